//! Gzip-compressed tar extraction for the toolchain release archive.
//!
//! Only directories and regular files are recreated, with their original
//! permission bits. Any other entry type (links, devices, FIFOs, ...) is
//! an error, as is any path that would land outside the destination.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::IacError;

/// Unpack `archive` into `destination`, creating it if needed.
pub fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<(), IacError> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    fs::create_dir_all(destination)?;

    let mut files = 0usize;
    for entry in tar.entries()? {
        let mut entry = entry?;
        let relative = entry.path()?.into_owned();
        let target = confined_join(destination, &relative)?;
        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode()?;

        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
            set_mode(&target, mode)?;
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            set_mode(&target, mode)?;
            files += 1;
        } else {
            return Err(IacError::UnsupportedEntry {
                kind: format!("{entry_type:?}"),
                path: relative.display().to_string(),
            });
        }
    }

    debug!(archive = %archive.display(), files, "Extracted archive");
    Ok(())
}

fn confined_join(root: &Path, relative: &Path) -> Result<PathBuf, IacError> {
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return Err(IacError::UnsafePath(relative.display().to_string())),
        }
    }
    Ok(joined)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
