//! Lazy, process-lifetime installation of the Pulumi CLI.
//!
//! The first call to [`ToolchainInstaller::get_or_install`] downloads the
//! pinned release archive, unpacks it, moves the CLI into
//! `<install_root>/bin` and probes it. The resulting [`PulumiCommand`] is
//! cached for the rest of the process. Concurrent first calls are
//! serialized by the installer's `OnceCell`, so exactly one of them
//! performs the install. A failed install leaves the cell empty and the
//! next caller tries again.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::archive::extract_tar_gz;
use crate::config::IacConfig;
use crate::error::IacError;

/// Handle to an installed Pulumi CLI.
#[derive(Debug, Clone)]
pub struct PulumiCommand {
    binary: PathBuf,
    home: PathBuf,
    version: String,
}

impl PulumiCommand {
    pub fn new(
        binary: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            home: home.into(),
            version: version.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// A command for this CLI with `PULUMI_HOME` set and the CLI's own
    /// directory first on `PATH`, so language hosts shipped alongside it
    /// are found.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.env("PULUMI_HOME", &self.home)
            .env("PULUMI_SKIP_UPDATE_CHECK", "true")
            .kill_on_drop(true);
        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn search_path(&self) -> Option<OsString> {
        let bin_dir = self.binary.parent()?;
        let mut dirs = vec![bin_dir.to_path_buf()];
        if let Some(existing) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(dirs).ok()
    }

    /// Run one CLI step and return its captured stdout.
    pub async fn run(
        &self,
        step: &'static str,
        args: &[&str],
        envs: &[(&str, &str)],
        workdir: &Path,
    ) -> Result<String, IacError> {
        self.execute(step, args, None, envs, workdir).await
    }

    /// Like [`run`](Self::run), but feeds `input` to the child's stdin.
    /// Secret values go this way so they never appear in the argument list.
    pub async fn run_with_stdin(
        &self,
        step: &'static str,
        args: &[&str],
        input: &str,
        envs: &[(&str, &str)],
        workdir: &Path,
    ) -> Result<String, IacError> {
        self.execute(step, args, Some(input), envs, workdir).await
    }

    async fn execute(
        &self,
        step: &'static str,
        args: &[&str],
        input: Option<&str>,
        envs: &[(&str, &str)],
        workdir: &Path,
    ) -> Result<String, IacError> {
        let mut cmd = self.command();
        cmd.args(args)
            .current_dir(workdir)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in envs {
            cmd.env(key, value);
        }

        debug!(step, "Running pulumi");
        let mut child = cmd.spawn()?;
        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(IacError::Command {
                step,
                status: output.status.to_string(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(stdout)
    }
}

/// Installs the Pulumi CLI once and hands out the cached handle.
pub struct ToolchainInstaller {
    config: IacConfig,
    http: reqwest::Client,
    command: OnceCell<PulumiCommand>,
}

impl ToolchainInstaller {
    pub fn new(config: IacConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            command: OnceCell::new(),
        }
    }

    /// An installer whose CLI is already in place (e.g. baked into the
    /// image); nothing will be downloaded.
    pub fn with_command(config: IacConfig, command: PulumiCommand) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            command: OnceCell::from(command),
        }
    }

    pub fn config(&self) -> &IacConfig {
        &self.config
    }

    pub fn is_installed(&self) -> bool {
        self.command.initialized()
    }

    pub async fn get_or_install(&self) -> Result<&PulumiCommand, IacError> {
        if let Some(command) = self.command.get() {
            debug!(version = %command.version(), "Reusing installed Pulumi CLI");
            return Ok(command);
        }
        self.command.get_or_try_init(|| self.install()).await
    }

    async fn install(&self) -> Result<PulumiCommand, IacError> {
        tokio::fs::create_dir_all(&self.config.install_root).await?;

        if let Some(archive) = &self.config.local_archive {
            info!(archive = %archive.display(), "Installing Pulumi CLI from local archive");
            return self.install_from_archive(archive).await;
        }

        let url = self.config.release_url();
        let archive = self.config.archive_path();
        info!(%url, "Downloading Pulumi CLI");
        download(&self.http, &url, &archive).await?;

        let installed = self.install_from_archive(&archive).await;
        if let Err(e) = tokio::fs::remove_file(&archive).await {
            debug!(error = %e, "Could not remove downloaded archive");
        }
        installed
    }

    async fn install_from_archive(&self, archive: &Path) -> Result<PulumiCommand, IacError> {
        let root = self.config.install_root.clone();
        let archive_path = archive.to_path_buf();
        let scratch = tokio::task::spawn_blocking(move || -> Result<_, IacError> {
            let scratch = tempfile::Builder::new()
                .prefix("pulumi")
                .tempdir_in(&root)?;
            extract_tar_gz(&archive_path, scratch.path())?;
            Ok(scratch)
        })
        .await
        .map_err(|e| IacError::Io(std::io::Error::other(e)))??;

        let extracted = scratch.path().join("pulumi");
        if !extracted.join("pulumi").is_file() {
            return Err(IacError::Layout(format!(
                "{} does not contain pulumi/pulumi",
                archive.display()
            )));
        }

        let bin_dir = self.config.bin_dir();
        if tokio::fs::try_exists(&bin_dir).await? {
            tokio::fs::remove_dir_all(&bin_dir).await?;
        }
        tokio::fs::rename(&extracted, &bin_dir).await?;
        drop(scratch);

        let home = self.config.home_dir();
        tokio::fs::create_dir_all(&home).await?;

        let binary = bin_dir.join("pulumi");
        let version = probe_version(&binary, &home).await?;
        if version.trim_start_matches('v') != self.config.pulumi_version {
            // Not fatal; the archive may have been supplied out of band.
            info!(
                expected = %self.config.pulumi_version,
                found = %version,
                "Pulumi version differs from pin"
            );
        }
        info!(binary = %binary.display(), %version, "Pulumi CLI installed");

        Ok(PulumiCommand::new(binary, home, version))
    }
}

async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), IacError> {
    let failed = |reason: String| IacError::Download {
        url: url.to_string(),
        reason,
    };

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("bad status: {}", response.status())));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(%url, bytes = written, "Download complete");
    Ok(())
}

async fn probe_version(binary: &Path, home: &Path) -> Result<String, IacError> {
    let probe = PulumiCommand::new(binary, home, String::new());
    let stdout = probe.run("version", &["version"], &[], home).await?;
    Ok(stdout.trim().to_string())
}
