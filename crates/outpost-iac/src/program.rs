//! The Pulumi program applied to every account stack.
//!
//! Currently a stand-in resource graph (a single S3 bucket) written as a
//! Pulumi YAML project, so no language runtime beyond the CLI is needed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = "Pulumi.yaml";

/// Encode a control-plane name into Pulumi's project/stack alphabet
/// `[A-Za-z0-9_.-]`.
///
/// Letters, digits, `.` and `-` pass through; `_` is doubled and every
/// other byte becomes `_` plus two lowercase hex digits. The encoding is
/// reversible, so distinct names never share a stack.
pub fn pulumi_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => {
                encoded.push(char::from(byte));
            }
            b'_' => encoded.push_str("__"),
            other => {
                let _ = write!(encoded, "_{other:02x}");
            }
        }
    }
    encoded
}

pub fn render(project: &str) -> String {
    format!(
        "name: {project}\n\
         runtime: yaml\n\
         description: Outpost account resources\n\
         resources:\n  \
         account-bucket:\n    \
         type: aws:s3:Bucket\n"
    )
}

/// Write the project file into `workdir`.
pub async fn write(workdir: &Path, project: &str) -> std::io::Result<PathBuf> {
    let path = workdir.join(PROJECT_FILE);
    tokio::fs::write(&path, render(project)).await?;
    Ok(path)
}
