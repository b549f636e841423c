//! Provisioning and toolchain error types.

use outpost_core::error::OutpostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IacError {
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("unsupported archive entry type {kind} at {path}")]
    UnsupportedEntry { kind: String, path: String },

    #[error("archive entry escapes destination: {0}")]
    UnsafePath(String),

    #[error("toolchain layout invalid: {0}")]
    Layout(String),

    #[error("pulumi {step} exited with {status}: {stderr}")]
    Command {
        step: &'static str,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IacError {
    /// Errors raised while acquiring the toolchain rather than running it.
    pub fn is_toolchain(&self) -> bool {
        matches!(
            self,
            Self::Download { .. }
                | Self::UnsupportedEntry { .. }
                | Self::UnsafePath(_)
                | Self::Layout(_)
        )
    }
}

impl From<IacError> for OutpostError {
    fn from(err: IacError) -> Self {
        if err.is_toolchain() {
            OutpostError::Toolchain(err.to_string())
        } else {
            OutpostError::Provisioning(err.to_string())
        }
    }
}
