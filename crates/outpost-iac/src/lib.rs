//! Outpost IaC — installs the Pulumi CLI on first use and drives it to
//! provision cloud accounts.

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod program;
pub mod toolchain;

pub use config::IacConfig;
pub use engine::{ProvisioningEngine, PulumiEngine};
pub use error::IacError;
pub use toolchain::{PulumiCommand, ToolchainInstaller};
