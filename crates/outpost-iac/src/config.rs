//! Provisioning engine configuration.

use std::path::PathBuf;

/// Configuration for the Pulumi toolchain and the account stack.
#[derive(Debug, Clone)]
pub struct IacConfig {
    /// Pulumi CLI release to install (without the leading `v`).
    pub pulumi_version: String,
    /// Directory that receives `bin/` and the Pulumi home directory.
    pub install_root: PathBuf,
    /// Region every account stack is pinned to.
    pub aws_region: String,
    /// Version of the `aws` resource plugin.
    pub aws_plugin_version: String,
    /// Pre-fetched release archive. When set, nothing is downloaded.
    pub local_archive: Option<PathBuf>,
}

impl Default for IacConfig {
    fn default() -> Self {
        Self {
            pulumi_version: "3.113.3".into(),
            install_root: PathBuf::from("/tmp"),
            aws_region: "us-west-2".into(),
            aws_plugin_version: "v6.32.0".into(),
            local_archive: None,
        }
    }
}

impl IacConfig {
    /// Read `OUTPOST_*` variables, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            pulumi_version: lookup("OUTPOST_PULUMI_VERSION").unwrap_or(defaults.pulumi_version),
            install_root: lookup("OUTPOST_INSTALL_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.install_root),
            aws_region: lookup("OUTPOST_AWS_REGION").unwrap_or(defaults.aws_region),
            aws_plugin_version: lookup("OUTPOST_AWS_PLUGIN_VERSION")
                .unwrap_or(defaults.aws_plugin_version),
            local_archive: lookup("OUTPOST_PULUMI_ARCHIVE").map(PathBuf::from),
        }
    }

    pub fn release_url(&self) -> String {
        let v = &self.pulumi_version;
        format!("https://github.com/pulumi/pulumi/releases/download/v{v}/pulumi-v{v}-linux-x64.tar.gz")
    }

    /// Scratch location of the downloaded archive.
    pub fn archive_path(&self) -> PathBuf {
        self.install_root.join("pulumi.tar.gz")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.install_root.join("bin")
    }

    pub fn home_dir(&self) -> PathBuf {
        self.install_root.join(".pulumi")
    }
}
