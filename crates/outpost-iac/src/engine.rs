//! Account provisioning through the Pulumi CLI.
//!
//! One stack per account, living in a project for its organization. Both
//! names go through the reversible [`program::pulumi_name`] encoding, so
//! distinct accounts never share a stack. Stack configuration carries the
//! account's cloud credentials; the organization's access token is only
//! ever passed through the environment.

use std::sync::Arc;

use outpost_core::models::account::Account;
use outpost_core::models::organization::Organization;
use tracing::info;

use crate::error::IacError;
use crate::program;
use crate::toolchain::ToolchainInstaller;

/// Materializes the infrastructure behind an account.
pub trait ProvisioningEngine: Send + Sync {
    /// Create or update the account's resources and return the engine's
    /// human-readable output. Nothing is rolled back on failure.
    fn create_account(
        &self,
        account: &Account,
        organization: &Organization,
    ) -> impl Future<Output = Result<String, IacError>> + Send;
}

/// [`ProvisioningEngine`] backed by the Pulumi CLI.
#[derive(Clone)]
pub struct PulumiEngine {
    installer: Arc<ToolchainInstaller>,
}

impl PulumiEngine {
    pub fn new(installer: Arc<ToolchainInstaller>) -> Self {
        Self { installer }
    }
}

impl ProvisioningEngine for PulumiEngine {
    async fn create_account(
        &self,
        account: &Account,
        organization: &Organization,
    ) -> Result<String, IacError> {
        let pulumi = self.installer.get_or_install().await?;
        let config = self.installer.config();

        let workdir = tempfile::Builder::new().prefix("pulumi").tempdir()?;
        let dir = workdir.path();
        let project = program::pulumi_name(&organization.name);
        let stack = program::pulumi_name(&account.name);
        program::write(dir, &project).await?;

        let envs = [(
            "PULUMI_ACCESS_TOKEN",
            organization.provisioning_token.as_str(),
        )];
        let creds = &account.credentials;

        pulumi
            .run(
                "stack select",
                &["stack", "select", "--create", "--non-interactive", stack.as_str()],
                &envs,
                dir,
            )
            .await?;

        let settings = [
            ("aws:region", config.aws_region.as_str()),
            ("aws:accessKey", creds.access_key.as_str()),
        ];
        for (key, value) in settings {
            let args = ["config", "set", "--stack", stack.as_str(), "--", key, value];
            pulumi.run("config set", &args, &envs, dir).await?;
        }

        // Secret values travel on stdin, never in the argument list.
        let secrets = [
            ("aws:secretKey", creds.secret_key.as_str()),
            ("aws:token", creds.session_token.as_str()),
        ];
        for (key, value) in secrets {
            let args = ["config", "set", "--stack", stack.as_str(), "--secret", "--", key];
            pulumi
                .run_with_stdin("config set", &args, value, &envs, dir)
                .await?;
        }

        pulumi
            .run(
                "plugin install",
                &["plugin", "install", "resource", "aws", config.aws_plugin_version.as_str()],
                &envs,
                dir,
            )
            .await?;

        let output = pulumi
            .run(
                "up",
                &[
                    "up",
                    "--yes",
                    "--skip-preview",
                    "--suppress-progress",
                    "--non-interactive",
                    "--stack",
                    stack.as_str(),
                ],
                &envs,
                dir,
            )
            .await?;

        info!(%project, %stack, "Account stack is up to date");
        Ok(output)
    }
}
