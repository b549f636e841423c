//! Outpost worker: reads one change batch from stdin and processes it.

use std::sync::Arc;

use anyhow::Context;
use outpost_db::DbManager;
use outpost_db::repository::{SurrealAccountRepository, SurrealOrganizationRepository};
use outpost_iac::{PulumiEngine, ToolchainInstaller};
use outpost_worker::{ChangeBatch, ChangeEventRouter, WorkerConfig};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("outpost=info".parse()?))
        .json()
        .init();

    let config = WorkerConfig::from_env();

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("reading change batch from stdin")?;
    let batch: ChangeBatch = serde_json::from_str(&input).context("decoding change batch")?;
    tracing::info!(records = batch.records.len(), "Received change batch");

    let manager = DbManager::connect(&config.db).await?;
    outpost_db::run_migrations(manager.client()).await?;
    let db = manager.client().clone();

    let installer = Arc::new(ToolchainInstaller::new(config.iac));
    let router = ChangeEventRouter::new(
        SurrealOrganizationRepository::new(db.clone()),
        SurrealAccountRepository::new(db),
        PulumiEngine::new(installer),
        config.router,
    );

    match router.handle_batch(&batch.records).await {
        Ok(outcomes) => {
            tracing::info!(?outcomes, "Change batch processed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Change batch failed");
            Err(e.into())
        }
    }
}
