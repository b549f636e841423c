//! Worker configuration, assembled from the environment.

use outpost_db::DbConfig;
use outpost_iac::IacConfig;

use crate::router::RouterConfig;

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub db: DbConfig,
    pub iac: IacConfig,
    pub router: RouterConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db: DbConfig::from_lookup(&lookup),
            iac: IacConfig::from_lookup(&lookup),
            router: RouterConfig::from_lookup(&lookup),
        }
    }
}
