//! Application wiring: the SQLite store behind the web state and health probes

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use chirp_core::AccountWorkflow;
use chirp_observability::{ComponentStatus, HealthState, Metrics, ReadinessChecker};
use chirp_store_sqlite::SqliteStore;
use chirp_web::AppState;

use crate::config::ServerConfig;

/// Readiness backed by a database round trip
pub struct DatabaseReadiness {
    store: Arc<SqliteStore>,
}

impl DatabaseReadiness {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReadinessChecker for DatabaseReadiness {
    async fn check(&self) -> Vec<ComponentStatus> {
        let status = match self.store.ping().await {
            Ok(()) => ComponentStatus::healthy("database"),
            Err(e) => ComponentStatus::unhealthy("database", e.to_string()),
        };
        vec![status]
    }
}

/// Open the configured database and drop sessions that expired while the
/// server was down.
pub async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let path = config.database_path();
    info!("📁 Opening database: {}", path.display());
    let store = SqliteStore::open(&path, config.store_config()).await?;

    let purged = store.purge_expired_sessions().await?;
    if purged > 0 {
        info!("🧹 Removed {} expired sessions", purged);
    }

    Ok(Arc::new(store))
}

/// Web state and health state sharing one metrics registry
pub fn build_states(
    config: &ServerConfig,
    store: Arc<SqliteStore>,
) -> anyhow::Result<(AppState, HealthState)> {
    let metrics = Arc::new(Metrics::new()?);
    let state = AppState::new(store.clone(), metrics.clone(), config.web_config());
    let health =
        HealthState::with_readiness_checker(metrics, Arc::new(DatabaseReadiness::new(store)));
    Ok((state, health))
}

/// Account workflow for offline administration such as `create-user`
pub fn account_workflow(store: Arc<SqliteStore>) -> AccountWorkflow {
    AccountWorkflow::new(store.clone(), store.clone(), store)
}
