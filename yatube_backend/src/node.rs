use crate::api;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::YatubeConfig;
use crate::database::Database;
use anyhow::Result;

/// Bootstraps the site once and hands out cloned handles to whichever
/// entrypoint (web server or admin console) needs them.
pub struct YatubeNode {
    config: YatubeConfig,
    bootstrap: BootstrapResources,
}

impl YatubeNode {
    pub async fn start(config: YatubeConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config).await?;

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db_path = %config.paths.db_path.display(),
            "yatube node initialized"
        );

        Ok(Self { config, bootstrap })
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            session_secret: self.bootstrap.session_secret.clone(),
        }
    }

    /// Runs the web server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        let snapshot = self.snapshot();
        api::serve_http(snapshot.config, snapshot.database, snapshot.session_secret).await
    }
}

#[derive(Clone)]
pub struct NodeSnapshot {
    pub config: YatubeConfig,
    pub database: Database,
    pub session_secret: String,
}
