use crate::config::YatubeConfig;
use crate::database::Database;
use anyhow::{Context, Result};
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
    pub session_secret: String,
}

pub async fn initialize(config: &YatubeConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.media_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.post_images_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    let database_initialized = database.ensure_migrations()?;

    let session_secret = match &config.auth.session_secret {
        Some(secret) => secret.clone(),
        None => database.ensure_session_secret()?,
    };

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
        session_secret,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        created.push(path.display().to_string());
    }
    Ok(())
}
