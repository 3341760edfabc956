use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct YatubeConfig {
    pub api_port: u16,
    pub paths: YatubePaths,
    pub listing: ListingConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
}

impl YatubeConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("YATUBE_HOME") {
            Ok(raw) if !raw.trim().is_empty() => YatubePaths::from_base_dir(raw.trim())?,
            _ => YatubePaths::discover()?,
        };
        let api_port = parse_env("YATUBE_API_PORT").unwrap_or(8000);
        Ok(Self {
            api_port,
            paths,
            listing: ListingConfig::from_env(),
            cache: CacheConfig::from_env(),
            auth: AuthConfig::from_env(),
            upload: UploadConfig::from_env(),
        })
    }

    /// Builds a configuration rooted at `paths` with every other section at
    /// its defaults. Used by tests and by embedders that manage their own
    /// directories.
    pub fn new(api_port: u16, paths: YatubePaths) -> Self {
        Self {
            api_port,
            paths,
            listing: ListingConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub posts_per_page: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { posts_per_page: 10 }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let posts_per_page = parse_env::<usize>("YATUBE_POSTS_PER_PAGE")
            .filter(|n| *n > 0)
            .unwrap_or(ListingConfig::default().posts_per_page);
        Self { posts_per_page }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub index_ttl: Duration,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            index_ttl: Duration::from_secs(20),
            max_entries: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let index_ttl = parse_env::<u64>("YATUBE_INDEX_CACHE_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.index_ttl);
        Self {
            index_ttl,
            ..defaults
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signing secret for session tokens. When unset, a generated secret is
    /// persisted in the `settings` table on first start.
    pub session_secret: Option<String>,
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl: Duration::from_secs(14 * 24 * 60 * 60),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let session_secret = env::var("YATUBE_SESSION_SECRET").ok().and_then(|raw| {
            if raw.trim().is_empty() {
                None
            } else {
                Some(raw)
            }
        });
        let session_ttl = parse_env::<u64>("YATUBE_SESSION_TTL_HOURS")
            .map(|hours| Duration::from_secs(hours * 60 * 60))
            .unwrap_or(defaults.session_ttl);
        // bcrypt refuses costs outside 4..=31
        let bcrypt_cost = parse_env::<u32>("YATUBE_BCRYPT_COST")
            .filter(|cost| (4..=31).contains(cost))
            .unwrap_or(defaults.bcrypt_cost);
        Self {
            session_secret,
            session_ttl,
            bcrypt_cost,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = parse_env::<usize>("YATUBE_MAX_UPLOAD_BYTES")
            .unwrap_or(UploadConfig::default().max_upload_bytes);
        Self { max_upload_bytes }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct YatubePaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub post_images_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub templates_glob: String,
}

impl YatubePaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("yatube.db");
        let media_dir = base.join("media");
        let post_images_dir = media_dir.join("posts");
        let logs_dir = base.join("logs");
        let templates_glob = env::var("YATUBE_TEMPLATES").unwrap_or_else(|_| {
            concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*").to_string()
        });

        Ok(Self {
            base,
            data_dir,
            db_path,
            media_dir,
            post_images_dir,
            logs_dir,
            templates_glob,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_base_dir() {
        let paths = YatubePaths::from_base_dir("/srv/yatube").unwrap();
        assert_eq!(paths.db_path, PathBuf::from("/srv/yatube/data/yatube.db"));
        assert_eq!(paths.post_images_dir, PathBuf::from("/srv/yatube/media/posts"));
    }

    #[test]
    fn defaults_match_listing_and_cache_expectations() {
        let config = YatubeConfig::new(8000, YatubePaths::default());
        assert_eq!(config.listing.posts_per_page, 10);
        assert_eq!(config.cache.index_ttl, Duration::from_secs(20));
        assert!(config.auth.session_secret.is_none());
    }
}
