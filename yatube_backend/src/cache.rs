use crate::authz::Viewer;
use crate::config::CacheConfig;
use moka::sync::Cache;

/// Rendered-page cache for the home listing. Entries live for the configured
/// TTL unless [`PageCache::invalidate`] drops them first.
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, String>,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        let pages = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.index_ttl)
            .build();
        Self { pages }
    }

    /// The page body depends on the URL and on who is looking at it.
    pub fn key(path_and_query: &str, viewer: &Viewer) -> String {
        match viewer.username() {
            Some(username) => format!("{path_and_query}|{username}"),
            None => format!("{path_and_query}|"),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.pages.get(key)
    }

    pub fn insert(&self, key: String, body: String) {
        self.pages.insert(key, body);
    }

    pub fn invalidate(&self) {
        self.pages.invalidate_all();
        tracing::debug!("page cache invalidated");
    }
}
