//! Result caching collaborator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use oxide_query_core::Row;
use tokio::sync::RwLock;

use crate::error::Result;

/// A cache of result sets keyed by caller-supplied strings.
#[allow(async_fn_in_trait)]
pub trait Cache {
    /// Cached rows for `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<Row>>>;

    /// Stores rows under `key`; `None` keeps them until overwritten.
    async fn set(&self, key: &str, rows: &[Row], ttl: Option<Duration>) -> Result<()>;

    /// Whether `key` holds unexpired rows.
    async fn exists(&self, key: &str) -> Result<bool>;
}

#[derive(Debug)]
struct Entry {
    rows: Vec<Row>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// In-process [`Cache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones not yet evicted included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no entry is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops `key` when its entry has expired; returns the live entry's rows.
    async fn live(&self, key: &str) -> Option<Vec<Row>> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live()) {
            entries.remove(key);
        }
        entries.get(key).map(|e| e.rows.clone())
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Row>>> {
        Ok(self.live(key).await)
    }

    async fn set(&self, key: &str, rows: &[Row], ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            rows: rows.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).await.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        let rows = vec![Row::new().with("id", 1)];
        cache.set("users", &rows, None).await.unwrap();
        assert!(cache.exists("users").await.unwrap());
        assert_eq!(cache.get("users").await.unwrap(), Some(rows));
        assert_eq!(cache.get("posts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let cache = MemoryCache::new();
        cache
            .set("users", &[Row::new()], Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(!cache.exists("users").await.unwrap());
        assert_eq!(cache.get("users").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted_on_read() {
        let cache = MemoryCache::new();
        cache
            .set("stale", &[Row::new()], Some(Duration::ZERO))
            .await
            .unwrap();
        cache.set("fresh", &[Row::new()], None).await.unwrap();
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.get("stale").await.unwrap(), None);
        assert_eq!(cache.len().await, 1);
        assert!(cache.exists("fresh").await.unwrap());
        assert!(!cache.is_empty().await);
    }
}
