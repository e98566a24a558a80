//! Directory Listing Cache
//!
//! Thread-safe TTL cache for remote directory listings, so repeated
//! `ls`/`info` calls against slow backends (FTP) do not re-issue
//! transfers. Uses DashMap for concurrent access without lock
//! contention.
//!
//! Features:
//! - TTL-based expiration (300s default)
//! - Per-directory invalidation on mutation
//! - Cache HIT/MISS logging

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::types::FileInfo;
use crate::utils::constants::DEFAULT_CACHE_TTL_SECS;

/// Cached listing with creation timestamp for TTL validation
#[derive(Clone, Debug)]
struct CacheEntry {
    entries: Arc<Vec<FileInfo>>,
    created_at: Instant,
    ttl_secs: u64,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > Duration::from_secs(self.ttl_secs)
    }
}

/// TTL cache of directory listings, keyed by directory path
#[derive(Clone)]
pub struct ListingCache {
    store: Arc<DashMap<String, CacheEntry>>,
    ttl_secs: u64,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    /// Cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL_SECS)
    }

    /// Cache with a custom TTL
    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl_secs,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a cached listing if present and not expired
    pub fn get(&self, path: &str) -> Option<Arc<Vec<FileInfo>>> {
        if let Some(entry) = self.store.get(path) {
            if entry.is_expired() {
                drop(entry); // release read lock before removing
                self.store.remove(path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 listing cache MISS (expired): {}", path);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ listing cache HIT: {}", path);
                Some(entry.entries.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 listing cache MISS: {}", path);
            None
        }
    }

    /// Store a listing
    pub fn set(&self, path: &str, entries: Vec<FileInfo>) -> Arc<Vec<FileInfo>> {
        let shared = Arc::new(entries);
        self.store.insert(
            path.to_string(),
            CacheEntry {
                entries: shared.clone(),
                created_at: Instant::now(),
                ttl_secs: self.ttl_secs,
            },
        );
        shared
    }

    /// Drop the cached listing for one directory
    pub fn invalidate(&self, path: &str) {
        self.store.remove(path);
        debug!("🗑️ listing cache invalidate: {}", path);
    }

    /// Drop every cached listing
    pub fn invalidate_all(&self) {
        self.store.clear();
    }

    /// Remove expired entries, returning how many were dropped
    #[allow(dead_code)]
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        before - self.store.len()
    }

    /// Hit/miss statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl_secs,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
