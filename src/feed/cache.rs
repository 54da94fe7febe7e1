//! Conditional-GET bookkeeping shared by concurrent fetches.
//!
//! The cache remembers the validators (`ETag`, `Last-Modified`) and the last
//! good body of each feed so that an unchanged feed can answer
//! `304 Not Modified` and still yield articles. It is an explicitly owned
//! component: construct one, wrap it in an `Arc` and hand it to
//! [`HttpTransport`](super::HttpTransport).
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::FeedUrl;

/// Default number of feeds remembered by the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Validators and body of the last successful download of one feed.
#[derive(Debug, Clone)]
pub struct FeedInfo {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Shared so lookups don't copy whole feed documents
    pub body: Arc<[u8]>,
}

impl FeedInfo {
    /// True when the server gave us something to revalidate with.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// Bounded, thread-safe LRU of [`FeedInfo`] keyed by feed URL.
///
/// All operations take a short-lived lock and never hold it across an
/// `.await`, so the cache can be used from any number of fetch tasks.
pub struct FeedInfoCache {
    entries: Mutex<LruCache<FeedUrl, FeedInfo>>,
}

impl FeedInfoCache {
    /// Creates a cache holding at most `capacity` feeds (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, url: &FeedUrl) -> Option<FeedInfo> {
        self.lock().get(url).cloned()
    }

    pub fn put(&self, url: FeedUrl, info: FeedInfo) {
        self.lock().put(url, info);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock can't leave the LRU half-updated in a
    // way that matters here; worst case is a stale entry.
    fn lock(&self) -> MutexGuard<'_, LruCache<FeedUrl, FeedInfo>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Feed info cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for FeedInfoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for FeedInfoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedInfoCache")
            .field("len", &self.len())
            .finish()
    }
}
