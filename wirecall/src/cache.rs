//! Response caching.
//!
//! Caching is opt-in: a session caches only after
//! [`Session::cache`](crate::Session::cache) installs a [`ResponseCache`].
//! Each wire request carries a [`CachePolicy`] saying how it may use the
//! store; the session's [`CacheHandler`](crate::handler::CacheHandler)
//! decides what gets stored.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use http::Method;
use lru::LruCache;
use url::Url;

use crate::request::WireRequest;
use crate::response::RawResponse;

/// How a request may use the response cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Always load; store the response if the cache handler allows it.
    #[default]
    UseProtocol,
    /// Load without consulting the cache. The response may still be stored.
    ReloadIgnoringCache,
    /// Return a stored response if there is one, otherwise load.
    ReturnCacheElseLoad,
    /// Return a stored response or fail with
    /// [`Error::CacheMiss`](crate::Error::CacheMiss). Never loads.
    ReturnCacheDontLoad,
}

impl CachePolicy {
    pub fn reads_cache(&self) -> bool {
        matches!(
            self,
            CachePolicy::ReturnCacheElseLoad | CachePolicy::ReturnCacheDontLoad
        )
    }
}

/// Identity of a cached response.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: Url,
}

impl CacheKey {
    pub fn for_request(request: &WireRequest) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
        }
    }
}

/// A store of responses.
pub trait ResponseCache: Send + Sync + 'static {
    fn get(&self, key: &CacheKey) -> Option<RawResponse>;

    fn put(&self, key: CacheKey, response: RawResponse);

    fn remove(&self, key: &CacheKey);

    fn clear(&self);
}

/// In-memory LRU response cache.
///
/// # Example
///
/// ```ignore
/// use wirecall::{MemoryCache, Session};
///
/// let session = Session::new(transport).cache(MemoryCache::new(256));
/// ```
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, RawResponse>>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` responses. A capacity of
    /// zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, RawResponse>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<RawResponse> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: CacheKey, response: RawResponse) {
        self.lock().put(key, response);
    }

    fn remove(&self, key: &CacheKey) {
        self.lock().pop(key);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("MemoryCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    fn key(path: &str) -> CacheKey {
        CacheKey {
            method: Method::GET,
            url: format!("https://api.example.com{path}").parse().unwrap(),
        }
    }

    fn response(body: &'static str) -> RawResponse {
        RawResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
            "https://api.example.com/".parse().unwrap(),
        )
    }

    #[test]
    fn test_memory_cache_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        cache.put(key("/a"), response("a"));
        cache.put(key("/b"), response("b"));
        // Touch /a so /b becomes the eviction candidate.
        assert!(cache.get(&key("/a")).is_some());
        cache.put(key("/c"), response("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("/b")).is_none());
        assert_eq!(cache.get(&key("/a")).unwrap().body(), "a");
    }

    #[test]
    fn test_memory_cache_remove_and_clear() {
        let cache = MemoryCache::new(0);
        cache.put(key("/a"), response("a"));
        cache.remove(&key("/a"));
        assert!(cache.is_empty());

        cache.put(key("/b"), response("b"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_distinguishes_method() {
        let mut post = key("/a");
        post.method = Method::POST;
        assert_ne!(post, key("/a"));
    }

    #[test]
    fn test_policy_reads_cache() {
        assert!(!CachePolicy::UseProtocol.reads_cache());
        assert!(!CachePolicy::ReloadIgnoringCache.reads_cache());
        assert!(CachePolicy::ReturnCacheElseLoad.reads_cache());
        assert!(CachePolicy::ReturnCacheDontLoad.reads_cache());
    }
}
