//! LRU embedding cache keyed by text.
//!
//! Log streams repeat the same error lines; a hit skips model inference.
//! Default: 1000 entries, 1-hour TTL.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bugwhisper_core::Result;
use ndarray::Array1;
use parking_lot::Mutex;

use crate::embedder::EmbedderBackend;

struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU + TTL cache of embeddings.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used at the front.
    order: VecDeque<String>,
    max_size: usize,
    ttl: Duration,
}

impl CacheInner {
    fn touch(&mut self, text: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == text) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }

    fn forget(&mut self, text: &str) {
        self.entries.remove(text);
        self.order.retain(|k| k != text);
    }
}

impl EmbeddingCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: VecDeque::with_capacity(max_size),
                max_size,
                ttl,
            }),
        }
    }

    pub fn default_cache() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    /// Cached embedding for `text`, refreshing its recency. None on miss or expiry.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let (embedding, expired) = match inner.entries.get(text) {
            Some(entry) => (entry.embedding.clone(), entry.inserted_at.elapsed() >= ttl),
            None => return None,
        };
        if expired {
            inner.forget(text);
            return None;
        }
        inner.touch(text);
        Some(embedding)
    }

    pub fn put(&self, text: &str, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();
        if inner.max_size == 0 {
            return;
        }
        if inner.entries.contains_key(text) {
            inner.touch(text);
        } else {
            while inner.entries.len() >= inner.max_size {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(text.to_string());
        }
        inner.entries.insert(
            text.to_string(),
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Embedder decorator that consults an `EmbeddingCache` first.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbedderBackend>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbedderBackend>, cache: EmbeddingCache) -> Self {
        Self { inner, cache }
    }

    pub fn with_default_cache(inner: Arc<dyn EmbedderBackend>) -> Self {
        Self::new(inner, EmbeddingCache::default_cache())
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

impl EmbedderBackend for CachedEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text)?;
        self.cache.put(text, embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hit_and_miss() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(3600));
        assert!(cache.get("NameError").is_none());
        cache.put("NameError", array![1.0, 2.0]);
        assert_eq!(cache.get("NameError"), Some(array![1.0, 2.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(3600));
        cache.put("a", array![1.0]);
        cache.put("b", array![2.0]);
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c", array![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = EmbeddingCache::new(10, Duration::from_millis(1));
        cache.put("ephemeral", array![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("ephemeral").is_none());
        assert!(cache.is_empty());
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl EmbedderBackend for CountingEmbedder {
        fn embed(&self, _text: &str) -> Result<Array1<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(array![1.0, 0.0])
        }
        fn dimension(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_cached_embedder_skips_repeat_inference() {
        let counting = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::with_default_cache(counting.clone());
        cached.embed("SyntaxError: unexpected EOF").unwrap();
        cached.embed("SyntaxError: unexpected EOF").unwrap();
        cached.embed("NameError").unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.name(), "counting");
        assert_eq!(cached.dimension(), 2);
    }
}
