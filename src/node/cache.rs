//! Per-handle cache of object bytes and system metadata

use crate::types::{Identifier, SystemMetadata};
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Entries are scoped to the subject that fetched them; `None` is the anonymous scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject: Option<String>,
    pid: Identifier,
}

impl CacheKey {
    pub fn new(subject: Option<&str>, pid: &Identifier) -> Self {
        Self {
            subject: subject.map(str::to_string),
            pid: pid.clone(),
        }
    }
}

/// LRU cache consulted by `get` and `get_system_metadata` when enabled
pub struct ObjectCache {
    objects: Mutex<LruCache<CacheKey, Bytes>>,
    metadata: Mutex<LruCache<CacheKey, SystemMetadata>>,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            objects: Mutex::new(LruCache::new(capacity)),
            metadata: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn object(&self, key: &CacheKey) -> Option<Bytes> {
        self.objects.lock().get(key).cloned()
    }

    pub fn put_object(&self, key: CacheKey, bytes: Bytes) {
        self.objects.lock().put(key, bytes);
    }

    pub fn system_metadata(&self, key: &CacheKey) -> Option<SystemMetadata> {
        self.metadata.lock().get(key).cloned()
    }

    pub fn put_system_metadata(&self, key: CacheKey, sysmeta: SystemMetadata) {
        self.metadata.lock().put(key, sysmeta);
    }

    /// Forget everything held for `pid`, under every subject
    pub fn invalidate(&self, pid: &Identifier) {
        evict_pid(&mut self.objects.lock(), pid);
        evict_pid(&mut self.metadata.lock(), pid);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len() + self.metadata.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_pid<V>(cache: &mut LruCache<CacheKey, V>, pid: &Identifier) {
    let stale: Vec<CacheKey> = cache.iter().filter(|(key, _)| &key.pid == pid).map(|(key, _)| key.clone()).collect();
    for key in stale {
        cache.pop(&key);
    }
}
