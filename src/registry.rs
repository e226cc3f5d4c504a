use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

use crate::error::{RagError, Result};
use crate::store::VectorStore;

/// Requester identity → that requester's current store.
///
/// Stores are swapped in whole: a reader clones the `Arc` it finds and keeps
/// searching it even if a re-upload replaces the entry a moment later. By
/// default nothing is ever evicted.
pub struct StoreRegistry {
    stores: Mutex<LruCache<String, Arc<VectorStore>>>,
    capacity: Option<NonZeroUsize>,
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl StoreRegistry {
    pub fn unbounded() -> Self {
        Self {
            stores: Mutex::new(LruCache::unbounded()),
            capacity: None,
        }
    }

    /// Keeps at most `capacity` identities, evicting the least recently used.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            stores: Mutex::new(LruCache::new(capacity)),
            capacity: Some(capacity),
        }
    }

    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        match capacity {
            Some(capacity) => Self::with_capacity(capacity),
            None => Self::unbounded(),
        }
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Installs `store` for `identity`, returning the store it replaced.
    pub fn replace(&self, identity: &str, store: VectorStore) -> Option<Arc<VectorStore>> {
        let store = Arc::new(store);
        match self.stores.lock().push(identity.to_string(), store) {
            Some((key, previous)) if key == identity => Some(previous),
            Some((evicted, _)) => {
                info!(identity = %evicted, "Evicted least recently used store");
                None
            }
            None => None,
        }
    }

    pub fn get(&self, identity: &str) -> Result<Arc<VectorStore>> {
        self.stores
            .lock()
            .get(identity)
            .cloned()
            .ok_or_else(|| RagError::NotFound(identity.to_string()))
    }

    pub fn remove(&self, identity: &str) -> bool {
        self.stores.lock().pop(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently used first.
    pub fn identities(&self) -> Vec<String> {
        self.stores.lock().iter().map(|(k, _)| k.clone()).collect()
    }
}
