//! Coalescing of identical concurrent requests.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};

type PendingMap<K, V> = Arc<Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>>;

/// Tracks outstanding requests by key. A second caller with a key that is
/// still pending awaits the first caller's future instead of starting a
/// new one. Entries are removed as soon as the shared future completes.
pub struct Inflight<K, V> {
    pending: PendingMap<K, V>,
}

impl<K, V> Default for Inflight<K, V> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Inflight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `start()` unless a request for `key` is already pending, in
    /// which case the pending result is awaited.
    pub async fn run<F>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = pending.get(&key) {
                existing.clone()
            } else {
                let request = start();
                let map = Arc::clone(&self.pending);
                let done_key = key.clone();
                let shared = async move {
                    let value = request.await;
                    map.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&done_key);
                    value
                }
                .boxed()
                .shared();
                pending.insert(key, shared.clone());
                shared
            }
        };
        shared.await
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
