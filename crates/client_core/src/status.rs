//! Calling-engine status: rate-limited fetching and background polling.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::FutureExt;
use shared::domain::SystemStatus;
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    api::{ApiResult, LeadsApi},
    inflight::Inflight,
};

pub const STATUS_MIN_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Default)]
struct Cache {
    /// Bumped by `invalidate`; requests started under an older value
    /// don't write back.
    generation: u64,
    attempted_at: Option<Instant>,
    result: Option<ApiResult<SystemStatus>>,
    last_good: Option<SystemStatus>,
}

/// Limits status requests to one per `min_interval`, successful or not.
/// Calls inside the window get the last outcome (including an error);
/// concurrent calls outside it share a single request.
pub struct StatusThrottle {
    min_interval: Duration,
    cache: Arc<Mutex<Cache>>,
    inflight: Inflight<u64, ApiResult<SystemStatus>>,
}

impl StatusThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            cache: Arc::new(Mutex::new(Cache::default())),
            inflight: Inflight::new(),
        }
    }

    pub async fn get(&self, api: Arc<dyn LeadsApi>) -> ApiResult<SystemStatus> {
        let generation = {
            let guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(result) = self.fresh(&guard) {
                return result;
            }
            guard.generation
        };

        let cache = Arc::clone(&self.cache);
        self.inflight
            .run(generation, move || {
                async move {
                    let result = api.status().await;
                    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
                    if guard.generation == generation {
                        guard.attempted_at = Some(Instant::now());
                        if let Ok(status) = &result {
                            guard.last_good = Some(*status);
                        }
                        guard.result = Some(result.clone());
                    }
                    result
                }
                .boxed()
            })
            .await
    }

    /// Forces the next [`get`](Self::get) to hit the backend. A request
    /// already in flight still answers its callers but is not cached.
    pub fn invalidate(&self) {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        guard.generation = guard.generation.wrapping_add(1);
        guard.attempted_at = None;
        guard.result = None;
    }

    /// Last successfully fetched status, however old.
    pub fn last_known(&self) -> Option<SystemStatus> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_good
    }

    fn fresh(&self, cache: &Cache) -> Option<ApiResult<SystemStatus>> {
        match (cache.attempted_at, &cache.result) {
            (Some(at), Some(result)) if at.elapsed() < self.min_interval => Some(result.clone()),
            _ => None,
        }
    }
}

/// Handle to a background status polling task. Dropping it stops the task.
pub struct StatusPoller {
    task: JoinHandle<()>,
}

impl StatusPoller {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
