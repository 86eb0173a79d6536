// Fire-and-forget background work.
// Tasks are tracked so shutdown and tests can wait for them to land.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinSet;
use tracing::warn;

/// A set of detached tasks that callers never wait on directly.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an async task onto the current runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.lock();
        while set.try_join_next().is_some() {}
        set.spawn(task);
    }

    /// Spawn a blocking closure (filesystem writes) onto the blocking pool.
    pub fn spawn_blocking<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut set = self.lock();
        while set.try_join_next().is_some() {}
        set.spawn_blocking(task);
    }

    /// Wait until every task spawned so far, and any they spawn, has finished.
    pub async fn settle(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.lock());
            if pending.is_empty() {
                return;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "background task did not complete");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
