//! Fire-and-forget work that must still be owned by someone until it finishes.

use std::future::Future;
use tokio::{sync::Mutex, task::JoinSet};

/// Background tasks spawned while handling events.  Lives as long as the handler.
#[derive(Default)]
pub struct BackgroundTasks(Mutex<JoinSet<()>>);

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task`, reaping any tasks that already finished.
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.0.lock().await;
        while let Some(finished) = set.try_join_next() {
            if let Err(e) = finished {
                log::warn!("Background task failed: {}", e);
            }
        }
        set.spawn(task);
    }

    /// Tasks not yet reaped.  Finished tasks count until the next `spawn` or `join_all`.
    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }

    /// Wait for every outstanding task.  Used at shutdown.
    pub async fn join_all(&self) {
        let mut set = self.0.lock().await;
        while let Some(finished) = set.join_next().await {
            if let Err(e) = finished {
                log::warn!("Background task failed: {}", e);
            }
        }
    }

    pub async fn abort_all(&self) {
        let mut set = self.0.lock().await;
        set.abort_all();
        while set.join_next().await.is_some() {}
    }
}
