//! Liveness tracking for per-user background work.
//!
//! Every fetch or update issued for a user runs as a tokio task tracked
//! here. Removing the user invalidates the liveness token and aborts the
//! tasks; a task that has already passed its last await checks the token
//! before touching cache state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use laurel_core::{LaurelResult, ServiceError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared flag that stays true until the owning cache is torn down.
#[derive(Debug, Clone)]
pub struct LivenessToken(Arc<AtomicBool>);

impl LivenessToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the background tasks of one user cache.
#[derive(Debug)]
pub struct TaskTracker {
    token: LivenessToken,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskTracker {
    pub fn new(runtime: Handle) -> Self {
        Self {
            token: LivenessToken::new(),
            runtime,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.token.is_alive()
    }

    /// Spawn `task` on the background runtime.
    ///
    /// Fails once the tracker has been shut down.
    pub fn spawn<F>(&self, task: F) -> LaurelResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.token.is_alive() {
            return Err(ServiceError::RuntimeUnavailable {
                reason: "cache has been torn down".to_string(),
            }
            .into());
        }

        let mut tasks = self.tasks.lock().map_err(|_| ServiceError::RuntimeUnavailable {
            reason: "task tracker lock poisoned".to_string(),
        })?;
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(self.runtime.spawn(task));
        Ok(())
    }

    /// Number of tracked tasks that have not finished.
    pub fn active_count(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Invalidate the liveness token and abort every outstanding task.
    pub fn shutdown(&self) {
        self.token.invalidate();
        match self.tasks.lock() {
            Ok(mut tasks) => {
                let outstanding = tasks.len();
                for handle in tasks.drain(..) {
                    handle.abort();
                }
                debug!(outstanding = outstanding, "Aborted tracked tasks");
            }
            Err(_) => warn!("Task tracker lock poisoned during shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_liveness_token_shared_between_clones() {
        let token = LivenessToken::new();
        let clone = token.clone();
        assert!(clone.is_alive());
        token.invalidate();
        assert!(!clone.is_alive());
    }

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let tracker = TaskTracker::new(Handle::current());
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        tracker
            .spawn(async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_and_rejects_new_tasks() {
        let tracker = TaskTracker::new(Handle::current());
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        tracker
            .spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                f.store(true, Ordering::SeqCst);
            })
            .unwrap();

        tracker.shutdown();
        assert!(!tracker.is_alive());
        assert!(tracker.spawn(async {}).is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(tracker.active_count(), 0);
    }
}
