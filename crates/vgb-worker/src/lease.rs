//! Worker Lease
//!
//! Scoped checkout of a pooled worker. Dropping the lease runs the
//! release / put-back protocol.

use std::sync::Arc;

use crate::{ThreadManager, ThreadState, Worker, WorkerError, WorkerId, WorkerThread};

/// Exclusive use of a worker until released or dropped
pub struct WorkerLease<S: ThreadState> {
    manager: Arc<ThreadManager<S>>,
    worker: Worker<S>,
    released: bool,
}

impl<S: ThreadState> std::fmt::Debug for WorkerLease<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("worker", &self.worker)
            .field("released", &self.released)
            .finish()
    }
}

impl<S: ThreadState> WorkerLease<S> {
    pub(crate) fn new(manager: Arc<ThreadManager<S>>, worker: Worker<S>) -> Self {
        Self {
            manager,
            worker,
            released: false,
        }
    }

    /// The leased worker
    pub fn worker(&self) -> &WorkerThread<S> {
        &self.worker
    }

    /// Checkout epoch of this lease
    pub fn checkout(&self) -> u64 {
        self.worker.checkout()
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    /// Queue a task on the leased worker
    pub fn run<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.worker.run(task)
    }

    /// Queue a task and block for its result
    pub fn run_and_wait<F, R>(&self, task: F) -> Result<R, WorkerError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.worker.run_and_wait(task)
    }

    /// Release the worker with a final cleanup task and return it to the pool
    pub fn release<F>(mut self, on_release: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.finish(on_release);
    }

    fn finish<F>(&mut self, on_release: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.released {
            return;
        }
        self.released = true;
        self.manager.release_thread(&self.worker, on_release);
        self.manager.put_back(self.worker.clone());
    }
}

impl<S: ThreadState> Drop for WorkerLease<S> {
    fn drop(&mut self) {
        self.finish(|_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WorkerConfig, WorkerPhase};
    use parking_lot::Mutex;

    #[test]
    fn test_lease_release_runs_cleanup() {
        let manager: Arc<ThreadManager<()>> = ThreadManager::new(WorkerConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));

        let lease = manager.checkout("lease").unwrap();
        let worker = lease.worker.clone();
        let task_log = Arc::clone(&log);
        lease.run(move |_| task_log.lock().push("draw")).unwrap();
        let cleanup_log = Arc::clone(&log);
        lease.release(move |_| cleanup_log.lock().push("cleanup"));

        worker.wait_idle().unwrap();
        assert_eq!(*log.lock(), vec!["draw", "cleanup"]);
        assert_eq!(manager.stats().idle_workers, 1);
    }

    #[test]
    fn test_lease_drop_returns_worker() {
        let manager: Arc<ThreadManager<()>> = ThreadManager::new(WorkerConfig::default());

        let worker = {
            let lease = manager.checkout("scoped").unwrap();
            assert!(lease.worker().is_working());
            lease.worker.clone()
        };

        worker.wait_idle().unwrap();
        assert!(!worker.is_working());
        assert_eq!(worker.phase(), WorkerPhase::Idle);
        assert_eq!(manager.stats().checked_out, 0);
    }
}
