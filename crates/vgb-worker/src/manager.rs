//! Thread Manager
//!
//! Lends pooled worker threads to callers that need exclusive use of a
//! thread-affine context, and takes them back for reuse. Workers live in
//! an arena indexed by [`WorkerId`]; the idle pool is a LIFO of slots.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::{
    Affinity, ThreadState, WorkerConfig, WorkerError, WorkerId, WorkerInfo, WorkerLease,
    WorkerThread,
};

/// A checked-out worker, stamped with the checkout it belongs to
///
/// Clones share the stamp. Once the worker is put back, every copy of this
/// handle is stale and the manager ignores it.
pub struct Worker<S: ThreadState> {
    thread: Arc<WorkerThread<S>>,
    checkout: u64,
}

impl<S: ThreadState> Worker<S> {
    /// Checkout epoch this handle was issued for
    pub fn checkout(&self) -> u64 {
        self.checkout
    }

    /// Whether this handle still refers to the live checkout
    pub fn is_current(&self) -> bool {
        self.thread.checkout() == self.checkout
    }

    /// The underlying worker
    pub fn thread(&self) -> &Arc<WorkerThread<S>> {
        &self.thread
    }
}

impl<S: ThreadState> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            thread: Arc::clone(&self.thread),
            checkout: self.checkout,
        }
    }
}

impl<S: ThreadState> Deref for Worker<S> {
    type Target = WorkerThread<S>;

    fn deref(&self) -> &Self::Target {
        &self.thread
    }
}

impl<S: ThreadState> std::fmt::Debug for Worker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("thread", &self.thread)
            .field("checkout", &self.checkout)
            .finish()
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live workers owned by the manager
    pub total_workers: usize,
    /// Workers sitting in the idle pool
    pub idle_workers: usize,
    /// Workers currently handed out
    pub checked_out: usize,
    /// Highest concurrent checkout count seen
    pub peak_checked_out: usize,
}

struct WorkerPool<S: ThreadState> {
    /// Arena of owned workers
    slots: Vec<Option<Arc<WorkerThread<S>>>>,
    /// Slots emptied by discarded workers
    free: Vec<usize>,
    /// Idle slots, most recently returned last
    idle: Vec<WorkerId>,
    checked_out: usize,
    peak_checked_out: usize,
}

impl<S: ThreadState> WorkerPool<S> {
    fn get(&self, id: WorkerId) -> Option<&Arc<WorkerThread<S>>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Empty a slot so `create` can reuse it
    fn discard(&mut self, id: WorkerId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    /// Pop the most recently returned idle worker, discarding dead ones
    fn pop_idle(&mut self) -> Option<Arc<WorkerThread<S>>> {
        while let Some(id) = self.idle.pop() {
            let Some(worker) = self.get(id).cloned() else {
                continue;
            };

            if worker.is_dead() {
                tracing::warn!("Discarding dead worker {} '{}'", id, worker.name());
                self.discard(id);
                continue;
            }

            return Some(worker);
        }
        None
    }

    fn create(&mut self, config: &WorkerConfig, name: &str) -> Arc<WorkerThread<S>> {
        let id = WorkerId(self.free.pop().unwrap_or(self.slots.len()));
        let name = if name.is_empty() {
            config.thread_name(id.0)
        } else {
            format!("{}-{}", name, id.0)
        };
        let info = WorkerInfo {
            id,
            name,
            affinity: Affinity::for_index(id.0, config.affinity_buckets),
        };

        let worker = Arc::new(WorkerThread::new(info, config.stack_size));
        match self.slots.get_mut(id.0) {
            Some(slot) => *slot = Some(Arc::clone(&worker)),
            None => self.slots.push(Some(Arc::clone(&worker))),
        }
        worker
    }

    fn live_workers(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Pool of reusable worker threads
pub struct ThreadManager<S: ThreadState> {
    config: WorkerConfig,
    pool: Mutex<WorkerPool<S>>,
}

impl<S: ThreadState> std::fmt::Debug for ThreadManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadManager")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

type Registry = HashMap<TypeId, Weak<dyn Any + Send + Sync>>;

/// Process-wide managers, one per thread-state type
static INSTANCES: OnceLock<Mutex<Registry>> = OnceLock::new();

impl<S: ThreadState> ThreadManager<S> {
    /// Create an independent manager
    pub fn new(config: WorkerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            pool: Mutex::new(WorkerPool {
                slots: Vec::new(),
                free: Vec::new(),
                idle: Vec::new(),
                checked_out: 0,
                peak_checked_out: 0,
            }),
        })
    }

    /// Get the process-wide manager for `S`, creating it on first use
    ///
    /// The instance is torn down once the last `Arc` is dropped; a later
    /// call creates a fresh one.
    pub fn get_instance() -> Arc<Self> {
        let mut registry = INSTANCES.get_or_init(Default::default).lock();
        let key = TypeId::of::<S>();

        if let Some(existing) = registry.get(&key).and_then(Weak::upgrade) {
            if let Ok(manager) = existing.downcast::<Self>() {
                return manager;
            }
        }

        let manager = Self::new(WorkerConfig::default());
        let erased: Arc<dyn Any + Send + Sync> = manager.clone();
        registry.insert(key, Arc::downgrade(&erased));

        tracing::info!("Created thread manager for {}", std::any::type_name::<S>());
        manager
    }

    /// Hand out a worker for exclusive use
    ///
    /// Reuses an idle worker when one exists, otherwise constructs a new
    /// one named after `name`. The returned worker is running, marked as
    /// working and stamped with a fresh checkout epoch.
    pub fn acquire_worker(&self, name: &str) -> Result<Worker<S>, WorkerError> {
        let (thread, checkout, reused) = {
            let mut pool = self.pool.lock();
            let (thread, reused) = match pool.pop_idle() {
                Some(thread) => (thread, true),
                None => (pool.create(&self.config, name), false),
            };
            let checkout = thread.advance_checkout();
            pool.checked_out += 1;
            pool.peak_checked_out = pool.peak_checked_out.max(pool.checked_out);
            (thread, checkout, reused)
        };

        if let Err(err) = thread.launch_thread() {
            let mut pool = self.pool.lock();
            pool.checked_out = pool.checked_out.saturating_sub(1);
            thread.advance_checkout();
            if thread.is_dead() {
                pool.discard(thread.id());
            } else {
                pool.idle.push(thread.id());
            }
            tracing::error!("Failed to launch worker {}: {}", thread.id(), err);
            return Err(err);
        }

        thread.set_is_working(true);
        tracing::debug!(
            "Acquired worker {} '{}' ({}, checkout {})",
            thread.id(),
            thread.name(),
            if reused { "reused" } else { "new" },
            checkout
        );
        Ok(Worker { thread, checkout })
    }

    /// Acquire a worker wrapped in a guard that returns it on drop
    pub fn checkout(self: &Arc<Self>, name: &str) -> Result<WorkerLease<S>, WorkerError> {
        let worker = self.acquire_worker(name)?;
        Ok(WorkerLease::new(Arc::clone(self), worker))
    }

    /// End a checkout: clear the working flag and queue `on_release`
    /// behind any pending work
    ///
    /// Ignored for a handle whose checkout has already ended.
    pub fn release_thread<F>(&self, worker: &Worker<S>, on_release: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if !worker.is_current() {
            tracing::warn!(
                "Release of worker {} ignored: checkout {} has ended",
                worker.id(),
                worker.checkout
            );
            return;
        }

        worker.set_is_working(false);
        worker.release_queue(on_release);
        tracing::debug!("Released worker {}", worker.id());
    }

    /// Return a released worker to the idle pool
    ///
    /// Ends the checkout: every copy of `worker` becomes stale.
    pub fn put_back(&self, worker: Worker<S>) {
        let id = worker.id();
        let mut pool = self.pool.lock();

        if !pool.get(id).is_some_and(|owned| Arc::ptr_eq(owned, &worker.thread)) {
            tracing::warn!("Worker {} is not owned by this manager", id);
            return;
        }

        if !worker.is_current() || pool.idle.contains(&id) {
            tracing::warn!(
                "Worker {} put back with ended checkout {}; ignored",
                id,
                worker.checkout
            );
            return;
        }

        if worker.is_working() {
            tracing::warn!("Worker {} put back without release; releasing now", id);
            self.release_thread(&worker, |_| {});
        }

        worker.advance_checkout();
        pool.idle.push(id);
        pool.checked_out = pool.checked_out.saturating_sub(1);
    }

    /// Pool statistics
    pub fn stats(&self) -> PoolStats {
        let pool = self.pool.lock();
        PoolStats {
            total_workers: pool.live_workers(),
            idle_workers: pool.idle.len(),
            checked_out: pool.checked_out,
            peak_checked_out: pool.peak_checked_out,
        }
    }

    /// Configuration this manager was created with
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

impl<S: ThreadState> Drop for ThreadManager<S> {
    fn drop(&mut self) {
        let workers: Vec<_> = self.pool.get_mut().slots.drain(..).flatten().collect();
        let count = workers.len();

        for worker in workers {
            worker.terminate_thread();
        }

        tracing::info!("Thread manager shut down ({} workers)", count);
    }
}
