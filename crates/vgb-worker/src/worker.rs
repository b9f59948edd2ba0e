//! Worker Thread
//!
//! A single OS thread draining a FIFO of closures. The thread owns a
//! piece of thread-affine state (see [`ThreadState`]) that every task
//! receives by mutable reference.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::{Affinity, ThreadState, WorkerError, WorkerId, WorkerInfo};

/// Task function type
pub type TaskFn<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Queued unit of work
enum Job<S> {
    Task(TaskFn<S>),
    /// Final job of a checkout
    Release(TaskFn<S>),
}

/// Worker lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerPhase {
    /// Constructed, no OS thread yet
    Created,
    /// Thread parked, not accepting work
    Idle,
    /// Accepting and draining work
    Running,
    /// Draining up to the release job
    Releasing,
    /// Thread exited, never restarted
    Terminated,
}

impl WorkerPhase {
    /// Get phase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Releasing => "releasing",
            Self::Terminated => "terminated",
        }
    }
}

struct QueueState<S> {
    jobs: VecDeque<Job<S>>,
    phase: WorkerPhase,
    accepting: bool,
    shutdown: bool,
    executing: bool,
    pending_releases: usize,
}

/// Worker queue
struct WorkerQueue<S> {
    state: Mutex<QueueState<S>>,
    /// Signalled on push and shutdown
    work_available: Condvar,
    /// Signalled whenever the queue goes quiet
    drained: Condvar,
}

impl<S> WorkerQueue<S> {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                phase: WorkerPhase::Created,
                accepting: false,
                shutdown: false,
                executing: false,
                pending_releases: 0,
            }),
            work_available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    fn push(&self, worker: WorkerId, task: TaskFn<S>) -> Result<(), WorkerError> {
        let mut queue = self.state.lock();
        if queue.shutdown {
            return Err(WorkerError::Terminated { worker });
        }
        if !queue.accepting {
            return Err(WorkerError::NotAccepting { worker });
        }
        queue.jobs.push_back(Job::Task(task));
        self.work_available.notify_one();
        Ok(())
    }

    /// Queue the release job and stop accepting. Returns false if the
    /// queue was not accepting work in the first place.
    fn push_release(&self, on_release: TaskFn<S>) -> bool {
        let mut queue = self.state.lock();
        if queue.shutdown || !queue.accepting {
            return false;
        }
        queue.accepting = false;
        queue.phase = WorkerPhase::Releasing;
        queue.pending_releases += 1;
        queue.jobs.push_back(Job::Release(on_release));
        self.work_available.notify_one();
        true
    }

    /// Block until a job is available. `None` once shut down and drained.
    fn wait_for_job(&self) -> Option<Job<S>> {
        let mut queue = self.state.lock();

        loop {
            if let Some(job) = queue.jobs.pop_front() {
                queue.executing = true;
                return Some(job);
            }

            if queue.shutdown {
                return None;
            }

            self.work_available.wait(&mut queue);
        }
    }

    fn finish_job(&self, was_release: bool) {
        let mut queue = self.state.lock();
        queue.executing = false;

        if was_release {
            queue.pending_releases = queue.pending_releases.saturating_sub(1);
            if queue.pending_releases == 0 && !queue.accepting && !queue.shutdown {
                queue.phase = WorkerPhase::Idle;
            }
        }

        if queue.jobs.is_empty() {
            self.drained.notify_all();
        }
    }

    fn open(&self, worker: WorkerId) -> Result<(), WorkerError> {
        let mut queue = self.state.lock();
        if queue.shutdown {
            return Err(WorkerError::Terminated { worker });
        }
        queue.accepting = true;
        queue.phase = WorkerPhase::Running;
        Ok(())
    }

    fn shutdown(&self) {
        let mut queue = self.state.lock();
        queue.shutdown = true;
        queue.accepting = false;
        self.work_available.notify_all();
    }

    fn mark_terminated(&self) {
        let mut queue = self.state.lock();
        queue.phase = WorkerPhase::Terminated;
        queue.accepting = false;
        queue.shutdown = true;
        queue.executing = false;
        self.drained.notify_all();
    }

    fn wait_idle(&self) {
        let mut queue = self.state.lock();
        while (queue.executing || !queue.jobs.is_empty())
            && queue.phase != WorkerPhase::Terminated
        {
            self.drained.wait(&mut queue);
        }
    }

    fn phase(&self) -> WorkerPhase {
        self.state.lock().phase
    }

    fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    jobs_run: AtomicU64,
    panics: AtomicU64,
    state_inits: AtomicU64,
}

/// Worker thread with a serial task queue and thread-affine state
pub struct WorkerThread<S: ThreadState> {
    info: WorkerInfo,
    stack_size: Option<usize>,
    queue: Arc<WorkerQueue<S>>,
    counters: Arc<WorkerCounters>,
    is_working: AtomicBool,
    /// Bumped on every hand-out and return
    checkout: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ThreadState> std::fmt::Debug for WorkerThread<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("affinity", &self.info.affinity)
            .field("phase", &self.phase())
            .field("is_working", &self.is_working())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

impl<S: ThreadState> WorkerThread<S> {
    /// Create a worker without starting its thread
    pub fn new(info: WorkerInfo, stack_size: Option<usize>) -> Self {
        Self {
            info,
            stack_size,
            queue: Arc::new(WorkerQueue::new()),
            counters: Arc::new(WorkerCounters::default()),
            is_working: AtomicBool::new(false),
            checkout: AtomicU64::new(0),
            thread: Mutex::new(None),
        }
    }

    /// Start the background thread if needed and begin accepting work
    ///
    /// Calling this on a running worker is a no-op.
    pub fn launch_thread(&self) -> Result<(), WorkerError> {
        let mut thread = self.thread.lock();

        match thread.as_ref().map(JoinHandle::is_finished) {
            Some(true) => {
                self.queue.mark_terminated();
                return Err(WorkerError::Terminated { worker: self.info.id });
            }
            Some(false) => {}
            None => {
                // Terminated before ever running
                if self.queue.phase() == WorkerPhase::Terminated {
                    return Err(WorkerError::Terminated { worker: self.info.id });
                }

                let mut builder = thread::Builder::new().name(self.info.name.clone());
                if let Some(size) = self.stack_size {
                    builder = builder.stack_size(size);
                }

                let info = self.info.clone();
                let queue = Arc::clone(&self.queue);
                let counters = Arc::clone(&self.counters);
                *thread = Some(builder.spawn(move || thread_main(info, queue, counters))?);

                tracing::debug!(
                    "Spawned worker {} '{}' ({} bucket)",
                    self.info.id,
                    self.info.name,
                    self.info.affinity.name()
                );
            }
        }

        self.queue.open(self.info.id)
    }

    /// Queue a task behind everything already submitted
    pub fn run<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.queue.push(self.info.id, Box::new(task))
    }

    /// Queue a task and block until it has produced a value
    pub fn run_and_wait<F, R>(&self, task: F) -> Result<R, WorkerError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let worker = self.info.id;
        if self.is_current_thread() {
            return Err(WorkerError::Reentrant { worker });
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.run(move |state| {
            match panic::catch_unwind(AssertUnwindSafe(|| task(state))) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let _ = tx.send(Err(WorkerError::TaskPanicked { worker }));
                    panic::resume_unwind(payload);
                }
            }
        })?;

        rx.recv().unwrap_or(Err(WorkerError::Disconnected { worker }))
    }

    /// Queue `on_release` as the final job of this checkout and stop
    /// accepting work until the next `launch_thread`
    ///
    /// Does not wait for the queue to drain.
    pub fn release_queue<F>(&self, on_release: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if !self.queue.push_release(Box::new(on_release)) {
            tracing::warn!(
                "Release of worker {} ignored: not accepting work ({})",
                self.info.id,
                self.phase().name()
            );
        }
    }

    /// Block until the queue is empty and no task is executing
    pub fn wait_idle(&self) -> Result<(), WorkerError> {
        if self.is_current_thread() {
            return Err(WorkerError::Reentrant { worker: self.info.id });
        }
        self.queue.wait_idle();
        Ok(())
    }

    /// Stop accepting work, let the thread drain its queue and join it
    pub fn terminate_thread(&self) {
        self.queue.shutdown();

        let handle = self.thread.lock().take();
        match handle {
            Some(handle) if handle.thread().id() == thread::current().id() => {
                tracing::warn!("Worker {} terminated from its own thread; detaching", self.info.id);
            }
            Some(handle) => {
                if handle.join().is_err() {
                    tracing::error!("Worker {} thread exited abnormally", self.info.id);
                }
            }
            None => self.queue.mark_terminated(),
        }
    }

    /// Mark the worker as checked out or free
    pub fn set_is_working(&self, working: bool) {
        self.is_working.store(working, Ordering::SeqCst);
    }

    /// Whether the worker is checked out
    pub fn is_working(&self) -> bool {
        self.is_working.load(Ordering::SeqCst)
    }

    /// Current checkout epoch
    pub fn checkout(&self) -> u64 {
        self.checkout.load(Ordering::SeqCst)
    }

    /// Start a new checkout epoch, invalidating every older one
    pub(crate) fn advance_checkout(&self) -> u64 {
        self.checkout.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// True once the thread has exited or the worker was terminated
    pub fn is_dead(&self) -> bool {
        self.phase() == WorkerPhase::Terminated
            || self.thread.lock().as_ref().is_some_and(|handle| handle.is_finished())
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> WorkerPhase {
        self.queue.phase()
    }

    /// Number of queued, not yet started jobs
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    pub fn id(&self) -> WorkerId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn affinity(&self) -> Affinity {
        self.info.affinity
    }

    /// Jobs executed so far, release jobs included
    pub fn tasks_completed(&self) -> u64 {
        self.counters.jobs_run.load(Ordering::SeqCst)
    }

    /// Jobs that panicked
    pub fn panics(&self) -> u64 {
        self.counters.panics.load(Ordering::SeqCst)
    }

    /// Times the thread state has been created (0 or 1)
    pub fn state_inits(&self) -> u64 {
        self.counters.state_inits.load(Ordering::SeqCst)
    }

    fn is_current_thread(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }
}

impl<S: ThreadState> Drop for WorkerThread<S> {
    fn drop(&mut self) {
        self.terminate_thread();
    }
}

fn thread_main<S: ThreadState>(
    info: WorkerInfo,
    queue: Arc<WorkerQueue<S>>,
    counters: Arc<WorkerCounters>,
) {
    let mut state: Option<S> = None;

    while let Some(job) = queue.wait_for_job() {
        let (task, is_release) = match job {
            Job::Task(task) => (task, false),
            Job::Release(task) => (task, true),
        };

        if state.is_none() {
            state = create_state(&info, &counters);
        }

        match state.as_mut() {
            Some(state) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(state))) {
                    counters.panics.fetch_add(1, Ordering::SeqCst);
                    tracing::error!(
                        "Task panicked on worker {}: {}",
                        info.id,
                        panic_message(&*payload)
                    );
                }
            }
            None => {
                tracing::error!("Dropping task on worker {}: thread state unavailable", info.id);
            }
        }

        counters.jobs_run.fetch_add(1, Ordering::SeqCst);
        queue.finish_job(is_release);
    }

    if state.take().is_some() {
        tracing::debug!("Thread state of worker {} destroyed", info.id);
    }
    queue.mark_terminated();
    tracing::debug!("Worker {} '{}' exited", info.id, info.name);
}

fn create_state<S: ThreadState>(info: &WorkerInfo, counters: &WorkerCounters) -> Option<S> {
    match panic::catch_unwind(AssertUnwindSafe(|| S::create(info))) {
        Ok(Ok(state)) => {
            counters.state_inits.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Thread state created on worker {}", info.id);
            Some(state)
        }
        Ok(Err(err)) => {
            tracing::error!("Failed to create thread state on worker {}: {}", info.id, err);
            None
        }
        Err(payload) => {
            tracing::error!(
                "Thread state creation panicked on worker {}: {}",
                info.id,
                panic_message(&*payload)
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
