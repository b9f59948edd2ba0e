//! Worker errors

use crate::WorkerId;

/// Errors surfaced by worker threads and the thread manager
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker {worker} is not accepting work")]
    NotAccepting { worker: WorkerId },

    #[error("Worker {worker} has been terminated")]
    Terminated { worker: WorkerId },

    #[error("Worker {worker} cannot wait on itself")]
    Reentrant { worker: WorkerId },

    #[error("Task panicked on worker {worker}")]
    TaskPanicked { worker: WorkerId },

    #[error("Worker {worker} dropped the task before completion")]
    Disconnected { worker: WorkerId },
}
