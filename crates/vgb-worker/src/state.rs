//! Thread-Local State
//!
//! Contract for the per-worker state (typically a native graphics
//! context) that must be created, used and destroyed on one OS thread.

use std::convert::Infallible;
use std::fmt;

/// Arena slot identifying a worker within its manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling bucket hint for a worker
///
/// Only used to spread workers across scheduling categories; carries no
/// correctness meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    Even,
    Odd,
}

impl Affinity {
    /// Bucket for the n-th worker, alternating even/odd
    pub fn for_index(index: usize, buckets: usize) -> Self {
        if buckets > 1 && (index % buckets) % 2 == 1 {
            Self::Odd
        } else {
            Self::Even
        }
    }

    /// Get affinity name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Odd => "odd",
        }
    }
}

/// Identity of the worker a state is being created for
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub name: String,
    pub affinity: Affinity,
}

/// State owned by a worker thread
///
/// `create` runs on the worker's own thread right before the first task
/// that needs it. The value is dropped on that same thread when the worker
/// terminates. Implementors need not be `Send`.
pub trait ThreadState: Sized + 'static {
    /// Error returned when the state cannot be created
    type Error: std::error::Error;

    /// Create the state on the calling (worker) thread
    fn create(info: &WorkerInfo) -> Result<Self, Self::Error>;
}

impl ThreadState for () {
    type Error = Infallible;

    fn create(_info: &WorkerInfo) -> Result<Self, Self::Error> {
        Ok(())
    }
}
