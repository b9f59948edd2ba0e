//! vgbridge Worker Pool
//!
//! Worker threads that each own a thread-affine native context, pooled so
//! that many short-lived views can share a few OS threads.
//!
//! - [`WorkerThread`]: one OS thread, a FIFO of closures, lazily created state
//! - [`ThreadManager`]: lends workers out and takes them back
//! - [`ThreadState`]: contract for the per-thread state
//!
//! # Example
//! ```rust
//! use vgb_worker::{ThreadManager, WorkerConfig};
//!
//! let manager = ThreadManager::<()>::new(WorkerConfig::default());
//! let lease = manager.checkout("view").unwrap();
//! let answer = lease.run_and_wait(|_| 6 * 7).unwrap();
//! assert_eq!(answer, 42);
//! lease.release(|_| {});
//! ```

mod config;
mod error;
mod lease;
mod manager;
mod state;
mod worker;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use lease::WorkerLease;
pub use manager::{PoolStats, ThreadManager, Worker};
pub use state::{Affinity, ThreadState, WorkerId, WorkerInfo};
pub use worker::{TaskFn, WorkerPhase, WorkerThread};
