//! Worker Configuration

/// Worker pool configuration options
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Prefix for OS thread names (`<prefix>-<id>`)
    pub thread_name_prefix: String,

    /// Stack size for worker threads (platform default when `None`)
    pub stack_size: Option<usize>,

    /// Number of affinity buckets workers are spread across
    pub affinity_buckets: usize,
}

impl WorkerConfig {
    /// Set the thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker stack size in bytes
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Set the number of affinity buckets (clamped to at least one)
    pub fn with_affinity_buckets(mut self, buckets: usize) -> Self {
        self.affinity_buckets = buckets.max(1);
        self
    }

    /// Thread name for the worker in `slot`
    pub(crate) fn thread_name(&self, slot: usize) -> String {
        format!("{}-{}", self.thread_name_prefix, slot)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "vgb-worker".to_string(),
            stack_size: None,
            affinity_buckets: 2,
        }
    }
}
