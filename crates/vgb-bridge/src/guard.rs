//! Call Guard
//!
//! Every host entry point runs inside [`guard`] so that a native panic
//! becomes an error value instead of unwinding into the host runtime.

use std::panic::{self, AssertUnwindSafe};

use crate::{BridgeError, BridgeResult};

/// Run `f`, converting a panic into [`BridgeError::Panic`]
pub fn guard<T>(op: &str, f: impl FnOnce() -> BridgeResult<T>) -> BridgeResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::debug!("{} failed: {}", op, err);
            Err(err)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("{} panicked: {}", op, message);
            Err(BridgeError::Panic(message))
        }
    }
}
