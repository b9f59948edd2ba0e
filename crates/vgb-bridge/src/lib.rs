//! vgbridge Host Boundary
//!
//! What the managed host sees of the native side: opaque 64-bit handles,
//! primitive-typed entry points and error values instead of unwinding.

pub mod bridge;
pub mod guard;
pub mod handle;
pub mod marshal;

pub use bridge::NativeBridge;
pub use guard::guard;
pub use handle::{Handle, HandleTable};

use vgb_render::RenderError;

/// Bridge error
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid handle: {0:#x}")]
    InvalidHandle(u64),

    #[error("Invalid {kind} value: {value}")]
    InvalidEnum { kind: &'static str, value: i32 },

    #[error("String is not valid UTF-8")]
    InvalidString,

    #[error("Native panic: {0}")]
    Panic(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

impl BridgeError {
    /// Negative status code reported to the host
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHandle(_) => -1,
            Self::InvalidEnum { .. } => -2,
            Self::InvalidString => -3,
            Self::Panic(_) => -4,
            Self::Render(RenderError::InvalidSize { .. }) => -5,
            Self::Render(RenderError::NoSurface) => -6,
            Self::Render(RenderError::Worker(_)) => -7,
        }
    }
}

/// Bridge result
pub type BridgeResult<T> = Result<T, BridgeError>;
