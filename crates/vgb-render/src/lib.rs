//! vgbridge Render
//!
//! Renderer adapters sitting between host views and pooled worker threads.
//!
//! Features:
//! - Per-thread [`SurfaceContext`] created lazily on its worker
//! - Fit / alignment math mapping scene bounds onto a view
//! - [`Scene`] boundary to the vector animation engine
//! - [`ViewRenderer`] owning one worker checkout per view

pub mod context;
pub mod fit;
pub mod renderer;
pub mod scene;

pub use context::{FrameSnapshot, SurfaceContext};
pub use fit::{Alignment, Bounds, Fit, compute_alignment, to_content_space};
pub use renderer::{RenderOptions, ViewRenderer};
pub use scene::{Scene, Shape, ShapeScene};

pub use tiny_skia::{Color, PixmapMut, Transform};

use vgb_worker::WorkerError;

/// Render error
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid surface size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("No surface bound to the context")]
    NoSurface,

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
