//! Surface Context
//!
//! The per-thread graphics context. One lives on each worker thread,
//! created with the first task and dropped when the thread exits; views
//! bind their surface to it for the duration of a checkout.

use std::marker::PhantomData;

use tiny_skia::{Color, Pixmap, PixmapMut};
use vgb_worker::{ThreadState, WorkerId, WorkerInfo};

use crate::RenderError;

/// Copy of a presented frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub width: u32,
    pub height: u32,
    /// Frames presented by the context before this one
    pub frame_index: u64,
    /// Premultiplied RGBA8
    pub pixels: Vec<u8>,
}

impl FrameSnapshot {
    /// RGBA value at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        self.pixels
            .get(offset..offset + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Thread-affine rendering context
///
/// Not `Send`: it never leaves the worker thread that created it.
#[derive(Debug)]
pub struct SurfaceContext {
    worker: WorkerId,
    surface: Option<Pixmap>,
    frames_presented: u64,
    surfaces_created: u64,
    _thread_bound: PhantomData<*const ()>,
}

impl ThreadState for SurfaceContext {
    type Error = RenderError;

    fn create(info: &WorkerInfo) -> Result<Self, Self::Error> {
        tracing::debug!("Creating surface context on '{}'", info.name);
        Ok(Self {
            worker: info.id,
            surface: None,
            frames_presented: 0,
            surfaces_created: 0,
            _thread_bound: PhantomData,
        })
    }
}

impl SurfaceContext {
    /// Bind a surface of the given size, reusing the current one if it matches
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if self.surface_size() == Some((width, height)) {
            return Ok(());
        }

        let pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
        self.surface = Some(pixmap);
        self.surfaces_created += 1;
        tracing::debug!("Worker {} bound {}x{} surface", self.worker, width, height);
        Ok(())
    }

    /// Drop the bound surface, keeping the context itself
    pub fn release_surface(&mut self) {
        if self.surface.take().is_some() {
            tracing::debug!("Worker {} released its surface", self.worker);
        }
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(|p| (p.width(), p.height()))
    }

    /// Clear the surface and hand it out for drawing
    pub fn begin_frame(&mut self, clear: Color) -> Result<PixmapMut<'_>, RenderError> {
        let pixmap = self.surface.as_mut().ok_or(RenderError::NoSurface)?;
        pixmap.fill(clear);
        Ok(pixmap.as_mut())
    }

    /// Finish the frame and copy it out
    pub fn present(&mut self) -> Result<FrameSnapshot, RenderError> {
        let pixmap = self.surface.as_ref().ok_or(RenderError::NoSurface)?;
        let snapshot = FrameSnapshot {
            width: pixmap.width(),
            height: pixmap.height(),
            frame_index: self.frames_presented,
            pixels: pixmap.data().to_vec(),
        };
        self.frames_presented += 1;
        Ok(snapshot)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn surfaces_created(&self) -> u64 {
        self.surfaces_created
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        tracing::debug!(
            "Surface context of worker {} destroyed after {} frames",
            self.worker,
            self.frames_presented
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgb_worker::Affinity;

    fn context() -> SurfaceContext {
        SurfaceContext::create(&WorkerInfo {
            id: WorkerId(0),
            name: "ctx-test".into(),
            affinity: Affinity::Even,
        })
        .unwrap()
    }

    #[test]
    fn test_frame_without_surface() {
        let mut ctx = context();
        assert!(matches!(ctx.begin_frame(Color::WHITE), Err(RenderError::NoSurface)));
        assert!(matches!(ctx.present(), Err(RenderError::NoSurface)));
    }

    #[test]
    fn test_zero_size_surface_rejected() {
        let mut ctx = context();
        assert!(matches!(
            ctx.resize(0, 10),
            Err(RenderError::InvalidSize { width: 0, height: 10 })
        ));
        assert!(!ctx.has_surface());
    }

    #[test]
    fn test_resize_reuses_matching_surface() {
        let mut ctx = context();
        ctx.resize(16, 16).unwrap();
        ctx.resize(16, 16).unwrap();
        assert_eq!(ctx.surfaces_created(), 1);

        ctx.resize(32, 8).unwrap();
        assert_eq!(ctx.surface_size(), Some((32, 8)));
        assert_eq!(ctx.surfaces_created(), 2);
    }

    #[test]
    fn test_present_clear_color() {
        let mut ctx = context();
        ctx.resize(4, 4).unwrap();
        ctx.begin_frame(Color::from_rgba8(0, 0, 255, 255)).unwrap();

        let frame = ctx.present().unwrap();
        assert_eq!(frame.frame_index, 0);
        assert_eq!(frame.pixel(3, 3), Some([0, 0, 255, 255]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(ctx.frames_presented(), 1);
    }
}
