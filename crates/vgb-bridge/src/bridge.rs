//! Native Bridge
//!
//! Entry points the host runtime calls by name. Native objects live in a
//! handle table; the host only ever sees the 64-bit handle.

use std::sync::Arc;

use parking_lot::Mutex;
use vgb_render::{FrameSnapshot, RenderOptions, Scene, SurfaceContext, ViewRenderer};
use vgb_worker::{PoolStats, ThreadManager};

use crate::marshal::{
    alignment_from_ordinal, bounds_from_array, bounds_to_array, color_from_argb, dimension,
    fit_from_ordinal, string_from_bytes,
};
use crate::{BridgeError, BridgeResult, Handle, HandleTable, guard};

type SharedRenderer = Arc<Mutex<ViewRenderer>>;

/// Host-facing facade over renderers and the worker pool
pub struct NativeBridge {
    manager: Arc<ThreadManager<SurfaceContext>>,
    renderers: Mutex<HandleTable<SharedRenderer>>,
}

impl std::fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBridge")
            .field("renderers", &self.renderers.lock().len())
            .field("pool", &self.manager.stats())
            .finish()
    }
}

impl NativeBridge {
    /// Bridge backed by the process-wide worker pool
    pub fn new() -> Self {
        Self::with_manager(ThreadManager::get_instance())
    }

    /// Bridge backed by a specific pool
    pub fn with_manager(manager: Arc<ThreadManager<SurfaceContext>>) -> Self {
        Self {
            manager,
            renderers: Mutex::new(HandleTable::new()),
        }
    }

    /// Create a renderer for `scene`, returning its handle
    pub fn create_renderer(
        &self,
        name: &[u8],
        scene: Box<dyn Scene>,
        fit: i32,
        alignment: i32,
        clear_argb: u32,
    ) -> BridgeResult<u64> {
        guard("create_renderer", || {
            let name = string_from_bytes(name)?;
            let options = RenderOptions {
                fit: fit_from_ordinal(fit)?,
                alignment: alignment_from_ordinal(alignment)?,
                clear_color: color_from_argb(clear_argb),
                ..RenderOptions::default()
            };

            let renderer = ViewRenderer::new(&self.manager, &name, scene, options)?;
            let handle = self.renderers.lock().insert(Arc::new(Mutex::new(renderer)));
            tracing::info!("Created renderer '{}' as handle {:#x}", name, handle.raw());
            Ok(handle.raw())
        })
    }

    pub fn set_surface(&self, handle: u64, width: i32, height: i32) -> BridgeResult<()> {
        guard("set_surface", || {
            let renderer = self.renderer(handle)?;
            let mut renderer = renderer.lock();
            renderer.set_surface(dimension(width), dimension(height))?;
            Ok(())
        })
    }

    /// Queue a frame advanced by `elapsed_seconds`
    pub fn draw(&self, handle: u64, elapsed_seconds: f32) -> BridgeResult<()> {
        guard("draw", || {
            let renderer = self.renderer(handle)?;
            let mut renderer = renderer.lock();
            renderer.draw_frame(elapsed_seconds)?;
            Ok(())
        })
    }

    /// Wait for queued frames of a renderer
    pub fn flush(&self, handle: u64) -> BridgeResult<()> {
        guard("flush", || {
            let renderer = self.renderer(handle)?;
            let renderer = renderer.lock();
            renderer.flush()?;
            Ok(())
        })
    }

    pub fn set_fit(&self, handle: u64, fit: i32) -> BridgeResult<()> {
        guard("set_fit", || {
            let fit = fit_from_ordinal(fit)?;
            self.renderer(handle)?.lock().set_fit(fit);
            Ok(())
        })
    }

    pub fn set_alignment(&self, handle: u64, alignment: i32) -> BridgeResult<()> {
        guard("set_alignment", || {
            let alignment = alignment_from_ordinal(alignment)?;
            self.renderer(handle)?.lock().set_alignment(alignment);
            Ok(())
        })
    }

    /// View-space point to scene space; `None` without a surface
    pub fn to_scene_space(&self, handle: u64, x: f32, y: f32) -> BridgeResult<Option<[f32; 2]>> {
        guard("to_scene_space", || {
            let point = self.renderer(handle)?.lock().to_scene_space(x, y);
            Ok(point.map(|(x, y)| [x, y]))
        })
    }

    /// Scene bounds as `[left, top, right, bottom]`
    pub fn scene_bounds(&self, handle: u64) -> BridgeResult<[f32; 4]> {
        guard("scene_bounds", || {
            let bounds = self.renderer(handle)?.lock().with_scene(|scene| scene.bounds());
            Ok(bounds_to_array(&bounds))
        })
    }

    /// Transform placing `content` inside `frame`, both `[left, top, right, bottom]`
    ///
    /// Returned row-major as `[sx, kx, tx, ky, sy, ty]`.
    pub fn align_transform(
        fit: i32,
        alignment: i32,
        frame: [f32; 4],
        content: [f32; 4],
        scale_factor: f32,
    ) -> BridgeResult<[f32; 6]> {
        guard("align_transform", || {
            let transform = vgb_render::compute_alignment(
                fit_from_ordinal(fit)?,
                alignment_from_ordinal(alignment)?,
                &bounds_from_array(frame),
                &bounds_from_array(content),
                scale_factor,
            );
            Ok([transform.sx, transform.kx, transform.tx, transform.ky, transform.sy, transform.ty])
        })
    }

    pub fn last_frame(&self, handle: u64) -> BridgeResult<Option<FrameSnapshot>> {
        guard("last_frame", || Ok(self.renderer(handle)?.lock().last_frame()))
    }

    /// Destroy a renderer and return its worker to the pool
    pub fn delete_renderer(&self, handle: u64) -> BridgeResult<()> {
        guard("delete_renderer", || {
            let renderer = self
                .renderers
                .lock()
                .remove(Handle::from_raw(handle))
                .ok_or(BridgeError::InvalidHandle(handle))?;
            // Dropped outside the table lock
            drop(renderer);
            tracing::info!("Deleted renderer {:#x}", handle);
            Ok(())
        })
    }

    pub fn live_renderers(&self) -> usize {
        self.renderers.lock().len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.manager.stats()
    }

    fn renderer(&self, handle: u64) -> BridgeResult<SharedRenderer> {
        self.renderers
            .lock()
            .get(Handle::from_raw(handle))
            .cloned()
            .ok_or(BridgeError::InvalidHandle(handle))
    }
}

impl Default for NativeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeBridge {
    fn drop(&mut self) {
        let leaked = self.renderers.get_mut().drain();
        if !leaked.is_empty() {
            tracing::warn!("Bridge dropped with {} live renderers", leaked.len());
        }
    }
}
