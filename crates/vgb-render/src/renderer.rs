//! View Renderer
//!
//! Adapter between one host view and a pooled worker. The view keeps its
//! worker checked out for its whole lifetime; surface changes, frames and
//! cleanup are forwarded as tasks so the context is only ever touched on
//! the worker thread.

use std::sync::Arc;

use parking_lot::Mutex;
use tiny_skia::Color;
use vgb_worker::{ThreadManager, WorkerId, WorkerLease};

use crate::{
    Alignment, Bounds, Fit, FrameSnapshot, RenderError, Scene, SurfaceContext, compute_alignment,
    to_content_space,
};

/// Per-view rendering options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub fit: Fit,
    pub alignment: Alignment,
    /// Display density, used by `Fit::Layout`
    pub scale_factor: f32,
    pub clear_color: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fit: Fit::Contain,
            alignment: Alignment::CENTER,
            scale_factor: 1.0,
            clear_color: Color::TRANSPARENT,
        }
    }
}

/// Renders one scene into one view's surface
pub struct ViewRenderer {
    name: String,
    lease: WorkerLease<SurfaceContext>,
    scene: Arc<Mutex<Box<dyn Scene>>>,
    options: Arc<Mutex<RenderOptions>>,
    last_frame: Arc<Mutex<Option<FrameSnapshot>>>,
    surface_size: Option<(u32, u32)>,
    frames_submitted: u64,
}

impl std::fmt::Debug for ViewRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRenderer")
            .field("name", &self.name)
            .field("worker", &self.lease.id())
            .field("surface_size", &self.surface_size)
            .field("frames_submitted", &self.frames_submitted)
            .finish()
    }
}

impl ViewRenderer {
    /// Check out a worker for a new view
    pub fn new(
        manager: &Arc<ThreadManager<SurfaceContext>>,
        name: &str,
        scene: Box<dyn Scene>,
        options: RenderOptions,
    ) -> Result<Self, RenderError> {
        let lease = manager.checkout(name)?;
        tracing::debug!("View '{}' rendering on worker {}", name, lease.id());

        Ok(Self {
            name: name.to_string(),
            lease,
            scene: Arc::new(Mutex::new(scene)),
            options: Arc::new(Mutex::new(options)),
            last_frame: Arc::new(Mutex::new(None)),
            surface_size: None,
            frames_submitted: 0,
        })
    }

    /// Bind a surface of the given size; waits for the worker to apply it
    pub fn set_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }

        self.lease.run_and_wait(move |ctx| ctx.resize(width, height))??;
        self.surface_size = Some((width, height));
        Ok(())
    }

    /// Queue one frame: advance the scene by `elapsed_seconds`, draw, present
    pub fn draw_frame(&mut self, elapsed_seconds: f32) -> Result<(), RenderError> {
        let scene = Arc::clone(&self.scene);
        let options = Arc::clone(&self.options);
        let last_frame = Arc::clone(&self.last_frame);

        self.lease.run(move |ctx| {
            match render_frame(ctx, &scene, &options, elapsed_seconds) {
                Ok(frame) => *last_frame.lock() = Some(frame),
                Err(err) => tracing::warn!("Frame dropped on worker {}: {}", ctx.worker(), err),
            }
        })?;

        self.frames_submitted += 1;
        Ok(())
    }

    /// Block until every queued frame has been presented
    pub fn flush(&self) -> Result<(), RenderError> {
        self.lease.worker().wait_idle()?;
        Ok(())
    }

    pub fn set_options(&self, options: RenderOptions) {
        *self.options.lock() = options;
    }

    pub fn set_fit(&self, fit: Fit) {
        self.options.lock().fit = fit;
    }

    pub fn set_alignment(&self, alignment: Alignment) {
        self.options.lock().alignment = alignment;
    }

    pub fn options(&self) -> RenderOptions {
        *self.options.lock()
    }

    /// Mutate the scene from the host thread (e.g. feed inputs)
    pub fn with_scene<R>(&self, f: impl FnOnce(&mut dyn Scene) -> R) -> R {
        let mut scene = self.scene.lock();
        f(scene.as_mut())
    }

    /// Map a view-space point into scene space, for pointer input
    pub fn to_scene_space(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let (width, height) = self.surface_size?;
        let options = self.options();
        let content = self.scene.lock().bounds();
        let frame = Bounds::from_size(width as f32, height as f32);
        let transform = compute_alignment(
            options.fit,
            options.alignment,
            &frame,
            &content,
            options.scale_factor,
        );
        to_content_space(&transform, x, y)
    }

    /// Most recently presented frame
    pub fn last_frame(&self) -> Option<FrameSnapshot> {
        self.last_frame.lock().clone()
    }

    pub fn worker_id(&self) -> WorkerId {
        self.lease.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface_size
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl Drop for ViewRenderer {
    fn drop(&mut self) {
        // Queued ahead of the lease's release job
        if let Err(err) = self.lease.run(SurfaceContext::release_surface) {
            tracing::warn!("View '{}' could not queue surface cleanup: {}", self.name, err);
        }
        tracing::debug!("View '{}' closed after {} frames", self.name, self.frames_submitted);
    }
}

fn render_frame(
    ctx: &mut SurfaceContext,
    scene: &Mutex<Box<dyn Scene>>,
    options: &Mutex<RenderOptions>,
    elapsed_seconds: f32,
) -> Result<FrameSnapshot, RenderError> {
    let (width, height) = ctx.surface_size().ok_or(RenderError::NoSurface)?;
    let options = *options.lock();
    let mut scene = scene.lock();

    scene.advance(elapsed_seconds);

    let frame = Bounds::from_size(width as f32, height as f32);
    let content = scene.bounds();
    let transform =
        compute_alignment(options.fit, options.alignment, &frame, &content, options.scale_factor);

    let mut target = ctx.begin_frame(options.clear_color)?;
    scene.draw(&mut target, transform);
    ctx.present()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShapeScene;
    use vgb_worker::WorkerConfig;

    fn manager() -> Arc<ThreadManager<SurfaceContext>> {
        ThreadManager::new(WorkerConfig::default().with_thread_name_prefix("render-test"))
    }

    fn open_view(manager: &Arc<ThreadManager<SurfaceContext>>, name: &str) -> ViewRenderer {
        ViewRenderer::new(manager, name, red_square(), RenderOptions::default()).unwrap()
    }

    fn red_square() -> Box<dyn Scene> {
        Box::new(
            ShapeScene::new(10.0, 10.0)
                .with_rect(Bounds::new(0.0, 0.0, 10.0, 10.0), Color::from_rgba8(255, 0, 0, 255)),
        )
    }

    #[test]
    fn test_frame_without_surface_dropped() {
        let manager = manager();
        let mut view = open_view(&manager, "no-surface");

        view.draw_frame(0.016).unwrap();
        view.flush().unwrap();

        assert!(view.last_frame().is_none());
        assert_eq!(view.frames_submitted(), 1);
    }

    #[test]
    fn test_contain_letterboxes() {
        let manager = manager();
        let mut view = open_view(&manager, "letterbox");
        view.set_surface(20, 10).unwrap();

        view.draw_frame(0.0).unwrap();
        view.flush().unwrap();

        let frame = view.last_frame().unwrap();
        assert_eq!((frame.width, frame.height), (20, 10));
        assert_eq!(frame.pixel(10, 5), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(1, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_fill_covers_surface() {
        let manager = manager();
        let options = RenderOptions { fit: Fit::Fill, ..RenderOptions::default() };
        let mut view = ViewRenderer::new(&manager, "fill", red_square(), options).unwrap();
        view.set_surface(20, 10).unwrap();

        view.draw_frame(0.0).unwrap();
        view.flush().unwrap();

        let frame = view.last_frame().unwrap();
        assert_eq!(frame.pixel(1, 5), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_surface_rejected() {
        let manager = manager();
        let mut view = open_view(&manager, "invalid");

        assert!(matches!(view.set_surface(0, 5), Err(RenderError::InvalidSize { .. })));
        assert_eq!(view.surface_size(), None);
    }

    #[test]
    fn test_to_scene_space() {
        let manager = manager();
        let mut view = open_view(&manager, "touch");
        assert!(view.to_scene_space(0.0, 0.0).is_none());

        view.set_surface(20, 10).unwrap();
        let (x, y) = view.to_scene_space(10.0, 5.0).unwrap();
        assert!((x - 5.0).abs() < 1e-3 && (y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_drop_returns_worker_and_clears_surface() {
        let manager = manager();
        let mut view = open_view(&manager, "closing");
        view.set_surface(8, 8).unwrap();
        let id = view.worker_id();
        drop(view);

        let lease = manager.checkout("next").unwrap();
        assert_eq!(lease.id(), id);
        assert!(!lease.run_and_wait(|ctx| ctx.has_surface()).unwrap());
        assert_eq!(manager.stats().total_workers, 1);
    }
}
