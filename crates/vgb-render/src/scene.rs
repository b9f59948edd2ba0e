//! Scene
//!
//! Boundary to the vector animation engine. The engine supplies the
//! drawable graph; adapters only need its bounds, a clock and a draw call.

use tiny_skia::{Color, Paint, PixmapMut, Rect, Transform};

use crate::Bounds;

/// Drawable, animatable content
pub trait Scene: Send + 'static {
    /// Content bounds in scene units
    fn bounds(&self) -> Bounds;

    /// Advance the animation clock. Returns false once settled.
    fn advance(&mut self, elapsed_seconds: f32) -> bool;

    /// Draw into `target` through `transform`
    fn draw(&self, target: &mut PixmapMut<'_>, transform: Transform);
}

/// Solid rectangle drifting horizontally
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub rect: Bounds,
    pub color: Color,
    /// Horizontal velocity in scene units per second
    pub velocity: f32,
}

/// Minimal scene made of rectangles
#[derive(Debug, Clone, Default)]
pub struct ShapeScene {
    bounds: Bounds,
    shapes: Vec<Shape>,
    time: f32,
}

impl ShapeScene {
    /// Create an empty scene of the given size
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: Bounds::from_size(width, height),
            shapes: Vec::new(),
            time: 0.0,
        }
    }

    /// Add a static rectangle
    pub fn with_rect(mut self, rect: Bounds, color: Color) -> Self {
        self.shapes.push(Shape { rect, color, velocity: 0.0 });
        self
    }

    /// Add a moving rectangle
    pub fn with_moving_rect(mut self, rect: Bounds, color: Color, velocity: f32) -> Self {
        self.shapes.push(Shape { rect, color, velocity });
        self
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Seconds advanced so far
    pub fn time(&self) -> f32 {
        self.time
    }
}

impl Scene for ShapeScene {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn advance(&mut self, elapsed_seconds: f32) -> bool {
        self.time += elapsed_seconds;

        let span = self.bounds.width();
        let mut animating = false;
        for shape in &mut self.shapes {
            if shape.velocity == 0.0 {
                continue;
            }
            animating = true;

            let width = shape.rect.width();
            let mut min_x = shape.rect.min_x + shape.velocity * elapsed_seconds;
            // Wrap around the scene edges
            if span > 0.0 {
                if min_x >= self.bounds.max_x {
                    min_x -= span + width;
                } else if min_x + width <= self.bounds.min_x {
                    min_x += span + width;
                }
            }
            shape.rect.min_x = min_x;
            shape.rect.max_x = min_x + width;
        }
        animating
    }

    fn draw(&self, target: &mut PixmapMut<'_>, transform: Transform) {
        let mut paint = Paint::default();
        paint.anti_alias = false;

        for shape in &self.shapes {
            if shape.rect.is_empty() {
                continue;
            }
            let Bounds { min_x, min_y, max_x, max_y } = shape.rect;
            let Some(rect) = Rect::from_ltrb(min_x, min_y, max_x, max_y) else {
                continue;
            };
            paint.set_color(shape.color);
            target.fill_rect(rect, &paint, transform, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Pixmap;

    #[test]
    fn test_static_scene_settles() {
        let mut scene = ShapeScene::new(10.0, 10.0)
            .with_rect(Bounds::new(0.0, 0.0, 5.0, 5.0), Color::BLACK);
        assert!(!scene.advance(0.5));
        assert_eq!(scene.time(), 0.5);
    }

    #[test]
    fn test_moving_rect_wraps() {
        let mut scene = ShapeScene::new(100.0, 10.0)
            .with_moving_rect(Bounds::new(90.0, 0.0, 100.0, 10.0), Color::BLACK, 20.0);

        assert!(scene.advance(1.0));
        let rect = scene.shapes()[0].rect;
        assert_eq!(rect.min_x, 0.0);
        assert_eq!(rect.width(), 10.0);
    }

    #[test]
    fn test_draw_fills_rect() {
        let scene = ShapeScene::new(4.0, 4.0)
            .with_rect(Bounds::new(0.0, 0.0, 2.0, 4.0), Color::from_rgba8(255, 0, 0, 255));
        let mut pixmap = Pixmap::new(4, 4).unwrap();

        scene.draw(&mut pixmap.as_mut(), Transform::identity());

        assert_eq!(pixmap.pixel(0, 0).map(|p| p.red()), Some(255));
        assert_eq!(pixmap.pixel(3, 0).map(|p| p.alpha()), Some(0));
    }

    #[test]
    fn test_degenerate_rect_skipped() {
        let scene = ShapeScene::new(4.0, 4.0)
            .with_rect(Bounds::new(2.0, 2.0, 2.0, 2.0), Color::BLACK);
        let mut pixmap = Pixmap::new(4, 4).unwrap();

        scene.draw(&mut pixmap.as_mut(), Transform::identity());
        assert!(pixmap.data().iter().all(|b| *b == 0));
    }
}
