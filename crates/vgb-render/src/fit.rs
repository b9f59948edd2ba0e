//! Fit and Alignment
//!
//! Maps scene (artboard) bounds into a view frame.

use tiny_skia::{Point, Transform};

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    /// Create from edges
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Bounds of a `width` x `height` area at the origin
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Create from `[left, top, right, bottom]`
    pub fn from_ltrb(ltrb: [f32; 4]) -> Self {
        Self::new(ltrb[0], ltrb[1], ltrb[2], ltrb[3])
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// True if either dimension is zero or negative
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Check if point is inside
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

/// How content is scaled into its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Fit {
    /// Stretch both axes independently
    Fill,
    /// Largest uniform scale that shows everything
    #[default]
    Contain,
    /// Smallest uniform scale that covers the frame
    Cover,
    FitWidth,
    FitHeight,
    /// No scaling
    None,
    /// Like `Contain`, but never enlarges
    ScaleDown,
    /// Uniform scale by the display scale factor
    Layout,
}

impl Fit {
    const ALL: [Fit; 8] = [
        Fit::Fill,
        Fit::Contain,
        Fit::Cover,
        Fit::FitWidth,
        Fit::FitHeight,
        Fit::None,
        Fit::ScaleDown,
        Fit::Layout,
    ];

    /// Fit for a host enum ordinal
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Anchor within frame and content, each axis in `-1.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub x: f32,
    pub y: f32,
}

impl Alignment {
    pub const TOP_LEFT: Self = Self::new(-1.0, -1.0);
    pub const TOP_CENTER: Self = Self::new(0.0, -1.0);
    pub const TOP_RIGHT: Self = Self::new(1.0, -1.0);
    pub const CENTER_LEFT: Self = Self::new(-1.0, 0.0);
    pub const CENTER: Self = Self::new(0.0, 0.0);
    pub const CENTER_RIGHT: Self = Self::new(1.0, 0.0);
    pub const BOTTOM_LEFT: Self = Self::new(-1.0, 1.0);
    pub const BOTTOM_CENTER: Self = Self::new(0.0, 1.0);
    pub const BOTTOM_RIGHT: Self = Self::new(1.0, 1.0);

    const ALL: [Alignment; 9] = [
        Self::TOP_LEFT,
        Self::TOP_CENTER,
        Self::TOP_RIGHT,
        Self::CENTER_LEFT,
        Self::CENTER,
        Self::CENTER_RIGHT,
        Self::BOTTOM_LEFT,
        Self::BOTTOM_CENTER,
        Self::BOTTOM_RIGHT,
    ];

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Alignment for a host enum ordinal (row-major, top-left first)
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Transform placing `content` inside `frame`
///
/// The content anchor is moved to the origin, scaled according to `fit`,
/// then moved to the frame anchor. Empty content is left unscaled.
pub fn compute_alignment(
    fit: Fit,
    alignment: Alignment,
    frame: &Bounds,
    content: &Bounds,
    scale_factor: f32,
) -> Transform {
    let content_width = content.width();
    let content_height = content.height();
    let frame_width = frame.width();
    let frame_height = frame.height();

    let x = -content.min_x - content_width * 0.5 - alignment.x * content_width * 0.5;
    let y = -content.min_y - content_height * 0.5 - alignment.y * content_height * 0.5;

    let (scale_x, scale_y) = if content.is_empty() {
        (1.0, 1.0)
    } else {
        let width_ratio = frame_width / content_width;
        let height_ratio = frame_height / content_height;
        match fit {
            Fit::Fill => (width_ratio, height_ratio),
            Fit::Contain => uniform(width_ratio.min(height_ratio)),
            Fit::Cover => uniform(width_ratio.max(height_ratio)),
            Fit::FitWidth => uniform(width_ratio),
            Fit::FitHeight => uniform(height_ratio),
            Fit::None => (1.0, 1.0),
            Fit::ScaleDown => uniform(width_ratio.min(height_ratio).min(1.0)),
            Fit::Layout => uniform(scale_factor),
        }
    };

    let translate_x = frame.min_x + frame_width * 0.5 + alignment.x * frame_width * 0.5;
    let translate_y = frame.min_y + frame_height * 0.5 + alignment.y * frame_height * 0.5;

    Transform::from_translate(translate_x, translate_y)
        .pre_scale(scale_x, scale_y)
        .pre_translate(x, y)
}

fn uniform(scale: f32) -> (f32, f32) {
    (scale, scale)
}

/// Map a view-space point back into content space
///
/// Returns `None` if the transform is not invertible.
pub fn to_content_space(transform: &Transform, x: f32, y: f32) -> Option<(f32, f32)> {
    let inverse = transform.invert()?;
    let mut points = [Point::from_xy(x, y)];
    inverse.map_points(&mut points);
    Some((points[0].x, points[0].y))
}
