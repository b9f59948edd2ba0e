//! Marshaling
//!
//! Conversions from host primitives (enum ordinals, byte strings, packed
//! colors, float arrays) into native types.

use vgb_render::{Alignment, Bounds, Color, Fit};

use crate::{BridgeError, BridgeResult};

/// Host `Fit` enum ordinal
pub fn fit_from_ordinal(ordinal: i32) -> BridgeResult<Fit> {
    Fit::from_ordinal(ordinal).ok_or(BridgeError::InvalidEnum { kind: "Fit", value: ordinal })
}

/// Host `Alignment` enum ordinal
pub fn alignment_from_ordinal(ordinal: i32) -> BridgeResult<Alignment> {
    Alignment::from_ordinal(ordinal).ok_or(BridgeError::InvalidEnum {
        kind: "Alignment",
        value: ordinal,
    })
}

/// UTF-8 host string, tolerating a trailing NUL terminator
pub fn string_from_bytes(bytes: &[u8]) -> BridgeResult<String> {
    let bytes = bytes.strip_suffix(&[0u8]).unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| BridgeError::InvalidString)
}

/// Packed `0xAARRGGBB` color
pub fn color_from_argb(argb: u32) -> Color {
    let [a, r, g, b] = argb.to_be_bytes();
    Color::from_rgba8(r, g, b, a)
}

/// `[left, top, right, bottom]`
pub fn bounds_from_array(ltrb: [f32; 4]) -> Bounds {
    Bounds::from_ltrb(ltrb)
}

pub fn bounds_to_array(bounds: &Bounds) -> [f32; 4] {
    [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y]
}

/// Host surface dimension; negative values become 0 and fail validation later
pub fn dimension(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
