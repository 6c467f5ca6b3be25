//! Percentage-to-pixel coordinate model for mask rectangles.
//!
//! Mask rectangles are stored as percentages of the image they were drawn on,
//! so a single definition can be reused across images of different sizes.
//! Pixel rectangles are fractional: nothing here rounds or truncates.

use crate::settings::MaskSettings;

/// Minimum drag extent (pixels, exclusive) for a selection to count as a mask.
pub const MIN_SELECTION_PX: f64 = 5.0;

/// A rectangle in canvas pixel space. Coordinates may be fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub w: f64,
    /// Height in pixels.
    pub h: f64,
}

impl PixelRect {
    /// Build a rectangle from two opposite drag corners given in any order.
    #[must_use]
    pub fn from_corners(start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            x: start.0.min(end.0),
            y: start.1.min(end.1),
            w: (start.0 - end.0).abs(),
            h: (start.1 - end.1).abs(),
        }
    }

    /// Whether the rectangle covers no area. A rectangle with any non-finite
    /// coordinate counts as empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let finite = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite());
        !finite || self.w <= 0.0 || self.h <= 0.0
    }

    /// Right edge (`x + w`).
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom edge (`y + h`).
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// Percentage rectangle: offset and extent relative to the canvas, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRect {
    /// Left offset, percent of canvas width.
    pub mask_x: f64,
    /// Top offset, percent of canvas height.
    pub mask_y: f64,
    /// Width, percent of canvas width.
    pub width: f64,
    /// Height, percent of canvas height.
    pub height: f64,
}

/// Map the mask rectangle of `settings` onto a canvas of the given size.
#[must_use]
pub fn to_pixel_rect(settings: &MaskSettings, canvas_width: u32, canvas_height: u32) -> PixelRect {
    let cw = f64::from(canvas_width);
    let ch = f64::from(canvas_height);
    PixelRect {
        x: cw * settings.mask_x / 100.0,
        y: ch * settings.mask_y / 100.0,
        w: cw * settings.width / 100.0,
        h: ch * settings.height / 100.0,
    }
}

/// Exact inverse of [`to_pixel_rect`]: express a pixel rectangle as canvas percentages.
///
/// A zero-sized canvas dimension yields zero for the matching components.
#[must_use]
pub fn to_percent(rect: PixelRect, canvas_width: u32, canvas_height: u32) -> PercentRect {
    let pct = |v: f64, extent: u32| {
        if extent == 0 {
            0.0
        } else {
            v / f64::from(extent) * 100.0
        }
    };
    PercentRect {
        mask_x: pct(rect.x, canvas_width),
        mask_y: pct(rect.y, canvas_height),
        width: pct(rect.w, canvas_width),
        height: pct(rect.h, canvas_height),
    }
}

/// Turn a finished drag on a canvas into a percentage rectangle.
///
/// Returns `None` unless the drag is larger than [`MIN_SELECTION_PX`] in both
/// directions, so stray clicks never replace an existing mask.
#[must_use]
pub fn selection_to_percent(
    start: (f64, f64),
    end: (f64, f64),
    canvas_width: u32,
    canvas_height: u32,
) -> Option<PercentRect> {
    let rect = PixelRect::from_corners(start, end);
    if rect.w > MIN_SELECTION_PX && rect.h > MIN_SELECTION_PX {
        Some(to_percent(rect, canvas_width, canvas_height))
    } else {
        None
    }
}
