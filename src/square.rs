//! Reversible square padding for fixed-aspect generative models.
//!
//! [`normalize`] embeds an image of any shape into a white square of side
//! `max(W, H)`; [`denormalize`] cuts the same region back out. Both use the
//! same [`placement`], so the pair is a pure pad/crop and never resamples.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::settings::AspectRatio;

/// Opaque white, used for the square's padding.
const PAD_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Top-left corner of the source image inside the square canvas.
///
/// Components are negative when the square is smaller than the source, which
/// only happens when a generator returns a smaller image than it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Horizontal offset in pixels.
    pub x: i64,
    /// Vertical offset in pixels.
    pub y: i64,
}

/// Side of the square canvas for an image of `width x height`.
#[must_use]
pub fn square_side(width: u32, height: u32) -> u32 {
    width.max(height)
}

/// Where an image of `width x height` sits inside a square of `side` pixels.
///
/// For [`AspectRatio::FourFive`] and strictly portrait images (`width < height`)
/// the image is left-aligned and vertically centered; every other case is
/// centered on both axes. Odd differences are floored.
#[must_use]
pub fn placement(ratio: AspectRatio, side: u32, width: u32, height: u32) -> Placement {
    let side = i64::from(side);
    let y = (side - i64::from(height)).div_euclid(2);
    let x = if ratio == AspectRatio::FourFive && width < height {
        0
    } else {
        (side - i64::from(width)).div_euclid(2)
    };
    Placement { x, y }
}

/// Pad `image` into a white square of side `max(W, H)` according to `ratio`.
///
/// Source pixels are copied verbatim (no scaling, no blending).
#[must_use]
pub fn normalize(image: &RgbaImage, ratio: AspectRatio) -> RgbaImage {
    let (w, h) = image.dimensions();
    let side = square_side(w, h);
    let at = placement(ratio, side, w, h);
    log::debug!("normalize {w}x{h} ({ratio}) into {side}x{side} at ({}, {})", at.x, at.y);

    let mut canvas = RgbaImage::from_pixel(side, side, PAD_COLOR);
    imageops::replace(&mut canvas, image, at.x, at.y);
    canvas
}

/// Cut a `target_width x target_height` region back out of a square image.
///
/// The square's side is taken from its width. Parts of the region that fall
/// outside the square are left fully transparent.
#[must_use]
pub fn denormalize(
    square: &RgbaImage,
    target_width: u32,
    target_height: u32,
    ratio: AspectRatio,
) -> RgbaImage {
    let side = square.width();
    let at = placement(ratio, side, target_width, target_height);
    log::debug!(
        "denormalize {side}x{} ({ratio}) to {target_width}x{target_height} from ({}, {})",
        square.height(),
        at.x,
        at.y
    );

    let mut out = RgbaImage::new(target_width, target_height);
    imageops::replace(&mut out, square, -at.x, -at.y);
    out
}

/// Resize `image` to a `side x side` square unless it already is one.
///
/// Generators are free to answer at their own resolution; the crop in
/// [`denormalize`] only lines up with [`normalize`] at the original side.
#[must_use]
pub fn fit_to_side(image: RgbaImage, side: u32) -> RgbaImage {
    if image.dimensions() == (side, side) {
        return image;
    }
    log::debug!(
        "rescaling generated {}x{} to {side}x{side}",
        image.width(),
        image.height()
    );
    imageops::resize(&image, side, side, FilterType::Lanczos3)
}
