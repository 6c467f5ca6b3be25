//! Feathered-mask compositing of a generated layer over the original image.
//!
//! The generated layer is cut down to a soft rectangular mask and drawn over
//! the base with standard "source over" alpha blending:
//! `out = src * a + base * (1 - a)`, where
//! `a = overlay_alpha * mask_alpha * opacity`.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::feather;
use crate::geometry::PixelRect;
use crate::record::BatchItem;
use crate::settings::MaskSettings;

/// Build a `width x height` coverage mask for `rect`, feathered by `feather` pixels.
///
/// Pixels fully inside the rectangle get `1.0`, pixels cut by a fractional
/// edge get their covered area, and the rest `0.0`. Parts of the rectangle
/// outside the canvas are clipped.
#[must_use]
pub fn build_mask(width: u32, height: u32, rect: PixelRect, feather: f64) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let mut mask = vec![0.0_f32; w * h];
    if rect.is_empty() || w == 0 || h == 0 {
        return mask;
    }

    let x_cov = axis_coverage(rect.x, rect.right(), width);
    let y_cov = axis_coverage(rect.y, rect.bottom(), height);
    for &(py, cy) in &y_cov {
        let row = &mut mask[py * w..(py + 1) * w];
        for &(px, cx) in &x_cov {
            #[allow(clippy::cast_possible_truncation)]
            {
                row[px] = (cx * cy) as f32;
            }
        }
    }

    feather::feather_mask(&mut mask, w, h, feather);
    mask
}

/// Per-pixel coverage of the span `[start, end)` along an axis of `len` pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_coverage(start: f64, end: f64, len: u32) -> Vec<(usize, f64)> {
    let lo = start.max(0.0);
    let hi = end.min(f64::from(len));
    if hi <= lo {
        return Vec::new();
    }
    let first = lo.floor() as usize;
    let last = (hi.ceil() as usize).min(len as usize);
    (first..last)
        .filter_map(|p| {
            #[allow(clippy::cast_precision_loss)]
            let p0 = p as f64;
            let cov = (p0 + 1.0).min(hi) - p0.max(lo);
            (cov > 0.0).then_some((p, cov.min(1.0)))
        })
        .collect()
}

/// Composite `overlay` over `base` through a feathered rectangular mask.
///
/// The result always has `base`'s dimensions; an overlay of a different size
/// is stretched to fit. Returns an unchanged copy of `base` when there is no
/// overlay, the rectangle is empty, or `opacity` is zero.
#[must_use]
pub fn composite(
    base: &RgbaImage,
    overlay: Option<&RgbaImage>,
    rect: PixelRect,
    feather: f64,
    opacity: f64,
) -> RgbaImage {
    let mut out = base.clone();
    let Some(overlay) = overlay else {
        return out;
    };
    if rect.is_empty() || opacity.is_nan() || opacity <= 0.0 {
        return out;
    }
    let opacity = opacity.min(1.0);

    let (width, height) = base.dimensions();
    let overlay: Cow<'_, RgbaImage> = if overlay.dimensions() == (width, height) {
        Cow::Borrowed(overlay)
    } else {
        Cow::Owned(imageops::resize(overlay, width, height, FilterType::Triangle))
    };

    let mask = build_mask(width, height, rect, feather);
    #[allow(clippy::cast_possible_truncation)]
    let opacity = opacity as f32;

    for ((dst, src), &m) in out.pixels_mut().zip(overlay.pixels()).zip(&mask) {
        let src_a = f32::from(src[3]) / 255.0 * m * opacity;
        if src_a <= 0.0 {
            continue;
        }
        let dst_a = f32::from(dst[3]) / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        for ch in 0..3 {
            let c = (f32::from(src[ch]) * src_a + f32::from(dst[ch]) * dst_a * (1.0 - src_a))
                / out_a;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                dst[ch] = c.round().clamp(0.0, 255.0) as u8;
            }
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Composite using the shared batch settings, recomputing the pixel
/// rectangle for `base`'s own size.
#[must_use]
pub fn composite_with_settings(
    base: &RgbaImage,
    overlay: Option<&RgbaImage>,
    settings: &MaskSettings,
) -> RgbaImage {
    let (w, h) = base.dimensions();
    composite(
        base,
        overlay,
        settings.pixel_rect(w, h),
        settings.feather,
        settings.opacity,
    )
}

/// Render a finished batch item: its generated result blended over its original.
///
/// Never fails. If the stored result cannot be decoded the problem is logged
/// and the original is returned unmodified.
#[must_use]
pub fn render_item(item: &BatchItem, settings: &MaskSettings) -> RgbaImage {
    let base = item.original().image();
    match item.result_image() {
        Ok(generated) => composite_with_settings(base, Some(&generated), settings),
        Err(e) => {
            log::warn!(
                "compositing {} failed, showing original: {e}",
                item.original().name()
            );
            base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use image::Rgba;

    use crate::record::{ImageRecord, PNG_MIME};

    const RED: Rgba<u8> = Rgba([200, 10, 10, 255]);
    const BLUE: Rgba<u8> = Rgba([10, 20, 220, 255]);

    fn rect(x: f64, y: f64, w: f64, h: f64) -> PixelRect {
        PixelRect { x, y, w, h }
    }

    #[test]
    fn zero_area_rect_returns_base() {
        let base = RgbaImage::from_pixel(20, 20, RED);
        let overlay = RgbaImage::from_pixel(20, 20, BLUE);
        let out = composite(&base, Some(&overlay), rect(5.0, 5.0, 0.0, 10.0), 3.0, 1.0);
        assert_eq!(out, base);
        let out = composite(&base, Some(&overlay), rect(5.0, 5.0, 10.0, 0.0), 0.0, 1.0);
        assert_eq!(out, base);
    }

    #[test]
    fn missing_overlay_returns_base() {
        let base = RgbaImage::from_pixel(8, 8, RED);
        assert_eq!(composite(&base, None, rect(0.0, 0.0, 8.0, 8.0), 0.0, 1.0), base);
    }

    #[test]
    fn zero_opacity_returns_base() {
        let base = RgbaImage::from_pixel(30, 30, RED);
        let overlay = RgbaImage::from_pixel(30, 30, BLUE);
        let out = composite(&base, Some(&overlay), rect(5.0, 5.0, 20.0, 20.0), 4.0, 0.0);
        assert_eq!(out, base);
    }

    #[test]
    fn hard_mask_full_opacity_swaps_inside_only() {
        let base = RgbaImage::from_pixel(40, 30, RED);
        let overlay = RgbaImage::from_pixel(40, 30, BLUE);
        let out = composite(&base, Some(&overlay), rect(10.0, 5.0, 20.0, 10.0), 0.0, 1.0);
        for (x, y, px) in out.enumerate_pixels() {
            let inside = (10..30).contains(&x) && (5..15).contains(&y);
            let expected = if inside { BLUE } else { RED };
            assert_eq!(*px, expected, "pixel ({x},{y})");
        }
    }

    #[test]
    fn half_opacity_mixes_evenly() {
        let base = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(10, 10, Rgba([200, 100, 50, 255]));
        let out = composite(&base, Some(&overlay), rect(0.0, 0.0, 10.0, 10.0), 0.0, 0.5);
        assert_eq!(out.get_pixel(5, 5), &Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn fractional_edges_get_partial_coverage() {
        let mask = build_mask(10, 1, rect(2.5, 0.0, 5.0, 1.0), 0.0);
        assert!((mask[1]).abs() < f32::EPSILON);
        assert!((mask[2] - 0.5).abs() < 1e-6);
        assert!((mask[4] - 1.0).abs() < f32::EPSILON);
        assert!((mask[7] - 0.5).abs() < 1e-6);
        assert!((mask[8]).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_bounds_rect_is_clipped() {
        let mask = build_mask(10, 10, rect(8.0, -3.0, 50.0, 5.0), 0.0);
        assert!((mask[9] - 1.0).abs() < f32::EPSILON);
        assert!((mask[10 + 9] - 1.0).abs() < f32::EPSILON);
        assert!(mask[2 * 10 + 9].abs() < f32::EPSILON);
        assert!(mask[7].abs() < f32::EPSILON);
    }

    #[test]
    fn feather_softens_the_edge() {
        let base = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let out = composite(&base, Some(&overlay), rect(25.0, 25.0, 50.0, 50.0), 5.0, 1.0);
        assert_eq!(out.get_pixel(50, 50)[0], 255);
        assert_eq!(out.get_pixel(2, 2)[0], 0);
        let edge = out.get_pixel(25, 50)[0];
        assert!(edge > 60 && edge < 200, "edge value {edge}");
        let just_outside = out.get_pixel(23, 50)[0];
        assert!(just_outside > 0, "feather should bleed past the edge");
    }

    #[test]
    fn overlay_is_stretched_to_base_size() {
        let base = RgbaImage::from_pixel(20, 20, RED);
        let overlay = RgbaImage::from_pixel(5, 5, BLUE);
        let out = composite(&base, Some(&overlay), rect(0.0, 0.0, 20.0, 20.0), 0.0, 1.0);
        assert_eq!(out.dimensions(), (20, 20));
        let px = out.get_pixel(10, 10);
        for ch in 0..4 {
            assert!(px[ch].abs_diff(BLUE[ch]) <= 1, "channel {ch}: {}", px[ch]);
        }
    }

    #[test]
    fn transparent_overlay_pixels_leave_base_visible() {
        let base = RgbaImage::from_pixel(10, 10, RED);
        let overlay = RgbaImage::new(10, 10);
        let out = composite(&base, Some(&overlay), rect(0.0, 0.0, 10.0, 10.0), 0.0, 1.0);
        assert_eq!(out, base);
    }

    #[test]
    fn enormous_feather_returns_promptly() {
        let base = RgbaImage::from_pixel(10, 10, RED);
        let overlay = RgbaImage::from_pixel(10, 10, BLUE);
        for feather in [1e10, 1e40] {
            let out = composite(&base, Some(&overlay), rect(2.0, 2.0, 5.0, 5.0), feather, 1.0);
            assert_eq!(out, base, "feather {feather}");
        }
    }

    #[test]
    fn accepted_huge_feather_setting_still_renders() {
        let json = r#"{"width":50,"height":50,"maskX":20,"maskY":20,"feather":1e40,"opacity":1,"aspectRatio":"9:16"}"#;
        let settings = MaskSettings::from_json(json).unwrap();
        let base = RgbaImage::from_pixel(10, 10, RED);
        let overlay = RgbaImage::from_pixel(10, 10, BLUE);
        assert_eq!(composite_with_settings(&base, Some(&overlay), &settings), base);
    }

    #[test]
    fn non_finite_rect_or_opacity_returns_base() {
        let base = RgbaImage::from_pixel(12, 12, RED);
        let overlay = RgbaImage::from_pixel(12, 12, BLUE);
        let nan_rect = rect(f64::NAN, 0.0, 6.0, 6.0);
        assert_eq!(composite(&base, Some(&overlay), nan_rect, 0.0, 1.0), base);
        let nan_size = rect(0.0, 0.0, f64::NAN, 6.0);
        assert_eq!(composite(&base, Some(&overlay), nan_size, 0.0, 1.0), base);
        let good = rect(0.0, 0.0, 6.0, 6.0);
        assert_eq!(composite(&base, Some(&overlay), good, 0.0, f64::NAN), base);
    }

    #[test]
    fn corrupt_result_renders_the_original() {
        let original = RgbaImage::from_fn(8, 6, |x, y| Rgba([x as u8 * 20, y as u8 * 30, 5, 255]));
        let record = ImageRecord::new("broken.png", PNG_MIME, original.clone());
        let item = BatchItem::from_raw(Arc::new(record), b"\x89PNG truncated".to_vec());
        let settings = MaskSettings {
            mask_x: 0.0,
            mask_y: 0.0,
            width: 100.0,
            height: 100.0,
            ..MaskSettings::default()
        };
        assert_eq!(render_item(&item, &settings), original);
    }
}
