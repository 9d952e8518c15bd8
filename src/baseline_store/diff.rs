//! Perceptual comparison of two captured images.
//!
//! Byte-identical inputs short-circuit; anything else is decoded and
//! compared per-pixel with a small per-channel tolerance so anti-aliasing
//! noise does not count as a visual change. Undecodable input degrades to
//! a conservative never-approvable result instead of aborting the run.

use image::RgbaImage;
use log::warn;

use super::types::DiffResult;

/// Per-channel delta treated as anti-aliasing noise rather than a change.
const CHANNEL_TOLERANCE: i32 = 12;

/// Compares two encoded images and scores the difference.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> DiffResult {
    if a == b {
        return DiffResult::identical();
    }
    let (img_a, img_b) = match (image::load_from_memory(a), image::load_from_memory(b)) {
        (Ok(x), Ok(y)) => (x.to_rgba8(), y.to_rgba8()),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Image decode failed during compare: {}", e);
            return DiffResult::unreadable();
        }
    };
    compare_images(&img_a, &img_b)
}

fn compare_images(a: &RgbaImage, b: &RgbaImage) -> DiffResult {
    let (wa, ha) = a.dimensions();
    let (wb, hb) = b.dimensions();
    let max_w = wa.max(wb);
    let max_h = ha.max(hb);
    if max_w == 0 || max_h == 0 {
        return DiffResult::unreadable();
    }

    let layout_shift = {
        let dw = (wa as f64 - wb as f64).abs() / max_w as f64;
        let dh = (ha as f64 - hb as f64).abs() / max_h as f64;
        dw.max(dh)
    };

    // Pixels outside the overlapping region count as differing outright.
    let overlap_w = wa.min(wb);
    let overlap_h = ha.min(hb);
    let mut differing: u64 = 0;
    let mut total_delta: u64 = 0;
    for y in 0..overlap_h {
        for x in 0..overlap_w {
            let pa = a.get_pixel(x, y).0;
            let pb = b.get_pixel(x, y).0;
            let mut beyond_tolerance = false;
            for c in 0..3 {
                let d = (pa[c] as i32 - pb[c] as i32).abs();
                total_delta += d as u64;
                if d > CHANNEL_TOLERANCE {
                    beyond_tolerance = true;
                }
            }
            if beyond_tolerance {
                differing += 1;
            }
        }
    }

    let overlap = overlap_w as u64 * overlap_h as u64;
    let max_area = max_w as u64 * max_h as u64;
    let pixel_diff = (differing + (max_area - overlap)) as f64 / max_area as f64;
    let color_variance = if overlap == 0 {
        1.0
    } else {
        total_delta as f64 / (overlap as f64 * 3.0 * 255.0)
    };
    let confidence =
        (1.0 - (0.6 * pixel_diff + 0.25 * layout_shift + 0.15 * color_variance)).clamp(0.0, 1.0);

    DiffResult {
        identical: false,
        pixel_diff,
        layout_shift,
        color_variance,
        confidence,
    }
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_bytes_short_circuit() {
        let png = solid_png(8, 8, [120, 10, 200, 255]);
        let diff = compare_bytes(&png, &png.clone());
        assert!(diff.identical);
        assert_eq!(diff.pixel_diff, 0.0);
        assert_eq!(diff.confidence, 1.0);
    }

    #[test]
    fn test_opposite_colors_score_high_difference() {
        let white = solid_png(10, 10, [255, 255, 255, 255]);
        let black = solid_png(10, 10, [0, 0, 0, 255]);
        let diff = compare_bytes(&white, &black);
        assert!(!diff.identical);
        assert_eq!(diff.pixel_diff, 1.0);
        assert_eq!(diff.layout_shift, 0.0);
        assert!(diff.color_variance > 0.9);
        assert!(diff.confidence < 0.3);
    }

    #[test]
    fn test_near_identical_within_tolerance() {
        let a = solid_png(10, 10, [255, 255, 255, 255]);
        let b = solid_png(10, 10, [250, 250, 250, 255]);
        let diff = compare_bytes(&a, &b);
        assert!(!diff.identical);
        assert_eq!(diff.pixel_diff, 0.0);
        assert!(diff.color_variance < 0.05);
        assert!(diff.confidence > 0.9);
    }

    #[test]
    fn test_dimension_mismatch_scores_layout_shift() {
        let a = solid_png(10, 10, [0, 0, 0, 255]);
        let b = solid_png(20, 10, [0, 0, 0, 255]);
        let diff = compare_bytes(&a, &b);
        assert!((diff.layout_shift - 0.5).abs() < 1e-9);
        // Half the larger canvas has no counterpart
        assert!((diff.pixel_diff - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_undecodable_input_is_never_approvable() {
        let diff = compare_bytes(b"not a png", b"also not a png 2");
        assert!(!diff.identical);
        assert_eq!(diff.confidence, 0.0);
        assert_eq!(diff.pixel_diff, 1.0);
    }
}
