// ============================================================================
// Text masks — grayscale, Otsu binarization and rectangular morphology
// ============================================================================

use image::{GrayImage, Luma};

use crate::canvas::PixelBuffer;
use crate::geometry::PixelBox;

/// White ratio above which a thresholded mask is assumed to have picked the
/// background as foreground and gets inverted.
pub const INVERT_MASK_THRESH: f64 = 0.75;

/// Grayscale copy of `rect` (clamped to the raster).
pub fn grayscale(pixels: &PixelBuffer, rect: PixelBox) -> GrayImage {
    let rect = pixels.clamp_box(rect);
    GrayImage::from_fn(rect.width(), rect.height(), |x, y| {
        Luma([pixels.get(rect.x0 + x, rect.y0 + y).luma()])
    })
}

/// Otsu's threshold over the 256-bin histogram of `gray`.
///
/// Returns the level that maximises between-class variance. A single-valued
/// image returns that value, so thresholding it yields an all-black mask.
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for p in gray.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0;
    }

    let sum_all: f64 = hist.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();
    let mut sum_bg = 0.0f64;
    let mut weight_bg = 0u64;
    let mut best_level = 0u8;
    let mut best_var = -1.0f64;

    for (level, &count) in hist.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            // Everything at or below this level: only reachable before any
            // split was found when the image holds a single value.
            if best_var < 0.0 {
                best_level = level as u8;
            }
            break;
        }
        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let diff = mean_bg - mean_fg;
        let between = weight_bg as f64 * weight_fg as f64 * diff * diff;
        if between > best_var {
            best_var = between;
            best_level = level as u8;
        }
    }
    best_level
}

/// Binary threshold: `> level` becomes 255, everything else 0.
pub fn threshold(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > level { Luma([255]) } else { Luma([0]) }
    })
}

/// Fraction of mask pixels that are foreground-white (255).
pub fn white_component_ratio(mask: &GrayImage) -> f64 {
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let white = mask.pixels().filter(|p| p.0[0] == 255).count() as u64;
    white as f64 / total as f64
}

pub fn invert(mask: &mut GrayImage) {
    for p in mask.pixels_mut() {
        p.0[0] = 255 - p.0[0];
    }
}

/// Text/foreground mask over `rect`: grayscale, Otsu threshold, then invert
/// when more than `invert_threshold` of the mask came out white. Otsu only
/// splits two classes; the inversion decides which one is ink.
pub fn text_mask(pixels: &PixelBuffer, rect: PixelBox, invert_threshold: f64) -> GrayImage {
    let gray = grayscale(pixels, rect);
    let mut mask = threshold(&gray, otsu_level(&gray));
    if white_component_ratio(&mask) > invert_threshold {
        log::debug!("inverting text mask ({}x{})", mask.width(), mask.height());
        invert(&mut mask);
    }
    mask
}

// -- Morphology ---------------------------------------------------------------
//
// Rectangular kernels with the anchor at (k / 2, k / 2). Out-of-bounds
// neighbours are ignored, matching a constant border that never wins.

fn kernel_span(k: u32) -> (i32, i32) {
    let k = k.max(1) as i32;
    let anchor = k / 2;
    (-anchor, k - 1 - anchor)
}

fn morph(mask: &GrayImage, k: u32, pick_max: bool) -> GrayImage {
    let (w, h) = (mask.width() as i32, mask.height() as i32);
    let (lo, hi) = kernel_span(k);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let mut acc: u8 = if pick_max { 0 } else { 255 };
        for dy in lo..=hi {
            for dx in lo..=hi {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let v = mask.get_pixel(nx as u32, ny as u32).0[0];
                acc = if pick_max { acc.max(v) } else { acc.min(v) };
            }
        }
        Luma([acc])
    })
}

/// Grow white areas with a `k × k` square.
pub fn dilate(mask: &GrayImage, k: u32) -> GrayImage {
    morph(mask, k, true)
}

/// Shrink white areas with a `k × k` square.
pub fn erode(mask: &GrayImage, k: u32) -> GrayImage {
    morph(mask, k, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Bgr;

    fn text_on_background(bg: Bgr, ink: Bgr) -> PixelBuffer {
        let mut buf = PixelBuffer::new(20, 20, bg);
        buf.fill_rect(PixelBox::new(6, 6, 10, 10), ink);
        buf
    }

    #[test]
    fn otsu_splits_two_levels() {
        let buf = text_on_background(Bgr::WHITE, Bgr::BLACK);
        let gray = grayscale(&buf, buf.bounds());
        let level = otsu_level(&gray);
        assert!(level < 255);
        let mask = threshold(&gray, level);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(7, 7).0[0], 0);
    }

    #[test]
    fn uniform_region_thresholds_to_black() {
        let buf = PixelBuffer::new(8, 8, Bgr::new(90, 90, 90));
        let gray = grayscale(&buf, buf.bounds());
        let mask = threshold(&gray, otsu_level(&gray));
        assert_eq!(white_component_ratio(&mask), 0.0);
    }

    #[test]
    fn dark_text_on_light_background_is_inverted() {
        let buf = text_on_background(Bgr::WHITE, Bgr::BLACK);
        let gray = grayscale(&buf, buf.bounds());
        let raw = threshold(&gray, otsu_level(&gray));
        assert!(white_component_ratio(&raw) > INVERT_MASK_THRESH);

        let mask = text_mask(&buf, buf.bounds(), INVERT_MASK_THRESH);
        assert!(white_component_ratio(&mask) <= INVERT_MASK_THRESH);
        assert_eq!(mask.get_pixel(7, 7).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn light_text_on_dark_background_is_kept() {
        let buf = text_on_background(Bgr::BLACK, Bgr::WHITE);
        let mask = text_mask(&buf, buf.bounds(), INVERT_MASK_THRESH);
        assert_eq!(mask.get_pixel(7, 7).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn dilate_then_erode_brackets_the_original() {
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, Luma([255]));
        let grown = dilate(&mask, 3);
        assert_eq!(grown.pixels().filter(|p| p.0[0] == 255).count(), 9);
        let shrunk = erode(&grown, 2);
        assert_eq!(shrunk.get_pixel(4, 4).0[0], 255);
        assert!(shrunk.pixels().filter(|p| p.0[0] == 255).count() < 9);
    }
}
