// ============================================================================
// Background regeneration under a text box
// ============================================================================
//
// Two strategies share one entry point:
//
//   Neighbor  flood the box (plus a border) with the most frequent ring
//             color. Fast, flat backgrounds only.
//   Inpaint   text mask over the box plus a border, dilate, synthesize the
//             masked pixels from their surroundings.
//
// In move-preparation mode both return a `DragPatch` holding the original
// text pixels and their mask, sized to the box, so the glyphs can be
// composited back at the region's new position on commit.

use crate::canvas::{Bgr, PixelBuffer};
use crate::components::region::DragPatch;
use crate::geometry::{PixelBox, Point};
use crate::ops::inpaint::fill_region_diffusion;
use crate::ops::mask;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillMethod {
    Neighbor,
    #[default]
    Inpaint,
}

impl FillMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillMethod::Neighbor => "neighbor",
            FillMethod::Inpaint => "inpaint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neighbor" | "neighbour" => Some(FillMethod::Neighbor),
            "inpaint" => Some(FillMethod::Inpaint),
            _ => None,
        }
    }
}

/// Tuning for both strategies. The two expansion borders are deliberately
/// separate knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct FillSettings {
    pub method: FillMethod,
    pub neighbor_border: u32,
    pub inpaint_border: u32,
    pub inpaint_radius: u32,
    pub dilate_kernel: u32,
    pub erode_kernel: u32,
    pub invert_mask_threshold: f64,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            method: FillMethod::Inpaint,
            neighbor_border: 1,
            inpaint_border: 3,
            inpaint_radius: 3,
            dilate_kernel: 3,
            erode_kernel: 2,
            invert_mask_threshold: mask::INVERT_MASK_THRESH,
        }
    }
}

/// Regenerate the background under `[top_left, bottom_right)`.
///
/// `background` is the neighbor-fill color; the inpainting path ignores it.
/// Returns a patch only when `for_move` is set.
pub fn fill_background(
    pixels: &mut PixelBuffer,
    top_left: Point,
    bottom_right: Point,
    background: Bgr,
    settings: &FillSettings,
    for_move: bool,
) -> Option<DragPatch> {
    if pixels.is_empty() {
        log::debug!("fill_background: empty raster");
        return None;
    }
    match settings.method {
        FillMethod::Neighbor => {
            let patch = for_move.then(|| {
                let rect = PixelBox::from_points(top_left, bottom_right, pixels.width(), pixels.height());
                let text = mask::text_mask(pixels, rect, settings.invert_mask_threshold);
                DragPatch::from_masked(&pixels.crop(rect), &text, PixelBox::new(0, 0, rect.width(), rect.height()))
            });
            neighbor_fill(pixels, top_left, bottom_right, settings.neighbor_border, background);
            patch
        }
        FillMethod::Inpaint => inpaint_fill(pixels, top_left, bottom_right, settings, for_move),
    }
}

/// Flood the inclusive range `[top_left - border, bottom_right + border]`,
/// clamped to the raster, with `color`.
pub fn neighbor_fill(pixels: &mut PixelBuffer, top_left: Point, bottom_right: Point, border: u32, color: Bgr) {
    if pixels.is_empty() {
        return;
    }
    let (w, h) = (pixels.width() as i32, pixels.height() as i32);
    let b = border as i32;
    let left = (top_left.x - b).clamp(0, w - 1);
    let top = (top_left.y - b).clamp(0, h - 1);
    let right = (bottom_right.x + b).clamp(0, w - 1);
    let bottom = (bottom_right.y + b).clamp(0, h - 1);
    if right < left || bottom < top {
        log::debug!("neighbor_fill: inverted box {:?}..{:?}", top_left, bottom_right);
        return;
    }
    pixels.fill_rect(
        PixelBox::new(left as u32, top as u32, right as u32 + 1, bottom as u32 + 1),
        color,
    );
}

/// Inpaint the text under `[top_left, bottom_right)` expanded by
/// `settings.inpaint_border`.
///
/// A side only expands if the full border fits inside the raster. Those
/// per-side flags decide what gets trimmed off the move patch, so the patch
/// always matches the unexpanded box.
pub fn inpaint_fill(
    pixels: &mut PixelBuffer,
    top_left: Point,
    bottom_right: Point,
    settings: &FillSettings,
    for_move: bool,
) -> Option<DragPatch> {
    let (w, h) = (pixels.width() as i32, pixels.height() as i32);
    let b = settings.inpaint_border as i32;

    let grow_left = top_left.x - b >= 0;
    let grow_top = top_left.y - b >= 0;
    let grow_right = bottom_right.x + b < w;
    let grow_bottom = bottom_right.y + b < h;

    let expanded_tl = Point::new(
        if grow_left { top_left.x - b } else { top_left.x },
        if grow_top { top_left.y - b } else { top_left.y },
    );
    let expanded_br = Point::new(
        if grow_right { bottom_right.x + b } else { bottom_right.x },
        if grow_bottom { bottom_right.y + b } else { bottom_right.y },
    );
    let rect = PixelBox::from_points(expanded_tl, expanded_br, pixels.width(), pixels.height());
    if rect.is_empty() {
        log::debug!("inpaint_fill: empty region {:?}..{:?}", top_left, bottom_right);
        return None;
    }

    let original = pixels.crop(rect);
    let text = mask::text_mask(pixels, rect, settings.invert_mask_threshold);
    let hole = mask::dilate(&text, settings.dilate_kernel);
    let filled = fill_region_diffusion(&original, &hole, settings.inpaint_radius);

    let patch = for_move.then(|| {
        let core = mask::erode(&hole, settings.erode_kernel);
        let trim = PixelBox::new(
            if grow_left { b as u32 } else { 0 },
            if grow_top { b as u32 } else { 0 },
            if grow_right { rect.width().saturating_sub(b as u32) } else { rect.width() },
            if grow_bottom { rect.height().saturating_sub(b as u32) } else { rect.height() },
        );
        DragPatch::from_masked(&original, &core, trim)
    });

    pixels.paste(rect.x0 as i32, rect.y0 as i32, &filled);
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors;

    fn neighbor_settings() -> FillSettings {
        FillSettings { method: FillMethod::Neighbor, ..FillSettings::default() }
    }

    #[test]
    fn black_square_on_white_is_erased() {
        let mut img = PixelBuffer::new(100, 100, Bgr::WHITE);
        img.fill_rect(PixelBox::new(40, 40, 50, 50), Bgr::BLACK);
        let (tl, br) = (Point::new(40, 40), Point::new(50, 50));
        let bg = colors::border_color(&img, tl, br, 1);
        assert_eq!(bg, Some(Bgr::WHITE));

        let patch = fill_background(&mut img, tl, br, Bgr::WHITE, &neighbor_settings(), false);
        assert!(patch.is_none());
        for y in 39..=51 {
            for x in 39..=51 {
                assert_eq!(img.get(x, y), Bgr::WHITE);
            }
        }
    }

    #[test]
    fn neighbor_fill_is_idempotent_on_flat_background() {
        let bg = Bgr::new(30, 60, 90);
        let mut img = PixelBuffer::new(20, 20, bg);
        let before = img.clone();
        let (tl, br) = (Point::new(5, 5), Point::new(12, 9));
        let color = colors::border_color(&img, tl, br, 1);
        assert_eq!(color, Some(bg));
        neighbor_fill(&mut img, tl, br, 1, bg);
        assert_eq!(img, before);
    }

    #[test]
    fn neighbor_fill_clamps_at_raster_edge() {
        let mut img = PixelBuffer::new(10, 10, Bgr::BLACK);
        neighbor_fill(&mut img, Point::new(0, 0), Point::new(9, 9), 1, Bgr::WHITE);
        assert_eq!(img, PixelBuffer::new(10, 10, Bgr::WHITE));
    }

    #[test]
    fn neighbor_move_patch_carries_the_glyphs() {
        let mut img = PixelBuffer::new(40, 20, Bgr::WHITE);
        img.fill_rect(PixelBox::new(12, 8, 26, 10), Bgr::BLACK);
        let patch = fill_background(
            &mut img,
            Point::new(10, 5),
            Point::new(30, 12),
            Bgr::WHITE,
            &neighbor_settings(),
            true,
        )
        .unwrap();
        assert_eq!((patch.width(), patch.height()), (20, 7));
        assert_eq!(patch.mask.get(2, 3), Bgr::WHITE);
        assert_eq!(patch.patch.get(2, 3), Bgr::BLACK);
        assert_eq!(img.get(15, 9), Bgr::WHITE);
    }

    fn thin_text_image() -> PixelBuffer {
        let mut img = PixelBuffer::new(100, 100, Bgr::WHITE);
        img.fill_rect(PixelBox::new(33, 32, 47, 34), Bgr::BLACK);
        img
    }

    #[test]
    fn inpaint_removes_text_on_flat_background() {
        let mut img = thin_text_image();
        let patch = inpaint_fill(&mut img, Point::new(30, 30), Point::new(50, 36), &FillSettings::default(), false);
        assert!(patch.is_none());
        assert_eq!(img, PixelBuffer::new(100, 100, Bgr::WHITE));
    }

    #[test]
    fn inpaint_move_patch_is_trimmed_to_box() {
        let mut img = thin_text_image();
        let (tl, br) = (Point::new(30, 30), Point::new(50, 36));
        let patch = inpaint_fill(&mut img, tl, br, &FillSettings::default(), true).unwrap();
        assert_eq!((patch.width(), patch.height()), (20, 6));
        // (35, 33) in raster = (5, 3) in the box
        assert_eq!(patch.mask.get(5, 3), Bgr::WHITE);
        assert_eq!(patch.patch.get(5, 3), Bgr::BLACK);
        assert_eq!(patch.mask.get(0, 0), Bgr::BLACK);
    }

    #[test]
    fn inpaint_near_edge_does_not_expand_that_side() {
        let mut img = PixelBuffer::new(30, 30, Bgr::WHITE);
        img.fill_rect(PixelBox::new(2, 2, 12, 3), Bgr::BLACK);
        let patch = inpaint_fill(&mut img, Point::new(1, 1), Point::new(14, 5), &FillSettings::default(), true).unwrap();
        assert_eq!((patch.width(), patch.height()), (13, 4));
    }

    #[test]
    fn fill_method_parses() {
        assert_eq!(FillMethod::parse("Neighbor"), Some(FillMethod::Neighbor));
        assert_eq!(FillMethod::parse("inpaint"), Some(FillMethod::Inpaint));
        assert_eq!(FillMethod::parse("blur"), None);
    }
}
