use std::collections::HashMap;

use image::{GrayImage, Rgba};

use crate::canvas::{Bgr, PixelBuffer};
use crate::geometry::{PixelBox, Point};

/// Palette size bounds. The configured limit is clamped into this range.
pub const PALETTE_MIN: usize = 5;
pub const PALETTE_MAX: usize = 10;

// ============================================================================
// Highlight overlay colors (RGBA, translucent)
// ============================================================================

pub const HIGHLIGHT_SHOWN: Rgba<u8> = Rgba([255, 243, 0, 100]);
pub const HIGHLIGHT_SELECTED: Rgba<u8> = Rgba([37, 122, 253, 100]);
pub const HIGHLIGHT_CHANGED: Rgba<u8> = Rgba([0, 255, 0, 100]);
/// Outline of the region being dragged.
pub const HIGHLIGHT_MOVING: Rgba<u8> = Rgba([255, 0, 243, 100]);

// ============================================================================
// Frequency counting
// ============================================================================

/// Color histogram that remembers first-seen order, so ties between equally
/// frequent colors resolve to the one met first in scan order.
#[derive(Default)]
struct ColorCounter {
    counts: HashMap<Bgr, (usize, usize)>,
    seen: usize,
}

impl ColorCounter {
    fn add(&mut self, c: Bgr) {
        let order = self.seen;
        let entry = self.counts.entry(c).or_insert((0, order));
        entry.0 += 1;
        self.seen += 1;
    }

    /// Colors by descending count, ties by first appearance.
    fn ranked(self) -> Vec<Bgr> {
        let mut v: Vec<(Bgr, usize, usize)> =
            self.counts.into_iter().map(|(c, (n, first))| (c, n, first)).collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        v.into_iter().map(|(c, _, _)| c).collect()
    }
}

/// Most frequent color on the ring `border` pixels outside the box
/// `[top_left, bottom_right)`.
///
/// Sides already at the raster edge fall back to the box edge itself. The
/// ring walks the top and bottom rows over `[left, right)` and the left and
/// right columns over `[top, bottom)`. Returns `None` for an empty raster.
pub fn border_color(pixels: &PixelBuffer, top_left: Point, bottom_right: Point, border: u32) -> Option<Bgr> {
    if pixels.is_empty() {
        return None;
    }
    let (w, h) = (pixels.width() as i32, pixels.height() as i32);
    let b = border as i32;
    let left = (top_left.x - b).max(0).min(w - 1);
    let top = (top_left.y - b).max(0).min(h - 1);
    let right = (bottom_right.x + b).min(w - 1).max(left);
    let bottom = (bottom_right.y + b).min(h - 1).max(top);

    let mut counter = ColorCounter::default();
    for x in left..right {
        counter.add(pixels.get(x as u32, top as u32));
        counter.add(pixels.get(x as u32, bottom as u32));
    }
    for y in top..bottom {
        counter.add(pixels.get(left as u32, y as u32));
        counter.add(pixels.get(right as u32, y as u32));
    }
    if counter.seen == 0 {
        // Single-pixel ring: no span to walk.
        return Some(pixels.get(left as u32, top as u32));
    }
    counter.ranked().into_iter().next()
}

/// Top-`limit` colors among the pixels of `rect` selected by `mask`
/// (non-zero = foreground). `mask` is in `rect`-local coordinates.
///
/// Pure black is dropped unless nothing else was found; scanned documents
/// are full of black noise that would otherwise always win.
pub fn palette(pixels: &PixelBuffer, rect: PixelBox, mask: &GrayImage, limit: usize) -> Vec<Bgr> {
    let rect = pixels.clamp_box(rect);
    let limit = limit.clamp(PALETTE_MIN, PALETTE_MAX);
    let mut counter = ColorCounter::default();
    for y in 0..rect.height().min(mask.height()) {
        for x in 0..rect.width().min(mask.width()) {
            if mask.get_pixel(x, y).0[0] != 0 {
                counter.add(pixels.get(rect.x0 + x, rect.y0 + y));
            }
        }
    }
    let ranked = counter.ranked();
    if ranked.len() == 1 {
        return ranked;
    }
    ranked
        .into_iter()
        .filter(|&c| c != Bgr::BLACK)
        .take(limit)
        .collect()
}
