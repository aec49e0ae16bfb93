// ============================================================================
// Inpainting — mask-guided pixel synthesis for text removal
// ============================================================================
//
// Two stages over the hole mask (non-zero = pixel to synthesize):
//
//   1. Onion peeling. Each pass fills the current boundary layer (hole pixels
//      with a known 4-neighbour) from a distance-weighted average of known
//      pixels inside `radius`. Filled pixels become sources for the next pass,
//      so colour is pushed from the outside inward along the hole border.
//   2. Diffusion. A few Gauss-Seidel sweeps of the discrete Laplace equation
//      restricted to the hole smooth out the seams the peeling leaves
//      between layers; known pixels act as fixed boundary conditions.
//
// Work is bounded by the region: callers hand in a crop of the text box plus
// its border, never the whole raster.

use image::{GrayImage, Luma};

use crate::canvas::{Bgr, PixelBuffer};

/// Laplace smoothing sweeps after peeling.
const DIFFUSION_SWEEPS: usize = 8;

/// Returns true if (x,y) is in the hole AND has at least one non-hole
/// direct (4-connected) neighbour.
#[inline]
fn is_boundary_hole(mask: &GrayImage, x: u32, y: u32) -> bool {
    if mask.get_pixel(x, y).0[0] == 0 {
        return false;
    }
    let (w, h) = mask.dimensions();
    for (dx, dy) in [(-1i32, 0), (1, 0), (0, -1i32), (0, 1)] {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx >= 0
            && ny >= 0
            && nx < w as i32
            && ny < h as i32
            && mask.get_pixel(nx as u32, ny as u32).0[0] == 0
        {
            return true;
        }
    }
    false
}

/// Distance-weighted mean of known pixels within `radius` of (x, y).
fn weighted_known_mean(
    img: &PixelBuffer,
    known: &GrayImage,
    x: u32,
    y: u32,
    radius: i32,
) -> Option<Bgr> {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let mut sum = [0.0f32; 3];
    let mut weight_total = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f32;
            if d2 == 0.0 || d2 > (radius * radius) as f32 {
                continue;
            }
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if known.get_pixel(nx as u32, ny as u32).0[0] != 0 {
                continue;
            }
            let p = img.get(nx as u32, ny as u32);
            let wgt = 1.0 / d2;
            sum[0] += p.b as f32 * wgt;
            sum[1] += p.g as f32 * wgt;
            sum[2] += p.r as f32 * wgt;
            weight_total += wgt;
        }
    }
    if weight_total < 1e-6 {
        return None;
    }
    Some(Bgr::new(
        (sum[0] / weight_total).round().clamp(0.0, 255.0) as u8,
        (sum[1] / weight_total).round().clamp(0.0, 255.0) as u8,
        (sum[2] / weight_total).round().clamp(0.0, 255.0) as u8,
    ))
}

/// Synthesize every pixel of `src` under `hole_mask` from its surroundings.
///
/// `hole_mask` must have the same dimensions as `src`. Pixels outside the
/// hole are returned unchanged. A mask that covers everything has no
/// context to draw from and leaves the image as is.
pub fn fill_region_diffusion(src: &PixelBuffer, hole_mask: &GrayImage, radius: u32) -> PixelBuffer {
    let (w, h) = (src.width(), src.height());
    let mut out = src.clone();
    if hole_mask.dimensions() != (w, h) {
        log::warn!(
            "inpaint: mask {:?} does not match image {}x{}",
            hole_mask.dimensions(),
            w,
            h
        );
        return out;
    }

    let holes: Vec<(u32, u32)> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .filter(|&(x, y)| hole_mask.get_pixel(x, y).0[0] > 0)
        .collect();
    if holes.is_empty() {
        return out;
    }
    if holes.len() == (w * h) as usize {
        log::debug!("inpaint: mask covers the whole region, nothing to sample");
        return out;
    }

    let radius = radius.max(1) as i32;
    let mut live_mask = hole_mask.clone();

    // Onion-peeling loop: each pass fills one "layer" of the hole boundary
    let max_peeling_passes = (w.max(h) as usize + 1) * 2;
    for _ in 0..max_peeling_passes {
        let boundary: Vec<(u32, u32)> = holes
            .iter()
            .copied()
            .filter(|&(x, y)| is_boundary_hole(&live_mask, x, y))
            .collect();
        if boundary.is_empty() {
            break;
        }

        // Collect fills first so one layer never reads its own output
        let fills: Vec<(u32, u32, Bgr)> = boundary
            .iter()
            .filter_map(|&(x, y)| {
                weighted_known_mean(&out, &live_mask, x, y, radius).map(|c| (x, y, c))
            })
            .collect();
        for (x, y, c) in fills {
            out.put(x, y, c);
        }
        for &(x, y) in &boundary {
            live_mask.put_pixel(x, y, Luma([0]));
        }
    }

    for _ in 0..DIFFUSION_SWEEPS {
        for &(x, y) in &holes {
            let mut sum = [0u32; 3];
            let mut n = 0u32;
            for (dx, dy) in [(-1i32, 0), (1, 0), (0, -1i32), (0, 1)] {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let p = out.get(nx as u32, ny as u32);
                sum[0] += p.b as u32;
                sum[1] += p.g as u32;
                sum[2] += p.r as u32;
                n += 1;
            }
            if n > 0 {
                out.put(
                    x,
                    y,
                    Bgr::new(
                        ((sum[0] + n / 2) / n) as u8,
                        ((sum[1] + n / 2) / n) as u8,
                        ((sum[2] + n / 2) / n) as u8,
                    ),
                );
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelBox;

    #[test]
    fn flat_background_is_restored_exactly() {
        let bg = Bgr::new(40, 120, 200);
        let mut img = PixelBuffer::new(16, 12, bg);
        img.fill_rect(PixelBox::new(5, 4, 10, 8), Bgr::BLACK);
        let mask = GrayImage::from_fn(16, 12, |x, y| {
            if (4..11).contains(&x) && (3..9).contains(&y) { Luma([255]) } else { Luma([0]) }
        });
        let out = fill_region_diffusion(&img, &mask, 3);
        for y in 0..12 {
            for x in 0..16 {
                assert_eq!(out.get(x, y), bg, "pixel {},{}", x, y);
            }
        }
    }

    #[test]
    fn gradient_fill_stays_between_neighbours() {
        let mut img = PixelBuffer::new(10, 3, Bgr::BLACK);
        for x in 0..10 {
            for y in 0..3 {
                let v = (x * 25) as u8;
                img.put(x, y, Bgr::new(v, v, v));
            }
        }
        let mask = GrayImage::from_fn(10, 3, |x, _| if x == 5 { Luma([255]) } else { Luma([0]) });
        let out = fill_region_diffusion(&img, &mask, 2);
        let v = out.get(5, 1).b;
        assert!((100..=150).contains(&v), "got {}", v);
    }

    #[test]
    fn full_mask_is_left_alone() {
        let img = PixelBuffer::new(4, 4, Bgr::new(9, 9, 9));
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        assert_eq!(fill_region_diffusion(&img, &mask, 3), img);
    }
}
