use image::{RgbImage, Rgba, RgbaImage, imageops::FilterType};
use rayon::prelude::*;

use crate::geometry::PixelBox;

/// Largest raster the engine will allocate (~256 megapixels).
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// COLOR
// ============================================================================

/// A 3-channel color in BGR byte order, matching the raster layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bgr {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Bgr {
    pub const BLACK: Bgr = Bgr { b: 0, g: 0, r: 0 };
    pub const WHITE: Bgr = Bgr { b: 255, g: 255, r: 255 };

    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }

    /// Luma with the BT.601 weights used for text masks.
    pub fn luma(self) -> u8 {
        let v = 0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32;
        v.round().clamp(0.0, 255.0) as u8
    }

    /// Stylesheet fragment the host shell uses for color swatches.
    pub fn css(self) -> String {
        format!("background-color: rgb({},{},{})", self.r, self.g, self.b)
    }
}

// ============================================================================
// PIXEL BUFFER — owned BGR raster
// ============================================================================

/// A row-major, tightly packed 3-channel BGR raster.
///
/// `Clone` is a deep copy. Snapshots rely on that: a buffer is never aliased
/// between two document states.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// A `width × height` raster filled with `color`. Oversized requests are
    /// logged and produce an empty buffer.
    pub fn new(width: u32, height: u32, color: Bgr) -> Self {
        if (width as u64) * (height as u64) > MAX_PIXELS {
            log::error!(
                "PixelBuffer::new: {}x{} exceeds {} pixels, using empty buffer",
                width,
                height,
                MAX_PIXELS
            );
            return Self::default();
        }
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[color.b, color.g, color.r]);
        }
        Self { width, height, data }
    }

    /// Import from the host's displayable RGBA bitmap (alpha is dropped).
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let mut data = vec![0u8; src.width() as usize * src.height() as usize * 3];
        data.par_chunks_exact_mut(3)
            .zip(src.as_raw().par_chunks_exact(4))
            .for_each(|(dst, px)| {
                dst[0] = px[2];
                dst[1] = px[1];
                dst[2] = px[0];
            });
        Self { width: src.width(), height: src.height(), data }
    }

    /// Import from an RGB image (decoder output).
    pub fn from_rgb_image(src: &RgbImage) -> Self {
        let mut data = src.as_raw().clone();
        data.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
        Self { width: src.width(), height: src.height(), data }
    }

    /// Export as an RGB image (encoder input).
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = self.data.clone();
        data.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
        RgbImage::from_raw(self.width, self.height, data).unwrap_or_default()
    }

    /// Export to the host's displayable RGBA bitmap (opaque).
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = vec![0u8; self.width as usize * self.height as usize * 4];
        out.par_chunks_exact_mut(4)
            .zip(self.data.par_chunks_exact(3))
            .for_each(|(dst, px)| {
                dst[0] = px[2];
                dst[1] = px[1];
                dst[2] = px[0];
                dst[3] = 255;
            });
        RgbaImage::from_raw(self.width, self.height, out).unwrap_or_default()
    }

    // ---- accessors ------------------------------------------------------------

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Always 3 (BGR).
    #[inline]
    pub fn channels(&self) -> u32 {
        3
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.len()
    }

    /// The whole raster as a box.
    pub fn bounds(&self) -> PixelBox {
        PixelBox::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Bgr {
        let i = self.offset(x, y);
        Bgr::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, color: Bgr) {
        let i = self.offset(x, y);
        self.data[i] = color.b;
        self.data[i + 1] = color.g;
        self.data[i + 2] = color.r;
    }

    // ---- sub-rectangle read / write -------------------------------------------

    /// Copy the pixels of `rect` (clamped to bounds) into a new buffer.
    pub fn crop(&self, rect: PixelBox) -> PixelBuffer {
        let rect = self.clamp_box(rect);
        let (w, h) = (rect.width(), rect.height());
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        for y in rect.y0..rect.y1 {
            let start = self.offset(rect.x0, y);
            data.extend_from_slice(&self.data[start..start + w as usize * 3]);
        }
        PixelBuffer { width: w, height: h, data }
    }

    /// Write `src` with its top-left at `(x, y)`. Pixels falling outside the
    /// raster are skipped.
    pub fn paste(&mut self, x: i32, y: i32, src: &PixelBuffer) {
        for sy in 0..src.height {
            let gy = y + sy as i32;
            if gy < 0 || gy as u32 >= self.height {
                continue;
            }
            let x_start = x.max(0);
            let x_end = (x + src.width as i32).min(self.width as i32);
            if x_start >= x_end {
                continue;
            }
            let run = (x_end - x_start) as usize * 3;
            let src_off = src.offset((x_start - x) as u32, sy);
            let dst_off = self.offset(x_start as u32, gy as u32);
            self.data[dst_off..dst_off + run].copy_from_slice(&src.data[src_off..src_off + run]);
        }
    }

    /// Flood `rect` (clamped) with a solid color.
    pub fn fill_rect(&mut self, rect: PixelBox, color: Bgr) {
        let rect = self.clamp_box(rect);
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                self.put(x, y, color);
            }
        }
    }

    pub fn clamp_box(&self, rect: PixelBox) -> PixelBox {
        PixelBox::new(
            rect.x0.min(self.width),
            rect.y0.min(self.height),
            rect.x1.min(self.width).max(rect.x0.min(self.width)),
            rect.y1.min(self.height).max(rect.y0.min(self.height)),
        )
    }

    // ---- resize ---------------------------------------------------------------

    /// Uniformly rescale with cubic interpolation. Used for zoomed display.
    pub fn resized(&self, scale: f64) -> PixelBuffer {
        if self.is_empty() || (scale - 1.0).abs() < f64::EPSILON {
            return self.clone();
        }
        let w = ((self.width as f64 * scale).round() as u32).max(1);
        let h = ((self.height as f64 * scale).round() as u32).max(1);
        // Resampling is channel-order agnostic, so BGR bytes ride in an RgbImage.
        let Some(container) = RgbImage::from_raw(self.width, self.height, self.data.clone()) else {
            return self.clone();
        };
        let out = image::imageops::resize(&container, w, h, FilterType::CatmullRom);
        PixelBuffer { width: w, height: h, data: out.into_raw() }
    }
}
