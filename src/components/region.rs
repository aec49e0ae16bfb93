use image::GrayImage;
use uuid::Uuid;

use crate::canvas::{Bgr, PixelBuffer};
use crate::components::colors;
use crate::error::{EngineError, Result};
use crate::geometry::{PixelBox, Point, ScreenRect};
use crate::ops::fill::{self, FillMethod, FillSettings};
use crate::ops::mask;

pub type RegionId = Uuid;

pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const DEFAULT_FONT_FAMILY: &str = "Times New Roman";

// ============================================================================
// DRAG PATCH — text pixels lifted off the raster while a move is staged
// ============================================================================

/// Original glyph pixels plus their mask (0 or 255 per channel), both sized
/// to the region box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragPatch {
    pub patch: PixelBuffer,
    pub mask: PixelBuffer,
}

impl DragPatch {
    /// Lift `src & mask` over `local` (in `src` coordinates).
    pub fn from_masked(src: &PixelBuffer, mask: &GrayImage, local: PixelBox) -> Self {
        let local = src.clamp_box(local);
        let (w, h) = (local.width(), local.height());
        let mut patch = PixelBuffer::new(w, h, Bgr::BLACK);
        let mut mask_color = PixelBuffer::new(w, h, Bgr::BLACK);
        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = (local.x0 + x, local.y0 + y);
                let on = sx < mask.width() && sy < mask.height() && mask.get_pixel(sx, sy).0[0] != 0;
                if on {
                    patch.put(x, y, src.get(sx, sy));
                    mask_color.put(x, y, Bgr::WHITE);
                }
            }
        }
        Self { patch, mask: mask_color }
    }

    pub fn width(&self) -> u32 {
        self.patch.width()
    }

    pub fn height(&self) -> u32 {
        self.patch.height()
    }

    /// `dst = (dst & !mask) + patch` with the patch's top-left at (x, y).
    /// Pixels outside `dst` are skipped.
    pub fn composite(&self, dst: &mut PixelBuffer, x: i32, y: i32) {
        for py in 0..self.height() {
            let gy = y + py as i32;
            if gy < 0 || gy as u32 >= dst.height() {
                continue;
            }
            for px in 0..self.width() {
                let gx = x + px as i32;
                if gx < 0 || gx as u32 >= dst.width() {
                    continue;
                }
                let d = dst.get(gx as u32, gy as u32);
                let m = self.mask.get(px, py);
                let p = self.patch.get(px, py);
                dst.put(
                    gx as u32,
                    gy as u32,
                    Bgr::new(
                        (d.b & !m.b).saturating_add(p.b),
                        (d.g & !m.g).saturating_add(p.g),
                        (d.r & !m.r).saturating_add(p.r),
                    ),
                );
            }
        }
    }
}

// ============================================================================
// HIGHLIGHT STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightState {
    Hidden,
    /// Visible, not selected.
    Shown,
    Selected,
    /// Marked as changed by the user; stays visible after deselection.
    Changed,
}

impl HighlightState {
    pub fn color(self) -> Option<image::Rgba<u8>> {
        match self {
            HighlightState::Hidden => None,
            HighlightState::Shown => Some(colors::HIGHLIGHT_SHOWN),
            HighlightState::Selected => Some(colors::HIGHLIGHT_SELECTED),
            HighlightState::Changed => Some(colors::HIGHLIGHT_CHANGED),
        }
    }
}

// ============================================================================
// TEXT REGION
// ============================================================================

/// One editable text block.
///
/// `top_left` / `bottom_right` are canonical (100% zoom) raster coordinates.
/// `line_space` is the same box at the current zoom and is always derived,
/// never edited directly.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRegion {
    pub id: RegionId,
    pub top_left: Point,
    pub bottom_right: Point,
    pub line_space: ScreenRect,
    pub text: String,
    pub font_size: u32,
    pub font_family: String,
    pub letter_spacing: i32,
    pub background_color: Bgr,
    pub font_color: Bgr,
    pub color_palette: Vec<Bgr>,
    /// Font color was chosen by the user; palette regeneration keeps it.
    pub color_set: bool,
    pub is_selected: bool,
    pub is_persistent: bool,
    pub highlight_visible: bool,
    pub enabled: bool,
    pub drag_patch: Option<DragPatch>,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, top_left: Point, bottom_right: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            top_left,
            bottom_right,
            line_space: ScreenRect::new(top_left, bottom_right),
            text: text.into(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            letter_spacing: 0,
            background_color: Bgr::WHITE,
            font_color: Bgr::BLACK,
            color_palette: Vec::new(),
            color_set: false,
            is_selected: false,
            is_persistent: false,
            highlight_visible: false,
            enabled: true,
            drag_patch: None,
        }
    }

    /// Copy with `edit` applied. The region identity is kept so selections
    /// follow the edited value.
    pub fn with_edits(&self, edit: impl FnOnce(&mut TextRegion)) -> TextRegion {
        let mut next = self.clone();
        edit(&mut next);
        next
    }

    pub fn width(&self) -> i32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> i32 {
        self.bottom_right.y - self.top_left.y
    }

    /// The canonical box as a clamped pixel rectangle.
    pub fn pixel_box(&self, image_width: u32, image_height: u32) -> PixelBox {
        PixelBox::from_points(self.top_left, self.bottom_right, image_width, image_height)
    }

    // ---- geometry -------------------------------------------------------------

    /// Clamp the canonical corners into the raster.
    pub fn bound(&mut self, image_width: u32, image_height: u32) {
        let max_x = image_width as i32 - 1;
        let max_y = image_height as i32 - 1;
        self.top_left.x = self.top_left.x.clamp(0, max_x.max(0));
        self.top_left.y = self.top_left.y.clamp(0, max_y.max(0));
        self.bottom_right.x = self.bottom_right.x.min(max_x);
        self.bottom_right.y = self.bottom_right.y.min(max_y);
    }

    /// Bound the box and derive its on-screen geometry at `zoom`.
    ///
    /// A box with non-positive extent is rejected and left untouched.
    pub fn init_geometry(&mut self, zoom: f64, image_width: u32, image_height: u32) -> Result<()> {
        let saved = (self.top_left, self.bottom_right);
        self.bound(image_width, image_height);
        if self.width() <= 0 || self.height() <= 0 {
            let err = EngineError::DegenerateGeometry { width: self.width(), height: self.height() };
            log::debug!("init_geometry: {} for {:?}", err, self.text);
            (self.top_left, self.bottom_right) = saved;
            return Err(err);
        }
        self.scale_and_position(zoom);
        Ok(())
    }

    /// Derive `line_space` from the canonical box at `zoom`. The canonical
    /// geometry is not touched.
    pub fn scale_and_position(&mut self, zoom: f64) {
        self.line_space = self.screen_rect(zoom);
    }

    /// The canonical box as it appears at `zoom`.
    pub fn screen_rect(&self, zoom: f64) -> ScreenRect {
        ScreenRect::new(self.top_left.scaled(zoom), self.bottom_right.scaled(zoom))
    }

    /// Structural retype: resize the canonical box by (`sx`, `sy`) from its
    /// top-left, bound it, then re-derive the screen box at `zoom`.
    pub fn scale_and_position_xy(&mut self, sx: f64, sy: f64, zoom: f64, image_width: u32, image_height: u32) {
        let size_x = (sx * self.width() as f64).round() as i32;
        let size_y = (sy * self.height() as f64).round() as i32;
        self.bottom_right = self.top_left + Point::new(size_x.max(1), size_y.max(1));
        self.bound(image_width, image_height);
        self.scale_and_position(zoom);
    }

    /// Move by `shift` (a delta when `relative`, otherwise the new top-left).
    ///
    /// A box that would leave the raster is shifted back just enough to stay
    /// inside; its size never changes. The screen box is not updated.
    pub fn reposition(&mut self, shift: Point, relative: bool, image_width: u32, image_height: u32) {
        let delta = if relative { shift } else { shift - self.top_left };
        let mut tl = self.top_left + delta;
        let mut br = self.bottom_right + delta;
        let (w, h) = (image_width as i32, image_height as i32);

        if tl.x < 0 {
            let back = Point::new(tl.x, 0);
            tl -= back;
            br -= back;
        } else if br.x >= w {
            let back = Point::new(br.x - w + 1, 0);
            tl -= back;
            br -= back;
        }

        if tl.y < 0 {
            let back = Point::new(0, tl.y);
            tl -= back;
            br -= back;
        } else if br.y >= h {
            let back = Point::new(0, br.y - h + 1);
            tl -= back;
            br -= back;
        }

        self.top_left = tl;
        self.bottom_right = br;
    }

    // ---- colors -----------------------------------------------------------------

    /// Sample the ring `border` pixels outside the box and store its most
    /// frequent color as the background.
    pub fn determine_border_color(&mut self, pixels: &PixelBuffer, border: u32) -> Option<Bgr> {
        let c = colors::border_color(pixels, self.top_left, self.bottom_right, border)?;
        self.background_color = c;
        Some(c)
    }

    pub fn generate_text_mask(&self, pixels: &PixelBuffer, invert_threshold: f64) -> GrayImage {
        mask::text_mask(pixels, self.pixel_box(pixels.width(), pixels.height()), invert_threshold)
    }

    /// Rank the foreground colors of the box. The first entry becomes the
    /// font color unless the user picked one.
    pub fn generate_color_palette(&mut self, pixels: &PixelBuffer, invert_threshold: f64, limit: usize) {
        let rect = self.pixel_box(pixels.width(), pixels.height());
        if rect.is_empty() {
            log::debug!("generate_color_palette: empty box for {:?}", self.text);
            return;
        }
        let text = mask::text_mask(pixels, rect, invert_threshold);
        self.color_palette = colors::palette(pixels, rect, &text, limit);
        if !self.color_set {
            if let Some(&first) = self.color_palette.first() {
                self.font_color = first;
            }
        }
    }

    pub fn set_font_color(&mut self, color: Bgr) {
        self.font_color = color;
        self.color_set = true;
    }

    // ---- background / move ------------------------------------------------------

    /// Regenerate the background under the box with the configured strategy.
    /// Returns the lifted glyphs only when `for_move` is set.
    pub fn fill_background(&mut self, pixels: &mut PixelBuffer, settings: &FillSettings, for_move: bool) -> Option<DragPatch> {
        if settings.method == FillMethod::Neighbor {
            self.determine_border_color(pixels, settings.neighbor_border);
        }
        fill::fill_background(
            pixels,
            self.top_left,
            self.bottom_right,
            self.background_color,
            settings,
            for_move,
        )
    }

    /// Lift the glyphs and clear the background once per drag.
    pub fn prepare_move(&mut self, pixels: &mut PixelBuffer, settings: &FillSettings) {
        if self.drag_patch.is_some() {
            return;
        }
        self.drag_patch = self.fill_background(pixels, settings, true);
    }

    /// Composite the lifted glyphs at the current position and drop them.
    pub fn unstage_move(&mut self, pixels: &mut PixelBuffer) {
        if let Some(patch) = self.drag_patch.take() {
            patch.composite(pixels, self.top_left.x, self.top_left.y);
        }
    }

    // ---- highlight ----------------------------------------------------------------

    pub fn highlight_state(&self) -> HighlightState {
        if !self.enabled || !self.highlight_visible {
            HighlightState::Hidden
        } else if self.is_selected {
            HighlightState::Selected
        } else if self.is_persistent {
            HighlightState::Changed
        } else {
            HighlightState::Shown
        }
    }

    pub fn show_highlight(&mut self) {
        self.highlight_visible = true;
    }

    pub fn toggle_highlight(&mut self) {
        self.highlight_visible = !self.highlight_visible;
    }

    pub fn select_highlight(&mut self) {
        self.highlight_visible = true;
        self.is_selected = true;
    }

    /// Drop the selection. Persistent regions stay visible.
    pub fn deselect(&mut self) {
        self.is_selected = false;
        if !self.is_persistent {
            self.highlight_visible = false;
        }
    }

    pub fn reset(&mut self) {
        self.deselect();
        self.highlight_visible = false;
        self.is_persistent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tl: (i32, i32), br: (i32, i32)) -> TextRegion {
        TextRegion::new("hello", Point::new(tl.0, tl.1), Point::new(br.0, br.1))
    }

    #[test]
    fn zoom_round_trip_restores_screen_box() {
        let mut r = region((13, 27), (61, 44));
        r.init_geometry(1.0, 200, 200).unwrap();
        let original = r.line_space;
        r.scale_and_position(2.0);
        assert_eq!(r.line_space.top_left, Point::new(26, 54));
        r.scale_and_position(1.0);
        assert_eq!(r.line_space, original);
        assert_eq!(r.top_left, Point::new(13, 27));
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let mut r = region((10, 10), (10, 20));
        assert!(matches!(
            r.init_geometry(1.0, 100, 100),
            Err(EngineError::DegenerateGeometry { width: 0, .. })
        ));
        assert_eq!(r.top_left, Point::new(10, 10));
    }

    #[test]
    fn init_geometry_clamps_overhanging_box() {
        let mut r = region((-3, 5), (120, 30));
        r.init_geometry(1.0, 100, 50).unwrap();
        assert_eq!(r.top_left, Point::new(0, 5));
        assert_eq!(r.bottom_right, Point::new(99, 30));
    }

    #[test]
    fn reposition_shifts_back_instead_of_shrinking() {
        let mut r = region((10, 10), (30, 20));
        r.reposition(Point::new(90, 0), true, 100, 100);
        assert_eq!(r.width(), 20);
        assert_eq!(r.bottom_right.x, 99);

        r.reposition(Point::new(-500, -500), true, 100, 100);
        assert_eq!(r.top_left, Point::new(0, 0));
        assert_eq!((r.width(), r.height()), (20, 10));
    }

    #[test]
    fn reposition_absolute_moves_top_left() {
        let mut r = region((10, 10), (30, 20));
        r.reposition(Point::new(40, 50), false, 100, 100);
        assert_eq!(r.top_left, Point::new(40, 50));
        assert_eq!(r.bottom_right, Point::new(60, 60));
    }

    #[test]
    fn anisotropic_scale_updates_canonical_box() {
        let mut r = region((10, 10), (30, 20));
        r.scale_and_position_xy(1.5, 2.0, 2.0, 100, 100);
        assert_eq!(r.bottom_right, Point::new(40, 30));
        assert_eq!(r.line_space.bottom_right, Point::new(80, 60));
    }

    #[test]
    fn highlight_state_machine() {
        let mut r = region((0, 0), (5, 5));
        assert_eq!(r.highlight_state(), HighlightState::Hidden);
        r.show_highlight();
        assert_eq!(r.highlight_state(), HighlightState::Shown);
        r.select_highlight();
        assert_eq!(r.highlight_state(), HighlightState::Selected);
        r.deselect();
        assert_eq!(r.highlight_state(), HighlightState::Hidden);

        r.select_highlight();
        r.is_persistent = true;
        r.deselect();
        assert_eq!(r.highlight_state(), HighlightState::Changed);
        r.reset();
        assert_eq!(r.highlight_state(), HighlightState::Hidden);
    }

    #[test]
    fn unstage_composites_patch_at_new_position() {
        let mut img = PixelBuffer::new(60, 20, Bgr::WHITE);
        img.fill_rect(PixelBox::new(12, 8, 26, 10), Bgr::BLACK);
        let mut r = region((10, 5), (30, 12));
        let settings = FillSettings { method: FillMethod::Neighbor, ..FillSettings::default() };
        r.prepare_move(&mut img, &settings);
        assert!(r.drag_patch.is_some());
        assert_eq!(img.get(15, 9), Bgr::WHITE);

        r.reposition(Point::new(25, 0), true, 60, 20);
        r.unstage_move(&mut img);
        assert!(r.drag_patch.is_none());
        assert_eq!(img.get(40, 9), Bgr::BLACK);
        assert_eq!(img.get(36, 9), Bgr::WHITE);
    }

    #[test]
    fn palette_sets_font_color_unless_user_picked() {
        let mut img = PixelBuffer::new(40, 20, Bgr::WHITE);
        img.fill_rect(PixelBox::new(12, 8, 26, 10), Bgr::from_rgb(200, 0, 0));
        let mut r = region((10, 5), (30, 12));
        r.generate_color_palette(&img, mask::INVERT_MASK_THRESH, 10);
        assert_eq!(r.font_color, Bgr::from_rgb(200, 0, 0));

        r.set_font_color(Bgr::from_rgb(0, 0, 9));
        r.generate_color_palette(&img, mask::INVERT_MASK_THRESH, 10);
        assert_eq!(r.font_color, Bgr::from_rgb(0, 0, 9));
    }
}
