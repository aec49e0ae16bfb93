use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::canvas::{Bgr, PixelBuffer};
use crate::components::history::{DocumentState, HistoryStack};
use crate::components::region::{RegionId, TextRegion};
use crate::compositor::{self, Frame};
use crate::error::{EngineError, Result};
use crate::geometry::{Point, ScreenRect, normalized};
use crate::ocr::{self, OcrEngine, OcrOutput, RecognitionPipeline};
use crate::ops::fill::FillSettings;
use crate::ops::text::{self, FontCache, TextStyle};
use crate::settings::EngineSettings;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Notifications for the host shell, drained once per frame.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    RecognitionComplete { regions: usize },
    RecognitionFailed(String),
    SelectionChanged(Option<RegionId>),
    /// The raster or an overlay changed; call [`Document::render`].
    Redraw,
}

/// Replacement content for the active region. `None` fields keep the
/// region's current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextEdit {
    pub text: Option<String>,
    pub font_size: Option<u32>,
    pub font_family: Option<String>,
    pub letter_spacing: Option<i32>,
    pub color: Option<Bgr>,
}

impl TextEdit {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }
}

/// A drag that has started but not been committed to history yet.
struct StagedMove {
    /// The document as it was before the drag began.
    snapshot: DocumentState,
    region: RegionId,
    displaced: bool,
}

/// Single open document: the current state, its history, and the session
/// state around it (zoom, drag, recognition).
pub struct Document {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled")
    pub name: String,
    /// `None` for pasted or untitled images.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    state: DocumentState,
    history: HistoryStack,
    drag: Option<StagedMove>,
    zoom: f64,
    settings: EngineSettings,
    fill: FillSettings,
    recognition: RecognitionPipeline,
    raw_text: String,
    fonts: FontCache,
    events: Vec<DocumentEvent>,
}

impl Document {
    pub fn new(pixels: PixelBuffer, settings: EngineSettings, engine: Arc<dyn OcrEngine>) -> Self {
        let recognition = RecognitionPipeline::new(engine, settings.ocr_params());
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            path: None,
            is_dirty: false,
            state: DocumentState::new(pixels),
            history: HistoryStack::new(settings.max_undo_steps),
            drag: None,
            zoom: 1.0,
            fill: settings.fill_settings(),
            settings,
            recognition,
            raw_text: String::new(),
            fonts: FontCache::new(),
            events: Vec::new(),
        }
    }

    pub fn from_file(path: &Path, settings: EngineSettings, engine: Arc<dyn OcrEngine>) -> Result<Self> {
        let pixels = crate::io::load_image_sync(path)?;
        let mut doc = Self::new(pixels, settings, engine);
        doc.path = Some(path.to_path_buf());
        doc.update_name_from_path();
        Ok(doc)
    }

    /// Encode the current raster to `path` and adopt it as the document path.
    pub fn save_to(&mut self, path: &Path, jpeg_quality: u8) -> Result<()> {
        self.commit_drag();
        crate::io::encode_and_write(&self.state.pixels, path, jpeg_quality)?;
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.is_dirty = false;
        Ok(())
    }

    fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ---- accessors --------------------------------------------------------------

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.state.pixels
    }

    pub fn regions(&self) -> impl Iterator<Item = &TextRegion> {
        self.state.regions.iter().map(|r| r.as_ref())
    }

    pub fn region(&self, id: RegionId) -> Option<&TextRegion> {
        self.state.region(id)
    }

    /// Region at `index` in list order. Used by the CLI, which addresses
    /// regions by number.
    pub fn region_at(&self, index: usize) -> Option<&TextRegion> {
        self.state.regions.get(index).map(|r| r.as_ref())
    }

    pub fn selected(&self) -> Option<RegionId> {
        self.state.selected
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.recognition.is_processing()
    }

    /// Full text of the last recognition run.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// A tab may only close once no recognition is writing into it.
    pub fn can_close(&self) -> bool {
        !self.is_processing()
    }

    pub fn drain_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn fonts_mut(&mut self) -> &mut FontCache {
        &mut self.fonts
    }

    fn dims(&self) -> (u32, u32) {
        (self.state.pixels.width(), self.state.pixels.height())
    }

    fn mark_changed(&mut self) {
        self.is_dirty = true;
        self.events.push(DocumentEvent::Redraw);
    }

    // ---- recognition ------------------------------------------------------------

    /// Start recognizing the current raster in the background.
    pub fn extract(&mut self) -> Result<()> {
        match self.recognition.extract(&self.state.pixels) {
            Ok(()) => Ok(()),
            Err(e) => {
                if matches!(e, EngineError::EmptyImage) {
                    self.events.push(DocumentEvent::RecognitionFailed(e.to_string()));
                }
                Err(e)
            }
        }
    }

    pub fn set_ocr_level(&mut self, level: ocr::OcrLevel) {
        self.recognition.set_level(level);
    }

    /// Apply a finished recognition run, if there is one. Returns `true` when
    /// a run completed (successfully or not).
    pub fn poll_recognition(&mut self) -> bool {
        match self.recognition.poll() {
            Some(outcome) => {
                self.apply_recognition(outcome);
                true
            }
            None => false,
        }
    }

    /// Blocking variant of [`poll_recognition`](Self::poll_recognition).
    pub fn wait_for_recognition(&mut self, timeout: Duration) -> bool {
        match self.recognition.wait(timeout) {
            Some(outcome) => {
                self.apply_recognition(outcome);
                true
            }
            None => false,
        }
    }

    fn apply_recognition(&mut self, outcome: Result<OcrOutput>) {
        match outcome {
            Ok(output) => {
                let (w, h) = self.dims();
                let regions = ocr::regions_from_output(&output, w, h, self.zoom);
                log::info!("recognition produced {} regions ({} spans)", regions.len(), output.spans.len());
                self.raw_text = output.text;
                self.state.regions = regions.into_iter().map(Arc::new).collect();
                self.state.selected = None;
                self.events.push(DocumentEvent::RecognitionComplete { regions: self.state.regions.len() });
                self.events.push(DocumentEvent::Redraw);
            }
            Err(e) => {
                log::error!("recognition failed: {}", e);
                self.events.push(DocumentEvent::RecognitionFailed(e.to_string()));
            }
        }
    }

    // ---- selection --------------------------------------------------------------

    /// Make `id` the single active selection. Colors are sampled on first
    /// selection.
    pub fn select(&mut self, id: RegionId) -> Result<()> {
        let Some(idx) = self.state.index_of(id) else {
            return Err(EngineError::InvalidArgument(format!("unknown region {}", id)));
        };
        if !self.state.regions[idx].enabled {
            return Err(EngineError::InvalidArgument(format!("region {} is disabled", id)));
        }
        if self.drag.as_ref().is_some_and(|d| d.region != id) {
            self.commit_drag();
        }

        self.state.for_each_region_mut(|r| {
            if r.id != id && r.is_selected {
                r.deselect();
            }
        });

        let DocumentState { regions, pixels, .. } = &mut self.state;
        let region = Arc::make_mut(&mut regions[idx]);
        region.select_highlight();
        if region.color_palette.is_empty() {
            region.generate_color_palette(pixels, self.fill.invert_mask_threshold, self.settings.palette_limit);
        }
        self.state.selected = Some(id);
        self.events.push(DocumentEvent::SelectionChanged(Some(id)));
        self.events.push(DocumentEvent::Redraw);
        Ok(())
    }

    /// Mark `id` without dropping the other marks (modifier-click). The
    /// active selection only moves to it when there is none yet.
    pub fn add_to_selection(&mut self, id: RegionId) -> Result<()> {
        let region = self
            .state
            .region_mut(id)
            .filter(|r| r.enabled)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown region {}", id)))?;
        region.select_highlight();
        if self.state.selected.is_none() {
            self.state.selected = Some(id);
        }
        self.events.push(DocumentEvent::SelectionChanged(self.state.selected));
        self.events.push(DocumentEvent::Redraw);
        Ok(())
    }

    /// Rubber-band selection with two screen-space corners. Returns the
    /// marked regions in list order; the first becomes the active one.
    pub fn select_in_rect(&mut self, a: Point, b: Point, additive: bool) -> Vec<RegionId> {
        self.commit_drag();
        let (tl, br) = normalized(a.unscaled(self.zoom), b.unscaled(self.zoom));

        if !additive {
            self.state.for_each_region_mut(|r| {
                if r.is_selected || r.highlight_visible {
                    r.deselect();
                }
            });
        }

        let hits: Vec<RegionId> = self
            .state
            .regions
            .iter()
            .filter(|r| r.enabled && ScreenRect::new(r.top_left, r.bottom_right).overlaps(tl, br))
            .map(|r| r.id)
            .collect();
        for &id in &hits {
            if let Some(r) = self.state.region_mut(id) {
                r.select_highlight();
            }
        }

        let active = if additive { self.state.selected.or(hits.first().copied()) } else { hits.first().copied() };
        self.state.selected = active;
        log::debug!("select_in_rect: {} hit(s), additive={}", hits.len(), additive);
        self.events.push(DocumentEvent::SelectionChanged(active));
        self.events.push(DocumentEvent::Redraw);
        hits
    }

    pub fn deselect_all(&mut self) {
        self.commit_drag();
        self.state.for_each_region_mut(|r| {
            if r.is_selected || r.highlight_visible {
                r.deselect();
            }
        });
        self.state.selected = None;
        self.events.push(DocumentEvent::SelectionChanged(None));
        self.events.push(DocumentEvent::Redraw);
    }

    /// Ids the next edit applies to: every marked region, or the active one.
    fn targets(&self) -> Vec<RegionId> {
        let marked = self.state.marked();
        if marked.is_empty() { self.state.selected.into_iter().collect() } else { marked }
    }

    /// Keep the marked regions visibly flagged as changed.
    pub fn highlight_selection(&mut self) {
        for id in self.targets() {
            if let Some(r) = self.state.region_mut(id) {
                r.is_persistent = true;
                r.deselect();
            }
        }
        self.state.selected = None;
        self.events.push(DocumentEvent::SelectionChanged(None));
        self.events.push(DocumentEvent::Redraw);
    }

    /// Clear marks and highlights from the marked regions.
    pub fn remove_selection(&mut self) {
        for id in self.targets() {
            if let Some(r) = self.state.region_mut(id) {
                r.reset();
            }
        }
        self.state.selected = None;
        self.events.push(DocumentEvent::SelectionChanged(None));
        self.events.push(DocumentEvent::Redraw);
    }

    /// Hide every overlay if any is visible, otherwise show them all.
    pub fn toggle_highlights(&mut self) {
        let any_visible = self.state.regions.iter().any(|r| r.highlight_visible);
        self.state.for_each_region_mut(|r| {
            if any_visible {
                r.highlight_visible = false;
            } else if r.enabled {
                r.show_highlight();
            }
        });
        self.events.push(DocumentEvent::Redraw);
    }

    // ---- structural edits -------------------------------------------------------

    /// Erase every marked region from the raster and drop it. Ignored while
    /// recognition runs. Returns the number of regions removed.
    pub fn delete_selection(&mut self) -> Result<usize> {
        if self.is_processing() {
            log::debug!("delete_selection: ignored while recognition is in flight");
            return Ok(0);
        }
        self.commit_drag();
        let targets = self.targets();
        if targets.is_empty() {
            return Err(EngineError::NoSelection);
        }

        let snapshot = self.state.clone();
        for &id in &targets {
            let Some(idx) = self.state.index_of(id) else { continue };
            let DocumentState { regions, pixels, .. } = &mut self.state;
            let region = Arc::make_mut(&mut regions[idx]);
            region.fill_background(pixels, &self.fill, false);
            regions.remove(idx);
        }
        self.state.selected = None;
        self.history.push("Delete text", snapshot);
        log::info!("deleted {} region(s)", targets.len());
        self.events.push(DocumentEvent::SelectionChanged(None));
        self.mark_changed();
        Ok(targets.len())
    }

    /// Merge the marked regions into one spanning their union. Texts are
    /// joined in reading order; a region starting below the previous one's
    /// bottom edge begins a new line.
    pub fn group_selections(&mut self) -> Result<RegionId> {
        if self.is_processing() {
            return Err(EngineError::RecognitionInProgress);
        }
        self.commit_drag();
        let mut members: Vec<TextRegion> = self
            .state
            .marked()
            .into_iter()
            .filter_map(|id| self.state.region(id).cloned())
            .collect();
        if members.len() < 2 {
            return Err(EngineError::InvalidArgument(format!(
                "grouping needs at least two marked regions, found {}",
                members.len()
            )));
        }
        members.sort_by_key(|r| (r.top_left.y, r.top_left.x));

        let mut text = String::new();
        let mut tl = members[0].top_left;
        let mut br = members[0].bottom_right;
        let mut line_bottom = members[0].bottom_right.y;
        for (i, r) in members.iter().enumerate() {
            if i > 0 {
                if r.top_left.y >= line_bottom {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
            text.push_str(&r.text);
            line_bottom = if r.top_left.y >= line_bottom { r.bottom_right.y } else { line_bottom.max(r.bottom_right.y) };
            tl = Point::new(tl.x.min(r.top_left.x), tl.y.min(r.top_left.y));
            br = Point::new(br.x.max(r.bottom_right.x), br.y.max(r.bottom_right.y));
        }

        let (w, h) = self.dims();
        let first = &members[0];
        let mut grouped = TextRegion::new(text, tl, br);
        grouped.font_size = first.font_size;
        grouped.font_family = first.font_family.clone();
        grouped.letter_spacing = first.letter_spacing;
        grouped.background_color = first.background_color;
        grouped.font_color = first.font_color;
        grouped.color_palette = first.color_palette.clone();
        grouped.color_set = first.color_set;
        grouped.init_geometry(self.zoom, w, h)?;
        grouped.select_highlight();
        let id = grouped.id;

        let snapshot = self.state.clone();
        let insert_at = members.iter().filter_map(|m| self.state.index_of(m.id)).min().unwrap_or(0);
        self.state.regions.retain(|r| !members.iter().any(|m| m.id == r.id));
        self.state.for_each_region_mut(|r| {
            if r.is_selected {
                r.deselect();
            }
        });
        let insert_at = insert_at.min(self.state.regions.len());
        self.state.regions.insert(insert_at, Arc::new(grouped));
        self.state.selected = Some(id);
        self.history.push("Group text", snapshot);
        log::info!("grouped {} regions", members.len());
        self.events.push(DocumentEvent::SelectionChanged(Some(id)));
        self.mark_changed();
        Ok(id)
    }

    /// Retype the active region: clear its background, draw the new text,
    /// and resize the box to the drawn text with its bottom edge anchored.
    ///
    /// The font is resolved first. If it cannot be loaded the edit fails and
    /// the document is left exactly as it was.
    pub fn edit_selection(&mut self, edit: TextEdit) -> Result<()> {
        if self.is_processing() {
            return Err(EngineError::RecognitionInProgress);
        }
        self.commit_drag();
        let id = self.state.selected.ok_or(EngineError::NoSelection)?;
        let idx = self.state.index_of(id).ok_or(EngineError::NoSelection)?;

        let family = edit.font_family.clone().unwrap_or_else(|| self.state.regions[idx].font_family.clone());
        let Some(font) = self.fonts.get(&family) else {
            log::warn!("edit_selection: no font for '{}', edit refused", family);
            return Err(EngineError::InvalidArgument(format!("no font for '{}'", family)));
        };

        let (w, h) = self.dims();
        let snapshot = self.state.clone();

        let DocumentState { regions, pixels, .. } = &mut self.state;
        let region = Arc::make_mut(&mut regions[idx]);
        if let Some(text) = edit.text {
            region.text = text;
        }
        if let Some(size) = edit.font_size {
            region.font_size = size.max(1);
        }
        region.font_family = family;
        if let Some(spacing) = edit.letter_spacing {
            region.letter_spacing = spacing;
        }
        if let Some(color) = edit.color {
            region.set_font_color(color);
        }

        region.fill_background(pixels, &self.fill, false);

        let style = TextStyle {
            size: region.font_size as f32,
            letter_spacing: region.letter_spacing as f32,
            color: region.font_color,
        };
        let (tw, th) = text::measure_text(&font, &region.text, style.size, style.letter_spacing);
        let (old_w, old_h) = (region.width().max(1), region.height().max(1));
        let offset = th as i32 - old_h;
        region.top_left.y = (region.top_left.y - offset).max(0);
        region.bottom_right.y = region.top_left.y + old_h;
        region.scale_and_position_xy(tw as f64 / old_w as f64, th as f64 / old_h as f64, self.zoom, w, h);

        text::draw_text(pixels, &font, &region.text, &style, region.top_left);
        region.is_persistent = true;
        region.select_highlight();

        self.history.push("Edit text", snapshot);
        self.mark_changed();
        Ok(())
    }

    /// Override the active region's font color for the next edit.
    pub fn set_font_color(&mut self, color: Bgr) -> Result<()> {
        let id = self.state.selected.ok_or(EngineError::NoSelection)?;
        let region = self.state.region_mut(id).ok_or(EngineError::NoSelection)?;
        region.set_font_color(color);
        Ok(())
    }

    /// Ranked font-color candidates of the active region.
    pub fn palette(&self) -> Vec<Bgr> {
        self.state.selected_region().map(|r| r.color_palette.clone()).unwrap_or_default()
    }

    /// Replace the raster with `pixels` (e.g. from the clipboard), drop all
    /// regions and recognize again.
    pub fn paste_image(&mut self, pixels: PixelBuffer) -> Result<()> {
        if self.is_processing() {
            return Err(EngineError::RecognitionInProgress);
        }
        if pixels.is_empty() {
            return Err(EngineError::EmptyImage);
        }
        self.commit_drag();
        let previous = std::mem::replace(&mut self.state, DocumentState::new(pixels));
        self.history.push("Paste image", previous);
        self.raw_text.clear();
        self.mark_changed();
        self.extract()
    }

    // ---- staged drag-move -------------------------------------------------------

    /// Stage a move of the active region. Staging leaves the pixels alone and
    /// nothing is written to history until [`commit_drag`](Self::commit_drag).
    /// Returns `false` when there is nothing to drag or recognition is
    /// running.
    pub fn begin_drag(&mut self) -> bool {
        if self.drag.is_some() {
            return true;
        }
        if self.is_processing() {
            log::debug!("begin_drag: ignored while recognition is in flight");
            return false;
        }
        let Some(id) = self.state.selected.filter(|id| self.state.region(*id).is_some_and(|r| r.enabled)) else {
            return false;
        };
        self.drag = Some(StagedMove { snapshot: self.state.clone(), region: id, displaced: false });
        log::debug!("drag staged for {}", id);
        true
    }

    /// Move the dragged region by `shift` (a delta when `relative`,
    /// otherwise a new top-left).
    ///
    /// The background under the original box is regenerated here, on the
    /// first call that actually displaces the region, not at commit. From
    /// then on the lifted glyphs only exist in the region's drag patch until
    /// [`commit_drag`](Self::commit_drag) draws them at the final position.
    pub fn drag_to(&mut self, shift: Point, relative: bool) {
        if !self.begin_drag() {
            return;
        }
        let Some(drag) = self.drag.as_mut() else { return };
        let Some(idx) = self.state.index_of(drag.region) else {
            log::warn!("drag_to: dragged region vanished, dropping the drag");
            self.drag = None;
            return;
        };
        let (w, h) = (self.state.pixels.width(), self.state.pixels.height());
        let DocumentState { regions, pixels, .. } = &mut self.state;
        let region = Arc::make_mut(&mut regions[idx]);

        let moves = if relative { shift != Point::ZERO } else { shift != region.top_left };
        if !moves {
            return;
        }
        if !drag.displaced {
            region.prepare_move(pixels, &self.fill);
            drag.displaced = true;
        }
        region.reposition(shift, relative, w, h);
        region.scale_and_position(self.zoom);
        self.events.push(DocumentEvent::Redraw);
    }

    /// Keyboard move by `dx`, `dy` steps of the configured nudge size.
    pub fn nudge(&mut self, dx: i32, dy: i32) {
        let step = self.settings.nudge_step;
        self.drag_to(Point::new(dx * step, dy * step), true);
    }

    /// Drop the lifted glyphs at the region's final position and record the
    /// whole drag as one history entry. A drag that never moved still
    /// records an entry. Returns `false` when no drag was staged.
    pub fn commit_drag(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if let Some(idx) = self.state.index_of(drag.region) {
            let DocumentState { regions, pixels, .. } = &mut self.state;
            let region = Arc::make_mut(&mut regions[idx]);
            region.unstage_move(pixels);
            if drag.displaced {
                region.is_persistent = true;
            }
        }
        self.history.push("Move text", drag.snapshot);
        log::debug!("drag committed (displaced: {})", drag.displaced);
        self.mark_changed();
        true
    }

    /// The drag modifier key went up.
    pub fn release_drag_modifier(&mut self) -> bool {
        self.commit_drag()
    }

    // ---- history ----------------------------------------------------------------

    /// Step back one history entry. Ignored (returns `false`) with no history,
    /// while recognition runs or while a drag is staged.
    pub fn undo(&mut self) -> bool {
        if self.is_processing() || self.drag.is_some() {
            log::debug!("undo: ignored (processing or dragging)");
            return false;
        }
        let current = std::mem::take(&mut self.state);
        match self.history.undo(current) {
            Ok(previous) => {
                self.state = previous;
                self.restore_after_history();
                true
            }
            Err(current) => {
                self.state = current;
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.is_processing() || self.drag.is_some() {
            log::debug!("redo: ignored (processing or dragging)");
            return false;
        }
        let current = std::mem::take(&mut self.state);
        match self.history.redo(current) {
            Ok(next) => {
                self.state = next;
                self.restore_after_history();
                true
            }
            Err(current) => {
                self.state = current;
                false
            }
        }
    }

    /// Re-derive display state for a snapshot that just became current.
    /// Regions that already match stay shared with the history entries.
    fn restore_after_history(&mut self) {
        let zoom = self.zoom;
        self.state.update_regions_where(
            |r| !r.enabled || r.drag_patch.is_some() || r.line_space != r.screen_rect(zoom),
            |r| {
                r.enabled = true;
                r.drag_patch = None;
                r.scale_and_position(zoom);
            },
        );
        match self.state.selected.and_then(|id| self.state.index_of(id)) {
            Some(idx) => {
                let r = &self.state.regions[idx];
                if !(r.is_selected && r.highlight_visible) {
                    Arc::make_mut(&mut self.state.regions[idx]).select_highlight();
                }
            }
            None => self.state.selected = None,
        }
        self.events.push(DocumentEvent::SelectionChanged(self.state.selected));
        self.mark_changed();
    }

    // ---- zoom -------------------------------------------------------------------

    pub fn set_zoom(&mut self, zoom: f64) {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        self.zoom = zoom;
        self.state.for_each_region_mut(|r| r.scale_and_position(zoom));
        self.events.push(DocumentEvent::Redraw);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.settings.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.settings.zoom_step);
    }

    // ---- display ----------------------------------------------------------------

    /// The zoomed raster plus one overlay per visible highlight.
    pub fn render(&self) -> Frame {
        compositor::render(&self.state, self.zoom, self.drag.as_ref().map(|d| d.region))
    }
}
