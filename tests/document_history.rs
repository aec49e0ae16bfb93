use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use textfe::{
    Bgr, Document, DocumentEvent, EngineError, EngineSettings, FillMethod, FontCache, OcrEngine, OcrOutput, OcrParams,
    OcrSpan, PixelBox, PixelBuffer, Point, RegionId, TextEdit,
};

const WAIT: Duration = Duration::from_secs(10);

struct ScriptedOcr {
    output: OcrOutput,
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _image: &PixelBuffer, _params: &OcrParams) -> textfe::Result<OcrOutput> {
        Ok(self.output.clone())
    }
}

/// Blocks until the test opens the gate.
struct GatedOcr {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl OcrEngine for GatedOcr {
    fn recognize(&self, _image: &PixelBuffer, _params: &OcrParams) -> textfe::Result<OcrOutput> {
        if let Ok(rx) = self.gate.lock() {
            let _ = rx.recv();
        }
        Ok(OcrOutput::default())
    }
}

fn span(text: &str, l: i32, t: i32, r: i32, b: i32) -> OcrSpan {
    OcrSpan { text: text.to_string(), left: l, top: t, right: r, bottom: b }
}

fn neighbor_settings() -> EngineSettings {
    EngineSettings { fill_method: FillMethod::Neighbor, ..EngineSettings::default() }
}

/// 100×60 white page with two thin black "words".
fn page() -> PixelBuffer {
    let mut img = PixelBuffer::new(100, 60, Bgr::WHITE);
    img.fill_rect(PixelBox::new(22, 24, 38, 26), Bgr::BLACK);
    img.fill_rect(PixelBox::new(62, 24, 78, 26), Bgr::BLACK);
    img
}

fn recognized_document() -> Document {
    recognized_document_with(neighbor_settings())
}

fn recognized_document_with(settings: EngineSettings) -> Document {
    let output = OcrOutput {
        text: "alpha beta\n".to_string(),
        spans: vec![span("alpha", 20, 20, 40, 30), span("beta", 60, 20, 80, 30)],
    };
    let mut doc = Document::new(page(), settings, Arc::new(ScriptedOcr { output }));
    doc.extract().unwrap();
    assert!(doc.wait_for_recognition(WAIT));
    doc
}

fn inpaint_settings() -> EngineSettings {
    EngineSettings { fill_method: FillMethod::Inpaint, ..EngineSettings::default() }
}

fn is_light(doc: &Document, x: u32, y: u32) -> bool {
    doc.pixels().get(x, y).luma() > 200
}

fn id_at(doc: &Document, index: usize) -> RegionId {
    doc.region_at(index).map(|r| r.id).unwrap()
}

#[test]
fn recognition_seeds_regions_and_notifies() {
    let mut doc = recognized_document();
    assert!(!doc.is_processing());
    assert_eq!(doc.regions().count(), 2);
    assert_eq!(doc.raw_text(), "alpha beta\n");
    let events = doc.drain_events();
    assert!(events.contains(&DocumentEvent::RecognitionComplete { regions: 2 }));
    assert!(doc.drain_events().is_empty());
}

#[test]
fn empty_image_fails_without_deadlock() {
    let engine = ScriptedOcr { output: OcrOutput::default() };
    let mut doc = Document::new(PixelBuffer::default(), neighbor_settings(), Arc::new(engine));
    assert!(matches!(doc.extract(), Err(EngineError::EmptyImage)));
    assert!(!doc.is_processing());
    assert_eq!(doc.regions().count(), 0);
    assert!(matches!(doc.drain_events().as_slice(), [DocumentEvent::RecognitionFailed(_)]));
}

#[test]
fn in_flight_recognition_gates_mutations() {
    let (open, gate) = mpsc::channel();
    let mut doc = Document::new(page(), neighbor_settings(), Arc::new(GatedOcr { gate: Mutex::new(gate) }));
    doc.extract().unwrap();
    assert!(doc.is_processing());
    assert!(!doc.can_close());
    assert!(!doc.undo());
    assert!(!doc.redo());
    assert_eq!(doc.delete_selection().unwrap(), 0);
    assert!(matches!(doc.extract(), Err(EngineError::RecognitionInProgress)));

    open.send(()).unwrap();
    assert!(doc.wait_for_recognition(WAIT));
    assert!(!doc.is_processing());
    assert!(doc.can_close());
}

#[test]
fn drag_collapses_into_one_history_entry() {
    let mut doc = recognized_document();
    let id = id_at(&doc, 0);
    doc.select(id).unwrap();
    let before = doc.pixels().clone();

    for _ in 0..4 {
        doc.drag_to(Point::new(5, 0), true);
    }
    assert!(doc.is_dragging());
    assert_eq!(doc.history().undo_count(), 0);
    assert!(doc.release_drag_modifier());

    assert!(!doc.is_dragging());
    assert_eq!(doc.history().undo_count(), 1);
    let r = doc.region(id).unwrap();
    assert_eq!(r.top_left, Point::new(40, 20));
    assert!(r.drag_patch.is_none());
    assert_eq!(doc.pixels().get(30, 25), Bgr::WHITE);
    assert_eq!(doc.pixels().get(50, 25), Bgr::BLACK);

    assert!(doc.undo());
    assert_eq!(doc.pixels(), &before);
    assert_eq!(doc.region(id).unwrap().top_left, Point::new(20, 20));
}

#[test]
fn click_without_motion_still_commits() {
    let mut doc = recognized_document();
    doc.select(id_at(&doc, 1)).unwrap();
    let before = doc.pixels().clone();
    assert!(doc.begin_drag());
    assert!(doc.release_drag_modifier());
    assert_eq!(doc.history().undo_count(), 1);
    assert_eq!(doc.pixels(), &before);
    assert!(!doc.release_drag_modifier());
}

#[test]
fn drag_stays_inside_the_raster() {
    let mut doc = recognized_document();
    let id = id_at(&doc, 1);
    doc.select(id).unwrap();
    doc.drag_to(Point::new(500, -500), true);
    doc.commit_drag();
    let r = doc.region(id).unwrap();
    assert_eq!(r.bottom_right, Point::new(99, 10));
    assert_eq!(r.top_left, Point::new(79, 0));
}

#[test]
fn edit_keeps_bottom_edge_and_marks_persistent() {
    let mut doc = recognized_document();
    let id = id_at(&doc, 0);
    doc.select(id).unwrap();
    doc.edit_selection(TextEdit::text("Hello")).unwrap();

    let r = doc.region(id).unwrap();
    assert_eq!(r.text, "Hello");
    assert_eq!(r.bottom_right.y, 30);
    assert!(r.is_persistent);
    assert_eq!(doc.history().undo_description(), Some("Edit text"));
    assert!(doc.is_dirty);
}

#[test]
fn edit_without_selection_fails() {
    let mut doc = recognized_document();
    assert!(matches!(doc.edit_selection(TextEdit::text("x")), Err(EngineError::NoSelection)));
    assert_eq!(doc.history().undo_count(), 0);
}

#[test]
fn undo_then_redo_reproduces_every_edit() {
    let mut doc = recognized_document();
    let initial_pixels = doc.pixels().clone();
    let (a, b) = (id_at(&doc, 0), id_at(&doc, 1));

    doc.select(a).unwrap();
    doc.drag_to(Point::new(0, 10), true);
    doc.commit_drag();

    doc.select(b).unwrap();
    doc.edit_selection(TextEdit { text: Some("new".into()), letter_spacing: Some(1), ..TextEdit::default() })
        .unwrap();

    assert_eq!(doc.select_in_rect(Point::new(0, 0), Point::new(99, 59), false).len(), 2);
    doc.group_selections().unwrap();
    assert_eq!(doc.delete_selection().unwrap(), 1);
    assert_eq!(doc.regions().count(), 0);

    let edited = doc.state().clone();
    assert_eq!(doc.history().undo_count(), 4);

    for _ in 0..4 {
        assert!(doc.undo());
    }
    assert!(!doc.undo());
    assert_eq!(doc.pixels(), &initial_pixels);
    assert_eq!(doc.regions().count(), 2);

    for _ in 0..4 {
        assert!(doc.redo());
    }
    assert!(!doc.redo());
    assert_eq!(doc.state(), &edited);
}

#[test]
fn new_edit_after_undo_clears_redo() {
    let mut doc = recognized_document();
    doc.select(id_at(&doc, 0)).unwrap();
    doc.nudge(1, 0);
    doc.commit_drag();
    assert!(doc.undo());
    assert!(doc.history().can_redo());

    doc.select(id_at(&doc, 1)).unwrap();
    doc.delete_selection().unwrap();
    assert!(!doc.history().can_redo());
}

#[test]
fn zoom_round_trip_restores_overlays() {
    let mut doc = recognized_document();
    doc.toggle_highlights();
    let original = doc.render().overlays;
    doc.set_zoom(2.0);
    let zoomed = doc.render();
    assert_eq!(zoomed.image.dimensions(), (200, 120));
    assert_eq!(zoomed.overlays[0].rect.top_left, Point::new(40, 40));
    doc.set_zoom(1.0);
    assert_eq!(doc.render().overlays, original);
}

#[test]
fn persistent_highlights_survive_deselect_all() {
    let mut doc = recognized_document();
    let (a, b) = (id_at(&doc, 0), id_at(&doc, 1));
    doc.select(a).unwrap();
    doc.highlight_selection();
    doc.select(b).unwrap();
    doc.deselect_all();
    assert!(doc.region(a).unwrap().highlight_visible);
    assert!(!doc.region(b).unwrap().highlight_visible);
    assert_eq!(doc.selected(), None);

    doc.add_to_selection(a).unwrap();
    doc.remove_selection();
    assert!(!doc.region(a).unwrap().highlight_visible);
    assert!(!doc.region(a).unwrap().is_persistent);
}

#[test]
fn paste_replaces_raster_and_recognizes_again() {
    let mut doc = recognized_document();
    let pasted = PixelBuffer::new(30, 30, Bgr::from_rgb(10, 20, 30));
    doc.paste_image(pasted.clone()).unwrap();
    assert_eq!(doc.pixels(), &pasted);
    assert!(doc.wait_for_recognition(WAIT));
    assert!(doc.undo());
    assert_eq!(doc.pixels(), &page());
    assert_eq!(doc.regions().count(), 2);
}

#[test]
fn palette_is_sampled_on_select() {
    let mut doc = recognized_document();
    let id = id_at(&doc, 0);
    assert!(doc.palette().is_empty());
    doc.select(id).unwrap();
    assert_eq!(doc.palette().first(), Some(&Bgr::BLACK));
    doc.set_font_color(Bgr::from_rgb(200, 0, 0)).unwrap();
    assert_eq!(doc.region(id).unwrap().font_color, Bgr::from_rgb(200, 0, 0));
}

#[test]
fn edit_with_unavailable_font_changes_nothing() {
    let mut doc = recognized_document();
    *doc.fonts_mut() = FontCache::registered_only();
    let id = id_at(&doc, 0);
    doc.select(id).unwrap();

    assert!(matches!(doc.edit_selection(TextEdit::text("Hello")), Err(EngineError::InvalidArgument(_))));
    assert_eq!(doc.pixels(), &page());
    assert_eq!(doc.history().undo_count(), 0);
    let r = doc.region(id).unwrap();
    assert_eq!(r.text, "alpha");
    assert!(!r.is_persistent);
}

#[test]
fn inpaint_drag_vacates_and_carries_the_glyphs() {
    let mut doc = recognized_document_with(inpaint_settings());
    let id = id_at(&doc, 0);
    doc.select(id).unwrap();

    doc.drag_to(Point::new(0, 10), true);
    // The old box is regenerated as soon as the region starts moving.
    for x in 22..38 {
        assert!(is_light(&doc, x, 24) && is_light(&doc, x, 25), "ink left at x={}", x);
    }
    assert!(is_light(&doc, 30, 35));

    doc.drag_to(Point::new(0, 10), true);
    assert!(doc.commit_drag());
    assert_eq!(doc.history().undo_count(), 1);
    assert_eq!(doc.region(id).unwrap().top_left, Point::new(20, 40));
    for x in 22..38 {
        assert!(is_light(&doc, x, 25), "ink left at x={}", x);
        assert_eq!(doc.pixels().get(x, 44), Bgr::BLACK);
        assert_eq!(doc.pixels().get(x, 45), Bgr::BLACK);
    }

    assert!(doc.undo());
    assert_eq!(doc.pixels(), &page());
}

#[test]
fn inpaint_edit_replaces_text_and_undoes_exactly() {
    let mut doc = recognized_document_with(inpaint_settings());
    let id = id_at(&doc, 0);
    doc.select(id).unwrap();
    doc.edit_selection(TextEdit { text: Some("Hi".into()), font_size: Some(10), ..TextEdit::default() })
        .unwrap();

    let r = doc.region(id).unwrap();
    assert_eq!(r.text, "Hi");
    assert_eq!(r.bottom_right.y, 30);
    assert!(r.is_persistent);
    assert_ne!(doc.pixels(), &page());

    assert!(doc.undo());
    assert_eq!(doc.pixels(), &page());
    assert_eq!(doc.region(id).unwrap().text, "alpha");
}
