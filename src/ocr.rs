//! Text recognition: the OCR collaborator seam, a tesseract backend, and the
//! asynchronous pipeline that turns recognized spans into text regions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use crate::canvas::PixelBuffer;
use crate::components::region::TextRegion;
use crate::error::{EngineError, Result};
use crate::geometry::Point;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Granularity at which recognized text is grouped into regions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OcrLevel {
    Block,
    Paragraph,
    Line,
    #[default]
    Word,
    Symbol,
}

impl OcrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrLevel::Block => "block",
            OcrLevel::Paragraph => "paragraph",
            OcrLevel::Line => "line",
            OcrLevel::Word => "word",
            OcrLevel::Symbol => "symbol",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Some(OcrLevel::Block),
            "paragraph" | "para" => Some(OcrLevel::Paragraph),
            "line" | "textline" => Some(OcrLevel::Line),
            "word" => Some(OcrLevel::Word),
            "symbol" => Some(OcrLevel::Symbol),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OcrParams {
    pub level: OcrLevel,
    pub engine_mode: i32,
    pub page_seg_mode: i32,
    pub dpi: i32,
    /// Trained-data identifier, e.g. `eng`.
    pub language: String,
    pub data_dir: PathBuf,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            level: OcrLevel::Word,
            engine_mode: 3,
            page_seg_mode: 3,
            dpi: 150,
            language: "eng".to_string(),
            data_dir: PathBuf::new(),
        }
    }
}

// ============================================================================
// ENGINE SEAM
// ============================================================================

/// One recognized span at the requested granularity, in raster pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OcrSpan {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OcrOutput {
    /// Full UTF-8 page text.
    pub text: String,
    pub spans: Vec<OcrSpan>,
}

/// An external text recognizer. Called from a worker thread with a private
/// copy of the raster (BGR, `channels() == 3`, rows `stride()` bytes apart).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &PixelBuffer, params: &OcrParams) -> Result<OcrOutput>;

    fn name(&self) -> &str {
        "ocr"
    }
}

/// A word box as reported by a word-level recognizer, with the layout
/// indices needed to regroup words into lines, paragraphs and blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WordBox {
    pub block: i32,
    pub paragraph: i32,
    pub line: i32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub text: String,
}

/// Merge words into spans at `level`, keeping first-appearance order.
/// Words of one line are joined by spaces, lines by newlines.
pub fn group_words(words: &[WordBox], level: OcrLevel) -> Vec<OcrSpan> {
    let key = |w: &WordBox| -> (i32, i32, i32, usize) {
        match level {
            OcrLevel::Block => (w.block, -1, -1, 0),
            OcrLevel::Paragraph => (w.block, w.paragraph, -1, 0),
            OcrLevel::Line => (w.block, w.paragraph, w.line, 0),
            OcrLevel::Word | OcrLevel::Symbol => (w.block, w.paragraph, w.line, 1),
        }
    };

    let mut order: Vec<(i32, i32, i32, usize)> = Vec::new();
    let mut groups: HashMap<(i32, i32, i32, usize), Vec<&WordBox>> = HashMap::new();
    for (i, w) in words.iter().filter(|w| !w.text.trim().is_empty()).enumerate() {
        let mut k = key(w);
        if k.3 == 1 {
            k.3 = i + 1; // every word is its own group
        }
        if !groups.contains_key(&k) {
            order.push(k);
        }
        groups.entry(k).or_default().push(w);
    }

    order
        .into_iter()
        .filter_map(|k| {
            let members = groups.remove(&k)?;
            let mut span = OcrSpan {
                text: String::new(),
                left: i32::MAX,
                top: i32::MAX,
                right: i32::MIN,
                bottom: i32::MIN,
            };
            let mut current_line: Option<(i32, i32, i32)> = None;
            for w in members {
                span.left = span.left.min(w.left);
                span.top = span.top.min(w.top);
                span.right = span.right.max(w.left + w.width);
                span.bottom = span.bottom.max(w.top + w.height);

                let line = (w.block, w.paragraph, w.line);
                match current_line {
                    Some(prev) if prev != line => span.text.push('\n'),
                    Some(_) => span.text.push(' '),
                    None => {}
                }
                current_line = Some(line);
                span.text.push_str(w.text.trim());
            }
            Some(span)
        })
        .collect()
}

// ============================================================================
// TESSERACT BACKEND
// ============================================================================

/// Environment variable the tesseract binary reads its data directory from.
pub const TESSDATA_PREFIX: &str = "TESSDATA_PREFIX";

/// Recognizer backed by the system `tesseract` binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct TesseractEngine;

impl TesseractEngine {
    /// Command-line arguments for one run.
    pub fn args(params: &OcrParams) -> rusty_tesseract::Args {
        rusty_tesseract::Args {
            lang: params.language.clone(),
            config_variables: HashMap::new(),
            dpi: Some(params.dpi),
            psm: Some(params.page_seg_mode),
            oem: Some(params.engine_mode),
        }
    }

    /// `params.data_dir` when it holds trained data for every language in
    /// `params.language` (`eng+deu` needs both files). `None` leaves
    /// tesseract on its installation default.
    pub fn tessdata_dir(params: &OcrParams) -> Option<PathBuf> {
        if params.data_dir.as_os_str().is_empty() {
            return None;
        }
        let missing = params
            .language
            .split('+')
            .map(|lang| params.data_dir.join(format!("{}.traineddata", lang.trim())))
            .find(|file| !file.is_file());
        match missing {
            Some(file) => {
                log::debug!("{} not found, using the tesseract default data", file.display());
                None
            }
            None => Some(params.data_dir.clone()),
        }
    }

    /// Point every later tesseract invocation at `params.data_dir`.
    ///
    /// The tesseract child process inherits our environment, so this writes
    /// [`TESSDATA_PREFIX`]. It must run before any recognition is dispatched.
    pub fn export_data_dir(params: &OcrParams) -> Option<PathBuf> {
        let dir = Self::tessdata_dir(params)?;
        // SAFETY: only called from `cli::run` before the first worker thread
        // exists, so no other thread can be reading the environment.
        unsafe { std::env::set_var(TESSDATA_PREFIX, &dir) };
        log::info!("tesseract data directory: {}", dir.display());
        Some(dir)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &PixelBuffer, params: &OcrParams) -> Result<OcrOutput> {
        use rusty_tesseract::Image;

        if let Some(dir) = Self::tessdata_dir(params)
            && std::env::var_os(TESSDATA_PREFIX).as_deref() != Some(dir.as_os_str())
        {
            log::warn!("{} is not exported; tesseract will not see {}", TESSDATA_PREFIX, dir.display());
        }

        log::info!(
            "Running OCR with rusty-tesseract on {}x{} image (level {})",
            image.width(),
            image.height(),
            params.level.as_str()
        );
        if params.level == OcrLevel::Symbol {
            log::debug!("tesseract data output stops at words; grouping symbols as words");
        }

        let dynamic_img = image::DynamicImage::ImageRgb8(image.to_rgb_image());
        let tess_img = Image::from_dynamic_image(&dynamic_img)
            .map_err(|e| EngineError::Ocr(format!("failed to create tesseract image: {}", e)))?;

        let args = Self::args(params);

        let text = rusty_tesseract::image_to_string(&tess_img, &args)
            .map_err(|e| EngineError::Ocr(format!("tesseract failed: {}", e)))?;
        let data = rusty_tesseract::image_to_data(&tess_img, &args)
            .map_err(|e| EngineError::Ocr(format!("tesseract failed: {}", e)))?;

        // Level 5 rows are words; the others are layout containers.
        let words: Vec<WordBox> = data
            .data
            .into_iter()
            .filter(|d| d.level == 5)
            .map(|d| WordBox {
                block: d.block_num,
                paragraph: d.par_num,
                line: d.line_num,
                left: d.left,
                top: d.top,
                width: d.width,
                height: d.height,
                text: d.text,
            })
            .collect();
        log::info!("Tesseract returned {} words", words.len());

        Ok(OcrOutput { text, spans: group_words(&words, params.level) })
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

// ============================================================================
// SPANS → REGIONS
// ============================================================================

/// One region per usable span. Trailing spaces and newlines are trimmed,
/// empty spans dropped, and boxes clamped into the raster. Boxes that end up
/// degenerate are logged and skipped.
pub fn regions_from_output(output: &OcrOutput, width: u32, height: u32, zoom: f64) -> Vec<TextRegion> {
    let mut regions = Vec::with_capacity(output.spans.len());
    for span in &output.spans {
        let text = span.text.trim_end_matches(['\n', ' ']);
        if text.is_empty() {
            log::debug!("skipping empty span at ({}, {})", span.left, span.top);
            continue;
        }
        if span.left < 0 || span.top < 0 || span.right > width as i32 || span.bottom > height as i32 {
            log::debug!(
                "clamping span '{}' ({},{})-({},{}) into {}x{}",
                text,
                span.left,
                span.top,
                span.right,
                span.bottom,
                width,
                height
            );
        }
        let mut region = TextRegion::new(text, Point::new(span.left, span.top), Point::new(span.right, span.bottom));
        if region.init_geometry(zoom, width, height).is_err() {
            continue;
        }
        regions.push(region);
    }
    regions
}

// ============================================================================
// RECOGNITION PIPELINE
// ============================================================================

struct RecognitionMessage {
    outcome: Result<OcrOutput>,
}

/// Runs the recognizer on a worker thread and hands the result back through
/// a channel polled by the owning document.
pub struct RecognitionPipeline {
    engine: Arc<dyn OcrEngine>,
    params: OcrParams,
    sender: mpsc::Sender<RecognitionMessage>,
    receiver: mpsc::Receiver<RecognitionMessage>,
    processing: bool,
}

impl RecognitionPipeline {
    pub fn new(engine: Arc<dyn OcrEngine>, params: OcrParams) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { engine, params, sender, receiver, processing: false }
    }

    pub fn set_level(&mut self, level: OcrLevel) {
        self.params.level = level;
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Start recognizing a private copy of `source`.
    ///
    /// Fails without side effects on an empty raster or while a previous run
    /// is still in flight.
    pub fn extract(&mut self, source: &PixelBuffer) -> Result<()> {
        if self.processing {
            log::debug!("extract: disallowed, recognition already in progress");
            return Err(EngineError::RecognitionInProgress);
        }
        if source.is_empty() {
            log::warn!("extract: empty image, nothing to recognize");
            return Err(EngineError::EmptyImage);
        }

        let pixels = source.clone();
        let engine = Arc::clone(&self.engine);
        let params = self.params.clone();
        let sender = self.sender.clone();
        self.processing = true;
        log::debug!("extract: dispatching {} on {}x{}", engine.name(), pixels.width(), pixels.height());

        rayon::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                engine.recognize(&pixels, &params)
            }));
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(panic_info) => {
                    let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.to_string()
                    } else {
                        "unknown panic payload".to_string()
                    };
                    log::error!("recognizer '{}' panicked: {}", engine.name(), msg);
                    Err(EngineError::Ocr(format!("recognizer panicked: {}", msg)))
                }
            };
            let _ = sender.send(RecognitionMessage { outcome });
        });
        Ok(())
    }

    /// Non-blocking check for a finished run.
    pub fn poll(&mut self) -> Option<Result<OcrOutput>> {
        let msg = self.receiver.try_recv().ok()?;
        self.processing = false;
        Some(msg.outcome)
    }

    /// Block up to `timeout` for a finished run. Used by headless callers.
    pub fn wait(&mut self, timeout: Duration) -> Option<Result<OcrOutput>> {
        if !self.processing {
            return self.poll();
        }
        let msg = self.receiver.recv_timeout(timeout).ok()?;
        self.processing = false;
        Some(msg.outcome)
    }
}
