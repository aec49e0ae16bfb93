//! TextFE: edit the text inside raster images.
//!
//! Text regions are recognized by an external OCR engine, then retyped,
//! moved, grouped or deleted while the pixels underneath are regenerated.
//! [`Document`] is the entry point; the host shell feeds it gestures and
//! draws the [`Frame`]s it renders.

#![allow(clippy::too_many_arguments)]

pub mod canvas;
pub mod cli;
pub mod components;
pub mod compositor;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logger;
pub mod ocr;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{Bgr, PixelBuffer};
pub use components::history::{DocumentState, HistoryStack};
pub use components::region::{DragPatch, HighlightState, RegionId, TextRegion};
pub use compositor::{Frame, Overlay};
pub use error::{EngineError, Result};
pub use geometry::{PixelBox, Point, ScreenRect};
pub use ocr::{OcrEngine, OcrLevel, OcrOutput, OcrParams, OcrSpan, RecognitionPipeline, TesseractEngine};
pub use ops::fill::{FillMethod, FillSettings};
pub use ops::text::FontCache;
pub use project::{Document, DocumentEvent, TextEdit};
pub use settings::EngineSettings;
