/// Error type for engine operations that can fail for reasons the caller
/// should hear about. Guarded no-ops (undo while processing, edits with no
/// selection from the host's gesture stream) are logged instead.
#[derive(Debug)]
pub enum EngineError {
    /// The source raster has no pixels.
    EmptyImage,
    /// A recognition run is already in flight for this document.
    RecognitionInProgress,
    /// The operation needs an active or marked region.
    NoSelection,
    /// A computed box has non-positive extent.
    DegenerateGeometry { width: i32, height: i32 },
    /// The OCR collaborator reported a failure.
    Ocr(String),
    Io(std::io::Error),
    Image(image::ImageError),
    Clipboard(String),
    InvalidArgument(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::EmptyImage => write!(f, "empty image"),
            EngineError::RecognitionInProgress => {
                write!(f, "disallowed: recognition already in progress")
            }
            EngineError::NoSelection => write!(f, "no region selected"),
            EngineError::DegenerateGeometry { width, height } => {
                write!(f, "degenerate region geometry ({}x{})", width, height)
            }
            EngineError::Ocr(e) => write!(f, "OCR error: {}", e),
            EngineError::Io(e) => write!(f, "I/O error: {}", e),
            EngineError::Image(e) => write!(f, "image error: {}", e),
            EngineError::Clipboard(e) => write!(f, "clipboard error: {}", e),
            EngineError::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            EngineError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Image(e)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
