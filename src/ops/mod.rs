// ============================================================================
// OPS — pixel operations on the BGR raster
// ============================================================================
//
//   mask.rs    — grayscale, Otsu threshold, text mask, morphology
//   inpaint.rs — mask-guided hole filling
//   fill.rs    — background regeneration (neighbor / inpaint)
//   text.rs    — font resolution, measurement and glyph drawing
// ============================================================================

pub mod fill;
pub mod inpaint;
pub mod mask;
pub mod text;
