// ============================================================================
// COMPONENTS — the editable document model
// ============================================================================
//
//   region.rs  — TextRegion, highlight state machine, drag patch
//   colors.rs  — border color and palette analysis, highlight colors
//   history.rs — DocumentState snapshots and the undo/redo stack
// ============================================================================

pub mod colors;
pub mod history;
pub mod region;
