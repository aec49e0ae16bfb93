use std::collections::VecDeque;
use std::sync::Arc;

use crate::canvas::PixelBuffer;
use crate::components::region::{RegionId, TextRegion};

// ============================================================================
// DOCUMENT STATE — one snapshot of {regions, pixels, selection}
// ============================================================================

/// A document snapshot.
///
/// Regions are shared between snapshots through `Arc` and copied on write
/// (`region_mut` goes through `Arc::make_mut`), so editing the current state
/// never reaches into a region still referenced from the history. The pixel
/// buffer is deep-copied by `Clone`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentState {
    pub regions: Vec<Arc<TextRegion>>,
    pub pixels: PixelBuffer,
    pub selected: Option<RegionId>,
}

impl DocumentState {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self { regions: Vec::new(), pixels, selected: None }
    }

    pub fn index_of(&self, id: RegionId) -> Option<usize> {
        self.regions.iter().position(|r| r.id == id)
    }

    pub fn region(&self, id: RegionId) -> Option<&TextRegion> {
        self.regions.iter().find(|r| r.id == id).map(|r| r.as_ref())
    }

    /// Mutable access, cloning the region first if a snapshot shares it.
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut TextRegion> {
        self.regions.iter_mut().find(|r| r.id == id).map(Arc::make_mut)
    }

    pub fn selected_region(&self) -> Option<&TextRegion> {
        self.selected.and_then(|id| self.region(id))
    }

    /// Apply `f` to every region, copying shared ones.
    pub fn for_each_region_mut(&mut self, mut f: impl FnMut(&mut TextRegion)) {
        for r in self.regions.iter_mut() {
            f(Arc::make_mut(r));
        }
    }

    /// Apply `f` only to the regions `needs` picks. The others stay shared
    /// with whatever snapshot also holds them.
    pub fn update_regions_where(&mut self, needs: impl Fn(&TextRegion) -> bool, mut f: impl FnMut(&mut TextRegion)) {
        for r in self.regions.iter_mut() {
            if needs(r.as_ref()) {
                f(Arc::make_mut(r));
            }
        }
    }

    /// Ids of every region whose selection mark is set, in list order.
    pub fn marked(&self) -> Vec<RegionId> {
        self.regions.iter().filter(|r| r.is_selected && r.enabled).map(|r| r.id).collect()
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.memory_bytes()
            + self
                .regions
                .iter()
                .map(|r| r.drag_patch.as_ref().map_or(0, |p| p.patch.memory_bytes() * 2))
                .sum::<usize>()
    }
}

// ============================================================================
// HISTORY STACK — linear undo/redo of whole snapshots
// ============================================================================

struct HistoryEntry {
    description: String,
    state: DocumentState,
}

/// Undo/redo stacks of document snapshots with count and memory limits.
pub struct HistoryStack {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    /// `0` keeps everything.
    max_steps: usize,
    max_memory_bytes: Option<usize>,
    total_memory: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryStack {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_steps,
            max_memory_bytes: Some(1024 * 1024 * 1024), // 1 GB
            total_memory: 0,
        }
    }

    /// Record the pre-mutation `state`. Clears the redo stack.
    pub fn push(&mut self, description: impl Into<String>, state: DocumentState) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(entry.state.memory_bytes());
        }
        self.total_memory += state.memory_bytes();
        self.undo_stack.push_back(HistoryEntry { description: description.into(), state });
        self.prune();
    }

    /// Swap `current` for the newest undo snapshot. `current` moves to the
    /// redo stack. With no history, `current` comes back as `Err`.
    pub fn undo(&mut self, current: DocumentState) -> Result<DocumentState, DocumentState> {
        let Some(entry) = self.undo_stack.pop_back() else {
            return Err(current);
        };
        self.total_memory = self.total_memory.saturating_sub(entry.state.memory_bytes());
        self.total_memory += current.memory_bytes();
        self.redo_stack.push_back(HistoryEntry { description: entry.description, state: current });
        Ok(entry.state)
    }

    /// Mirror of [`undo`](Self::undo).
    pub fn redo(&mut self, current: DocumentState) -> Result<DocumentState, DocumentState> {
        let Some(entry) = self.redo_stack.pop_back() else {
            return Err(current);
        };
        self.total_memory = self.total_memory.saturating_sub(entry.state.memory_bytes());
        self.total_memory += current.memory_bytes();
        self.undo_stack.push_back(HistoryEntry { description: entry.description, state: current });
        Ok(entry.state)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.undo_stack.iter().rev().map(|e| e.description.as_str()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    fn prune(&mut self) {
        if self.max_steps > 0 {
            while self.undo_stack.len() > self.max_steps {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.state.memory_bytes());
                }
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    log::debug!("history: dropping '{}' to stay under memory cap", removed.description);
                    self.total_memory = self.total_memory.saturating_sub(removed.state.memory_bytes());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Bgr;
    use crate::geometry::Point;

    fn state(shade: u8) -> DocumentState {
        DocumentState::new(PixelBuffer::new(4, 4, Bgr::new(shade, shade, shade)))
    }

    #[test]
    fn push_clears_redo() {
        let mut h = HistoryStack::new(10);
        h.push("a", state(1));
        let current = h.undo(state(2)).unwrap();
        assert_eq!(current, state(1));
        assert!(h.can_redo());
        h.push("b", state(3));
        assert!(!h.can_redo());
    }

    #[test]
    fn undo_on_empty_hands_state_back() {
        let mut h = HistoryStack::default();
        let back = h.undo(state(7)).unwrap_err();
        assert_eq!(back, state(7));
        assert_eq!(h.redo_count(), 0);
    }

    #[test]
    fn undo_redo_swap_snapshots() {
        let mut h = HistoryStack::new(10);
        h.push("edit", state(1));
        let s = h.undo(state(2)).unwrap();
        assert_eq!(s, state(1));
        assert_eq!(h.redo_description(), Some("edit"));
        let s = h.redo(s).unwrap();
        assert_eq!(s, state(2));
        assert_eq!(h.undo_count(), 1);
        assert_eq!(h.redo_count(), 0);
    }

    #[test]
    fn oldest_entries_are_pruned() {
        let mut h = HistoryStack::new(3);
        for i in 0..5 {
            h.push(format!("step {}", i), state(i));
        }
        assert_eq!(h.undo_count(), 3);
        assert_eq!(h.undo_history(), vec!["step 4", "step 3", "step 2"]);
    }

    #[test]
    fn region_mut_copies_shared_regions() {
        let mut s = state(0);
        let r = TextRegion::new("x", Point::new(0, 0), Point::new(2, 2));
        let id = r.id;
        s.regions.push(Arc::new(r));
        let snapshot = s.clone();

        if let Some(r) = s.region_mut(id) {
            r.text = "changed".into();
        }
        assert_eq!(snapshot.region(id).map(|r| r.text.as_str()), Some("x"));
        assert_eq!(s.region(id).map(|r| r.text.as_str()), Some("changed"));
    }
}
