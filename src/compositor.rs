// ============================================================================
// COMPOSITOR — zoomed display raster plus clickable overlays
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::components::colors::HIGHLIGHT_MOVING;
use crate::components::history::DocumentState;
use crate::components::region::{HighlightState, RegionId};
use crate::geometry::{Point, ScreenRect};

/// One highlight rectangle for the host to draw and hit-test.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub id: RegionId,
    /// Screen coordinates at the frame's zoom.
    pub rect: ScreenRect,
    pub color: Rgba<u8>,
    pub state: HighlightState,
}

/// Everything the display needs for one redraw.
pub struct Frame {
    pub image: RgbaImage,
    pub overlays: Vec<Overlay>,
    pub zoom: f64,
}

impl Frame {
    /// Topmost overlay under a screen point (later overlays are drawn above
    /// earlier ones).
    pub fn hit_test(&self, p: Point) -> Option<RegionId> {
        self.overlays
            .iter()
            .rev()
            .find(|o| o.rect.overlaps(p, p))
            .map(|o| o.id)
    }
}

/// Compose `state` at `zoom`.
///
/// While a drag is staged the raster under the original box is already
/// cleared; the lifted glyphs of `moving` are previewed at the region's
/// current position on a copy, so the document raster itself is untouched
/// until the drag commits.
pub fn render(state: &DocumentState, zoom: f64, moving: Option<RegionId>) -> Frame {
    let preview = moving
        .and_then(|id| state.region(id))
        .and_then(|r| r.drag_patch.as_ref().map(|p| (r, p)));

    let scaled = match preview {
        Some((region, patch)) => {
            let mut pixels = state.pixels.clone();
            patch.composite(&mut pixels, region.top_left.x, region.top_left.y);
            pixels.resized(zoom)
        }
        None => state.pixels.resized(zoom),
    };

    let overlays = state
        .regions
        .iter()
        .filter_map(|r| {
            if Some(r.id) == moving {
                return Some(Overlay {
                    id: r.id,
                    rect: r.line_space,
                    color: HIGHLIGHT_MOVING,
                    state: HighlightState::Selected,
                });
            }
            let hs = r.highlight_state();
            hs.color().map(|color| Overlay { id: r.id, rect: r.line_space, color, state: hs })
        })
        .collect();

    Frame { image: scaled.to_rgba_image(), overlays, zoom }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Bgr, PixelBuffer};
    use crate::components::region::TextRegion;
    use std::sync::Arc;

    fn state_with_region(visible: bool) -> (DocumentState, RegionId) {
        let mut s = DocumentState::new(PixelBuffer::new(40, 20, Bgr::WHITE));
        let mut r = TextRegion::new("hi", Point::new(5, 5), Point::new(15, 12));
        r.init_geometry(1.0, 40, 20).unwrap();
        r.highlight_visible = visible;
        let id = r.id;
        s.regions.push(Arc::new(r));
        (s, id)
    }

    #[test]
    fn hidden_regions_have_no_overlay() {
        let (s, _) = state_with_region(false);
        let frame = render(&s, 1.0, None);
        assert!(frame.overlays.is_empty());
        assert_eq!(frame.image.dimensions(), (40, 20));
    }

    #[test]
    fn zoom_scales_image_and_overlays() {
        let (mut s, id) = state_with_region(true);
        if let Some(r) = s.region_mut(id) {
            r.scale_and_position(2.0);
        }
        let frame = render(&s, 2.0, None);
        assert_eq!(frame.image.dimensions(), (80, 40));
        assert_eq!(frame.overlays[0].rect.top_left, Point::new(10, 10));
        assert_eq!(frame.hit_test(Point::new(12, 12)), Some(id));
        assert_eq!(frame.hit_test(Point::new(70, 2)), None);
    }

    #[test]
    fn moving_region_uses_moving_color() {
        let (s, id) = state_with_region(false);
        let frame = render(&s, 1.0, Some(id));
        assert_eq!(frame.overlays.len(), 1);
        assert_eq!(frame.overlays[0].color, HIGHLIGHT_MOVING);
    }
}
