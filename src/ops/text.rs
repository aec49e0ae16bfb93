use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use std::collections::HashMap;

use crate::canvas::{Bgr, PixelBuffer};
use crate::error::{EngineError, Result};
use crate::geometry::Point;

/// How an edited region's text is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    /// Extra pixels between adjacent glyphs (may be negative).
    pub letter_spacing: f32,
    pub color: Bgr,
}

/// Lay out one line with kerning and letter spacing.
/// Returns `(glyph, x)` pairs and the advance width of the line.
fn layout_line(font: &FontArc, text: &str, size: f32, spacing: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id) + spacing;
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x.max(0.0))
}

/// Pixel size of `text` (multi-line on '\n').
pub fn measure_text(font: &FontArc, text: &str, size: f32, spacing: f32) -> (u32, u32) {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines
        .iter()
        .map(|l| layout_line(font, l, size, spacing).1)
        .fold(0.0f32, f32::max);
    let height = font.as_scaled(size).height() * lines.len() as f32;
    (width.round().max(1.0) as u32, height.round().max(1.0) as u32)
}

#[inline]
fn blend(dst: Bgr, src: Bgr, coverage: f32) -> Bgr {
    let c = coverage.clamp(0.0, 1.0);
    let mix = |d: u8, s: u8| (d as f32 * (1.0 - c) + s as f32 * c).round() as u8;
    Bgr::new(mix(dst.b, src.b), mix(dst.g, src.g), mix(dst.r, src.r))
}

/// Rasterize `text` into `pixels` with its first line's top at `top_left`.
/// Anti-aliased coverage is blended over whatever is underneath.
pub fn draw_text(pixels: &mut PixelBuffer, font: &FontArc, text: &str, style: &TextStyle, top_left: Point) {
    let scaled = font.as_scaled(style.size);
    let ascent = scaled.ascent();
    let line_height = scaled.height();
    let (w, h) = (pixels.width() as i32, pixels.height() as i32);

    for (line_idx, line) in text.split('\n').enumerate() {
        let baseline = top_left.y as f32 + ascent + line_idx as f32 * line_height;
        let (glyphs, _) = layout_line(font, line, style.size, style.letter_spacing);
        for (id, x) in glyphs {
            let glyph = id.with_scale_and_position(style.size, point(top_left.x as f32 + x, baseline));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue; // whitespace
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= w || py >= h || coverage <= 0.0 {
                    return;
                }
                let dst = pixels.get(px as u32, py as u32);
                pixels.put(px as u32, py as u32, blend(dst, style.color, coverage));
            });
        }
    }
}

// ============================================================================
// FONT RESOLUTION
// ============================================================================

/// Load a font by family name from the system at regular weight.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::Serif, FamilyName::SansSerif],
            &Properties::new(),
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Enumerate system font families, sorted and deduplicated.
pub fn enumerate_system_fonts() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(e) => {
            log::warn!("font enumeration failed: {:?}", e);
            Vec::new()
        }
    }
}

/// Family name → loaded font. Misses are cached too, so an unknown family
/// costs one system lookup per session.
pub struct FontCache {
    fonts: HashMap<String, Option<FontArc>>,
    system_lookup: bool,
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FontCache {
    pub fn new() -> Self {
        Self { fonts: HashMap::new(), system_lookup: true }
    }

    /// A cache that only knows fonts handed to [`register`](Self::register).
    /// Hosts that ship their own fonts use this to stay independent of what
    /// is installed.
    pub fn registered_only() -> Self {
        Self { fonts: HashMap::new(), system_lookup: false }
    }

    pub fn get(&mut self, family: &str) -> Option<FontArc> {
        let system_lookup = self.system_lookup;
        self.fonts
            .entry(family.to_string())
            .or_insert_with(|| {
                let font = if system_lookup { load_system_font(family) } else { None };
                if font.is_none() {
                    log::warn!("font '{}' not found", family);
                }
                font
            })
            .clone()
    }

    /// Make raw TrueType/OpenType bytes available under `family`.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| EngineError::InvalidArgument(format!("font '{}': {}", family, e)))?;
        self.fonts.insert(family.to_string(), Some(font));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        let d = Bgr::WHITE;
        let s = Bgr::new(10, 20, 30);
        assert_eq!(blend(d, s, 0.0), d);
        assert_eq!(blend(d, s, 1.0), s);
        assert_eq!(blend(d, s, 2.0), s);
    }

    #[test]
    fn register_rejects_garbage() {
        let mut cache = FontCache::new();
        assert!(cache.register("junk", vec![1, 2, 3]).is_err());
    }

    #[test]
    fn registered_only_cache_never_asks_the_system() {
        let mut cache = FontCache::registered_only();
        assert!(cache.get("serif").is_none());
        assert!(cache.get("Times New Roman").is_none());
    }

    #[test]
    fn measured_lines_stack_and_widen_with_spacing() {
        let Some(font) = load_system_font("serif") else {
            return;
        };
        let (w1, h1) = measure_text(&font, "abcd", 20.0, 0.0);
        let (w2, _) = measure_text(&font, "abcd", 20.0, 3.0);
        let (w3, h3) = measure_text(&font, "abcd\nab", 20.0, 0.0);
        assert_eq!(w2, w1 + 9);
        assert_eq!(w3, w1);
        assert!(h3 >= 2 * h1 - 1);
    }

    #[test]
    fn system_font_list_is_sorted_and_unique() {
        let fonts = enumerate_system_fonts();
        assert!(fonts.windows(2).all(|w| w[0] < w[1]));
    }
}
