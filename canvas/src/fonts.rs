//! Font resolution and text measurement.
//!
//! Faces are discovered through `fontdb` (system fonts plus an optional extra
//! directory) and rasterized through `ab_glyph`. A `FontBook` with no faces is
//! still usable: measurement falls back to a fixed per-character advance and
//! glyph drawing is skipped, so layout and hit-testing stay deterministic in
//! headless environments.

#[cfg(test)]
#[path = "fonts_test.rs"]
mod fonts_test;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ab_glyph::{Font, FontArc, FontVec, GlyphId, PxScale, ScaleFont};
use tracing::{debug, warn};

use crate::consts::{FALLBACK_ADVANCE_EM, FALLBACK_BOLD_ADVANCE_EM};

/// A glyph placed on a single line, relative to the line's left edge.
#[derive(Debug, Clone, Copy)]
pub struct PlacedGlyph {
    pub id: GlyphId,
    pub x: f32,
}

/// A shaped single line of text ready for rasterization.
pub struct LineLayout {
    pub font: FontArc,
    pub scale: PxScale,
    pub ascent: f32,
    pub width: f32,
    pub glyphs: Vec<PlacedGlyph>,
}

/// Registry of font faces keyed by family name and weight.
pub struct FontBook {
    db: Option<fontdb::Database>,
    resolved: Mutex<HashMap<(String, bool), Option<FontArc>>>,
}

impl FontBook {
    /// A font book with no faces. Measurement uses fallback metrics.
    #[must_use]
    pub fn fallback() -> Self {
        Self { db: None, resolved: Mutex::new(HashMap::new()) }
    }

    /// A font book populated from the system font directories.
    #[must_use]
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "loaded system fonts");
        Self { db: Some(db), resolved: Mutex::new(HashMap::new()) }
    }

    /// System fonts plus every face found under `dir`.
    #[must_use]
    pub fn with_dir(dir: &Path) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        db.load_fonts_dir(dir);
        debug!(faces = db.len(), dir = %dir.display(), "loaded fonts");
        Self { db: Some(db), resolved: Mutex::new(HashMap::new()) }
    }

    /// Number of faces known to this book.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.db.as_ref().map_or(0, fontdb::Database::len)
    }

    /// Resolve a face for `family`, falling back to sans-serif and then to any face.
    #[must_use]
    pub fn resolve(&self, family: &str, bold: bool) -> Option<FontArc> {
        let db = self.db.as_ref()?;
        let key = (family.to_owned(), bold);
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = resolved.get(&key) {
            return hit.clone();
        }

        let families = [fontdb::Family::Name(family), fontdb::Family::SansSerif];
        let query = fontdb::Query {
            families: &families,
            weight: if bold { fontdb::Weight::BOLD } else { fontdb::Weight::NORMAL },
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let id = db.query(&query).or_else(|| db.faces().next().map(|face| face.id));
        let font = id.and_then(|id| load_face(db, id));
        if font.is_none() {
            warn!(family, bold, "no usable font face; text will not be drawn");
        }
        resolved.insert(key, font.clone());
        font
    }

    /// Advance width of `text` rendered at `size` pixels.
    #[must_use]
    pub fn measure(&self, text: &str, family: &str, size: f64, bold: bool) -> f64 {
        match self.layout_line(text, family, size, bold) {
            Some(line) => f64::from(line.width),
            None => fallback_width(text, size, bold),
        }
    }

    /// Shape a single line of text. Returns `None` when no face is available.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn layout_line(&self, text: &str, family: &str, size: f64, bold: bool) -> Option<LineLayout> {
        let font = self.resolve(family, bold)?;
        let scale = px_scale(&font, size as f32);
        let scaled = font.as_scaled(scale);

        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            glyphs.push(PlacedGlyph { id, x: caret });
            caret += scaled.h_advance(id);
            prev = Some(id);
        }

        let ascent = scaled.ascent();
        Some(LineLayout { font, scale, ascent, width: caret, glyphs })
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::fallback()
    }
}

fn load_face(db: &fontdb::Database, id: fontdb::ID) -> Option<FontArc> {
    let parsed = db.with_face_data(id, |data, index| FontVec::try_from_vec_and_index(data.to_vec(), index))?;
    match parsed {
        Ok(font) => Some(FontArc::new(font)),
        Err(e) => {
            warn!(error = %e, "failed to parse font face");
            None
        }
    }
}

/// Convert a CSS-style pixel size (em height) to an `ab_glyph` scale.
fn px_scale(font: &FontArc, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
        _ => PxScale::from(size),
    }
}

/// Width estimate used when no face can be resolved.
#[must_use]
pub fn fallback_width(text: &str, size: f64, bold: bool) -> f64 {
    let em = if bold { FALLBACK_BOLD_ADVANCE_EM } else { FALLBACK_ADVANCE_EM };
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    f64::from(chars) * size * em
}
