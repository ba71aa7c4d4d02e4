//! Offscreen raster surface backed by a `tiny_skia::Pixmap`.
//!
//! All coordinates are canvas pixels. Every surface is independent, so bulk
//! rows never draw into the interactive surface.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash, Transform,
};
use tracing::warn;

use crate::error::CanvasError;
use crate::fonts::LineLayout;
use crate::geom::Rect;
use crate::raster::Raster;

pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAllocation` for zero or oversized dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let pixmap = Pixmap::new(width, height).ok_or(CanvasError::SurfaceAllocation { width, height })?;
        Ok(Self { pixmap })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    /// Paint the whole surface with `color`.
    pub fn fill(&mut self, color: &str) {
        self.pixmap.fill(parse_color(color));
    }

    pub fn fill_rect(&mut self, rect: Rect, color: &str) {
        let Some(r) = to_skia_rect(rect) else {
            return;
        };
        let paint = solid(color);
        self.pixmap.fill_rect(r, &paint, Transform::identity(), None);
    }

    /// Fill a rectangle with quadratic corners of `radius` (clamped to half the short side).
    #[allow(clippy::cast_possible_truncation)]
    pub fn fill_round_rect(&mut self, rect: Rect, radius: f64, color: &str) {
        let radius = radius.clamp(0.0, rect.width.min(rect.height) / 2.0);
        if radius <= 0.0 {
            self.fill_rect(rect, color);
            return;
        }

        let (x, y, w, h, r) = (rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32, radius as f32);
        let mut pb = PathBuilder::new();
        pb.move_to(x + r, y);
        pb.line_to(x + w - r, y);
        pb.quad_to(x + w, y, x + w, y + r);
        pb.line_to(x + w, y + h - r);
        pb.quad_to(x + w, y + h, x + w - r, y + h);
        pb.line_to(x + r, y + h);
        pb.quad_to(x, y + h, x, y + h - r);
        pb.line_to(x, y + r);
        pb.quad_to(x, y, x + r, y);
        pb.close();
        let Some(path) = pb.finish() else {
            return;
        };
        self.pixmap.fill_path(&path, &solid(color), FillRule::Winding, Transform::identity(), None);
    }

    /// Outline `rect` with an on/off dash pattern of `dash` pixels.
    #[allow(clippy::cast_possible_truncation)]
    pub fn stroke_dashed_rect(&mut self, rect: Rect, color: &str, width: f64, dash: f64) {
        let Some(r) = to_skia_rect(rect) else {
            return;
        };
        let path = PathBuilder::from_rect(r);
        let stroke = Stroke {
            width: width as f32,
            dash: StrokeDash::new(vec![dash as f32, dash as f32], 0.0),
            ..Stroke::default()
        };
        self.pixmap.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    /// Draw `raster` stretched to fill `dest` exactly (aspect ratio not preserved).
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn draw_raster(&mut self, raster: &Raster, dest: Rect) {
        if dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let sx = dest.width as f32 / raster.width() as f32;
        let sy = dest.height as f32 / raster.height() as f32;
        let transform = Transform::from_row(sx, 0.0, 0.0, sy, dest.x as f32, dest.y as f32);
        let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
        self.pixmap.draw_pixmap(0, 0, raster.pixmap().as_ref(), &paint, transform, None);
    }

    /// Rasterize a shaped line with its left edge at `left` and the top of the
    /// line box at `top`. Glyph coverage is accumulated into a layer sized to
    /// the union of glyph bounds, then composited onto the surface.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fill_text(&mut self, line: &LineLayout, left: f64, top: f64, color: &str) {
        use ab_glyph::Font as _;

        let baseline = top as f32 + line.ascent;
        let outlines: Vec<_> = line
            .glyphs
            .iter()
            .filter_map(|g| {
                let glyph = g.id.with_scale_and_position(line.scale, ab_glyph::point(left as f32 + g.x, baseline));
                line.font.outline_glyph(glyph)
            })
            .collect();

        let Some(bounds) = outlines.iter().map(ab_glyph::OutlinedGlyph::px_bounds).reduce(|a, b| ab_glyph::Rect {
            min: ab_glyph::point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: ab_glyph::point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        }) else {
            return;
        };

        let (x0, y0) = (bounds.min.x.floor(), bounds.min.y.floor());
        let width = (bounds.max.x.ceil() - x0).max(1.0) as u32;
        let height = (bounds.max.y.ceil() - y0).max(1.0) as u32;
        let Some(mut layer) = Pixmap::new(width, height) else {
            return;
        };

        let stride = width as usize;
        let mut coverage = vec![0.0f32; stride * height as usize];
        for outlined in &outlines {
            let b = outlined.px_bounds();
            let (ox, oy) = ((b.min.x - x0) as u32, (b.min.y - y0) as u32);
            outlined.draw(|px, py, c| {
                let (x, y) = (ox + px, oy + py);
                if x < width && y < height {
                    let idx = y as usize * stride + x as usize;
                    coverage[idx] = (coverage[idx] + c).min(1.0);
                }
            });
        }

        let base = parse_color(color);
        for (dst, cov) in layer.pixels_mut().iter_mut().zip(&coverage) {
            if *cov > 0.0 {
                let mut c = base;
                c.apply_opacity(*cov);
                *dst = c.premultiply().to_color_u8();
            }
        }

        self.pixmap.draw_pixmap(
            x0 as i32,
            y0 as i32,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Straight-alpha RGBA of one pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Encode the surface as PNG.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the PNG encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, CanvasError> {
        self.pixmap.encode_png().map_err(|e| CanvasError::Encode(e.to_string()))
    }

    /// Encode the surface as a `data:image/png;base64,` URL.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the PNG encoder fails.
    pub fn to_data_url(&self) -> Result<String, CanvasError> {
        Ok(png_data_url(&self.encode_png()?))
    }
}

/// Wrap encoded PNG bytes in a data URL.
#[must_use]
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[allow(clippy::cast_possible_truncation)]
fn to_skia_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32)
}

fn solid(color: &str) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(parse_color(color));
    paint.anti_alias = true;
    paint
}

/// Parse `#rgb`, `#rrggbb`, or `#rrggbbaa`. Anything else draws as black.
#[must_use]
pub fn parse_color(raw: &str) -> Color {
    if let Some(color) = parse_hex(raw) {
        return color;
    }
    warn!(color = raw, "invalid color; using black");
    Color::BLACK
}

#[allow(clippy::cast_possible_truncation)]
fn parse_hex(raw: &str) -> Option<Color> {
    let hex = raw.trim().strip_prefix('#')?;
    let d: Vec<u8> = hex.chars().map(|c| c.to_digit(16).map(|v| v as u8)).collect::<Option<_>>()?;
    let (r, g, b, a) = match d.as_slice() {
        [r, g, b] => (r * 17, g * 17, b * 17, 255),
        [r1, r2, g1, g2, b1, b2] => (r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255),
        [r1, r2, g1, g2, b1, b2, a1, a2] => (r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, a1 * 16 + a2),
        _ => return None,
    };
    Some(Color::from_rgba8(r, g, b, a))
}
