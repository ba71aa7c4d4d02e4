//! Rendering: draws a scene onto a `Surface`.
//!
//! Layer order is fixed: clear, background color, stretched background image,
//! elements bottom-to-top, then the selection outline. Drawing reads the scene
//! and raster cache only; it never mutates application state. Images whose
//! raster is not cached are skipped for this pass.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use tracing::trace;

use crate::consts::{SELECTION_COLOR, SELECTION_DASH_PX, SELECTION_MARGIN_PX, SELECTION_STROKE_PX};
use crate::element::{ButtonElement, Element, ImageElement, TextElement};
use crate::error::CanvasError;
use crate::fonts::FontBook;
use crate::geom::Rect;
use crate::raster::RasterCache;
use crate::scene::Scene;
use crate::surface::Surface;

/// Per-pass toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Draw the dashed outline around the selected element.
    pub show_selection: bool,
}

impl RenderOptions {
    /// Interactive redraw: selection outline visible.
    #[must_use]
    pub fn interactive() -> Self {
        Self { show_selection: true }
    }

    /// Export: the design only.
    #[must_use]
    pub fn export() -> Self {
        Self { show_selection: false }
    }
}

/// Draw the full scene.
pub fn draw_scene(surface: &mut Surface, scene: &Scene, rasters: &RasterCache, options: RenderOptions) {
    draw_background(surface, scene.background_color(), scene.background_image_src(), rasters);
    draw_elements(surface, scene.elements(), scene.fonts(), rasters);

    if options.show_selection {
        if let Some(el) = scene.selected() {
            draw_selection(surface, el);
        }
    }
}

/// Clear, fill with `color`, then stretch the background image (if cached) over the whole surface.
pub fn draw_background(surface: &mut Surface, color: &str, image_src: Option<&str>, rasters: &RasterCache) {
    surface.clear();
    surface.fill(color);
    if let Some(raster) = image_src.and_then(|src| rasters.get(src)) {
        let full = Rect::new(0.0, 0.0, f64::from(surface.width()), f64::from(surface.height()));
        surface.draw_raster(raster, full);
    }
}

/// Draw elements in slice order (bottom first).
pub fn draw_elements(surface: &mut Surface, elements: &[Element], fonts: &FontBook, rasters: &RasterCache) {
    for el in elements {
        draw_element(surface, el, fonts, rasters);
    }
}

pub fn draw_element(surface: &mut Surface, el: &Element, fonts: &FontBook, rasters: &RasterCache) {
    match el {
        Element::Text(t) => draw_text(surface, t, fonts),
        Element::Button(b) => draw_button(surface, b, fonts),
        Element::Image(i) => draw_image(surface, i, rasters),
    }
}

fn draw_text(surface: &mut Surface, t: &TextElement, fonts: &FontBook) {
    let Some(line) = fonts.layout_line(&t.text, &t.font, t.size, t.bold) else {
        trace!(id = %t.id, "no font face; text skipped");
        return;
    };
    let left = t.bounds().x;
    surface.fill_text(&line, left, t.y, &t.color);
}

fn draw_button(surface: &mut Surface, b: &ButtonElement, fonts: &FontBook) {
    surface.fill_round_rect(b.bounds(), b.radius, &b.bg_color);
    draw_text(surface, &b.text_element, fonts);
}

fn draw_image(surface: &mut Surface, i: &ImageElement, rasters: &RasterCache) {
    match rasters.get(&i.src) {
        Some(raster) => surface.draw_raster(raster, i.bounds()),
        None => trace!(id = %i.id, "raster not loaded; image skipped"),
    }
}

/// Dashed callout outline around an element, inflated by a fixed margin.
pub fn draw_selection(surface: &mut Surface, el: &Element) {
    let outline = el.bounds().inflate(SELECTION_MARGIN_PX);
    surface.stroke_dashed_rect(outline, SELECTION_COLOR, SELECTION_STROKE_PX, SELECTION_DASH_PX);
}

/// Render the scene at its canvas size without selection UI and encode as PNG.
///
/// # Errors
///
/// Returns `SurfaceAllocation` or `Encode` on failure.
pub fn export_png(scene: &Scene, rasters: &RasterCache) -> Result<Vec<u8>, CanvasError> {
    let (width, height) = scene.canvas_size().dimensions();
    let mut surface = Surface::new(width, height)?;
    draw_scene(&mut surface, scene, rasters, RenderOptions::export());
    surface.encode_png()
}
