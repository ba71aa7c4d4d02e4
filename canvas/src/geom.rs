//! Rectangle and point math shared by hit-testing, layout, and the selection overlay.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// A point in either display or canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    #[must_use]
    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// Axis-aligned rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Edge-inclusive containment test.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }

    /// Grow the rectangle by `margin` on every side.
    #[must_use]
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::new(self.x - margin, self.y - margin, self.width + margin * 2.0, self.height + margin * 2.0)
    }
}

/// Mapping between the on-screen size of the canvas and its true pixel size.
///
/// The canvas is usually displayed scaled down (a 1000x1500 pin shown at
/// 400x600), so pointer coordinates must be scaled before hit-testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub display_width: f64,
    pub display_height: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Viewport {
    /// A viewport displayed at its native resolution.
    #[must_use]
    pub fn native(canvas_width: f64, canvas_height: f64) -> Self {
        Self { display_width: canvas_width, display_height: canvas_height, canvas_width, canvas_height }
    }

    /// Horizontal and vertical display-to-canvas ratios. Unknown display sizes map 1:1.
    #[must_use]
    pub fn scale(&self) -> (f64, f64) {
        let sx = if self.display_width > 0.0 { self.canvas_width / self.display_width } else { 1.0 };
        let sy = if self.display_height > 0.0 { self.canvas_height / self.display_height } else { 1.0 };
        (sx, sy)
    }

    /// Convert a display-space pointer position to canvas pixel space.
    #[must_use]
    pub fn to_canvas(&self, display: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(display.x * sx, display.y * sy)
    }
}
