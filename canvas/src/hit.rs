#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::element::ElementId;
use crate::geom::Point;
use crate::scene::Scene;

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub element_id: ElementId,
    /// Anchor of the hit element, used to compute the drag offset.
    pub anchor: Point,
}

/// Find the topmost element under `canvas_pt`. Later elements draw on top, so
/// the scan runs in reverse z-order.
#[must_use]
pub fn hit_test(canvas_pt: Point, scene: &Scene) -> Option<Hit> {
    scene
        .elements()
        .iter()
        .rev()
        .find(|el| el.is_hit(canvas_pt))
        .map(|el| Hit { element_id: el.id(), anchor: el.position() })
}
