//! Input model: pointer buttons and the drag state machine.
//!
//! `InputState` is the gesture tracked between pointer-down and pointer-up.
//! It holds only the dragged element's id, never a reference into the scene.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::element::ElementId;
use crate::geom::Point;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// An element is following the pointer.
    Dragging {
        /// Id of the element being dragged.
        id: ElementId,
        /// Pointer position minus element anchor at pointer-down, in canvas pixels.
        offset: Point,
    },
}

impl InputState {
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    /// Id of the dragged element, if a drag is in progress.
    #[must_use]
    pub fn dragged_id(&self) -> Option<ElementId> {
        match self {
            Self::Dragging { id, .. } => Some(*id),
            Self::Idle => None,
        }
    }
}
