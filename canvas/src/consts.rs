//! Shared numeric constants for the canvas crate.

// ── Selection overlay ───────────────────────────────────────────

/// Gap between an element's bounds and its dashed selection outline, in canvas pixels.
pub const SELECTION_MARGIN_PX: f64 = 6.0;

/// Stroke width of the selection outline, in canvas pixels.
pub const SELECTION_STROKE_PX: f64 = 3.0;

/// Dash segment length of the selection outline, in canvas pixels.
pub const SELECTION_DASH_PX: f64 = 10.0;

/// Callout color used for the selection outline.
pub const SELECTION_COLOR: &str = "#1E90FF";

// ── Element defaults ────────────────────────────────────────────

pub const DEFAULT_FONT: &str = "Arial";
pub const DEFAULT_TEXT_SIZE: f64 = 48.0;
pub const DEFAULT_TEXT_COLOR: &str = "#000000";
pub const DEFAULT_BUTTON_BG: &str = "#E60023";
pub const DEFAULT_BUTTON_TEXT_COLOR: &str = "#FFFFFF";
pub const DEFAULT_BUTTON_PADDING: f64 = 20.0;
pub const DEFAULT_BUTTON_RADIUS: f64 = 12.0;
pub const DEFAULT_IMAGE_SIZE: f64 = 400.0;
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";

// ── Ids ─────────────────────────────────────────────────────────

/// Largest element id accepted from a record: 2^53 - 1, the largest integer a
/// JSON number holds exactly in a browser client.
pub const MAX_ELEMENT_ID: u64 = (1 << 53) - 1;

// ── Text metrics ────────────────────────────────────────────────

/// Advance per character (in em) when no font face can be resolved.
pub const FALLBACK_ADVANCE_EM: f64 = 0.55;

/// Bold advance per character (in em) when no font face can be resolved.
pub const FALLBACK_BOLD_ADVANCE_EM: f64 = 0.6;

// ── History ─────────────────────────────────────────────────────

/// Maximum number of snapshots kept before the oldest is dropped.
pub const HISTORY_CAPACITY: usize = 100;

// ── Raster decoding ─────────────────────────────────────────────

/// Largest width or height accepted when decoding an image.
pub const MAX_RASTER_DIMENSION: u32 = 8192;

/// Largest allocation the decoder may make for one image, in bytes.
pub const MAX_RASTER_ALLOC_BYTES: u64 = 256 * 1024 * 1024;
