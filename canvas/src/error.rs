//! Error type shared by every canvas operation.
//!
//! Variants split into three groups: local failures the caller is expected to
//! skip past (`UnknownKind`, `MalformedElement`), input validation
//! (`InvalidAttribute`, `UnknownCanvasSize`, `ElementNotFound`,
//! `IdOutOfRange`, `NoRows`), and batch-fatal conditions
//! (`SurfaceAllocation`, `Encode`, `Cancelled`).

use crate::element::ElementId;

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("unknown element kind: {0}")]
    UnknownKind(String),
    #[error("malformed element record: {0}")]
    MalformedElement(#[from] serde_json::Error),
    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },
    #[error("unknown canvas size: {0}")]
    UnknownCanvasSize(String),
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("element id {0} exceeds the largest supported id")]
    IdOutOfRange(ElementId),
    #[error("tabular source has no rows")]
    NoRows,
    #[error("failed to allocate {width}x{height} surface")]
    SurfaceAllocation { width: u32, height: u32 },
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("bulk generation cancelled after {completed} rows")]
    Cancelled { completed: usize },
}

impl CanvasError {
    /// Whether this error aborts a whole bulk batch rather than a single element or row.
    #[must_use]
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::SurfaceAllocation { .. } | Self::Encode(_) | Self::Cancelled { .. })
    }
}
