//! Pin design engine: element model, scene, undo/redo, pointer interaction,
//! raster rendering, and bulk generation from tabular data.
//!
//! The crate is host-agnostic. It owns the full lifecycle of a design:
//! translating pointer input into scene mutations, snapshotting the scene
//! into history, and drawing it onto an offscreen surface. The host supplies
//! fonts, fetches image bytes through an [`raster::AssetFetcher`], and reacts
//! to the [`engine::Action`]s returned from every handler.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`element`] | Text, button, and image elements and their records |
//! | [`scene`] | Ordered element list, background, canvas size, selection |
//! | [`history`] | Linear undo/redo of scene snapshots |
//! | [`input`] | Pointer buttons and the drag state machine |
//! | [`hit`] | Topmost-element hit testing |
//! | [`geom`] | Points, rectangles, and display-to-canvas mapping |
//! | [`render`] | Scene drawing and single-image export |
//! | [`surface`] | `tiny-skia` pixmap wrapper and color parsing |
//! | [`fonts`] | Font lookup, measurement, and glyph layout |
//! | [`raster`] | Decoded images, the raster cache, and asset fetching |
//! | [`bulk`] | One rendered pin per tabular row |
//! | [`consts`] | Shared defaults and overlay constants |
//! | [`error`] | [`error::CanvasError`] |

pub mod bulk;
pub mod consts;
pub mod element;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod geom;
pub mod hit;
pub mod history;
pub mod input;
pub mod raster;
pub mod render;
pub mod scene;
pub mod surface;

pub use element::{Element, ElementId, ElementKind, ElementPatch, PatchTarget};
pub use error::CanvasError;
pub use scene::{CanvasSize, Scene, SceneRecord};
