//! Boundary collaborators used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! The canvas crate treats tabular parsing, image fetching, and archiving as
//! external. These modules supply them so route handlers can stay focused on
//! protocol translation.

pub mod archive;
pub mod assets;
pub mod tabular;
