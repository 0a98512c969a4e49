//! Flame description: the JSON boundary model and the immutable snapshot built from it.

/// JSON document parsing and building.
pub mod document;
/// Immutable flame snapshot types.
pub mod flame;
pub(crate) mod model;
/// Variation capability and built-in catalog.
pub mod variation;
