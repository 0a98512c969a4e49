//! Camera projection from flame space to raster cells.

/// Depth-of-field blur shapes.
pub mod dof;
/// Camera projection.
pub mod projection;
