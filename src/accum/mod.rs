//! Shared density accumulation.

/// Atomic accumulation buffer and raster snapshots.
pub mod buffer;
/// Spread kernels.
pub mod kernel;
/// Per-sample accumulation strategies.
pub mod strategy;
