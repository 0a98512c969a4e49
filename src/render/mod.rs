//! Render passes: worker coordination and tone mapping.

/// Worker pool, pass lifecycle and checkpoints.
pub mod coordinator;
/// Density to pixel conversion.
pub mod tonemap;
