//! Per-worker random streams.

/// Random source trait and the PCG-backed implementation.
pub mod source;
