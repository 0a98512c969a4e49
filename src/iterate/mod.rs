/// Per-worker chaos-game iteration.
pub mod engine;
