/// Weighted transform selection tables.
pub mod transition;
