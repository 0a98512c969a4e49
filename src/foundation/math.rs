/// Smallest magnitude treated as non-zero by camera and antialias math.
pub const EPSILON: f64 = 1.0e-6;

/// One in Q16 fixed point.
pub(crate) const Q16_ONE: u32 = 1 << 16;

/// Quintic smoothstep (`6t^5 - 15t^4 + 10t^3`) with zero first and second derivatives at both
/// edges.
pub fn smootherstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Quantize a non-negative channel value to Q16. Negative and non-finite input maps to zero.
pub(crate) fn to_q16(v: f64) -> u64 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    (v * f64::from(Q16_ONE)).round() as u64
}

/// Scale a Q16 value by a Q16 weight, rounding to nearest.
pub(crate) fn q16_mul(v: u64, w: u32) -> u64 {
    v.saturating_mul(u64::from(w)).saturating_add(1 << 15) >> 16
}

pub(crate) fn q16_to_f64(v: u64) -> f64 {
    v as f64 / f64::from(Q16_ONE)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
