use crate::foundation::error::{FlameError, FlameResult};
use crate::foundation::math::Q16_ONE;

/// Square blur kernel in Q16, built as the outer product of a normalized 1D profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlurKernel {
    radius: usize,
    weights: Vec<u32>,
}

impl BlurKernel {
    /// Kernel of side `2 * radius + 1` with profile `exp(-falloff * (i / radius)^2)`.
    ///
    /// `falloff == 0` yields a box kernel.
    pub fn gaussian(radius: u32, falloff: f64) -> FlameResult<Self> {
        let line = gaussian_kernel_q16(radius, falloff)?;
        let side = line.len();
        let mut weights = Vec::with_capacity(side * side);
        for &wy in &line {
            for &wx in &line {
                let w = (u64::from(wy) * u64::from(wx) + (1 << 15)) >> 16;
                weights.push(w as u32);
            }
        }
        Ok(Self {
            radius: radius as usize,
            weights,
        })
    }

    /// Kernel radius in cells.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Kernel side length (`2 * radius + 1`).
    pub fn side(&self) -> usize {
        2 * self.radius + 1
    }

    /// Q16 weight at kernel row `ky`, column `kx`.
    pub fn weight(&self, ky: usize, kx: usize) -> u32 {
        self.weights[ky * self.side() + kx]
    }

    /// Sum of all weights, in Q16.
    pub fn total(&self) -> u64 {
        self.weights.iter().map(|&w| u64::from(w)).sum()
    }
}

fn gaussian_kernel_q16(radius: u32, falloff: f64) -> FlameResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![Q16_ONE]);
    }
    if !falloff.is_finite() || falloff < 0.0 {
        return Err(FlameError::validation("blur falloff must be >= 0"));
    }

    let r = radius as i64;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let t = i as f64 / r as f64;
        let w = (-falloff * t * t).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(FlameError::evaluation("blur kernel sum is zero"));
    }

    let one = i64::from(Q16_ONE);
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * one as f64).round() as i64;
        let q = q.clamp(0, one);
        weights.push(q as u32);
        acc += q;
    }
    let delta = one - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, one) as u32;
    }

    Ok(weights)
}

#[cfg(test)]
#[path = "../../tests/unit/accum/kernel.rs"]
mod tests;
