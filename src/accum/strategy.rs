use std::sync::Arc;

use crate::accum::buffer::AccumulationBuffer;
use crate::accum::kernel::BlurKernel;
use crate::foundation::core::Rgb;
use crate::foundation::error::FlameResult;
use crate::foundation::math::{q16_mul, to_q16};
use crate::scene::flame::Shading;

/// Where in its budget a worker is when it plots a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplePhase {
    /// Zero-based index of the sample within the worker's budget.
    pub index: u64,
    /// The worker's total budget.
    pub budget: u64,
}

/// How a plotted sample is written into the buffer.
///
/// Selected once per pass. `notify` receives `(row, col)` for every touched cell.
pub trait AccumulationStrategy: Send + Sync + std::fmt::Debug {
    /// Add `color` at cell `(row, col)`, which must lie inside the buffer.
    fn accumulate(
        &self,
        buffer: &AccumulationBuffer,
        row: usize,
        col: usize,
        color: Rgb,
        phase: SamplePhase,
        notify: &mut dyn FnMut(usize, usize),
    );
}

/// One sample adds to exactly one cell.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainCell;

impl AccumulationStrategy for PlainCell {
    fn accumulate(
        &self,
        buffer: &AccumulationBuffer,
        row: usize,
        col: usize,
        color: Rgb,
        _phase: SamplePhase,
        notify: &mut dyn FnMut(usize, usize),
    ) {
        plot_cell(buffer, row, col, color);
        notify(row, col);
    }
}

/// Early samples spread across a kernel; the rest fall back to [`PlainCell`].
#[derive(Clone, Debug)]
pub struct KernelSpread {
    kernel: BlurKernel,
    fade: f64,
}

impl KernelSpread {
    /// Spread with `kernel` while `index < (1 - fade) * budget`; `fade` is clamped to `[0, 1]`.
    pub fn new(kernel: BlurKernel, fade: f64) -> Self {
        Self {
            kernel,
            fade: fade.clamp(0.0, 1.0),
        }
    }

    /// Number of leading samples that get spread for a worker with `budget` samples.
    pub fn blur_samples(&self, budget: u64) -> u64 {
        ((1.0 - self.fade) * budget as f64) as u64
    }
}

impl AccumulationStrategy for KernelSpread {
    fn accumulate(
        &self,
        buffer: &AccumulationBuffer,
        row: usize,
        col: usize,
        color: Rgb,
        phase: SamplePhase,
        notify: &mut dyn FnMut(usize, usize),
    ) {
        if phase.index >= self.blur_samples(phase.budget) {
            plot_cell(buffer, row, col, color);
            notify(row, col);
            return;
        }

        let size = buffer.size();
        let r = self.kernel.radius() as i64;
        let rgb = [to_q16(color.r), to_q16(color.g), to_q16(color.b)];
        for ky in 0..self.kernel.side() {
            let y = row as i64 - r + ky as i64;
            for kx in 0..self.kernel.side() {
                let x = col as i64 - r + kx as i64;
                let Some(index) = size.index(y, x) else {
                    continue;
                };
                let w = self.kernel.weight(ky, kx);
                buffer.add(
                    index,
                    [q16_mul(rgb[0], w), q16_mul(rgb[1], w), q16_mul(rgb[2], w)],
                    1,
                );
                notify(y as usize, x as usize);
            }
        }
    }
}

fn plot_cell(buffer: &AccumulationBuffer, row: usize, col: usize, color: Rgb) {
    if let Some(index) = buffer.size().index(row as i64, col as i64) {
        buffer.add(index, [to_q16(color.r), to_q16(color.g), to_q16(color.b)], 1);
    }
}

/// Strategy for `shading`: kernel spread when `blur_radius > 0`, otherwise plain cells.
pub fn strategy_for(shading: &Shading) -> FlameResult<Arc<dyn AccumulationStrategy>> {
    if shading.blur_radius == 0 {
        return Ok(Arc::new(PlainCell));
    }
    let kernel = BlurKernel::gaussian(shading.blur_radius, shading.blur_falloff)?;
    Ok(Arc::new(KernelSpread::new(kernel, shading.blur_fade)))
}

#[cfg(test)]
#[path = "../../tests/unit/accum/strategy.rs"]
mod tests;
