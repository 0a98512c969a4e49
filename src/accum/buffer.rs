use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::RasterSize;
use crate::foundation::error::{FlameError, FlameResult};
use crate::foundation::math::q16_to_f64;

#[derive(Debug, Default)]
struct AtomicCell {
    red: AtomicU64,
    green: AtomicU64,
    blue: AtomicU64,
    count: AtomicU64,
}

/// Shared raster of per-cell color sums and hit counts.
///
/// Channels are Q16 integers updated with atomic adds, so concurrent contributions
/// commute exactly and the result does not depend on worker interleaving.
#[derive(Debug)]
pub struct AccumulationBuffer {
    size: RasterSize,
    cells: Vec<AtomicCell>,
}

impl AccumulationBuffer {
    /// Zeroed buffer of `size` cells.
    pub fn new(size: RasterSize) -> Self {
        let cells = (0..size.cell_count())
            .map(|_| AtomicCell::default())
            .collect();
        Self { size, cells }
    }

    /// Buffer restored from [`AccumulationBuffer::raw_cells`] output.
    pub fn from_raw(size: RasterSize, raw: &[[u64; 4]]) -> FlameResult<Self> {
        if raw.len() != size.cell_count() {
            return Err(FlameError::state_mismatch(format!(
                "saved buffer has {} cells, raster needs {}",
                raw.len(),
                size.cell_count()
            )));
        }
        let cells = raw
            .iter()
            .map(|&[r, g, b, n]| AtomicCell {
                red: AtomicU64::new(r),
                green: AtomicU64::new(g),
                blue: AtomicU64::new(b),
                count: AtomicU64::new(n),
            })
            .collect();
        Ok(Self { size, cells })
    }

    /// Raster dimensions.
    pub fn size(&self) -> RasterSize {
        self.size
    }

    /// Exact fixed-point contents as `[red, green, blue, count]` per cell.
    pub fn raw_cells(&self) -> Vec<[u64; 4]> {
        self.cells
            .iter()
            .map(|c| {
                [
                    c.red.load(Ordering::Relaxed),
                    c.green.load(Ordering::Relaxed),
                    c.blue.load(Ordering::Relaxed),
                    c.count.load(Ordering::Relaxed),
                ]
            })
            .collect()
    }

    /// Add a Q16 color and `hits` to cell `index`.
    pub(crate) fn add(&self, index: usize, rgb: [u64; 3], hits: u64) {
        let cell = &self.cells[index];
        cell.red.fetch_add(rgb[0], Ordering::Relaxed);
        cell.green.fetch_add(rgb[1], Ordering::Relaxed);
        cell.blue.fetch_add(rgb[2], Ordering::Relaxed);
        cell.count.fetch_add(hits, Ordering::Relaxed);
    }

    /// Copy the current contents. Consistent once every worker has stopped;
    /// while workers run it is a progressive preview.
    pub fn snapshot(&self) -> Raster {
        let cells = self
            .cells
            .iter()
            .map(|c| RasterCell {
                red: q16_to_f64(c.red.load(Ordering::Relaxed)),
                green: q16_to_f64(c.green.load(Ordering::Relaxed)),
                blue: q16_to_f64(c.blue.load(Ordering::Relaxed)),
                count: c.count.load(Ordering::Relaxed),
            })
            .collect();
        Raster {
            size: self.size,
            cells,
        }
    }
}

/// Accumulated color sums and hit count of one raster cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RasterCell {
    /// Sum of red contributions.
    pub red: f64,
    /// Sum of green contributions.
    pub green: f64,
    /// Sum of blue contributions.
    pub blue: f64,
    /// Number of contributions.
    pub count: u64,
}

/// Point-in-time copy of an [`AccumulationBuffer`].
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    size: RasterSize,
    cells: Vec<RasterCell>,
}

impl Raster {
    /// Raster dimensions.
    pub fn size(&self) -> RasterSize {
        self.size
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[RasterCell] {
        &self.cells
    }

    /// Cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&RasterCell> {
        self.size
            .index(row as i64, col as i64)
            .map(|i| &self.cells[i])
    }

    /// Sum of all hit counts.
    pub fn total_count(&self) -> u64 {
        self.cells.iter().map(|c| c.count).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/accum/buffer.rs"]
mod tests;
