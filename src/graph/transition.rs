use crate::foundation::error::{FlameError, FlameResult};
use crate::random::source::RandomSource;
use crate::scene::flame::Transform;

/// Slots per row unless configured otherwise.
pub const DEFAULT_TABLE_RESOLUTION: usize = 100;

/// Index of a transform in its flame's transform list.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TransformId(pub usize);

/// Precomputed successor lookup: one row per predecessor transform, `resolution` slots per row.
///
/// A uniform slot draw maps to the next transform in O(1). `None` slots mark rows whose
/// successor weights sum to zero; such a row cannot extend a chain.
#[derive(Clone, Debug)]
pub struct TransitionTable {
    resolution: usize,
    rows: usize,
    slots: Vec<Option<TransformId>>,
}

impl TransitionTable {
    /// Build the table for `transforms`.
    ///
    /// Row `k` distributes its slots over successors `i` in proportion to
    /// `weight[i] * transforms[k].mod_weight(i)`.
    #[tracing::instrument(skip(transforms), fields(transforms = transforms.len()))]
    pub fn build(transforms: &[Transform], resolution: usize) -> FlameResult<Self> {
        if resolution == 0 {
            return Err(FlameError::validation(
                "transition table resolution must be > 0",
            ));
        }
        let n = transforms.len();
        let mut slots = Vec::with_capacity(n.saturating_mul(resolution));
        let mut tp = vec![0.0f64; n];

        for from in transforms {
            let mut total = 0.0;
            for (i, to) in transforms.iter().enumerate() {
                tp[i] = to.weight * from.mod_weight(i);
                total += tp[i];
            }

            let last_live = tp.iter().rposition(|&w| w > 0.0);
            let Some(last_live) = last_live.filter(|_| total > 0.0) else {
                slots.extend(std::iter::repeat_n(None, resolution));
                continue;
            };

            let mut j = 0usize;
            let mut cum = tp[0];
            for slot in 0..resolution {
                let pointer = slot as f64 * total / resolution as f64;
                while cum <= pointer && j < last_live {
                    j += 1;
                    cum += tp[j];
                }
                slots.push(Some(TransformId(j)));
            }
        }

        Ok(Self {
            resolution,
            rows: n,
            slots,
        })
    }

    /// Slots per row.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Number of rows (one per transform).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// All slots of row `from`.
    pub fn row(&self, from: TransformId) -> &[Option<TransformId>] {
        let start = from.0 * self.resolution;
        &self.slots[start..start + self.resolution]
    }

    /// Successor stored in `slot` of row `from`.
    pub fn lookup(&self, from: TransformId, slot: usize) -> Option<TransformId> {
        self.row(from)[slot % self.resolution]
    }

    /// Draw a successor of `from`.
    pub fn next(&self, from: TransformId, rng: &mut dyn RandomSource) -> Option<TransformId> {
        self.lookup(from, rng.random_index(self.resolution))
    }

    /// Return `true` when row `from` can extend a chain.
    pub fn is_live(&self, from: TransformId) -> bool {
        self.row(from)[0].is_some()
    }

    /// First transform whose row can extend a chain.
    pub fn first_live(&self) -> Option<TransformId> {
        (0..self.rows).map(TransformId).find(|&k| self.is_live(k))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/transition.rs"]
mod tests;
