use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Uniform and discrete random draws consumed by one iteration worker.
///
/// Every worker owns its own source; sources are never shared across threads.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn random(&mut self) -> f64;

    /// Uniform discrete draw in `[0, n)`. Returns `0` when `n == 0`.
    fn random_index(&mut self, n: usize) -> usize;

    /// Internal generator state for exact resume, when the source supports capturing it.
    fn state(&self) -> Option<RngState> {
        None
    }
}

/// Serializable snapshot of a [`PcgRandom`] generator.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RngState(Pcg32);

/// PCG32-backed [`RandomSource`] with capturable state.
#[derive(Clone, Debug)]
pub struct PcgRandom {
    rng: Pcg32,
}

impl PcgRandom {
    /// Seeded generator on a fixed stream.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Generator for worker `worker` of a pass seeded with `seed`.
    ///
    /// Workers share the seed but draw from distinct PCG streams.
    pub fn for_worker(seed: u64, worker: usize) -> Self {
        Self {
            rng: Pcg32::new(seed, worker as u64),
        }
    }

    /// Generator seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::rng().random())
    }

    /// Restore a generator from a captured state.
    pub fn from_state(state: RngState) -> Self {
        Self { rng: state.0 }
    }
}

impl RandomSource for PcgRandom {
    fn random(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn random_index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.random_range(0..n)
    }

    fn state(&self) -> Option<RngState> {
        Some(RngState(self.rng.clone()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/random/source.rs"]
mod tests;
