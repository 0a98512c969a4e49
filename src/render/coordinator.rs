use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::Rng;
use rayon::prelude::*;

use crate::accum::buffer::{AccumulationBuffer, Raster};
use crate::foundation::core::RasterSize;
use crate::foundation::error::{FlameError, FlameResult};
use crate::iterate::engine::{
    Checkpoint, IterationEngine, IterationObserver, IterationPass, PassConfig, WorkerExit,
};
use crate::random::source::PcgRandom;
use crate::scene::flame::Flame;

/// Options for one render pass.
#[derive(Clone, Default)]
pub struct RenderOpts {
    /// Worker count; `None` uses the available parallelism.
    pub workers: Option<usize>,
    /// Total samples over all workers; `None` derives it from the flame's sample density.
    pub sample_budget: Option<u64>,
    /// Pass seed; `None` draws one from the thread-local entropy source.
    pub seed: Option<u64>,
    /// Table resolution and fuse iterations.
    pub config: PassConfig,
    /// Receives every touched cell, for progressive preview.
    pub observer: Option<Arc<dyn IterationObserver>>,
}

impl std::fmt::Debug for RenderOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOpts")
            .field("workers", &self.workers)
            .field("sample_budget", &self.sample_budget)
            .field("seed", &self.seed)
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Outcome of a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// Every worker reached its budget or stalled.
    Completed,
    /// Cancelled; the raster holds a partial result.
    Cancelled,
    /// Stopped for checkpointing.
    Suspended,
    /// A worker failed; the raster holds whatever was accumulated before.
    Failed(String),
}

/// Final state of a pass.
#[derive(Clone, Debug)]
pub struct RenderReport {
    /// How the pass ended.
    pub status: RenderStatus,
    /// Iterations run by all workers, including earlier suspended segments.
    pub samples_done: u64,
    /// Workers that stopped on a transform without outgoing transitions.
    pub stalled_workers: usize,
    /// Wall time of this segment.
    pub elapsed: Duration,
    /// Accumulated raster.
    pub raster: Raster,
}

/// A stopped pass that can be continued with [`RenderCoordinator::resume`].
#[derive(Debug)]
pub struct SuspendedPass {
    checkpoints: Vec<Checkpoint>,
    buffer: Arc<AccumulationBuffer>,
    seed: u64,
    config: PassConfig,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SuspendedPassFile {
    seed: u64,
    table_resolution: usize,
    fuse_iterations: usize,
    raster: RasterSize,
    checkpoints: Vec<Checkpoint>,
    cells: Vec<[u64; 4]>,
}

impl SuspendedPass {
    /// Build a suspended pass from externally stored checkpoints and a buffer.
    pub fn new(
        checkpoints: Vec<Checkpoint>,
        buffer: Arc<AccumulationBuffer>,
        seed: u64,
        config: PassConfig,
    ) -> Self {
        Self {
            checkpoints,
            buffer,
            seed,
            config,
        }
    }

    /// One checkpoint per worker, ordered by worker slot.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Raster accumulated so far.
    pub fn snapshot(&self) -> Raster {
        self.buffer.snapshot()
    }

    /// Iterations completed by all workers.
    pub fn samples_done(&self) -> u64 {
        self.checkpoints.iter().map(|c| c.sample_index).sum()
    }

    /// Seed of the suspended pass.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Write checkpoints and the exact buffer contents as JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> FlameResult<()> {
        let file = SuspendedPassFile {
            seed: self.seed,
            table_resolution: self.config.table_resolution,
            fuse_iterations: self.config.fuse_iterations,
            raster: self.buffer.size(),
            checkpoints: self.checkpoints.clone(),
            cells: self.buffer.raw_cells(),
        };
        serde_json::to_writer(writer, &file)
            .map_err(|e| FlameError::serde(format!("write suspended pass: {e}")))
    }

    /// Read a pass written by [`SuspendedPass::write_json`].
    pub fn read_json<R: Read>(reader: R) -> FlameResult<Self> {
        let file: SuspendedPassFile = serde_json::from_reader(reader)
            .map_err(|e| FlameError::serde(format!("read suspended pass: {e}")))?;
        let buffer = AccumulationBuffer::from_raw(file.raster, &file.cells)?;
        Ok(Self {
            checkpoints: file.checkpoints,
            buffer: Arc::new(buffer),
            seed: file.seed,
            config: PassConfig {
                table_resolution: file.table_resolution,
                fuse_iterations: file.fuse_iterations,
            },
        })
    }
}

struct WorkerOutcome {
    exit: Result<WorkerExit, String>,
    checkpoint: Checkpoint,
}

/// Entry points that start and resume render passes.
///
/// Workers always draw from [`PcgRandom`] streams so their state can be checkpointed.
/// Other [`RandomSource`](crate::random::source::RandomSource) implementations plug in
/// by driving an [`IterationEngine`] directly.
#[derive(Debug)]
pub struct RenderCoordinator;

impl RenderCoordinator {
    /// Validate `flame`, split the budget and start the workers in the background.
    ///
    /// Configuration errors are returned before any worker starts.
    #[tracing::instrument(skip(flame, opts), fields(workers = ?opts.workers, budget = ?opts.sample_budget))]
    pub fn start(flame: Arc<Flame>, opts: RenderOpts) -> FlameResult<RenderHandle> {
        let workers = match opts.workers {
            Some(0) => return Err(FlameError::validation("worker count must be >= 1")),
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };
        flame.validate()?;
        let budget = match opts.sample_budget {
            Some(b) => b,
            None => flame.default_sample_budget()?,
        };
        let seed = opts.seed.unwrap_or_else(|| rand::rng().random());

        let buffer = Arc::new(AccumulationBuffer::new(flame.raster_size()?));
        let pass = Arc::new(IterationPass::new(flame, opts.config, buffer, opts.observer)?);

        let engines = split_budget(budget, workers)
            .into_iter()
            .enumerate()
            .map(|(worker, share)| {
                IterationEngine::new(
                    worker,
                    Arc::clone(&pass),
                    PcgRandom::for_worker(seed, worker),
                    share,
                )
            })
            .collect();

        tracing::info!(workers, budget, seed, "render pass started");
        RenderHandle::spawn(pass, engines, seed, opts.config)
    }

    /// Start, then block until the pass ends.
    pub fn render(flame: Arc<Flame>, opts: RenderOpts) -> FlameResult<RenderReport> {
        Self::start(flame, opts)?.wait()
    }

    /// Continue `suspended` against `flame` toward each worker's original budget.
    ///
    /// Checkpoints carrying generator state continue bit-identically; the others
    /// continue on a stream derived from the pass seed, worker and sample index.
    #[tracing::instrument(skip_all, fields(workers = suspended.checkpoints.len()))]
    pub fn resume(
        flame: Arc<Flame>,
        suspended: SuspendedPass,
        observer: Option<Arc<dyn IterationObserver>>,
    ) -> FlameResult<RenderHandle> {
        if suspended.checkpoints.is_empty() {
            return Err(FlameError::state_mismatch("no checkpoints to resume"));
        }
        let SuspendedPass {
            checkpoints,
            buffer,
            seed,
            config,
        } = suspended;
        let pass = Arc::new(IterationPass::new(flame, config, buffer, observer)?);

        let mut engines = Vec::with_capacity(checkpoints.len());
        for checkpoint in &checkpoints {
            let rng = match &checkpoint.rng {
                Some(state) => PcgRandom::from_state(state.clone()),
                None => PcgRandom::for_worker(
                    seed.wrapping_add(checkpoint.sample_index),
                    checkpoint.worker,
                ),
            };
            engines.push(IterationEngine::from_checkpoint(
                Arc::clone(&pass),
                checkpoint,
                rng,
            )?);
        }
        pass.record_progress(checkpoints.iter().map(|c| c.sample_index).sum());

        tracing::info!(
            workers = engines.len(),
            samples_done = pass.samples_done(),
            "render pass resumed"
        );
        RenderHandle::spawn(pass, engines, seed, config)
    }
}

/// Running pass. Dropping the handle cancels the pass and joins its workers.
pub struct RenderHandle {
    pass: Arc<IterationPass>,
    seed: u64,
    config: PassConfig,
    started: Instant,
    driver: Option<JoinHandle<Vec<WorkerOutcome>>>,
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("pass", &self.pass)
            .field("seed", &self.seed)
            .field("running", &self.driver.is_some())
            .finish()
    }
}

impl RenderHandle {
    fn spawn(
        pass: Arc<IterationPass>,
        engines: Vec<IterationEngine<PcgRandom>>,
        seed: u64,
        config: PassConfig,
    ) -> FlameResult<Self> {
        let pool = build_thread_pool(engines.len())?;
        let control = Arc::clone(&pass);
        let driver = std::thread::Builder::new()
            .name("flamerender-driver".to_string())
            .spawn(move || {
                pool.install(|| {
                    engines
                        .into_par_iter()
                        .with_max_len(1)
                        .map(|engine| run_worker(engine, &control))
                        .collect()
                })
            })
            .map_err(|e| FlameError::evaluation(format!("failed to spawn driver thread: {e}")))?;
        Ok(Self {
            pass,
            seed,
            config,
            started: Instant::now(),
            driver: Some(driver),
        })
    }

    /// Request a cooperative stop; workers finish their current iteration.
    pub fn cancel(&self) {
        self.pass.control().cancel();
    }

    /// Progressive preview of the raster.
    pub fn snapshot(&self) -> Raster {
        self.pass.buffer().snapshot()
    }

    /// Iterations reported so far.
    pub fn samples_done(&self) -> u64 {
        self.pass.samples_done()
    }

    /// Return `true` once every worker has stopped.
    pub fn is_finished(&self) -> bool {
        self.driver.as_ref().is_none_or(|d| d.is_finished())
    }

    /// Block until the pass ends.
    pub fn wait(mut self) -> FlameResult<RenderReport> {
        let outcomes = self.join()?;

        let mut status = RenderStatus::Completed;
        let mut stalled_workers = 0;
        for outcome in &outcomes {
            match &outcome.exit {
                Err(msg) => status = RenderStatus::Failed(msg.clone()),
                Ok(WorkerExit::Stalled) => stalled_workers += 1,
                Ok(WorkerExit::Cancelled) if !matches!(status, RenderStatus::Failed(_)) => {
                    status = RenderStatus::Cancelled
                }
                Ok(WorkerExit::Suspended) if status == RenderStatus::Completed => {
                    status = RenderStatus::Suspended
                }
                Ok(_) => {}
            }
        }

        let elapsed = self.started.elapsed();
        let samples_done = self.pass.samples_done();
        tracing::info!(
            status = ?status,
            samples_done,
            stalled_workers,
            elapsed_ms = elapsed.as_millis() as u64,
            "render pass finished"
        );
        Ok(RenderReport {
            status,
            samples_done,
            stalled_workers,
            elapsed,
            raster: self.pass.buffer().snapshot(),
        })
    }

    /// Stop every worker at its next iteration boundary and export their checkpoints.
    ///
    /// Workers that already finished contribute their final checkpoint.
    pub fn suspend(mut self) -> FlameResult<SuspendedPass> {
        self.pass.control().suspend();
        let outcomes = self.join()?;
        if let Some(msg) = outcomes.iter().find_map(|o| o.exit.as_ref().err()) {
            return Err(FlameError::evaluation(format!(
                "cannot suspend a failed pass: {msg}"
            )));
        }
        let mut checkpoints: Vec<Checkpoint> =
            outcomes.into_iter().map(|o| o.checkpoint).collect();
        checkpoints.sort_by_key(|c| c.worker);
        tracing::info!(
            workers = checkpoints.len(),
            samples_done = self.pass.samples_done(),
            "render pass suspended"
        );
        Ok(SuspendedPass {
            checkpoints,
            buffer: Arc::clone(self.pass.buffer()),
            seed: self.seed,
            config: self.config,
        })
    }

    fn join(&mut self) -> FlameResult<Vec<WorkerOutcome>> {
        let driver = self
            .driver
            .take()
            .ok_or_else(|| FlameError::evaluation("render pass was already joined"))?;
        driver
            .join()
            .map_err(|_| FlameError::evaluation("render driver thread panicked"))
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            self.pass.control().cancel();
            let _ = driver.join();
        }
    }
}

fn run_worker(mut engine: IterationEngine<PcgRandom>, pass: &IterationPass) -> WorkerOutcome {
    let worker = engine.worker();
    let exit = catch_unwind(AssertUnwindSafe(|| engine.run())).map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string());
        format!("worker {worker}: {msg}")
    });

    match &exit {
        Ok(WorkerExit::Stalled) => tracing::warn!(
            worker,
            samples = engine.sample_index(),
            "worker stalled on a transform without successors"
        ),
        Ok(kind) => tracing::debug!(worker, samples = engine.sample_index(), exit = ?kind, "worker stopped"),
        Err(msg) => {
            tracing::warn!(worker, error = %msg, "worker failed");
            pass.control().cancel();
        }
    }
    WorkerOutcome {
        exit,
        checkpoint: engine.checkpoint(),
    }
}

fn split_budget(budget: u64, workers: usize) -> Vec<u64> {
    let n = workers as u64;
    let base = budget / n;
    let extra = budget % n;
    (0..n).map(|i| base + u64::from(i < extra)).collect()
}

fn build_thread_pool(threads: usize) -> FlameResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(FlameError::validation("worker count must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("flamerender-worker-{i}"))
        .build()
        .map_err(|e| FlameError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/coordinator.rs"]
mod tests;
