use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::accum::buffer::AccumulationBuffer;
use crate::accum::strategy::{AccumulationStrategy, SamplePhase, strategy_for};
use crate::foundation::core::PointState;
use crate::foundation::error::{FlameError, FlameResult};
use crate::foundation::math::EPSILON;
use crate::graph::transition::{TransformId, TransitionTable};
use crate::random::source::{RandomSource, RngState};
use crate::scene::flame::{DrawMode, Flame, Transform};
use crate::scene::variation::VariationContext;
use crate::view::projection::ProjectionView;

/// Discarded iterations run before the first recorded sample unless configured otherwise.
pub const DEFAULT_FUSE_ITERATIONS: usize = 100;

/// Iterations between two updates of the shared progress counter.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Receives every raster cell a worker writes to.
pub trait IterationObserver: Send + Sync {
    /// Called after worker `worker` accumulated into cell `(row, col)`.
    fn notify_iteration_finished(&self, worker: usize, row: usize, col: usize);
}

/// Lifecycle of one [`IterationEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No chain yet; the next run seeds and fuses a point.
    Init,
    /// Producing samples.
    Running,
    /// Stopped between iterations; can be checkpointed and continued.
    Suspended,
    /// Budget reached or the chain hit a dead transition row.
    Done,
    /// Cancelled.
    Aborted,
}

/// Why a worker stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Sample budget reached.
    Completed,
    /// Cancellation observed.
    Cancelled,
    /// Suspension observed or the requested stop index was reached.
    Suspended,
    /// The current transform has no outgoing transition.
    Stalled,
}

const SIGNAL_RUN: u8 = 0;
const SIGNAL_CANCEL: u8 = 1;
const SIGNAL_SUSPEND: u8 = 2;

/// Stop request shared by the workers of a pass, checked before every iteration.
#[derive(Debug, Default)]
pub struct RenderControl {
    signal: AtomicU8,
}

impl RenderControl {
    /// Ask workers to stop; accumulated data is kept.
    pub fn cancel(&self) {
        self.signal.store(SIGNAL_CANCEL, Ordering::Release);
    }

    /// Ask workers to stop at the next iteration boundary so they can be checkpointed.
    /// Has no effect once cancellation was requested.
    pub fn suspend(&self) {
        let _ = self.signal.compare_exchange(
            SIGNAL_RUN,
            SIGNAL_SUSPEND,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Return `true` after [`RenderControl::cancel`].
    pub fn is_cancelled(&self) -> bool {
        self.signal.load(Ordering::Acquire) == SIGNAL_CANCEL
    }

    fn stop_request(&self) -> Option<WorkerExit> {
        match self.signal.load(Ordering::Acquire) {
            SIGNAL_CANCEL => Some(WorkerExit::Cancelled),
            SIGNAL_SUSPEND => Some(WorkerExit::Suspended),
            _ => None,
        }
    }
}

/// Per-pass tuning that does not belong to the flame itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassConfig {
    /// Slots per transition-table row.
    pub table_resolution: usize,
    /// Discarded iterations before the first sample.
    pub fuse_iterations: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            table_resolution: crate::graph::transition::DEFAULT_TABLE_RESOLUTION,
            fuse_iterations: DEFAULT_FUSE_ITERATIONS,
        }
    }
}

/// Read-only state shared by every worker of one render pass, plus the shared buffer.
pub struct IterationPass {
    flame: Arc<Flame>,
    table: TransitionTable,
    view: ProjectionView,
    strategy: Arc<dyn AccumulationStrategy>,
    buffer: Arc<AccumulationBuffer>,
    control: RenderControl,
    observer: Option<Arc<dyn IterationObserver>>,
    fuse_iterations: usize,
    progress: AtomicU64,
}

impl std::fmt::Debug for IterationPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationPass")
            .field("transforms", &self.flame.transforms.len())
            .field("raster", &self.buffer.size())
            .field("strategy", &self.strategy)
            .field("samples_done", &self.samples_done())
            .finish_non_exhaustive()
    }
}

impl IterationPass {
    /// Validate `flame` and precompute everything the workers share.
    ///
    /// `buffer` must match the flame's raster size; passing a buffer from an earlier
    /// pass continues accumulating into it.
    pub fn new(
        flame: Arc<Flame>,
        config: PassConfig,
        buffer: Arc<AccumulationBuffer>,
        observer: Option<Arc<dyn IterationObserver>>,
    ) -> FlameResult<Self> {
        flame.validate()?;
        let raster = flame.raster_size()?;
        if buffer.size() != raster {
            return Err(FlameError::state_mismatch(format!(
                "buffer is {}x{}, flame raster is {}x{}",
                buffer.size().width,
                buffer.size().height,
                raster.width,
                raster.height
            )));
        }
        let table = TransitionTable::build(&flame.transforms, config.table_resolution)?;
        if table.first_live().is_none() {
            return Err(FlameError::validation(
                "no transform has a reachable successor",
            ));
        }
        let view = ProjectionView::new(&flame, raster);
        let strategy = strategy_for(&flame.shading)?;
        Ok(Self {
            flame,
            table,
            view,
            strategy,
            buffer,
            control: RenderControl::default(),
            observer,
            fuse_iterations: config.fuse_iterations,
            progress: AtomicU64::new(0),
        })
    }

    /// Flame snapshot of this pass.
    pub fn flame(&self) -> &Arc<Flame> {
        &self.flame
    }

    /// Transition table of this pass.
    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Shared accumulation buffer.
    pub fn buffer(&self) -> &Arc<AccumulationBuffer> {
        &self.buffer
    }

    /// Stop switch observed by every worker.
    pub fn control(&self) -> &RenderControl {
        &self.control
    }

    /// Iterations reported so far by all workers (lags by up to [`PROGRESS_INTERVAL`] per worker).
    pub fn samples_done(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    pub(crate) fn record_progress(&self, samples: u64) {
        self.progress.fetch_add(samples, Ordering::Relaxed);
    }
}

/// Serializable state of one worker between two iterations.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    /// Worker slot.
    pub worker: usize,
    /// Current chain point.
    pub point: PointState,
    /// Transform that produced `point`; `None` before the first iteration or after a stall.
    pub transform: Option<TransformId>,
    /// Iterations completed so far.
    pub sample_index: u64,
    /// The worker's total budget.
    pub samples_target: u64,
    /// Generator state for bit-identical continuation.
    #[serde(default)]
    pub rng: Option<RngState>,
}

/// One worker's chaos-game loop.
pub struct IterationEngine<R: RandomSource> {
    worker: usize,
    pass: Arc<IterationPass>,
    rng: R,
    point: PointState,
    current: Option<TransformId>,
    sample_index: u64,
    budget: u64,
    reported: u64,
    state: EngineState,
}

impl<R: RandomSource> IterationEngine<R> {
    /// Fresh worker that will produce `budget` samples.
    pub fn new(worker: usize, pass: Arc<IterationPass>, rng: R, budget: u64) -> Self {
        Self {
            worker,
            pass,
            rng,
            point: PointState::default(),
            current: None,
            sample_index: 0,
            budget,
            reported: 0,
            state: EngineState::Init,
        }
    }

    /// Worker restored from `checkpoint`, drawing from `rng`.
    ///
    /// Fails with [`FlameError::StateMismatch`] when the checkpoint refers to a transform
    /// the pass's flame does not have.
    pub fn from_checkpoint(
        pass: Arc<IterationPass>,
        checkpoint: &Checkpoint,
        rng: R,
    ) -> FlameResult<Self> {
        let n = pass.flame.transforms.len();
        if let Some(id) = checkpoint.transform
            && id.0 >= n
        {
            return Err(FlameError::state_mismatch(format!(
                "worker {} checkpoint references transform {} but the flame has {n}",
                checkpoint.worker, id.0
            )));
        }
        if checkpoint.sample_index > checkpoint.samples_target {
            return Err(FlameError::state_mismatch(format!(
                "worker {} checkpoint is past its budget ({} > {})",
                checkpoint.worker, checkpoint.sample_index, checkpoint.samples_target
            )));
        }
        let state = if checkpoint.transform.is_none() && checkpoint.sample_index == 0 {
            EngineState::Init
        } else {
            EngineState::Suspended
        };
        Ok(Self {
            worker: checkpoint.worker,
            pass,
            rng,
            point: checkpoint.point,
            current: checkpoint.transform,
            sample_index: checkpoint.sample_index,
            budget: checkpoint.samples_target,
            reported: checkpoint.sample_index,
            state,
        })
    }

    /// Worker slot.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Iterations completed.
    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    /// Total budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Current chain point.
    pub fn point(&self) -> &PointState {
        &self.point
    }

    /// Run until the budget is exhausted or a stop is requested.
    pub fn run(&mut self) -> WorkerExit {
        self.run_until(u64::MAX)
    }

    /// Run until `stop_at` iterations are done, the budget is exhausted or a stop is
    /// requested, whichever comes first. Stopping at `stop_at` reports
    /// [`WorkerExit::Suspended`].
    pub fn run_until(&mut self, stop_at: u64) -> WorkerExit {
        match self.state {
            EngineState::Done if self.current.is_none() => return WorkerExit::Stalled,
            EngineState::Done => return WorkerExit::Completed,
            EngineState::Aborted => return WorkerExit::Cancelled,
            EngineState::Init => {
                if let Err(exit) = self.init() {
                    return self.finish(exit);
                }
            }
            EngineState::Running | EngineState::Suspended => {}
        }
        self.state = EngineState::Running;

        let limit = stop_at.min(self.budget);
        while self.sample_index < limit {
            if let Some(exit) = self.pass.control.stop_request() {
                return self.finish(exit);
            }
            if let Err(exit) = self.step() {
                return self.finish(exit);
            }
            self.sample_index += 1;
            if self.sample_index % PROGRESS_INTERVAL == 0 {
                self.flush_progress();
            }
        }

        if self.sample_index >= self.budget {
            self.finish(WorkerExit::Completed)
        } else {
            self.finish(WorkerExit::Suspended)
        }
    }

    /// Snapshot of the worker between two iterations.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            worker: self.worker,
            point: self.point,
            transform: self.current,
            sample_index: self.sample_index,
            samples_target: self.budget,
            rng: self.rng.state(),
        }
    }

    fn finish(&mut self, exit: WorkerExit) -> WorkerExit {
        self.flush_progress();
        self.state = match exit {
            WorkerExit::Completed => EngineState::Done,
            WorkerExit::Stalled => {
                self.current = None;
                EngineState::Done
            }
            WorkerExit::Cancelled => EngineState::Aborted,
            WorkerExit::Suspended => EngineState::Suspended,
        };
        exit
    }

    fn flush_progress(&mut self) {
        let delta = self.sample_index - self.reported;
        if delta > 0 {
            self.pass.record_progress(delta);
            self.reported = self.sample_index;
        }
    }

    fn init(&mut self) -> Result<(), WorkerExit> {
        let pass = &*self.pass;
        self.point = seed_point(&mut self.rng);
        let start = pass.table.first_live().ok_or(WorkerExit::Stalled)?;
        let mut ctx = VariationContext {
            rng: &mut self.rng,
            preserve_z: pass.flame.preserve_z,
        };
        self.point = pass.flame.transforms[start.0].apply(&mut ctx, &self.point);
        self.current = Some(start);

        let mut cur = start;
        for _ in 0..pass.fuse_iterations {
            let next = pass
                .table
                .next(cur, &mut self.rng)
                .ok_or(WorkerExit::Stalled)?;
            cur = next;
            let mut ctx = VariationContext {
                rng: &mut self.rng,
                preserve_z: pass.flame.preserve_z,
            };
            self.point = pass.flame.transforms[next.0].apply(&mut ctx, &self.point);
            self.current = Some(next);
            if !self.point.is_finite() {
                self.point = seed_point(&mut self.rng);
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), WorkerExit> {
        let pass = &*self.pass;
        let from = self.current.ok_or(WorkerExit::Stalled)?;
        let next = pass
            .table
            .next(from, &mut self.rng)
            .ok_or(WorkerExit::Stalled)?;
        self.current = Some(next);

        let xf = &pass.flame.transforms[next.0];
        let mut ctx = VariationContext {
            rng: &mut self.rng,
            preserve_z: pass.flame.preserve_z,
        };
        self.point = xf.apply(&mut ctx, &self.point);
        if !self.point.is_finite() {
            self.point = seed_point(&mut self.rng);
            return Ok(());
        }

        match xf.draw_mode {
            DrawMode::Hidden => return Ok(()),
            DrawMode::Opaque { opacity } if self.rng.random() > opacity => return Ok(()),
            _ => {}
        }

        let phase = SamplePhase {
            index: self.sample_index,
            budget: self.budget,
        };
        plot(pass, &mut self.rng, &self.point, xf, phase, self.worker);
        Ok(())
    }
}

fn seed_point(rng: &mut dyn RandomSource) -> PointState {
    let x = 2.0 * rng.random() - 1.0;
    let y = 2.0 * rng.random() - 1.0;
    PointState::new(x, y, 0.0, rng.random())
}

fn plot(
    pass: &IterationPass,
    rng: &mut dyn RandomSource,
    point: &PointState,
    xf: &Transform,
    phase: SamplePhase,
    worker: usize,
) {
    let flame = &*pass.flame;
    let projected = match &flame.final_transform {
        Some(fin) => {
            let mut ctx = VariationContext {
                rng: &mut *rng,
                preserve_z: flame.preserve_z,
            };
            let q = fin.apply(&mut ctx, point);
            pass.view.project(&q, rng)
        }
        None => pass.view.project(point, rng),
    };
    let Some(prj) = projected else {
        return;
    };

    let aa = flame.final_transform.as_ref().unwrap_or(xf);
    let (mut x, mut y) = (prj.x, prj.y);
    if aa.antialias_amount > EPSILON
        && aa.antialias_radius > EPSILON
        && rng.random() > 1.0 - aa.antialias_amount
    {
        let u = 1.0 - rng.random();
        let dr = (aa.antialias_radius * (-u.ln()).sqrt()).exp() - 1.0;
        let da = rng.random() * TAU;
        x += dr * da.cos();
        y += dr * da.sin();
    }
    let col = (x + 0.5).floor();
    let row = (y + 0.5).floor();
    if !(col.is_finite() && row.is_finite()) {
        return;
    }
    let size = pass.buffer.size();
    if size.index(row as i64, col as i64).is_none() {
        return;
    }

    let base = point.rgb.unwrap_or_else(|| flame.palette.lookup(point.color));
    let color = base.scaled(prj.intensity);

    let (row, col) = (row as usize, col as usize);
    match &pass.observer {
        Some(observer) => pass.strategy.accumulate(
            &pass.buffer,
            row,
            col,
            color,
            phase,
            &mut |r, c| observer.notify_iteration_finished(worker, r, c),
        ),
        None => pass
            .strategy
            .accumulate(&pass.buffer, row, col, color, phase, &mut |_, _| {}),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/iterate/engine.rs"]
mod tests;
