use std::sync::Mutex;

use super::*;
use crate::foundation::core::Affine;
use crate::random::source::PcgRandom;

fn sierpinski() -> Flame {
    let corners = [(-0.5, -0.5), (0.5, -0.5), (0.0, 0.5)];
    let transforms = corners
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            Transform::new(1.0)
                .with_affine(Affine::new([0.5, 0.0, 0.0, 0.5, 0.5 * x, 0.5 * y]))
                .with_color(i as f64 / 2.0, 0.0)
        })
        .collect();
    Flame::new(64, 64, transforms)
}

fn pass_for(flame: Flame, observer: Option<Arc<dyn IterationObserver>>) -> Arc<IterationPass> {
    let buffer = Arc::new(AccumulationBuffer::new(flame.raster_size().unwrap()));
    Arc::new(IterationPass::new(Arc::new(flame), PassConfig::default(), buffer, observer).unwrap())
}

#[test]
fn bounded_attractor_plots_every_sample() {
    let pass = pass_for(sierpinski(), None);
    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(7), 5_000);
    assert_eq!(engine.state(), EngineState::Init);

    assert_eq!(engine.run(), WorkerExit::Completed);
    assert_eq!(engine.state(), EngineState::Done);
    assert_eq!(engine.sample_index(), 5_000);
    assert_eq!(pass.buffer().snapshot().total_count(), 5_000);
    assert_eq!(pass.samples_done(), 5_000);
    assert_eq!(engine.run(), WorkerExit::Completed);
}

#[test]
fn hidden_transforms_iterate_without_plotting() {
    let mut flame = sierpinski();
    for xf in &mut flame.transforms {
        xf.draw_mode = DrawMode::Hidden;
    }
    let pass = pass_for(flame, None);
    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(1), 1_000);
    assert_eq!(engine.run(), WorkerExit::Completed);
    assert_eq!(engine.sample_index(), 1_000);
    assert_eq!(pass.buffer().snapshot().total_count(), 0);
}

#[test]
fn opaque_transforms_plot_a_fraction() {
    let mut flame = sierpinski();
    for xf in &mut flame.transforms {
        xf.draw_mode = DrawMode::Opaque { opacity: 0.25 };
    }
    let pass = pass_for(flame, None);
    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(2), 20_000);
    engine.run();
    let plotted = pass.buffer().snapshot().total_count() as f64 / 20_000.0;
    assert!((plotted - 0.25).abs() < 0.02, "plotted = {plotted}");
}

#[test]
fn suspend_and_resume_match_an_uninterrupted_run() {
    let full = pass_for(sierpinski(), None);
    let mut engine = IterationEngine::new(0, full.clone(), PcgRandom::seeded(99), 3_000);
    engine.run();

    let split = pass_for(sierpinski(), None);
    let mut first = IterationEngine::new(0, split.clone(), PcgRandom::seeded(99), 3_000);
    assert_eq!(first.run_until(1_234), WorkerExit::Suspended);
    assert_eq!(first.state(), EngineState::Suspended);

    let checkpoint = first.checkpoint();
    assert_eq!(checkpoint.sample_index, 1_234);
    let rng = PcgRandom::from_state(checkpoint.rng.clone().unwrap());
    let mut second = IterationEngine::from_checkpoint(split.clone(), &checkpoint, rng).unwrap();
    assert_eq!(second.run(), WorkerExit::Completed);

    assert_eq!(full.buffer().snapshot(), split.buffer().snapshot());
    assert_eq!(second.point(), engine.point());
}

#[test]
fn dead_row_stalls_the_worker() {
    let mut a = Transform::new(1.0);
    a.mod_weights = vec![0.0, 1.0];
    let mut b = Transform::new(1.0);
    b.mod_weights = vec![0.0, 0.0];
    let flame = Flame::new(16, 16, vec![a, b]);
    let buffer = Arc::new(AccumulationBuffer::new(flame.raster_size().unwrap()));
    let config = PassConfig {
        fuse_iterations: 0,
        ..PassConfig::default()
    };
    let pass = Arc::new(IterationPass::new(Arc::new(flame), config, buffer, None).unwrap());

    let mut engine = IterationEngine::new(0, pass, PcgRandom::seeded(1), 100);
    assert_eq!(engine.run(), WorkerExit::Stalled);
    assert_eq!(engine.sample_index(), 1);
    assert_eq!(engine.state(), EngineState::Done);
    assert_eq!(engine.checkpoint().transform, None);
    assert_eq!(engine.run(), WorkerExit::Stalled);
}

#[test]
fn pass_rejects_unreachable_rows_and_foreign_buffers() {
    let mut a = Transform::new(1.0);
    a.mod_weights = vec![0.0];
    let flame = Arc::new(Flame::new(16, 16, vec![a]));
    let buffer = Arc::new(AccumulationBuffer::new(flame.raster_size().unwrap()));
    let err = IterationPass::new(flame, PassConfig::default(), buffer, None).unwrap_err();
    assert!(matches!(err, FlameError::Validation(_)));

    let flame = Arc::new(sierpinski());
    let small = Arc::new(AccumulationBuffer::new(
        crate::foundation::core::RasterSize::new(8, 8).unwrap(),
    ));
    let err = IterationPass::new(flame, PassConfig::default(), small, None).unwrap_err();
    assert!(matches!(err, FlameError::StateMismatch(_)));
}

#[test]
fn checkpoint_with_unknown_transform_is_a_state_mismatch() {
    let pass = pass_for(sierpinski(), None);
    let checkpoint = Checkpoint {
        worker: 0,
        point: PointState::new(0.0, 0.0, 0.0, 0.5),
        transform: Some(TransformId(7)),
        sample_index: 10,
        samples_target: 100,
        rng: None,
    };
    let err = IterationEngine::from_checkpoint(pass, &checkpoint, PcgRandom::seeded(1))
        .err()
        .unwrap();
    assert!(matches!(err, FlameError::StateMismatch(_)));
}

#[test]
fn cancellation_is_observed_before_the_next_iteration() {
    let pass = pass_for(sierpinski(), None);
    pass.control().cancel();
    pass.control().suspend();
    assert!(pass.control().is_cancelled());

    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(1), 1_000);
    assert_eq!(engine.run(), WorkerExit::Cancelled);
    assert_eq!(engine.state(), EngineState::Aborted);
    assert_eq!(engine.sample_index(), 0);
    assert_eq!(pass.buffer().snapshot().total_count(), 0);
}

#[derive(Default)]
struct CountingObserver {
    hits: Mutex<Vec<(usize, usize, usize)>>,
}

impl IterationObserver for CountingObserver {
    fn notify_iteration_finished(&self, worker: usize, row: usize, col: usize) {
        self.hits.lock().unwrap().push((worker, row, col));
    }
}

#[test]
fn observer_sees_every_touched_cell() {
    let observer = Arc::new(CountingObserver::default());
    let pass = pass_for(sierpinski(), Some(observer.clone()));
    let mut engine = IterationEngine::new(3, pass.clone(), PcgRandom::seeded(4), 500);
    engine.run();

    let hits = observer.hits.lock().unwrap();
    assert_eq!(hits.len() as u64, pass.buffer().snapshot().total_count());
    assert!(hits.iter().all(|&(w, r, c)| w == 3 && r < 64 && c < 64));
}

fn collapsed(width: u32, x: f64) -> Flame {
    let xf = Transform::new(1.0).with_affine(Affine::new([0.0, 0.0, 0.0, 0.0, x, 0.0]));
    let mut flame = Flame::new(width, width, vec![xf]);
    flame.camera.pixels_per_unit = 50.0;
    flame
}

fn lit_cells(pass: &IterationPass) -> usize {
    pass.buffer().snapshot().cells().iter().filter(|c| c.count > 0).count()
}

#[test]
fn antialias_jitter_spreads_a_fixed_point() {
    let sharp = pass_for(collapsed(41, 0.0), None);
    IterationEngine::new(0, sharp.clone(), PcgRandom::seeded(5), 20_000).run();
    assert_eq!(lit_cells(&sharp), 1);
    assert_eq!(sharp.buffer().snapshot().cell(20, 20).map(|c| c.count), Some(20_000));

    let mut flame = collapsed(41, 0.0);
    flame.transforms[0].antialias_amount = 1.0;
    flame.transforms[0].antialias_radius = 0.5;
    let jittered = pass_for(flame, None);
    IterationEngine::new(0, jittered.clone(), PcgRandom::seeded(5), 20_000).run();
    assert!(lit_cells(&jittered) > 1, "{} cells", lit_cells(&jittered));
    assert_eq!(jittered.buffer().snapshot().total_count(), 20_000);
}

#[test]
fn final_transform_antialias_settings_take_precedence() {
    let mut flame = collapsed(41, 0.0);
    flame.transforms[0].antialias_amount = 1.0;
    flame.transforms[0].antialias_radius = 0.5;
    flame.final_transform = Some(Transform::new(1.0));
    let pass = pass_for(flame, None);
    IterationEngine::new(0, pass.clone(), PcgRandom::seeded(6), 5_000).run();
    assert_eq!(lit_cells(&pass), 1);

    let mut flame = collapsed(41, 0.0);
    let mut fin = Transform::new(1.0);
    fin.antialias_amount = 1.0;
    fin.antialias_radius = 0.5;
    flame.final_transform = Some(fin);
    let pass = pass_for(flame, None);
    IterationEngine::new(0, pass.clone(), PcgRandom::seeded(6), 5_000).run();
    assert!(lit_cells(&pass) > 1);
}

#[test]
fn jitter_past_the_raster_edge_is_discarded() {
    let mut flame = collapsed(41, 0.4);
    flame.transforms[0].antialias_amount = 1.0;
    flame.transforms[0].antialias_radius = 1.5;
    let observer = Arc::new(CountingObserver::default());
    let pass = pass_for(flame, Some(observer.clone()));
    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(8), 20_000);
    assert_eq!(engine.run(), WorkerExit::Completed);

    let total = pass.buffer().snapshot().total_count();
    assert!(total > 0 && total < 20_000, "total = {total}");
    let hits = observer.hits.lock().unwrap();
    assert_eq!(hits.len() as u64, total);
    assert!(hits.iter().all(|&(_, r, c)| r < 41 && c < 41));
}

#[test]
fn final_transform_moves_only_the_plotted_copy() {
    let xf = Transform::new(1.0).with_affine(Affine::new([0.5, 0.0, 0.0, 0.5, 0.25, 0.0]));
    let mut flame = Flame::new(41, 41, vec![xf]);
    flame.camera.pixels_per_unit = 50.0;
    flame.final_transform =
        Some(Transform::new(1.0).with_affine(Affine::new([1.0, 0.0, 0.0, 1.0, -0.2, 0.0])));
    let pass = pass_for(flame, None);
    let mut engine = IterationEngine::new(0, pass.clone(), PcgRandom::seeded(9), 20_000);
    engine.run();

    assert!((engine.point().x - 0.5).abs() < 1e-9);
    let raster = pass.buffer().snapshot();
    assert_eq!(raster.cell(20, 35).map(|c| c.count), Some(20_000));
}

#[derive(Debug)]
struct FirstChoice;

impl RandomSource for FirstChoice {
    fn random(&mut self) -> f64 {
        0.0
    }

    fn random_index(&mut self, _n: usize) -> usize {
        0
    }
}

#[test]
fn engine_accepts_any_random_source() {
    let pass = pass_for(sierpinski(), None);
    let mut engine = IterationEngine::new(0, pass.clone(), FirstChoice, 1_000);
    assert_eq!(engine.run(), WorkerExit::Completed);

    assert_eq!(lit_cells(&pass), 1);
    assert_eq!(pass.buffer().snapshot().total_count(), 1_000);
    assert!(engine.checkpoint().rng.is_none());
}
