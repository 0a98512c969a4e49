//! Flamerender is a multithreaded fractal flame renderer.
//!
//! A flame is a set of weighted affine-plus-nonlinear transforms. Worker threads run the chaos
//! game over those transforms, project each point through a 3D camera with optional
//! depth-of-field, and accumulate density into one shared raster. The raster is then tone mapped
//! into display pixels.
//!
//! - Load a [`FlameDocument`] and build a [`Flame`]
//! - Run a pass with [`RenderCoordinator`], optionally suspending to a [`SuspendedPass`]
//! - Turn the accumulated [`Raster`] into pixels with [`ToneMapper`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Density accumulation.
pub mod accum;
/// Transform selection.
pub mod graph;
/// Chaos-game iteration.
pub mod iterate;
/// Random sources.
pub mod random;
/// Render coordination and tone mapping.
pub mod render;
/// Flame model.
pub mod scene;
/// Camera projection.
pub mod view;

pub use crate::foundation::core::{
    Affine, FrameRGBA, Point, PointState, RasterSize, Rgb, Vec2, Vec3,
};
pub use crate::foundation::error::{FlameError, FlameResult};

pub use crate::accum::buffer::{AccumulationBuffer, Raster, RasterCell};
pub use crate::accum::kernel::BlurKernel;
pub use crate::accum::strategy::{AccumulationStrategy, KernelSpread, PlainCell, SamplePhase};
pub use crate::graph::transition::{TransformId, TransitionTable};
pub use crate::iterate::engine::{
    Checkpoint, EngineState, IterationEngine, IterationObserver, IterationPass, PassConfig,
    RenderControl, WorkerExit,
};
pub use crate::random::source::{PcgRandom, RandomSource, RngState};
pub use crate::render::coordinator::{
    RenderCoordinator, RenderHandle, RenderOpts, RenderReport, RenderStatus, SuspendedPass,
};
pub use crate::render::tonemap::ToneMapper;
pub use crate::scene::document::FlameDocument;
pub use crate::scene::flame::{
    Camera, Dof, DofMode, DofShapeKind, DrawMode, Flame, Palette, PointLight, Shading,
    SolidSettings, Transform,
};
pub use crate::scene::variation::{Variation, VariationContext, VariationSlot};
pub use crate::view::projection::{ProjectedPoint, ProjectionView};
