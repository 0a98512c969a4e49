use std::f64::consts::TAU;

use crate::foundation::core::{Point, Vec3};
use crate::random::source::RandomSource;
use crate::scene::flame::DofShapeKind;

/// Displacement applied to a camera-space point once its blur distance is known.
///
/// Both methods finish with the perspective divide by `zr` and return the
/// screen-plane position.
pub trait DofShape: Send + Sync + std::fmt::Debug {
    /// Displace `cam` by a random offset scaled by `dist`, then divide by `zr`.
    fn apply_dof_and_camera(
        &self,
        cam: Vec3,
        dist: f64,
        zr: f64,
        rng: &mut dyn RandomSource,
    ) -> Point;

    /// Perspective divide only.
    fn apply_only_camera(&self, cam: Vec3, zr: f64) -> Point {
        Point::new(cam.x / zr, cam.y / zr)
    }
}

/// Uniform displacement inside a disc of radius `scale * dist`.
#[derive(Clone, Copy, Debug)]
pub struct BubbleShape {
    scale: f64,
}

impl DofShape for BubbleShape {
    fn apply_dof_and_camera(
        &self,
        cam: Vec3,
        dist: f64,
        zr: f64,
        rng: &mut dyn RandomSource,
    ) -> Point {
        let a = TAU * rng.random();
        let dr = rng.random() * self.scale * dist;
        Point::new((cam.x + dr * a.cos()) / zr, (cam.y + dr * a.sin()) / zr)
    }
}

/// Displacement onto the circle of radius `scale * dist`.
#[derive(Clone, Copy, Debug)]
pub struct RingShape {
    scale: f64,
}

impl DofShape for RingShape {
    fn apply_dof_and_camera(
        &self,
        cam: Vec3,
        dist: f64,
        zr: f64,
        rng: &mut dyn RandomSource,
    ) -> Point {
        let a = TAU * rng.random();
        let dr = self.scale * dist;
        Point::new((cam.x + dr * a.cos()) / zr, (cam.y + dr * a.sin()) / zr)
    }
}

/// Normally distributed displacement with standard deviation `scale * dist / 2`.
#[derive(Clone, Copy, Debug)]
pub struct GaussianShape {
    scale: f64,
}

impl DofShape for GaussianShape {
    fn apply_dof_and_camera(
        &self,
        cam: Vec3,
        dist: f64,
        zr: f64,
        rng: &mut dyn RandomSource,
    ) -> Point {
        // Box-Muller; 1 - u keeps the log argument in (0, 1].
        let u = 1.0 - rng.random();
        let a = TAU * rng.random();
        let dr = (-2.0 * u.ln()).sqrt() * 0.5 * self.scale * dist;
        Point::new((cam.x + dr * a.cos()) / zr, (cam.y + dr * a.sin()) / zr)
    }
}

/// Shape for `kind` with blur strength `amount`.
pub fn dof_shape(kind: DofShapeKind, amount: f64) -> Box<dyn DofShape> {
    let scale = 0.1 * amount;
    match kind {
        DofShapeKind::Bubble => Box::new(BubbleShape { scale }),
        DofShapeKind::Ring => Box::new(RingShape { scale }),
        DofShapeKind::Gaussian => Box::new(GaussianShape { scale }),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/dof.rs"]
mod tests;
