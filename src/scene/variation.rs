use std::collections::BTreeMap;
use std::f64::consts::{FRAC_1_PI, FRAC_PI_2, PI};
use std::fmt;
use std::sync::Arc;

use crate::foundation::core::PointState;
use crate::foundation::error::{FlameError, FlameResult};
use crate::random::source::RandomSource;

/// Per-call context handed to a [`Variation`].
pub struct VariationContext<'a> {
    /// Random source of the calling worker.
    pub rng: &'a mut dyn RandomSource,
    /// Carry the affine z coordinate through 2D variations.
    pub preserve_z: bool,
}

/// Nonlinear contribution added on top of a transform's affine part.
///
/// Implementations add `amount`-weighted output into `out`; they must not overwrite it.
pub trait Variation: Send + Sync + fmt::Debug {
    /// Catalog name.
    fn name(&self) -> &str;

    /// Add this variation's contribution for `affine` into `out`.
    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    );
}

/// One weighted variation attached to a transform.
#[derive(Clone, Debug)]
pub struct VariationSlot {
    /// Contribution weight.
    pub amount: f64,
    /// Evaluation capability.
    pub func: Arc<dyn Variation>,
}

impl VariationSlot {
    /// Attach `func` with weight `amount`.
    pub fn new(amount: f64, func: Arc<dyn Variation>) -> Self {
        Self { amount, func }
    }
}

/// Resolve a built-in variation by catalog name.
pub fn builtin_variation(
    name: &str,
    params: &BTreeMap<String, f64>,
) -> FlameResult<Arc<dyn Variation>> {
    let param = |key: &str, default: f64| params.get(key).copied().unwrap_or(default);
    let known: &[&str] = match name {
        "linear" | "sinusoidal" | "spherical" | "swirl" | "horseshoe" => &[],
        "cannabiscurve_wf" => &["filled"],
        "collideoscope" => &["a", "num"],
        _ => {
            return Err(FlameError::validation(format!(
                "unknown variation '{name}'"
            )));
        }
    };
    if let Some(bad) = params.keys().find(|k| !known.contains(&k.as_str())) {
        return Err(FlameError::validation(format!(
            "variation '{name}' has no parameter '{bad}'"
        )));
    }

    Ok(match name {
        "linear" => Arc::new(Linear),
        "sinusoidal" => Arc::new(Sinusoidal),
        "spherical" => Arc::new(Spherical),
        "swirl" => Arc::new(Swirl),
        "horseshoe" => Arc::new(Horseshoe),
        "cannabiscurve_wf" => Arc::new(CannabisCurve {
            filled: param("filled", 1.0).round() as i64 == 1,
        }),
        _ => Arc::new(Collideoscope::new(
            param("a", 0.2),
            param("num", 1.0).round() as i64,
        )?),
    })
}

fn add_z(ctx: &VariationContext<'_>, affine: &PointState, out: &mut PointState, amount: f64) {
    if ctx.preserve_z {
        out.z += amount * affine.z;
    }
}

/// Identity contribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Variation for Linear {
    fn name(&self) -> &str {
        "linear"
    }

    fn transform(
        &self,
        _ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        out.x += amount * affine.x;
        out.y += amount * affine.y;
        out.z += amount * affine.z;
    }
}

/// Sine of each coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sinusoidal;

impl Variation for Sinusoidal {
    fn name(&self) -> &str {
        "sinusoidal"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        out.x += amount * affine.x.sin();
        out.y += amount * affine.y.sin();
        add_z(ctx, affine, out, amount);
    }
}

/// Inversion through the unit circle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spherical;

impl Variation for Spherical {
    fn name(&self) -> &str {
        "spherical"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        let r = amount / (affine.x * affine.x + affine.y * affine.y + 1.0e-10);
        out.x += r * affine.x;
        out.y += r * affine.y;
        add_z(ctx, affine, out, amount);
    }
}

/// Rotation by the squared radius.
#[derive(Debug, Clone, Copy, Default)]
pub struct Swirl;

impl Variation for Swirl {
    fn name(&self) -> &str {
        "swirl"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        let r2 = affine.x * affine.x + affine.y * affine.y;
        let (s, c) = r2.sin_cos();
        out.x += amount * (s * affine.x - c * affine.y);
        out.y += amount * (c * affine.x + s * affine.y);
        add_z(ctx, affine, out, amount);
    }
}

/// Angle-doubling fold.
#[derive(Debug, Clone, Copy, Default)]
pub struct Horseshoe;

impl Variation for Horseshoe {
    fn name(&self) -> &str {
        "horseshoe"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        let r = amount / ((affine.x * affine.x + affine.y * affine.y).sqrt() + 1.0e-10);
        out.x += r * (affine.x - affine.y) * (affine.x + affine.y);
        out.y += r * 2.0 * affine.x * affine.y;
        add_z(ctx, affine, out, amount);
    }
}

/// Cannabis curve outline, optionally filled with random radii.
#[derive(Debug, Clone, Copy)]
pub struct CannabisCurve {
    /// Scatter points inside the outline instead of on it.
    pub filled: bool,
}

impl Variation for CannabisCurve {
    fn name(&self) -> &str {
        "cannabiscurve_wf"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        let mut a = affine.x.atan2(affine.y);
        let mut r = (1.0 + 0.9 * (8.0 * a).cos())
            * (1.0 + 0.1 * (24.0 * a).cos())
            * (0.9 + 0.1 * (200.0 * a).cos())
            * (1.0 + a.sin());
        a += FRAC_PI_2;
        if self.filled {
            r *= ctx.rng.random();
        }
        out.x += amount * a.sin() * r;
        out.y += amount * a.cos() * r;
    }
}

/// Kaleidoscopic fold of the polar angle into `num` mirrored wedges.
#[derive(Debug, Clone, Copy)]
pub struct Collideoscope {
    num: i64,
    kn_pi: f64,
    pi_kn: f64,
    ka_kn: f64,
}

impl Collideoscope {
    /// `a` offsets the fold (in half turns), `num` is the wedge count.
    pub fn new(a: f64, num: i64) -> FlameResult<Self> {
        if num < 1 {
            return Err(FlameError::validation("collideoscope num must be >= 1"));
        }
        let n = num as f64;
        Ok(Self {
            num,
            kn_pi: n * FRAC_1_PI,
            pi_kn: PI / n,
            ka_kn: PI * a / n,
        })
    }

    /// Wedge count.
    pub fn num(&self) -> i64 {
        self.num
    }
}

impl Variation for Collideoscope {
    fn name(&self) -> &str {
        "collideoscope"
    }

    fn transform(
        &self,
        ctx: &mut VariationContext<'_>,
        affine: &PointState,
        out: &mut PointState,
        amount: f64,
    ) {
        let mut a = affine.y.atan2(affine.x);
        let r = amount * (affine.x * affine.x + affine.y * affine.y).sqrt();

        if a >= 0.0 {
            let alt = (a * self.kn_pi) as i64;
            let base = alt as f64 * self.pi_kn;
            a = if alt % 2 == 0 {
                base + (self.ka_kn + a) % self.pi_kn
            } else {
                base + (-self.ka_kn + a) % self.pi_kn
            };
        } else {
            let alt = (-a * self.kn_pi) as i64;
            let base = alt as f64 * self.pi_kn;
            a = if alt % 2 == 1 {
                -(base + (-self.ka_kn - a) % self.pi_kn)
            } else {
                -(base + (self.ka_kn - a) % self.pi_kn)
            };
        }

        let (s, c) = a.sin_cos();
        out.x += r * c;
        out.y += r * s;
        add_z(ctx, affine, out, amount);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/variation.rs"]
mod tests;
