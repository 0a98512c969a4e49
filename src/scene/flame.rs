use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::foundation::core::{Affine, Point, PointState, RasterSize, Rgb};
use crate::foundation::error::{FlameError, FlameResult};
use crate::foundation::math::EPSILON;
use crate::scene::variation::{Variation, VariationContext, VariationSlot};

/// Number of entries in every flame palette.
pub const PALETTE_SIZE: usize = 256;

/// Immutable parameter snapshot describing one renderable attractor.
///
/// A render pass shares one `Arc<Flame>` between all workers and never mutates it.
#[derive(Clone, Debug)]
pub struct Flame {
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Raster cells per output pixel along each axis.
    pub spatial_oversample: u32,
    /// Samples per raster cell used to derive a default budget.
    pub sample_density: f64,
    /// Camera model.
    pub camera: Camera,
    /// Tone-mapping and density-estimation parameters.
    pub shading: Shading,
    /// Lights and solid-rendering switches.
    pub solid: SolidSettings,
    /// Palette indexed by the chain's color coordinate.
    pub palette: Palette,
    /// Ordered transform list.
    pub transforms: Vec<Transform>,
    /// Transform applied to a copy of every plotted point.
    pub final_transform: Option<Transform>,
    /// Carry z through 2D variations.
    pub preserve_z: bool,
}

impl Flame {
    /// Snapshot with default camera/shading, a gray palette and the given transforms.
    pub fn new(width: u32, height: u32, transforms: Vec<Transform>) -> Self {
        Self {
            width,
            height,
            spatial_oversample: 1,
            sample_density: 100.0,
            camera: Camera::default(),
            shading: Shading::default(),
            solid: SolidSettings::default(),
            palette: Palette::gray(),
            transforms,
            final_transform: None,
            preserve_z: false,
        }
    }

    /// Accumulation raster size (`image × spatial_oversample`).
    pub fn raster_size(&self) -> FlameResult<RasterSize> {
        let os = self.spatial_oversample.max(1) as usize;
        RasterSize::new(self.width as usize * os, self.height as usize * os)
    }

    /// Sample budget implied by `sample_density`.
    pub fn default_sample_budget(&self) -> FlameResult<u64> {
        let cells = self.raster_size()?.cell_count() as f64;
        Ok(((self.sample_density * cells).round() as u64).max(1))
    }

    /// Return `true` when depth-of-field blur is enabled.
    pub fn is_dof_active(&self) -> bool {
        self.camera.dof.amount > EPSILON
    }

    /// Return `true` when shadow-casting projections must be computed.
    pub fn with_shadows(&self) -> bool {
        self.solid.enabled
            && self.solid.hard_shadows
            && self.solid.lights.iter().any(|l| l.cast_shadows)
    }

    /// Return `true` when the camera needs the full 3D path instead of the planar one.
    pub fn is_3d_projection_required(&self) -> bool {
        let c = &self.camera;
        c.pitch.abs() > EPSILON
            || c.yaw.abs() > EPSILON
            || c.perspective.abs() > EPSILON
            || c.pos_x.abs() > EPSILON
            || c.pos_y.abs() > EPSILON
            || c.pos_z.abs() > EPSILON
            || c.dimish_z > EPSILON
            || self.is_dof_active()
            || self.with_shadows()
    }

    /// Check the snapshot is renderable. Called before any worker starts.
    pub fn validate(&self) -> FlameResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FlameError::validation("image size must be non-zero"));
        }
        if self.spatial_oversample == 0 {
            return Err(FlameError::validation("spatial_oversample must be >= 1"));
        }
        if !self.sample_density.is_finite() || self.sample_density <= 0.0 {
            return Err(FlameError::validation("sample_density must be > 0"));
        }
        if self.transforms.is_empty() {
            return Err(FlameError::validation("flame has no transforms"));
        }
        let n = self.transforms.len();
        for (i, xf) in self.transforms.iter().enumerate() {
            xf.validate(n)
                .map_err(|e| FlameError::validation(format!("transform {i}: {e}")))?;
        }
        if let Some(xf) = &self.final_transform {
            xf.validate(n)
                .map_err(|e| FlameError::validation(format!("final transform: {e}")))?;
        }
        let total: f64 = self.transforms.iter().map(|xf| xf.weight).sum();
        if total <= 0.0 {
            return Err(FlameError::validation("all transform weights are zero"));
        }
        self.camera.validate()?;
        self.shading.validate()?;
        Ok(())
    }
}

/// Camera parameters. Angles are in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// View centre x in attractor space.
    pub centre_x: f64,
    /// View centre y in attractor space.
    pub centre_y: f64,
    /// Raster scale at zoom 1.
    pub pixels_per_unit: f64,
    /// Zoom factor applied to `pixels_per_unit`.
    pub zoom: f64,
    /// Roll in degrees.
    pub roll: f64,
    /// Pitch in degrees.
    pub pitch: f64,
    /// Yaw in degrees.
    pub yaw: f64,
    /// Perspective strength.
    pub perspective: f64,
    /// Camera position x.
    pub pos_x: f64,
    /// Camera position y.
    pub pos_y: f64,
    /// Camera position z.
    pub pos_z: f64,
    /// Focal plane for legacy depth-of-field and fog reference depth.
    pub cam_z: f64,
    /// Fog strength; attenuation is `exp(-zdist^2 * dimish_z)`.
    pub dimish_z: f64,
    /// Depth-of-field settings.
    pub dof: Dof,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            centre_x: 0.0,
            centre_y: 0.0,
            pixels_per_unit: 50.0,
            zoom: 1.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            perspective: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
            pos_z: 0.0,
            cam_z: 0.0,
            dimish_z: 0.0,
            dof: Dof::default(),
        }
    }
}

impl Camera {
    fn validate(&self) -> FlameResult<()> {
        if !(self.pixels_per_unit.is_finite() && self.pixels_per_unit > 0.0) {
            return Err(FlameError::validation("pixels_per_unit must be > 0"));
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err(FlameError::validation("zoom must be > 0"));
        }
        let d = &self.dof;
        if d.mode == DofMode::Area && !(d.exponent.is_finite() && d.exponent > 0.0) {
            return Err(FlameError::validation("dof exponent must be > 0"));
        }
        if d.area < 0.0 {
            return Err(FlameError::validation("dof area must be >= 0"));
        }
        Ok(())
    }
}

/// Depth-of-field model selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DofMode {
    /// Blur grows with signed distance from the `cam_z` plane.
    #[default]
    Legacy,
    /// Blur grows with distance from the focus point, with a sharp inner area.
    Area,
}

/// Displacement shape used once a blur distance is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DofShapeKind {
    /// Uniform disc.
    #[default]
    Bubble,
    /// Circle edge only.
    Ring,
    /// Normal distribution.
    Gaussian,
}

/// Depth-of-field parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dof {
    /// Blur strength; zero disables depth-of-field.
    pub amount: f64,
    /// Blur model.
    pub mode: DofMode,
    /// Displacement shape.
    pub shape: DofShapeKind,
    /// Focus point x (area mode).
    pub focus_x: f64,
    /// Focus point y (area mode).
    pub focus_y: f64,
    /// Focus point z (area mode).
    pub focus_z: f64,
    /// Radius of full blur around the focus point (area mode).
    pub area: f64,
    /// Distance exponent (area mode).
    pub exponent: f64,
}

impl Default for Dof {
    fn default() -> Self {
        Self {
            amount: 0.0,
            mode: DofMode::Legacy,
            shape: DofShapeKind::Bubble,
            focus_x: 0.0,
            focus_y: 0.0,
            focus_z: 0.0,
            area: 0.5,
            exponent: 2.0,
        }
    }
}

/// Tone mapping and density-estimation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shading {
    /// Gamma exponent (output uses `1 / gamma`).
    pub gamma: f64,
    /// Density below which the gamma curve is linearized.
    pub gamma_threshold: f64,
    /// Brightness multiplier.
    pub brightness: f64,
    /// Contrast multiplier.
    pub contrast: f64,
    /// Blend between per-channel and alpha-driven gamma.
    pub vibrancy: f64,
    /// Output value of a fully saturated channel.
    pub white_level: f64,
    /// Background color, composited under low-density cells.
    pub background: Rgb,
    /// Kernel radius of the blur phase, in raster cells. Zero disables it.
    pub blur_radius: u32,
    /// Fraction of each worker's samples accumulated without blur.
    pub blur_fade: f64,
    /// Gaussian falloff of the blur kernel.
    pub blur_falloff: f64,
}

impl Default for Shading {
    fn default() -> Self {
        Self {
            gamma: 4.0,
            gamma_threshold: 0.04,
            brightness: 4.0,
            contrast: 1.0,
            vibrancy: 1.0,
            white_level: 200.0,
            background: Rgb::black(),
            blur_radius: 0,
            blur_fade: 0.95,
            blur_falloff: 2.0,
        }
    }
}

impl Shading {
    fn validate(&self) -> FlameResult<()> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(FlameError::validation("gamma must be > 0"));
        }
        if !(self.contrast.is_finite() && self.contrast > 0.0) {
            return Err(FlameError::validation("contrast must be > 0"));
        }
        if !(self.white_level.is_finite() && self.white_level > 0.0) {
            return Err(FlameError::validation("white_level must be > 0"));
        }
        if !(self.brightness.is_finite() && self.vibrancy.is_finite()) {
            return Err(FlameError::validation(
                "brightness and vibrancy must be finite",
            ));
        }
        if !self.blur_fade.is_finite() {
            return Err(FlameError::validation("blur_fade must be finite"));
        }
        if self.blur_radius > 0 && !(self.blur_falloff.is_finite() && self.blur_falloff >= 0.0) {
            return Err(FlameError::validation("blur_falloff must be >= 0"));
        }
        Ok(())
    }
}

/// Point light used for shadow projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// Light position x.
    pub x: f64,
    /// Light position y.
    pub y: f64,
    /// Light position z.
    pub z: f64,
    /// Whether points are projected into this light's frame.
    #[serde(default)]
    pub cast_shadows: bool,
}

/// Solid-rendering switches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidSettings {
    /// Solid rendering; forces camera-only depth-of-field.
    pub enabled: bool,
    /// Compute per-light shadow projections.
    pub hard_shadows: bool,
    /// Scene lights.
    pub lights: Vec<PointLight>,
}

/// Fixed-size color lookup table.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Palette from exactly [`PALETTE_SIZE`] colors.
    pub fn new(colors: Vec<Rgb>) -> FlameResult<Self> {
        if colors.len() != PALETTE_SIZE {
            return Err(FlameError::validation(format!(
                "palette must have {PALETTE_SIZE} entries, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Palette linearly interpolated through evenly spaced color stops.
    pub fn from_stops(stops: &[Rgb]) -> FlameResult<Self> {
        match stops {
            [] => Err(FlameError::validation("palette needs at least one color stop")),
            [only] => Ok(Self {
                colors: vec![*only; PALETTE_SIZE],
            }),
            _ => {
                let segments = (stops.len() - 1) as f64;
                let colors = (0..PALETTE_SIZE)
                    .map(|i| {
                        let t = i as f64 / (PALETTE_SIZE - 1) as f64 * segments;
                        let lo = (t.floor() as usize).min(stops.len() - 2);
                        stops[lo].lerp(stops[lo + 1], t - lo as f64)
                    })
                    .collect();
                Ok(Self { colors })
            }
        }
    }

    /// Black-to-white ramp.
    pub fn gray() -> Self {
        let colors = (0..PALETTE_SIZE)
            .map(|i| {
                let v = i as f64;
                Rgb::new(v, v, v)
            })
            .collect();
        Self { colors }
    }

    /// Color for a palette coordinate; out-of-range coordinates clamp to the ends.
    pub fn lookup(&self, color: f64) -> Rgb {
        let scl = (PALETTE_SIZE - 1) as f64;
        let idx = (color * scl + 0.5).clamp(0.0, scl) as usize;
        self.colors[idx]
    }

    /// All entries.
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }
}

/// Plotting behavior of a transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DrawMode {
    /// Always plotted.
    #[default]
    Normal,
    /// Plotted with probability `opacity`.
    Opaque {
        /// Plot probability in `0.0..=1.0`.
        opacity: f64,
    },
    /// Never plotted; still iterated.
    Hidden,
}

/// One affine + nonlinear point mapping with its selection weight.
#[derive(Clone, Debug)]
pub struct Transform {
    /// Selection weight, `>= 0`.
    pub weight: f64,
    /// Per-successor multipliers on the successor weights; missing entries count as `1`.
    pub mod_weights: Vec<f64>,
    /// Palette coordinate this transform pulls the chain color towards.
    pub color: f64,
    /// `1` keeps the incoming color, `-1` jumps to `color`, `0` averages.
    pub color_symmetry: f64,
    /// Plotting behavior.
    pub draw_mode: DrawMode,
    /// Probability of antialias jitter per plotted sample.
    pub antialias_amount: f64,
    /// Antialias jitter radius parameter.
    pub antialias_radius: f64,
    /// Pre-variation affine map.
    pub affine: Affine,
    /// Optional post-variation affine map.
    pub post: Option<Affine>,
    /// Weighted variations; none means the affine result is used as-is.
    pub variations: Vec<VariationSlot>,
}

impl Transform {
    /// Identity transform with weight `weight`.
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            mod_weights: Vec::new(),
            color: 0.0,
            color_symmetry: 0.0,
            draw_mode: DrawMode::Normal,
            antialias_amount: 0.0,
            antialias_radius: 0.0,
            affine: Affine::IDENTITY,
            post: None,
            variations: Vec::new(),
        }
    }

    /// Builder-style affine setter.
    pub fn with_affine(mut self, affine: Affine) -> Self {
        self.affine = affine;
        self
    }

    /// Builder-style palette coordinate setter.
    pub fn with_color(mut self, color: f64, symmetry: f64) -> Self {
        self.color = color;
        self.color_symmetry = symmetry;
        self
    }

    /// Builder-style variation append.
    pub fn with_variation(mut self, amount: f64, func: Arc<dyn Variation>) -> Self {
        self.variations.push(VariationSlot::new(amount, func));
        self
    }

    /// Multiplier applied to successor `i`'s weight when leaving this transform.
    pub fn mod_weight(&self, i: usize) -> f64 {
        self.mod_weights.get(i).copied().unwrap_or(1.0)
    }

    /// Map `src` through this transform.
    pub fn apply(&self, ctx: &mut VariationContext<'_>, src: &PointState) -> PointState {
        let p = self.affine * Point::new(src.x, src.y);
        let affine = PointState::new(p.x, p.y, src.z, src.color);

        let mut out = if self.variations.is_empty() {
            affine
        } else {
            let mut acc = PointState::new(0.0, 0.0, 0.0, src.color);
            for slot in &self.variations {
                slot.func.transform(ctx, &affine, &mut acc, slot.amount);
            }
            acc
        };

        out.color = src.color * (1.0 + self.color_symmetry) * 0.5
            + self.color * (1.0 - self.color_symmetry) * 0.5;
        if let Some(post) = self.post {
            let q = post * Point::new(out.x, out.y);
            out.x = q.x;
            out.y = q.y;
        }
        out
    }

    fn validate(&self, n: usize) -> Result<(), String> {
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err("weight must be finite and >= 0".to_string());
        }
        if self.mod_weights.len() > n {
            return Err(format!(
                "{} mod weights for {n} transforms",
                self.mod_weights.len()
            ));
        }
        if self.mod_weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err("mod weights must be finite and >= 0".to_string());
        }
        if let DrawMode::Opaque { opacity } = self.draw_mode
            && !(0.0..=1.0).contains(&opacity)
        {
            return Err("opacity must be in [0, 1]".to_string());
        }
        if !self.affine.is_finite() {
            return Err("affine coefficients must be finite".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/flame.rs"]
mod tests;
