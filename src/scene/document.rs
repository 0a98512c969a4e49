use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::Affine;
use crate::foundation::error::{FlameError, FlameResult};
use crate::scene::flame::{Flame, PALETTE_SIZE, Palette, Transform};
use crate::scene::model::{FlameDef, TransformDef};
use crate::scene::variation::{VariationSlot, builtin_variation};

/// JSON-facing flame description.
///
/// Parsed leniently, validated explicitly, then built into the immutable [`Flame`]
/// snapshot a render pass consumes.
#[derive(Debug, Clone)]
pub struct FlameDocument {
    def: FlameDef,
}

impl FlameDocument {
    /// Parse a flame from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> FlameResult<Self> {
        let def: FlameDef = serde_json::from_reader(r)
            .map_err(|e| FlameError::validation(format!("parse flame JSON: {e}")))?;
        Ok(Self { def })
    }

    /// Parse a flame from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> FlameResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FlameError::validation(format!("open flame JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check that the document builds into a renderable flame.
    pub fn validate(&self) -> FlameResult<()> {
        self.build().map(|_| ())
    }

    /// Output size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.def.width, self.def.height)
    }

    /// Build and validate the flame snapshot.
    pub fn build(&self) -> FlameResult<Flame> {
        let def = &self.def;
        let transforms = def
            .transforms
            .iter()
            .enumerate()
            .map(|(i, xf)| build_transform(xf).map_err(|e| prefixed(&format!("transform {i}"), e)))
            .collect::<FlameResult<Vec<_>>>()?;
        let final_transform = def
            .final_transform
            .as_ref()
            .map(|xf| build_transform(xf).map_err(|e| prefixed("final transform", e)))
            .transpose()?;

        let palette = match def.palette.len() {
            0 => Palette::gray(),
            PALETTE_SIZE => Palette::new(def.palette.clone())?,
            _ => Palette::from_stops(&def.palette)?,
        };

        let flame = Flame {
            width: def.width,
            height: def.height,
            spatial_oversample: def.spatial_oversample,
            sample_density: def.sample_density,
            camera: def.camera.clone(),
            shading: def.shading.clone(),
            solid: def.solid.clone(),
            palette,
            transforms,
            final_transform,
            preserve_z: def.preserve_z,
        };
        flame.validate()?;
        Ok(flame)
    }
}

fn build_transform(def: &TransformDef) -> FlameResult<Transform> {
    let variations = def
        .variations
        .iter()
        .map(|(name, v)| Ok(VariationSlot::new(v.amount, builtin_variation(name, &v.params)?)))
        .collect::<FlameResult<Vec<_>>>()?;
    Ok(Transform {
        weight: def.weight,
        mod_weights: def.mod_weights.clone(),
        color: def.color,
        color_symmetry: def.color_symmetry,
        draw_mode: def.draw_mode,
        antialias_amount: def.antialias_amount,
        antialias_radius: def.antialias_radius,
        affine: Affine::new(def.coefs),
        post: def.post.map(Affine::new),
        variations,
    })
}

fn prefixed(label: &str, err: FlameError) -> FlameError {
    match err {
        FlameError::Validation(msg) => FlameError::validation(format!("{label}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/document.rs"]
mod tests;
