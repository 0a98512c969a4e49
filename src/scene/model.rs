use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb;
use crate::scene::flame::{Camera, DrawMode, Shading, SolidSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FlameDef {
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default = "one_u32")]
    pub(crate) spatial_oversample: u32,
    #[serde(default = "default_density")]
    pub(crate) sample_density: f64,
    #[serde(default)]
    pub(crate) camera: Camera,
    #[serde(default)]
    pub(crate) shading: Shading,
    #[serde(default)]
    pub(crate) solid: SolidSettings,
    /// Evenly spaced stops; exactly 256 entries are used verbatim, none means a gray ramp.
    #[serde(default)]
    pub(crate) palette: Vec<Rgb>,
    pub(crate) transforms: Vec<TransformDef>,
    #[serde(default)]
    pub(crate) final_transform: Option<TransformDef>,
    #[serde(default)]
    pub(crate) preserve_z: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TransformDef {
    #[serde(default = "one")]
    pub(crate) weight: f64,
    #[serde(default)]
    pub(crate) mod_weights: Vec<f64>,
    #[serde(default)]
    pub(crate) color: f64,
    #[serde(default)]
    pub(crate) color_symmetry: f64,
    #[serde(default)]
    pub(crate) draw_mode: DrawMode,
    #[serde(default)]
    pub(crate) antialias_amount: f64,
    #[serde(default)]
    pub(crate) antialias_radius: f64,
    /// `[a, b, c, d, e, f]`: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
    #[serde(default = "identity_coefs")]
    pub(crate) coefs: [f64; 6],
    #[serde(default)]
    pub(crate) post: Option<[f64; 6]>,
    #[serde(default)]
    pub(crate) variations: BTreeMap<String, VariationDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct VariationDef {
    pub(crate) amount: f64,
    #[serde(flatten)]
    pub(crate) params: BTreeMap<String, f64>,
}

impl<'de> Deserialize<'de> for VariationDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Amount(f64),
            Full {
                amount: f64,
                #[serde(flatten)]
                params: BTreeMap<String, f64>,
            },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Amount(amount) => Ok(Self {
                amount,
                params: BTreeMap::new(),
            }),
            Repr::Full { amount, params } => Ok(Self { amount, params }),
        }
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Obj { r: f64, g: f64, b: f64 },
            Arr(Vec<f64>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map_err(serde::de::Error::custom),
            Repr::Obj { r, g, b } => Ok(Rgb::new(r, g, b)),
            Repr::Arr(v) => match v.as_slice() {
                &[r, g, b] => Ok(Rgb::new(r, g, b)),
                _ => Err(serde::de::Error::custom(
                    "rgb array must have len 3 ([r,g,b])",
                )),
            },
        }
    }
}

fn parse_hex(s: &str) -> Result<Rgb, String> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if s.len() != 6 || !s.is_ascii() {
        return Err("hex color must be #RRGGBB (case-insensitive)".to_owned());
    }
    let r = hex_byte(&s[0..2])?;
    let g = hex_byte(&s[2..4])?;
    let b = hex_byte(&s[4..6])?;
    Ok(Rgb::new(f64::from(r), f64::from(g), f64::from(b)))
}

fn one() -> f64 {
    1.0
}

fn one_u32() -> u32 {
    1
}

fn default_density() -> f64 {
    100.0
}

fn identity_coefs() -> [f64; 6] {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
