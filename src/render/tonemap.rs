use crate::accum::buffer::Raster;
use crate::foundation::core::{FrameRGBA, Rgb};
use crate::foundation::error::{FlameError, FlameResult};
use crate::scene::flame::{Flame, Shading};

/// Converts accumulated densities into display pixels.
///
/// Log-density scaling, gamma with a linear toe below `gamma_threshold`, vibrancy blend and
/// background compositing. Each `spatial_oversample²` block of cells becomes one pixel.
#[derive(Clone, Debug)]
pub struct ToneMapper {
    width: u32,
    height: u32,
    oversample: usize,
    shading: Shading,
}

impl ToneMapper {
    /// Tone mapper for `flame`'s output size and shading.
    pub fn new(flame: &Flame) -> Self {
        Self {
            width: flame.width,
            height: flame.height,
            oversample: flame.spatial_oversample.max(1) as usize,
            shading: flame.shading.clone(),
        }
    }

    /// Map `raster`, accumulated from `samples` iterations, to RGBA8 pixels.
    pub fn map(&self, raster: &Raster, samples: u64) -> FlameResult<FrameRGBA> {
        let os = self.oversample;
        let size = raster.size();
        if size.width != self.width as usize * os || size.height != self.height as usize * os {
            return Err(FlameError::validation(format!(
                "raster is {}x{}, expected {}x{} for oversample {os}",
                size.width,
                size.height,
                self.width as usize * os,
                self.height as usize * os
            )));
        }

        let s = &self.shading;
        let k1 = s.brightness * s.contrast * 268.0 / 256.0;
        let k2 = if samples > 0 {
            size.cell_count() as f64 / (s.contrast * samples as f64)
        } else {
            0.0
        };
        let g = 1.0 / s.gamma;
        let block = (os * os) as f64;
        let bg = s.background;

        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for py in 0..self.height as usize {
            for px in 0..self.width as usize {
                let mut sum = Rgb::black();
                let mut count = 0u64;
                for y in py * os..(py + 1) * os {
                    for x in px * os..(px + 1) * os {
                        if let Some(cell) = raster.cell(y, x) {
                            sum.r += cell.red;
                            sum.g += cell.green;
                            sum.b += cell.blue;
                            count += cell.count;
                        }
                    }
                }

                let rgb = if count == 0 || k2 == 0.0 {
                    bg
                } else {
                    let n = count as f64 / block;
                    let avg = sum.scaled(1.0 / block);
                    self.shade(n, avg, k1, k2, g)
                };
                data.extend_from_slice(&[channel(rgb.r), channel(rgb.g), channel(rgb.b), 255]);
            }
        }

        Ok(FrameRGBA {
            width: self.width,
            height: self.height,
            data,
        })
    }

    fn shade(&self, n: f64, sum: Rgb, k1: f64, k2: f64, g: f64) -> Rgb {
        let s = &self.shading;
        let ls = k1 * (1.0 + n * k2).ln() / n;
        let alpha = n * ls;
        let c = sum.scaled(ls / 255.0);

        let alpha_g = gamma_alpha(alpha, g, s.gamma_threshold);
        let scale = if alpha > 0.0 {
            s.vibrancy * alpha_g / alpha
        } else {
            0.0
        };
        let mix = |v: f64| {
            let v = scale * v + (1.0 - s.vibrancy) * v.max(0.0).powf(g);
            v.clamp(0.0, 1.0)
        };
        let cover = alpha_g.clamp(0.0, 1.0);
        let bg = s.background;
        Rgb::new(
            mix(c.r) * s.white_level + (1.0 - cover) * bg.r,
            mix(c.g) * s.white_level + (1.0 - cover) * bg.g,
            mix(c.b) * s.white_level + (1.0 - cover) * bg.b,
        )
    }
}

/// `alpha^g`, blended towards a straight line through the origin below `threshold` so the
/// curve has finite slope at zero.
pub fn gamma_alpha(alpha: f64, g: f64, threshold: f64) -> f64 {
    if alpha <= 0.0 {
        return 0.0;
    }
    if alpha >= threshold || threshold <= 0.0 {
        return alpha.powf(g);
    }
    let frac = alpha / threshold;
    let slope = threshold.powf(g) / threshold;
    (1.0 - frac) * alpha * slope + frac * alpha.powf(g)
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/tonemap.rs"]
mod tests;
