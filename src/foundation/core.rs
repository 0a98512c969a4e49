use crate::foundation::error::{FlameError, FlameResult};

pub use kurbo::{Affine, Point, Vec2};

/// Linear RGB color with channels in `0.0..=255.0`.
///
/// Deserializes from `"#rrggbb"`, `[r, g, b]` or `{ "r", "g", "b" }`.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Rgb {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
}

impl Rgb {
    /// Build a color from its three channels.
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Black.
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Multiply every channel by `k`.
    pub fn scaled(self, k: f64) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k)
    }

    /// Linear interpolation towards `other`; `t = 0` returns `self`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

/// Plain 3D vector used by the camera model.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

impl Vec3 {
    /// Build a vector from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Iteration state of one chaotic chain.
///
/// Owned by exactly one worker; the optional `rgb` override bypasses the palette lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointState {
    /// Attractor-space x.
    pub x: f64,
    /// Attractor-space y.
    pub y: f64,
    /// Attractor-space z.
    pub z: f64,
    /// Scalar palette coordinate, nominally in `0.0..=1.0`.
    pub color: f64,
    /// Direct color that replaces the palette lookup when set.
    #[serde(default)]
    pub rgb: Option<Rgb>,
}

impl PointState {
    /// Point at `(x, y, z)` with palette coordinate `color`.
    pub fn new(x: f64, y: f64, z: f64, color: f64) -> Self {
        Self {
            x,
            y,
            z,
            color,
            rgb: None,
        }
    }

    /// Return `true` when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Accumulation raster dimensions in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RasterSize {
    /// Width in cells.
    pub width: usize,
    /// Height in cells.
    pub height: usize,
}

impl RasterSize {
    /// Create a validated, non-empty raster size.
    pub fn new(width: usize, height: usize) -> FlameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FlameError::validation("raster size must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Number of cells.
    pub fn cell_count(self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Row-major cell index for `(row, col)`, or `None` when outside the raster.
    pub fn index(self, row: i64, col: i64) -> Option<usize> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(row * self.width + col)
    }
}

/// A tone-mapped image as straight-alpha RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Read back one pixel, or `None` when outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
