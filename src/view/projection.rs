use std::f64::consts::PI;

use smallvec::SmallVec;

use crate::foundation::core::{Point, PointState, RasterSize, Vec3};
use crate::foundation::math::{EPSILON, smootherstep};
use crate::random::source::RandomSource;
use crate::scene::flame::{Camera, DofMode, Flame};
use crate::view::dof::{DofShape, dof_shape};

/// 3x3 rotation; `m[i][j]` weights input component `i` into output component `j`.
type Matrix3 = [[f64; 3]; 3];

/// Camera-space point mapped onto the accumulation raster.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedPoint {
    /// Raster x in cells (continuous).
    pub x: f64,
    /// Raster y in cells (continuous).
    pub y: f64,
    /// Camera-space depth (zero on the planar path).
    pub z: f64,
    /// Fog attenuation in `0.0..=1.0`.
    pub intensity: f64,
    /// Blur distance that was applied; zero when the point was not blurred.
    pub dof_dist: f64,
    /// Point in each light's frame, `None` for lights that cast no shadow.
    pub lights: SmallVec<[Option<Vec3>; 4]>,
}

/// Precomputed view transform for one flame and raster size.
///
/// Built once per pass and shared read-only by the workers.
#[derive(Debug)]
pub struct ProjectionView {
    camera: Camera,
    project_3d: bool,
    use_dof: bool,
    solid_dof: bool,
    camera_matrix: Matrix3,
    light_matrices: Option<Vec<Option<Matrix3>>>,
    area: f64,
    fade: f64,
    area_minus_fade: f64,
    cam_w: f64,
    cam_h: f64,
    bws: f64,
    bhs: f64,
    cosa: f64,
    sina: f64,
    rc_x: f64,
    rc_y: f64,
    shape: Box<dyn DofShape>,
}

impl ProjectionView {
    /// View of `flame` onto a raster of `raster` cells.
    pub fn new(flame: &Flame, raster: RasterSize) -> Self {
        let camera = flame.camera.clone();
        let project_3d = flame.is_3d_projection_required();

        let camera_matrix = rotation_matrix(
            -camera.yaw.to_radians(),
            camera.pitch.to_radians(),
            camera.roll.to_radians(),
        );

        let light_matrices = flame.with_shadows().then(|| {
            flame
                .solid
                .lights
                .iter()
                .map(|light| {
                    if !light.cast_shadows {
                        return None;
                    }
                    let d = Vec3::new(-light.x, -light.y, -light.z);
                    let n = d.length();
                    if n < EPSILON {
                        return None;
                    }
                    let (dx, dy) = (d.x / n, d.y / n);
                    let pitch = dy.clamp(-1.0, 1.0).asin();
                    let cp = pitch.cos();
                    let yaw = if cp.abs() > EPSILON {
                        (dx / cp).clamp(-1.0, 1.0).asin()
                    } else {
                        0.0
                    };
                    Some(rotation_matrix(yaw, pitch, 0.0))
                })
                .collect()
        });

        let ppu = camera.pixels_per_unit * camera.zoom;
        let cam_w = f64::from(flame.width) / ppu;
        let cam_h = f64::from(flame.height) / ppu;
        let cam_x0 = camera.centre_x - cam_w / 2.0;
        let cam_y0 = camera.centre_y - cam_h / 2.0;
        let x_size = if cam_w.abs() > 0.01 { 1.0 / cam_w } else { 1.0 };
        let y_size = if cam_h.abs() > 0.01 { 1.0 / cam_h } else { 1.0 };

        let (cosa, sina, rc_x, rc_y) = if project_3d {
            (1.0, 0.0, -cam_x0, -cam_y0)
        } else {
            let a = -PI * camera.roll / 180.0;
            let (sina, cosa) = a.sin_cos();
            let (cx, cy) = (camera.centre_x, camera.centre_y);
            (
                cosa,
                sina,
                cx * (1.0 - cosa) - cy * sina - cam_x0,
                cy * (1.0 - cosa) + cx * sina - cam_y0,
            )
        };

        let area = camera.dof.area;
        let fade = area / 2.25;
        Self {
            shape: dof_shape(camera.dof.shape, camera.dof.amount),
            use_dof: flame.is_dof_active(),
            solid_dof: flame.solid.enabled,
            camera,
            project_3d,
            camera_matrix,
            light_matrices,
            area,
            fade,
            area_minus_fade: area - fade,
            cam_w,
            cam_h,
            bws: (raster.width as f64 - 0.5) * x_size,
            bhs: (raster.height as f64 - 0.5) * y_size,
            cosa,
            sina,
            rc_x,
            rc_y,
        }
    }

    /// Return `true` when points go through the camera matrix.
    pub fn is_3d(&self) -> bool {
        self.project_3d
    }

    /// Map `point` to raster coordinates, or `None` when it falls outside the view,
    /// behind the camera, or is not finite.
    pub fn project(&self, point: &PointState, rng: &mut dyn RandomSource) -> Option<ProjectedPoint> {
        if !point.is_finite() {
            return None;
        }
        let mut screen = Point::new(point.x, point.y);
        let mut projected = ProjectedPoint {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            intensity: 1.0,
            dof_dist: 0.0,
            lights: SmallVec::new(),
        };

        if self.project_3d {
            let world = Vec3::new(point.x, point.y, point.z);
            if let Some(matrices) = &self.light_matrices {
                projected
                    .lights
                    .extend(matrices.iter().map(|m| m.as_ref().map(|m| apply(m, world))));
            }

            let c = &self.camera;
            let mut cam = apply(&self.camera_matrix, world);
            cam.x += c.pos_x;
            cam.y += c.pos_y;
            cam.z += c.pos_z;

            let zr = 1.0 - c.perspective * cam.z + c.pos_z;
            if zr < EPSILON {
                return None;
            }
            projected.z = cam.z;

            let zdist = c.cam_z - cam.z;
            if c.dimish_z > EPSILON && zdist > 0.0 {
                projected.intensity = (-zdist * zdist * c.dimish_z).exp();
            }

            screen = if self.use_dof {
                let dist = match c.dof.mode {
                    DofMode::Legacy => zdist.max(0.0),
                    DofMode::Area => {
                        let d = Vec3::new(
                            cam.x - c.dof.focus_x,
                            cam.y - c.dof.focus_y,
                            cam.z - c.dof.focus_z,
                        );
                        let sq = d.x * d.x + d.y * d.y + d.z * d.z;
                        self.dof_blur_distance(sq.powf(1.0 / c.dof.exponent))
                    }
                };
                projected.dof_dist = dist;
                if dist > 0.0 && !self.solid_dof {
                    self.shape.apply_dof_and_camera(cam, dist, zr, rng)
                } else {
                    self.shape.apply_only_camera(cam, zr)
                }
            } else {
                Point::new(cam.x / zr, cam.y / zr)
            };
        }

        let px = screen.x * self.cosa + screen.y * self.sina + self.rc_x;
        if !(0.0..=self.cam_w).contains(&px) {
            return None;
        }
        let py = screen.y * self.cosa - screen.x * self.sina + self.rc_y;
        if !(0.0..=self.cam_h).contains(&py) {
            return None;
        }
        projected.x = self.bws * px;
        projected.y = self.bhs * py;
        Some(projected)
    }

    /// Effective area-mode blur distance for a focus distance `dist`.
    ///
    /// Zero inside `area - fade`, full `dist` beyond `area`, and a smootherstep ramp
    /// in between; the result is continuous in `dist`.
    pub fn dof_blur_distance(&self, dist: f64) -> f64 {
        if dist > self.area {
            dist
        } else if dist > self.area_minus_fade {
            smootherstep(0.0, 1.0, (dist - self.area_minus_fade) / self.fade) * dist
        } else {
            0.0
        }
    }
}

fn rotation_matrix(yaw: f64, pitch: f64, roll: f64) -> Matrix3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();
    let mut m = [[0.0; 3]; 3];
    m[0][0] = cy * cr - sr * sy * cp;
    m[1][0] = -sy * cr - cy * cp * sr;
    m[2][0] = sr * sp;
    m[0][1] = cy * sr + cr * sy * cp;
    m[1][1] = -sy * sr + cy * cp * cr;
    m[2][1] = -cr * sp;
    m[0][2] = sy * sp;
    m[1][2] = cy * sp;
    m[2][2] = cp;
    m
}

fn apply(m: &Matrix3, p: Vec3) -> Vec3 {
    Vec3::new(
        m[0][0] * p.x + m[1][0] * p.y + m[2][0] * p.z,
        m[0][1] * p.x + m[1][1] * p.y + m[2][1] * p.z,
        m[0][2] * p.x + m[1][2] * p.y + m[2][2] * p.z,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/view/projection.rs"]
mod tests;
