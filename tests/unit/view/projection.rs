use super::*;
use crate::random::source::PcgRandom;
use crate::scene::flame::{PointLight, Transform};

fn flame(w: u32, h: u32) -> Flame {
    Flame::new(w, h, vec![Transform::new(1.0)])
}

fn view(flame: &Flame) -> ProjectionView {
    ProjectionView::new(flame, flame.raster_size().unwrap())
}

#[test]
fn planar_centre_maps_to_raster_centre() {
    let mut f = flame(64, 48);
    f.camera.centre_x = 0.3;
    f.camera.centre_y = -0.2;
    let v = view(&f);
    assert!(!v.is_3d());

    let mut rng = PcgRandom::seeded(1);
    let p = v
        .project(&PointState::new(0.3, -0.2, 0.0, 0.0), &mut rng)
        .unwrap();
    assert!((p.x - 32.0).abs() <= 0.5, "x = {}", p.x);
    assert!((p.y - 24.0).abs() <= 0.5, "y = {}", p.y);
    assert_eq!(p.intensity, 1.0);
}

#[test]
fn roll_rotates_around_the_centre() {
    let mut f = flame(64, 48);
    f.camera.roll = 90.0;
    let v = view(&f);
    let mut rng = PcgRandom::seeded(1);

    let centre = v.project(&PointState::new(0.0, 0.0, 0.0, 0.0), &mut rng).unwrap();
    let off = v
        .project(&PointState::new(0.1, 0.0, 0.0, 0.0), &mut rng)
        .unwrap();
    let bhs = (48.0 - 0.5) / (48.0 / 50.0);
    assert!((off.x - centre.x).abs() < 1e-9);
    assert!((off.y - centre.y - 0.1 * bhs).abs() < 1e-9);
}

#[test]
fn points_outside_the_view_or_not_finite_are_rejected() {
    let v = view(&flame(32, 32));
    let mut rng = PcgRandom::seeded(1);
    assert!(v.project(&PointState::new(5.0, 0.0, 0.0, 0.0), &mut rng).is_none());
    assert!(v.project(&PointState::new(0.0, -5.0, 0.0, 0.0), &mut rng).is_none());
    assert!(
        v.project(&PointState::new(f64::NAN, 0.0, 0.0, 0.0), &mut rng)
            .is_none()
    );
}

#[test]
fn points_behind_the_camera_are_rejected() {
    let mut f = flame(32, 32);
    f.camera.perspective = 1.0;
    let v = view(&f);
    assert!(v.is_3d());
    let mut rng = PcgRandom::seeded(1);
    assert!(v.project(&PointState::new(0.0, 0.0, 2.0, 0.0), &mut rng).is_none());
    assert!(v.project(&PointState::new(0.0, 0.0, 0.5, 0.0), &mut rng).is_some());
}

#[test]
fn fog_attenuates_points_behind_the_focal_plane() {
    let mut f = flame(32, 32);
    f.camera.dimish_z = 0.5;
    let v = view(&f);
    let mut rng = PcgRandom::seeded(1);

    let far = v.project(&PointState::new(0.0, 0.0, -1.0, 0.0), &mut rng).unwrap();
    assert!((far.intensity - (-0.5f64).exp()).abs() < 1e-12);
    assert_eq!(far.z, -1.0);

    let near = v.project(&PointState::new(0.0, 0.0, 1.0, 0.0), &mut rng).unwrap();
    assert_eq!(near.intensity, 1.0);
}

#[test]
fn area_blur_distance_is_continuous() {
    let mut f = flame(32, 32);
    f.camera.dof.amount = 1.0;
    f.camera.dof.mode = DofMode::Area;
    f.camera.dof.area = 0.9;
    let v = view(&f);

    let inner = 0.9 - 0.9 / 2.25;
    let eps = 1e-9;
    assert_eq!(v.dof_blur_distance(inner), 0.0);
    assert!(v.dof_blur_distance(inner + eps) < 1e-6);
    assert!((v.dof_blur_distance(0.9 + eps) - v.dof_blur_distance(0.9)).abs() < 1e-6);
    assert!((v.dof_blur_distance(2.0) - 2.0).abs() < 1e-12);

    let mut prev = 0.0;
    for i in 0..=200 {
        let d = v.dof_blur_distance(i as f64 * 0.01);
        assert!(d + 1e-12 >= prev);
        prev = d;
    }
}

#[test]
fn legacy_dof_only_blurs_behind_the_focal_plane() {
    let mut f = flame(32, 32);
    f.camera.dof.amount = 2.0;
    let v = view(&f);
    let mut rng = PcgRandom::seeded(9);

    let front = v.project(&PointState::new(0.0, 0.0, 0.5, 0.0), &mut rng).unwrap();
    assert_eq!(front.dof_dist, 0.0);
    let sharp = v.project(&PointState::new(0.0, 0.0, 0.0, 0.0), &mut rng).unwrap();
    assert_eq!((front.x, front.y), (sharp.x, sharp.y));

    let behind = v
        .project(&PointState::new(0.0, 0.0, -0.5, 0.0), &mut rng)
        .unwrap();
    assert_eq!(behind.dof_dist, 0.5);
}

#[test]
fn shadow_casting_lights_get_a_frame() {
    let mut f = flame(32, 32);
    f.solid.enabled = true;
    f.solid.hard_shadows = true;
    f.solid.lights = vec![
        PointLight {
            x: 10.0,
            y: 0.0,
            z: 0.0,
            cast_shadows: true,
        },
        PointLight {
            x: 0.0,
            y: 5.0,
            z: 0.0,
            cast_shadows: false,
        },
    ];
    let v = view(&f);
    assert!(v.is_3d());
    let mut rng = PcgRandom::seeded(1);
    let p = v.project(&PointState::new(0.1, 0.2, 0.3, 0.0), &mut rng).unwrap();
    assert_eq!(p.lights.len(), 2);
    let lit = p.lights[0].unwrap();
    assert!((lit.length() - Vec3::new(0.1, 0.2, 0.3).length()).abs() < 1e-12);
    assert!(p.lights[1].is_none());
}
