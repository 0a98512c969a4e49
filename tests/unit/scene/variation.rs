use super::*;
use crate::random::source::PcgRandom;

fn eval(var: &dyn Variation, x: f64, y: f64, amount: f64) -> PointState {
    let mut rng = PcgRandom::seeded(1);
    let mut ctx = VariationContext {
        rng: &mut rng,
        preserve_z: false,
    };
    let affine = PointState::new(x, y, 0.0, 0.0);
    let mut out = PointState::default();
    var.transform(&mut ctx, &affine, &mut out, amount);
    out
}

#[test]
fn linear_scales_input() {
    let out = eval(&Linear, 0.5, -2.0, 2.0);
    assert_eq!((out.x, out.y), (1.0, -4.0));
}

#[test]
fn spherical_inverts_radius() {
    let out = eval(&Spherical, 2.0, 0.0, 1.0);
    assert!((out.x - 0.5).abs() < 1e-9);
    assert!(out.y.abs() < 1e-12);
}

#[test]
fn variations_accumulate_into_output() {
    let mut rng = PcgRandom::seeded(1);
    let mut ctx = VariationContext {
        rng: &mut rng,
        preserve_z: false,
    };
    let affine = PointState::new(0.3, 0.4, 0.0, 0.0);
    let mut out = PointState::default();
    Linear.transform(&mut ctx, &affine, &mut out, 0.5);
    Linear.transform(&mut ctx, &affine, &mut out, 0.5);
    assert!((out.x - 0.3).abs() < 1e-12);
    assert!((out.y - 0.4).abs() < 1e-12);
}

#[test]
fn preserve_z_carries_depth() {
    let mut rng = PcgRandom::seeded(1);
    let mut ctx = VariationContext {
        rng: &mut rng,
        preserve_z: true,
    };
    let affine = PointState::new(0.3, 0.4, 2.0, 0.0);
    let mut out = PointState::default();
    Swirl.transform(&mut ctx, &affine, &mut out, 0.5);
    assert_eq!(out.z, 1.0);
}

#[test]
fn collideoscope_preserves_radius() {
    let var = Collideoscope::new(0.2, 3).unwrap();
    let out = eval(&var, 0.6, -0.8, 1.0);
    let r = (out.x * out.x + out.y * out.y).sqrt();
    assert!((r - 1.0).abs() < 1e-9);
    assert!(Collideoscope::new(0.2, 0).is_err());
}

#[test]
fn catalog_resolves_names_and_rejects_unknown() {
    let params = BTreeMap::new();
    for name in [
        "linear",
        "sinusoidal",
        "spherical",
        "swirl",
        "horseshoe",
        "cannabiscurve_wf",
        "collideoscope",
    ] {
        assert_eq!(builtin_variation(name, &params).unwrap().name(), name);
    }
    assert!(builtin_variation("julia_n", &params).is_err());

    let mut bad = BTreeMap::new();
    bad.insert("power".to_string(), 2.0);
    assert!(builtin_variation("linear", &bad).is_err());
}

#[test]
fn cannabis_curve_stays_bounded() {
    let var = CannabisCurve { filled: true };
    let mut rng = PcgRandom::seeded(5);
    let mut ctx = VariationContext {
        rng: &mut rng,
        preserve_z: false,
    };
    for i in 0..200 {
        let t = f64::from(i) * 0.1;
        let affine = PointState::new(t.cos(), t.sin(), 0.0, 0.0);
        let mut out = PointState::default();
        var.transform(&mut ctx, &affine, &mut out, 1.0);
        assert!(out.is_finite());
        assert!(out.x.abs() < 10.0 && out.y.abs() < 10.0);
    }
}
