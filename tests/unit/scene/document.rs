use super::*;
use crate::Rgb;

fn parse(json: &str) -> FlameResult<FlameDocument> {
    FlameDocument::from_reader(json.as_bytes())
}

const SIERPINSKI: &str = r##"{
    "width": 32,
    "height": 24,
    "palette": ["#000000", "#ffffff"],
    "transforms": [
        { "weight": 1, "color": 0.0, "coefs": [0.5, 0, 0, 0.5, 0, 0], "variations": { "linear": 1 } },
        { "weight": 1, "color": 0.5, "coefs": [0.5, 0, 0, 0.5, 0.5, 0], "variations": { "linear": 1 } },
        { "weight": 1, "color": 1.0, "coefs": [0.5, 0, 0, 0.5, 0, 0.5], "variations": { "linear": 1 } }
    ],
    "final_transform": { "variations": { "swirl": 0.2 } }
}"##;

#[test]
fn builds_a_complete_flame() {
    let doc = parse(SIERPINSKI).unwrap();
    assert_eq!(doc.size(), (32, 24));
    let flame = doc.build().unwrap();
    assert_eq!(flame.transforms.len(), 3);
    assert_eq!(flame.transforms[1].affine, Affine::new([0.5, 0.0, 0.0, 0.5, 0.5, 0.0]));
    assert_eq!(flame.transforms[2].variations[0].func.name(), "linear");
    assert!(flame.final_transform.is_some());
    assert_eq!(flame.palette.colors().len(), PALETTE_SIZE);
    assert_eq!(flame.palette.lookup(0.0), Rgb::black());
    assert_eq!(flame.palette.lookup(1.0), Rgb::new(255.0, 255.0, 255.0));
}

#[test]
fn empty_palette_falls_back_to_gray() {
    let doc = parse(r#"{"width": 4, "height": 4, "transforms": [{"variations": {"linear": 1}}]}"#)
        .unwrap();
    let flame = doc.build().unwrap();
    assert_eq!(flame.palette.colors(), Palette::gray().colors());
}

#[test]
fn malformed_json_is_a_validation_error() {
    let err = parse("{ not json").unwrap_err();
    match err {
        FlameError::Validation(msg) => assert!(msg.starts_with("parse flame JSON"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_variation_names_its_transform() {
    let doc = parse(
        r#"{"width": 4, "height": 4, "transforms": [
            {"variations": {"linear": 1}},
            {"variations": {"bogus": 1}}
        ]}"#,
    )
    .unwrap();
    match doc.validate().unwrap_err() {
        FlameError::Validation(msg) => {
            assert_eq!(msg, "transform 1: unknown variation 'bogus'");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn final_transform_errors_are_labelled() {
    let doc = parse(
        r#"{"width": 4, "height": 4,
            "transforms": [{"variations": {"linear": 1}}],
            "final_transform": {"variations": {"linear": {"amount": 1, "filled": 1}}}}"#,
    )
    .unwrap();
    match doc.build().unwrap_err() {
        FlameError::Validation(msg) => assert!(msg.starts_with("final transform: "), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn flame_level_checks_still_run() {
    let doc = parse(r#"{"width": 0, "height": 4, "transforms": [{}]}"#).unwrap();
    assert!(matches!(doc.validate(), Err(FlameError::Validation(_))));

    let doc = parse(r#"{"width": 4, "height": 4, "transforms": []}"#).unwrap();
    assert!(matches!(doc.validate(), Err(FlameError::Validation(_))));
}

#[test]
fn missing_file_is_reported() {
    let err = FlameDocument::from_path("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, FlameError::Validation(msg) if msg.contains("not/here.json")));
}
