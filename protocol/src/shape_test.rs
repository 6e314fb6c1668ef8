#![allow(clippy::float_cmp)]

use super::*;

fn stroke(points: &[(f64, f64)]) -> Shape {
    Shape::Freehand {
        path: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        color: DEFAULT_COLOR.to_owned(),
        stroke_width: DEFAULT_STROKE_WIDTH,
    }
}

// =============================================================
// Defaults and aliases
// =============================================================

#[test]
fn rect_fills_missing_style_with_defaults() {
    let shape: Shape = serde_json::from_str(r#"{"type":"rect","x":1,"y":2,"width":3,"height":4}"#).expect("rect");
    assert_eq!(
        shape,
        Shape::Rect {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            color: "#ffffff".into(),
            stroke_width: 2.0,
        }
    );
}

#[test]
fn circle_alias_decodes_as_ellipse() {
    let shape: Shape =
        serde_json::from_str(r#"{"type":"circle","centerX":10,"centerY":20,"radius":5,"color":"red"}"#).expect("circle");
    assert!(matches!(shape, Shape::Ellipse { radius, .. } if radius == 5.0));
    assert_eq!(shape.color(), Some("red"));
}

#[test]
fn pencil_alias_decodes_as_freehand() {
    let shape: Shape = serde_json::from_str(r#"{"type":"pencil","path":[{"x":0,"y":0},{"x":5,"y":5}]}"#).expect("pencil");
    assert_eq!(shape.kind(), "freehand");
}

#[test]
fn text_accepts_text_alias_for_content() {
    let shape: Shape = serde_json::from_str(r#"{"type":"text","x":0,"y":0,"text":"hi"}"#).expect("text");
    match shape {
        Shape::Text { content, font_size, .. } => {
            assert_eq!(content, "hi");
            assert_eq!(font_size, DEFAULT_FONT_SIZE);
        }
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn eraser_has_no_color_and_wide_default() {
    let shape: Shape = serde_json::from_str(r#"{"type":"eraser","path":[{"x":1,"y":1}]}"#).expect("eraser");
    assert_eq!(shape.color(), None);
    assert!(matches!(shape, Shape::Eraser { stroke_width, .. } if stroke_width == DEFAULT_ERASER_WIDTH));
}

#[test]
fn serialized_fields_are_camel_case() {
    let shape = Shape::Ellipse {
        center_x: 1.0,
        center_y: 2.0,
        radius: 3.0,
        color: "blue".into(),
        stroke_width: 4.0,
    };
    let json = serde_json::to_value(&shape).expect("serialize");
    assert_eq!(json["type"], "ellipse");
    assert_eq!(json["centerX"], 1.0);
    assert_eq!(json["strokeWidth"], 4.0);
}

// =============================================================
// Validation
// =============================================================

#[test]
fn single_point_stroke_is_valid() {
    assert!(stroke(&[(3.0, 4.0)]).validate().is_ok());
}

#[test]
fn empty_path_is_rejected() {
    assert_eq!(stroke(&[]).validate(), Err(ShapeError::EmptyPath));
}

#[test]
fn non_finite_coordinate_is_rejected() {
    let shape = Shape::Rect {
        x: f64::NAN,
        y: 0.0,
        width: 1.0,
        height: 1.0,
        color: DEFAULT_COLOR.into(),
        stroke_width: 1.0,
    };
    assert_eq!(shape.validate(), Err(ShapeError::NonFinite("x")));
}

#[test]
fn zero_stroke_width_is_rejected() {
    let shape = Shape::Eraser { path: vec![Point::new(0.0, 0.0)], stroke_width: 0.0 };
    assert_eq!(shape.validate(), Err(ShapeError::NonPositive("strokeWidth")));
}

#[test]
fn negative_rect_extent_is_allowed() {
    let shape = Shape::Rect {
        x: 10.0,
        y: 10.0,
        width: -5.0,
        height: -5.0,
        color: DEFAULT_COLOR.into(),
        stroke_width: 1.0,
    };
    assert!(shape.validate().is_ok());
}

#[test]
fn negative_font_size_is_rejected() {
    let shape = Shape::Text {
        x: 0.0,
        y: 0.0,
        content: "x".into(),
        color: DEFAULT_COLOR.into(),
        font_size: -1.0,
    };
    assert_eq!(shape.validate(), Err(ShapeError::NonPositive("fontSize")));
}

// =============================================================
// Value equality
// =============================================================

#[test]
fn shapes_compare_by_value() {
    assert_eq!(stroke(&[(0.0, 0.0), (1.0, 1.0)]), stroke(&[(0.0, 0.0), (1.0, 1.0)]));
    assert_ne!(stroke(&[(0.0, 0.0), (1.0, 1.0)]), stroke(&[(0.0, 0.0), (1.0, 2.0)]));
}

#[test]
fn point_distance_is_euclidean() {
    assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
}
