use super::*;
use serde_json::json;

#[test]
fn text_field_defaults_apply() {
    let f: Field = serde_json::from_value(json!({
        "name": "title",
        "kind": "text",
        "position": {"x": 50, "y": 40}
    }))
    .unwrap();
    assert_eq!(f.depth, 1);
    assert!(f.visible);
    assert_eq!(f.rotation_deg, 0.0);
    assert_eq!(f.kind_tag(), "text");
    let FieldKind::Text { style } = &f.kind else {
        panic!("expected text kind");
    };
    assert_eq!(style, &TextStyle::default());
}

#[test]
fn editor_aliases_and_partial_styles_parse() {
    let f: Field = serde_json::from_value(json!({
        "id": "f1",
        "name": "logo",
        "kind": "static_image",
        "staticContent": "logo.png",
        "position": [10, 90],
        "zIndex": 7,
        "rotation": -15,
        "style": {"imageMaxWidth": 10, "rounded": true, "fontSize": 99}
    }))
    .unwrap();
    assert_eq!(f.depth, 7);
    assert_eq!(f.rotation_deg, -15.0);
    assert_eq!(f.position, Position::new(10.0, 90.0));
    assert!(f.is_static());
    let FieldKind::StaticImage { content, style } = &f.kind else {
        panic!("expected static image");
    };
    assert_eq!(content, "logo.png");
    assert_eq!(style.max_width, 10.0);
    assert_eq!(style.max_height, 25.0);
    assert!(style.rounded);
}

#[test]
fn font_weight_accepts_keywords_and_numbers() {
    let s: TextStyle = serde_json::from_value(json!({"fontWeight": "bold"})).unwrap();
    assert_eq!(s.font_weight, FontWeight::BOLD);
    let s: TextStyle = serde_json::from_value(json!({"font_weight": 600})).unwrap();
    assert_eq!(s.font_weight, FontWeight(600));
    let s: TextStyle = serde_json::from_value(json!({"font_weight": "300"})).unwrap();
    assert_eq!(s.font_weight, FontWeight(300));
    assert!(serde_json::from_value::<TextStyle>(json!({"font_weight": "heavy-ish"})).is_err());
}

#[test]
fn font_weight_strings_clamp_like_numbers() {
    let weight = |v: serde_json::Value| {
        serde_json::from_value::<TextStyle>(json!({ "font_weight": v }))
            .unwrap()
            .font_weight
    };
    assert_eq!(weight(json!("0")), FontWeight(1));
    assert_eq!(weight(json!(0)), FontWeight(1));
    assert_eq!(weight(json!("5000")), FontWeight(1000));
    assert_eq!(weight(json!(5000)), FontWeight(1000));
    assert_eq!(weight(json!(" 650.4 ")), FontWeight(650));
    assert!(serde_json::from_value::<TextStyle>(json!({"font_weight": "inf"})).is_err());
}

#[test]
fn unknown_kind_is_rejected() {
    let r = serde_json::from_value::<Field>(json!({
        "name": "x",
        "kind": "video",
        "position": {"x": 0, "y": 0}
    }));
    assert!(r.is_err());
}

#[test]
fn builders_round_trip_through_json() {
    let f = Field::text("name", Position::new(50.0, 50.0), TextStyle::default()).at_depth(3);
    let v = serde_json::to_value(&f).unwrap();
    assert_eq!(v["kind"], json!("text"));
    let back: Field = serde_json::from_value(v).unwrap();
    assert_eq!(back, f);
}
