mod common;

use engine_core::RecordingSink;
use rune_scene::{Keyword, SceneError, StyleError, StyleNumber, StyleProperty, StyleValue};

fn style_error(err: SceneError) -> StyleError {
    match err {
        SceneError::Style(e) => e,
        other => panic!("expected a style error, got {other:?}"),
    }
}

#[test]
fn shared_styles_cascade_into_layout() {
    let mut scene = common::scene();
    let root = scene.root();
    let card = scene.create_box().unwrap();
    scene.append_child(root, card).unwrap();
    scene.set_style_str(card, "height", "10px").unwrap();

    let shared = scene.create_style();
    scene
        .set_style_value(shared, StyleProperty::Width, StyleNumber::point(120.0))
        .unwrap();
    scene
        .set_style_parent(scene.style_of(card).unwrap(), Some(shared))
        .unwrap();
    let mut sink = RecordingSink::new();
    scene.frame(&mut sink).unwrap();
    assert_eq!(scene.layout_box(card).unwrap().width, 120.0);

    scene
        .set_style(card, StyleProperty::Width, StyleNumber::point(60.0))
        .unwrap();
    scene.frame(&mut sink).unwrap();
    assert_eq!(scene.layout_box(card).unwrap().width, 60.0);

    // A change the node shadows does not move it.
    scene
        .set_style_value(shared, StyleProperty::Width, StyleNumber::point(200.0))
        .unwrap();
    let stats = scene.frame(&mut sink).unwrap();
    assert!(!stats.layout_ran);

    scene.unset_style(card, StyleProperty::Width).unwrap();
    scene.frame(&mut sink).unwrap();
    assert_eq!(scene.layout_box(card).unwrap().width, 200.0);

    scene.destroy_style(shared).unwrap();
    scene.frame(&mut sink).unwrap();
    assert_eq!(scene.layout_box(card).unwrap().width, 800.0);
    // Back to inheriting from the tree.
    assert_eq!(
        scene.styles().parent(scene.style_of(card).unwrap()).unwrap(),
        Some(scene.style_of(root).unwrap())
    );
}

#[test]
fn text_properties_inherit_down_the_tree() {
    let mut scene = common::scene();
    let root = scene.root();
    let panel = scene.create_box().unwrap();
    scene.append_child(root, panel).unwrap();
    scene.set_style_str(panel, "color", "red").unwrap();
    scene.set_style_str(panel, "width", "120px").unwrap();
    scene.set_style_str(panel, "opacity", "0.5").unwrap();

    let label = scene.create_text().unwrap();
    scene.append_child(panel, label).unwrap();
    let red = scene.get_style(panel, StyleProperty::Color).unwrap();
    assert_eq!(scene.get_style(label, StyleProperty::Color).unwrap(), red);
    assert_eq!(
        scene.get_style(label, StyleProperty::Width).unwrap(),
        StyleProperty::Width.default_value()
    );
    assert_eq!(
        scene.get_style(label, StyleProperty::Opacity).unwrap(),
        StyleProperty::Opacity.default_value()
    );

    scene.set_style_str(root, "font-weight", "700").unwrap();
    assert_eq!(
        scene.get_style(label, StyleProperty::FontWeight).unwrap(),
        StyleValue::Integer(700)
    );

    scene.remove_child(panel, label).unwrap();
    assert_eq!(
        scene.get_style(label, StyleProperty::Color).unwrap(),
        StyleProperty::Color.default_value()
    );
    assert_eq!(scene.styles().parent(scene.style_of(label).unwrap()).unwrap(), None);
}

#[test]
fn inherited_color_repaints_text_without_layout() {
    let mut scene = common::scene();
    let root = scene.root();
    let panel = scene.create_box().unwrap();
    scene.append_child(root, panel).unwrap();
    let label = scene.create_text().unwrap();
    scene.set_text(label, "hello").unwrap();
    scene.append_child(panel, label).unwrap();
    let mut sink = RecordingSink::new();
    scene.frame(&mut sink).unwrap();

    scene.set_style_str(panel, "color", "#336699").unwrap();
    let stats = scene.frame(&mut sink).unwrap();
    assert!(!stats.layout_ran);
    assert_eq!(stats.painted, 1);

    scene.set_style_str(label, "text-align", "center").unwrap();
    let stats = scene.frame(&mut sink).unwrap();
    assert!(!stats.layout_ran);
}

#[test]
fn effective_values_fall_back_to_defaults() {
    let mut scene = common::scene();
    let text = scene.create_text().unwrap();
    assert_eq!(
        scene.get_style(text, StyleProperty::FontWeight).unwrap(),
        StyleValue::Integer(400)
    );
    scene.set_style_str(text, "font-weight", "700").unwrap();
    assert_eq!(
        scene.get_style(text, StyleProperty::FontWeight).unwrap(),
        StyleValue::Integer(700)
    );
    scene.unset_style(text, StyleProperty::FontWeight).unwrap();
    assert_eq!(
        scene.get_style(text, StyleProperty::FontWeight).unwrap(),
        StyleValue::Integer(400)
    );
    assert_eq!(
        scene.get_style(text, StyleProperty::FlexDirection).unwrap(),
        StyleValue::Keyword(Keyword::Column)
    );
}

#[test]
fn bad_values_are_rejected_and_keep_the_old_value() {
    let mut scene = common::scene();
    let node = scene.create_box().unwrap();
    scene.set_style_str(node, "opacity", "0.5").unwrap();

    let err = style_error(scene.set_style_str(node, "opacity", "2").unwrap_err());
    assert!(matches!(err, StyleError::Validation { property: StyleProperty::Opacity, .. }));
    let err = style_error(scene.set_style_str(node, "opacity", "half").unwrap_err());
    assert!(matches!(err, StyleError::Parse { .. }));
    let err = style_error(scene.set_style_str(node, "no-such-thing", "1").unwrap_err());
    assert_eq!(err, StyleError::UnknownProperty("no-such-thing".into()));
    let err = style_error(scene.set_style(node, StyleProperty::Width, 5).unwrap_err());
    assert!(matches!(err, StyleError::KindMismatch { .. }));
    let err = style_error(scene.set_style_str(node, "width", "-4px").unwrap_err());
    assert!(matches!(err, StyleError::Validation { .. }));

    assert_eq!(
        scene.get_style(node, StyleProperty::Opacity).unwrap(),
        StyleValue::Number(StyleNumber::number(0.5))
    );
}

#[test]
fn owned_styles_and_cycles_are_refused() {
    let mut scene = common::scene();
    let node = scene.create_box().unwrap();
    let owned = scene.style_of(node).unwrap();
    let err = style_error(scene.destroy_style(owned).unwrap_err());
    assert_eq!(err, StyleError::Owned(owned));

    let a = scene.create_style();
    let b = scene.create_style();
    scene.set_style_parent(b, Some(a)).unwrap();
    let err = style_error(scene.set_style_parent(a, Some(b)).unwrap_err());
    assert!(matches!(err, StyleError::Cycle { .. }));
    let err = style_error(scene.set_style_parent(a, Some(a)).unwrap_err());
    assert!(matches!(err, StyleError::Cycle { .. }));

    let err = style_error(scene.set_style_parent(a, Some(owned)).unwrap_err());
    assert_eq!(err, StyleError::SharedParent { style: a, parent: owned });

    scene.destroy_style(a).unwrap();
    let err = style_error(scene.set_style_parent(b, Some(a)).unwrap_err());
    assert_eq!(err, StyleError::Stale(a));
}
