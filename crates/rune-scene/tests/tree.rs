mod common;

use engine_core::RecordingSink;
use rune_scene::{NodeType, SceneError, StructuralError, StyleProperty};

fn structural(err: SceneError) -> StructuralError {
    match err {
        SceneError::Structural(e) => e,
        other => panic!("expected a structural error, got {other:?}"),
    }
}

#[test]
fn append_and_remove_are_inverse() {
    let mut scene = common::scene();
    scene
        .resources_mut()
        .register_asset("a.png", common::png(2, 2));
    let root = scene.root();
    let outer = scene.create_box().unwrap();
    let image = scene.create_image().unwrap();
    scene.set_image_source(image, Some("a.png")).unwrap();
    let resource = scene.node_resources(image)[0];

    scene.append_child(root, outer).unwrap();
    let before: Vec<_> = scene.children(root).unwrap().to_vec();
    let refcount = scene.resources().refcount(resource);

    scene.append_child(outer, image).unwrap();
    scene.remove_child(outer, image).unwrap();

    assert_eq!(scene.children(root).unwrap(), before.as_slice());
    assert!(scene.children(outer).unwrap().is_empty());
    assert_eq!(scene.parent(image).unwrap(), None);
    assert_eq!(scene.resources().refcount(resource), refcount);
}

#[test]
fn insert_before_keeps_document_order() {
    let mut scene = common::scene();
    let root = scene.root();
    let (a, b, c) = (
        scene.create_box().unwrap(),
        scene.create_box().unwrap(),
        scene.create_box().unwrap(),
    );
    scene.append_child(root, a).unwrap();
    scene.append_child(root, c).unwrap();
    scene.insert_before(root, b, c).unwrap();
    assert_eq!(scene.children(root).unwrap(), &[a, b, c]);

    let d = scene.create_box().unwrap();
    let err = structural(scene.insert_before(root, d, d).unwrap_err());
    assert!(matches!(err, StructuralError::NotAChild { .. }));
}

#[test]
fn invalid_mutations_are_rejected_and_change_nothing() {
    let mut scene = common::scene();
    let root = scene.root();
    let parent = scene.create_box().unwrap();
    let child = scene.create_box().unwrap();
    let text = scene.create_text().unwrap();
    scene.append_child(root, parent).unwrap();
    scene.append_child(parent, child).unwrap();

    let err = structural(scene.append_child(parent, root).unwrap_err());
    assert_eq!(err, StructuralError::RootNode);

    let err = structural(scene.append_child(child, parent).unwrap_err());
    assert!(matches!(err, StructuralError::Cycle { .. }));

    let err = structural(scene.append_child(child, child).unwrap_err());
    assert!(matches!(err, StructuralError::Cycle { .. }));

    let loose = scene.create_box().unwrap();
    let err = structural(scene.append_child(text, loose).unwrap_err());
    assert_eq!(err, StructuralError::LeafNode(text));

    let err = structural(scene.append_child(root, child).unwrap_err());
    assert_eq!(err, StructuralError::AlreadyParented { child });

    let err = structural(scene.remove_child(root, child).unwrap_err());
    assert!(matches!(err, StructuralError::NotAChild { .. }));

    assert_eq!(scene.children(root).unwrap(), &[parent]);
    assert_eq!(scene.children(parent).unwrap(), &[child]);
    assert_eq!(scene.parent(child).unwrap(), Some(parent));
}

#[test]
fn foreign_and_stale_ids_are_rejected() {
    let mut scene = common::scene();
    let mut other = common::scene();
    let foreign = other.create_box().unwrap();
    let err = structural(scene.append_child(scene.root(), foreign).unwrap_err());
    assert_eq!(err, StructuralError::ForeignScene(foreign));

    let gone = scene.create_box().unwrap();
    scene.destroy_node(gone).unwrap();
    let err = structural(scene.append_child(scene.root(), gone).unwrap_err());
    assert_eq!(err, StructuralError::Stale(gone));
    assert!(!scene.contains(gone));

    // A new node reusing the slot does not revive the old id.
    let fresh = scene.create_box().unwrap();
    assert_ne!(fresh, gone);
    assert!(scene.node_type(gone).is_err());
}

#[test]
fn destroy_requires_leaves_first() {
    let mut scene = common::scene();
    let root = scene.root();
    let outer = scene.create_box().unwrap();
    let inner = scene.create_box().unwrap();
    let text = scene.create_text().unwrap();
    scene.append_child(root, outer).unwrap();
    scene.append_child(outer, inner).unwrap();
    scene.append_child(inner, text).unwrap();

    let err = structural(scene.destroy_node(outer).unwrap_err());
    assert_eq!(err, StructuralError::HasChildren(outer));
    let err = structural(scene.destroy_node(root).unwrap_err());
    assert_eq!(err, StructuralError::RootNode);

    scene.destroy_subtree(outer).unwrap();
    assert_eq!(scene.node_count(), 1);
    assert!(scene.children(root).unwrap().is_empty());
    assert_eq!(scene.styles().len(), 1);
}

#[test]
fn destroying_a_node_releases_its_resources() {
    let mut scene = common::scene();
    scene
        .resources_mut()
        .register_asset("a.png", common::png(2, 2));
    let image = scene.create_image().unwrap();
    scene.set_image_source(image, Some("a.png")).unwrap();
    let resource = scene.node_resources(image)[0];
    assert_eq!(scene.resources().refcount(resource), 1);
    assert_eq!(scene.resources().listener_count(resource), 1);

    scene.destroy_node(image).unwrap();
    assert_eq!(scene.resources().refcount(resource), 0);
    assert_eq!(scene.resources().listener_count(resource), 0);
    assert!(scene.resources().is_pending_deletion(resource));
    assert_eq!(scene.resources_mut().compact(), 1);
    assert!(!scene.resources().contains(resource));
}

#[test]
fn z_order_is_stable_and_invalidated_by_changes() {
    let mut scene = common::scene();
    let root = scene.root();
    let a = scene.create_box().unwrap();
    let b = scene.create_box().unwrap();
    let c = scene.create_box().unwrap();
    for n in [a, b, c] {
        scene.append_child(root, n).unwrap();
    }
    scene.set_style(a, StyleProperty::ZIndex, 2).unwrap();
    scene.set_style(c, StyleProperty::ZIndex, 1).unwrap();
    assert_eq!(scene.children_ordered_by_z_index(root).unwrap(), vec![b, c, a]);

    scene.set_style(b, StyleProperty::ZIndex, 1).unwrap();
    assert_eq!(scene.children_ordered_by_z_index(root).unwrap(), vec![b, c, a]);

    scene.set_style(b, StyleProperty::ZIndex, 5).unwrap();
    assert_eq!(scene.children_ordered_by_z_index(root).unwrap(), vec![c, a, b]);

    scene.remove_child(root, a).unwrap();
    assert_eq!(scene.children_ordered_by_z_index(root).unwrap(), vec![c, b]);
}

#[test]
fn content_setters_check_the_node_kind() {
    let mut scene = common::scene();
    let boxed = scene.create_box().unwrap();
    let err = structural(scene.set_text(boxed, "nope").unwrap_err());
    assert!(matches!(err, StructuralError::WrongKind { expected: "text", .. }));
    let err = structural(scene.set_image_source(boxed, Some("a.png")).unwrap_err());
    assert!(matches!(err, StructuralError::WrongKind { expected: "image", .. }));
    assert_eq!(scene.node_type(boxed).unwrap(), NodeType::Box);
}

#[test]
fn detached_nodes_are_not_drawn() {
    let mut scene = common::scene();
    let root = scene.root();
    let b = scene.create_box().unwrap();
    scene.set_style_str(b, "height", "10px").unwrap();
    scene.set_style_str(b, "background-color", "red").unwrap();
    scene.append_child(root, b).unwrap();
    let mut sink = RecordingSink::new();
    scene.frame(&mut sink).unwrap();
    assert_eq!(sink.display_list().fill_rects().len(), 1);

    scene.remove_child(root, b).unwrap();
    sink.clear();
    let stats = scene.frame(&mut sink).unwrap();
    assert!(stats.composited);
    assert!(sink.display_list().fill_rects().is_empty());
    assert_eq!(scene.layout_box(b), None);
}
