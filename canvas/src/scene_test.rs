#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn fonts() -> Arc<FontBook> {
    Arc::new(FontBook::fallback())
}

fn empty() -> Scene {
    Scene::new(fonts())
}

fn ids(scene: &Scene) -> Vec<ElementId> {
    scene.elements().iter().map(Element::id).collect()
}

// =============================================================
// CanvasSize
// =============================================================

#[test]
fn canvas_size_dimensions() {
    assert_eq!(CanvasSize::Standard.dimensions(), (1000, 1500));
    assert_eq!(CanvasSize::Long.dimensions(), (1000, 2100));
    assert_eq!(CanvasSize::Square.dimensions(), (1000, 1000));
    assert_eq!(CanvasSize::Story.dimensions(), (1080, 1920));
}

#[test]
fn canvas_size_parses_wxh_strings() {
    for size in CanvasSize::ALL {
        assert_eq!(size.as_str().parse::<CanvasSize>().unwrap(), size);
    }
    assert!(matches!("800x600".parse::<CanvasSize>(), Err(CanvasError::UnknownCanvasSize(s)) if s == "800x600"));
}

#[test]
fn canvas_size_serializes_as_string() {
    assert_eq!(serde_json::to_value(CanvasSize::Story).unwrap(), json!("1080x1920"));
    let size: CanvasSize = serde_json::from_value(json!("1000x2100")).unwrap();
    assert_eq!(size, CanvasSize::Long);
}

// =============================================================
// add / delete
// =============================================================

#[test]
fn add_appends_names_and_selects() {
    let mut scene = empty();
    let a = scene.add_element(ElementKind::Text, Point::new(10.0, 10.0));
    let b = scene.add_element(ElementKind::Text, Point::new(20.0, 20.0));
    let c = scene.add_element(ElementKind::Image, Point::new(30.0, 30.0));

    assert_eq!(ids(&scene), vec![a, b, c]);
    assert_eq!(scene.element(a).unwrap().name(), "Text 1");
    assert_eq!(scene.element(b).unwrap().name(), "Text 2");
    assert_eq!(scene.element(c).unwrap().name(), "Image 1");
    assert_eq!(scene.selected_id(), Some(c));
}

#[test]
fn added_ids_are_unique_including_button_labels() {
    let mut scene = empty();
    scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));
    scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));
    let mut all: Vec<ElementId> = scene.elements().iter().flat_map(Element::owned_ids).collect();
    let before = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), before);
}

#[test]
fn added_text_is_laid_out() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert!(scene.element(id).unwrap().bounds().width > 0.0);
}

#[test]
fn delete_clears_selection() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert!(scene.delete_element(id));
    assert!(scene.is_empty());
    assert_eq!(scene.selected_id(), None);
}

#[test]
fn delete_is_idempotent() {
    let mut scene = empty();
    let keep = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert!(!scene.delete_element(ElementId(999)));
    assert_eq!(ids(&scene), vec![keep]);
    assert_eq!(scene.selected_id(), Some(keep));
}

#[test]
fn delete_button_removes_its_label() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));
    let Element::Button(b) = scene.element(id).unwrap() else { unreachable!() };
    let label = b.text_element.id;
    scene.delete_element(id);
    assert!(scene.element_by_id(label).is_none());
}

// =============================================================
// z-order
// =============================================================

#[test]
fn move_layer_swaps_neighbours() {
    let mut scene = empty();
    let a = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    let b = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    let c = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));

    assert!(scene.move_layer(a, LayerDirection::Up));
    assert_eq!(ids(&scene), vec![b, a, c]);
    assert!(scene.move_layer(c, LayerDirection::Down));
    assert_eq!(ids(&scene), vec![b, c, a]);
}

#[test]
fn move_layer_is_noop_at_boundaries() {
    let mut scene = empty();
    let bottom = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    let top = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));

    assert!(!scene.move_layer(bottom, LayerDirection::Down));
    assert!(!scene.move_layer(top, LayerDirection::Up));
    assert!(!scene.move_layer(ElementId(42), LayerDirection::Up));
    assert_eq!(ids(&scene), vec![bottom, top]);
}

// =============================================================
// updates / selection
// =============================================================

#[test]
fn update_attribute_targets_button_or_label() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));

    scene.update_attribute(id, "color", &json!("#00AA00"), PatchTarget::Element).unwrap();
    scene.update_attribute(id, "color", &json!("#111111"), PatchTarget::Label).unwrap();

    let Element::Button(b) = scene.element(id).unwrap() else { unreachable!() };
    assert_eq!(b.bg_color, "#00AA00");
    assert_eq!(b.text_element.color, "#111111");
}

#[test]
fn update_unknown_id_is_an_error() {
    let mut scene = empty();
    let err = scene.update_attribute(ElementId(5), "text", &json!("x"), PatchTarget::Element).unwrap_err();
    assert!(matches!(err, CanvasError::ElementNotFound(ElementId(5))));
}

#[test]
fn element_by_id_resolves_labels() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));
    let Element::Button(b) = scene.element(id).unwrap() else { unreachable!() };
    let label = b.text_element.id;

    let (owner, target) = scene.element_by_id(label).unwrap();
    assert_eq!(owner.id(), id);
    assert_eq!(target, PatchTarget::Label);
    assert_eq!(scene.element_by_id(id).unwrap().1, PatchTarget::Element);
}

#[test]
fn set_selection_ignores_unknown_ids() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    scene.set_selection(Some(ElementId(77)));
    assert_eq!(scene.selected_id(), None);
    scene.set_selection(Some(id));
    assert_eq!(scene.selected_id(), Some(id));
    scene.set_selection(None);
    assert_eq!(scene.selected_id(), None);
}

#[test]
fn set_element_position_moves_anchor() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Image, Point::new(0.0, 0.0));
    assert!(scene.set_element_position(id, Point::new(12.0, 34.0)));
    assert_eq!(scene.element(id).unwrap().position(), Point::new(12.0, 34.0));
}

#[test]
fn empty_background_image_is_cleared() {
    let mut scene = empty();
    scene.set_background_image(Some("bg.png".into()));
    assert_eq!(scene.background_image_src(), Some("bg.png"));
    scene.set_background_image(Some(String::new()));
    assert_eq!(scene.background_image_src(), None);
}

// =============================================================
// default template
// =============================================================

#[test]
fn default_template_has_title_caption_button() {
    let scene = Scene::with_default_template(fonts());
    let kinds: Vec<ElementKind> = scene.elements().iter().map(Element::kind).collect();
    assert_eq!(kinds, vec![ElementKind::Text, ElementKind::Text, ElementKind::Button]);
    assert_eq!(scene.elements()[0].name(), "Title");
    assert_eq!(scene.selected_id(), None);
}

#[test]
fn default_template_button_is_centered() {
    let scene = Scene::with_default_template(fonts());
    let b = scene.elements()[2].bounds();
    let (width, _) = scene.canvas_size().dimensions();
    assert!((b.x + b.width / 2.0 - f64::from(width) / 2.0).abs() < 1e-9);
}

// =============================================================
// records
// =============================================================

#[test]
fn record_round_trip_restores_ids_verbatim() {
    let mut scene = Scene::with_default_template(fonts());
    scene.set_background_color("#FAFAFA");
    scene.set_canvas_size(CanvasSize::Square);
    let record = scene.to_record();

    let restored = Scene::from_record(&record, fonts()).unwrap();
    assert_eq!(restored.to_record(), record);
    assert_eq!(ids(&restored), ids(&scene));
}

#[test]
fn record_wire_shape_is_camel_case() {
    let scene = Scene::with_default_template(fonts());
    let value = serde_json::to_value(scene.to_record()).unwrap();
    assert_eq!(value["canvasSize"], "1000x1500");
    assert_eq!(value["backgroundColor"], "#FFFFFF");
    assert!(value["backgroundImageSrc"].is_null());
    assert_eq!(value["elements"].as_array().unwrap().len(), 3);
}

#[test]
fn bad_element_records_are_skipped() {
    let value = json!({
        "canvasSize": "1000x1500",
        "backgroundColor": "#fff",
        "elements": [
            { "kind": "video", "id": 1 },
            { "kind": "image", "id": 2, "name": "Pic", "x": 0.0, "y": 0.0, "src": "a.png" },
            { "kind": "text", "id": 3 }
        ]
    });
    let record: SceneRecord = serde_json::from_value(value).unwrap();
    assert_eq!(record.elements.len(), 1);
    assert_eq!(record.elements[0].id(), ElementId(2));
}

#[test]
fn load_record_never_reuses_ids() {
    let mut scene = empty();
    let record = SceneRecord {
        canvas_size: CanvasSize::Standard,
        background_color: "#fff".into(),
        background_image_src: None,
        elements: vec![Element::image(ElementId(40), "Pic", Point::new(0.0, 0.0), "a.png")],
    };
    scene.load_record(&record).unwrap();
    let fresh = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert!(fresh.0 > 40);

    scene.load_record(&record).unwrap();
    let again = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert!(again > fresh);
}

#[test]
fn load_record_clears_dangling_selection() {
    let mut scene = empty();
    let id = scene.add_element(ElementKind::Text, Point::new(0.0, 0.0));
    assert_eq!(scene.selected_id(), Some(id));
    scene.load_record(&SceneRecord {
        canvas_size: CanvasSize::Standard,
        background_color: "#fff".into(),
        background_image_src: None,
        elements: Vec::new(),
    })
    .unwrap();
    assert_eq!(scene.selected_id(), None);
}

#[test]
fn max_u64_id_is_rejected_without_touching_the_scene() {
    let value = json!({
        "canvasSize": "1000x1000",
        "backgroundColor": "#000",
        "elements": [
            { "kind": "image", "id": 18_446_744_073_709_551_615_u64, "name": "Pic", "x": 0.0, "y": 0.0, "src": "a.png" }
        ]
    });
    let record: SceneRecord = serde_json::from_value(value).unwrap();
    assert!(matches!(
        Scene::from_record(&record, fonts()),
        Err(CanvasError::IdOutOfRange(ElementId(u64::MAX)))
    ));

    let mut scene = Scene::with_default_template(fonts());
    let before = scene.to_record();
    assert!(scene.load_record(&record).is_err());
    assert_eq!(scene.to_record(), before);
}

#[test]
fn largest_supported_id_still_allocates_fresh_ids() {
    let mut scene = empty();
    let record = SceneRecord {
        canvas_size: CanvasSize::Standard,
        background_color: "#fff".into(),
        background_image_src: None,
        elements: vec![Element::image(ElementId(MAX_ELEMENT_ID), "Pic", Point::new(0.0, 0.0), "a.png")],
    };
    scene.load_record(&record).unwrap();
    let fresh = scene.add_element(ElementKind::Button, Point::new(0.0, 0.0));
    assert_eq!(fresh, ElementId(MAX_ELEMENT_ID + 1));
    let Some(Element::Button(b)) = scene.element(fresh) else { unreachable!() };
    assert_eq!(b.text_element.id, ElementId(MAX_ELEMENT_ID + 2));

    let over = SceneRecord {
        elements: vec![Element::image(ElementId(MAX_ELEMENT_ID + 1), "Pic", Point::new(0.0, 0.0), "a.png")],
        ..record
    };
    assert!(matches!(scene.load_record(&over), Err(CanvasError::IdOutOfRange(_))));
}

#[test]
fn pending_image_sources_dedupes_background_first() {
    let mut scene = empty();
    scene.set_background_image(Some("bg.png".into()));
    for src in ["a.png", "bg.png", "a.png", ""] {
        let id = scene.add_element(ElementKind::Image, Point::new(0.0, 0.0));
        scene.update_attribute(id, "src", &json!(src), PatchTarget::Element).unwrap();
    }
    assert_eq!(scene.pending_image_sources(), vec!["bg.png".to_owned(), "a.png".to_owned()]);
}
