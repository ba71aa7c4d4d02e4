use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use super::*;
use crate::element::ElementKind;
use crate::geom::Point;
use crate::raster::{AssetError, DataUrlFetcher};
use crate::scene::{CanvasSize, SceneRecord};

// =============================================================
// Helpers
// =============================================================

fn fonts() -> Arc<FontBook> {
    Arc::new(FontBook::fallback())
}

/// Text id=1 "Title" and image id=2 on a square canvas.
fn template() -> Scene {
    let record = SceneRecord {
        canvas_size: CanvasSize::Square,
        background_color: "#FFFFFF".into(),
        background_image_src: None,
        elements: vec![
            Element::text(ElementId(1), "Title", Point::new(10.0, 10.0), "Title"),
            Element::image(ElementId(2), "Photo", Point::new(0.0, 500.0), ""),
        ],
    };
    Scene::from_record(&record, fonts()).unwrap()
}

fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

fn source(column: &str, values: &[&str]) -> TabularSource {
    TabularSource::new(vec![column.to_owned()], values.iter().map(|v| row(&[(column, *v)])).collect())
}

fn mapping(pairs: &[(u64, &str)]) -> BulkMapping {
    pairs.iter().map(|(id, col)| (ElementId(*id), (*col).to_owned())).collect()
}

fn png_data_url(rgba: [u8; 4]) -> String {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
}

fn pixel(png: &[u8], x: u32, y: u32) -> [u8; 4] {
    image::load_from_memory(png).unwrap().to_rgba8().get_pixel(x, y).0
}

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetFetcher for CountingFetcher {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DataUrlFetcher.fetch(src).await
    }
}

async fn run(template: &Scene, source: &TabularSource, mapping: &BulkMapping) -> Result<Vec<BulkOutput>, CanvasError> {
    generate(template, source, mapping, &mut RasterCache::new(), &DataUrlFetcher, &CancellationToken::new()).await
}

// =============================================================
// Names
// =============================================================

#[test]
fn sanitize_replaces_each_non_alphanumeric() {
    assert_eq!(sanitize_name("Men's Shoes!!"), "Men_s_Shoes__");
    assert_eq!(sanitize_name("abc123"), "abc123");
    assert_eq!(sanitize_name("café"), "caf_");
}

#[test]
fn mapping_orders_by_id_and_parses_string_keys() {
    let m: BulkMapping = serde_json::from_value(json!({ "7": "b", "3": "a" })).unwrap();
    assert_eq!(m.first_column(), Some("a"));
    assert_eq!(m.get(ElementId(7)), Some("b"));
    assert_eq!(m.len(), 2);
}

// =============================================================
// Pipeline
// =============================================================

#[tokio::test]
async fn end_to_end_two_rows() {
    let template = template();
    let out = run(&template, &source("product_name", &["Widget A", ""]), &mapping(&[(1, "product_name")]))
        .await
        .unwrap();

    let names: Vec<&str> = out.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["pin_Widget_A", "pin_2"]);
    assert!(out.iter().all(|o| o.png.starts_with(b"\x89PNG")));
    assert!(out[0].data_url().starts_with("data:image/png;base64,"));
}

#[test]
fn empty_value_keeps_template_default() {
    let template = template();
    let m = mapping(&[(1, "title")]);
    let src = source("title", &["Replaced", ""]);

    let mut elements = template.elements().to_vec();
    substitute(&mut elements, &m, &src.rows[1], template.fonts());
    let Element::Text(t) = &elements[0] else { unreachable!() };
    assert_eq!(t.text, "Title");

    substitute(&mut elements, &m, &src.rows[0], template.fonts());
    let Element::Text(t) = &elements[0] else { unreachable!() };
    assert_eq!(t.text, "Replaced");
    assert_eq!(t.width, template.fonts().measure("Replaced", &t.font, t.size, t.bold));
}

#[tokio::test]
async fn template_is_never_mutated() {
    let template = template();
    let before = template.to_record();
    run(&template, &source("title", &["One", "Two"]), &mapping(&[(1, "title")])).await.unwrap();
    assert_eq!(template.to_record(), before);
}

#[tokio::test]
async fn no_rows_is_rejected_before_work() {
    let fetcher = CountingFetcher::default();
    let mut template = template();
    template.set_background_image(Some(png_data_url([0, 0, 0, 255])));
    let err = generate(
        &template,
        &TabularSource::default(),
        &BulkMapping::new(),
        &mut RasterCache::new(),
        &fetcher,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CanvasError::NoRows));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unmapped_rows_are_named_by_index() {
    let template = template();
    let out = run(&template, &source("x", &["a", "b", "c"]), &BulkMapping::new()).await.unwrap();
    let names: Vec<&str> = out.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["pin_1", "pin_2", "pin_3"]);
}

#[tokio::test]
async fn image_src_is_substituted_per_row() {
    let template = template();
    let red = png_data_url([255, 0, 0, 255]);
    let blue = png_data_url([0, 0, 255, 255]);
    let src = source("photo", &[red.as_str(), blue.as_str(), ""]);

    let out = run(&template, &src, &mapping(&[(2, "photo")])).await.unwrap();
    assert_eq!(pixel(&out[0].png, 100, 600), [255, 0, 0, 255]);
    assert_eq!(pixel(&out[1].png, 100, 600), [0, 0, 255, 255]);
    // Empty value keeps the template's empty src: nothing drawn.
    assert_eq!(pixel(&out[2].png, 100, 600), [255, 255, 255, 255]);
    assert_eq!(out[2].name, "pin_3");
}

#[tokio::test]
async fn failed_image_degrades_row_and_is_fetched_once() {
    let template = template();
    let fetcher = CountingFetcher::default();
    let src = source("photo", &["https://cdn.example/gone.png", "https://cdn.example/gone.png"]);

    let out = generate(
        &template,
        &src,
        &mapping(&[(2, "photo")]),
        &mut RasterCache::new(),
        &fetcher,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(pixel(&out[0].png, 100, 600), [255, 255, 255, 255]);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn background_image_loaded_once_for_batch() {
    let fetcher = CountingFetcher::default();
    let mut template = template();
    template.set_background_image(Some(png_data_url([0, 255, 0, 255])));

    let out = generate(
        &template,
        &source("x", &["a", "b", "c"]),
        &BulkMapping::new(),
        &mut RasterCache::new(),
        &fetcher,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(pixel(&out[2].png, 990, 990), [0, 255, 0, 255]);
}

#[test]
fn button_label_mapping_replaces_label_text() {
    let mut template = template();
    let button = template.add_element(ElementKind::Button, Point::new(100.0, 800.0));
    let Some(Element::Button(b)) = template.element(button) else { unreachable!() };
    let label = b.text_element.id;
    let width_before = b.width;

    let m = mapping(&[(label.0, "cta")]);
    let src = source("cta", &["Buy the whole collection now"]);
    let mut elements = template.elements().to_vec();
    substitute(&mut elements, &m, &src.rows[0], template.fonts());

    let Element::Button(b) = &elements[2] else { unreachable!() };
    assert_eq!(b.text_element.text, "Buy the whole collection now");
    assert!(b.width > width_before);
}

#[tokio::test]
async fn cancelled_token_aborts_batch() {
    let template = template();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = generate(
        &template,
        &source("x", &["a", "b"]),
        &BulkMapping::new(),
        &mut RasterCache::new(),
        &DataUrlFetcher,
        &cancel,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CanvasError::Cancelled { completed: 0 }));
    assert!(err.is_batch_fatal());
}

#[tokio::test]
async fn unknown_mapping_id_is_ignored() {
    let template = template();
    let out = run(&template, &source("x", &["Hello"]), &mapping(&[(99, "x")])).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "pin_Hello");
}

#[tokio::test]
async fn output_matches_single_image_export_for_unmapped_rows() {
    let template = template();
    let out = run(&template, &source("x", &["a"]), &BulkMapping::new()).await.unwrap();
    let direct = render::export_png(&template, &RasterCache::new()).unwrap();
    assert_eq!(out[0].png, direct);
}

#[tokio::test]
async fn row_specific_rasters_are_evicted_after_each_row() {
    let mut template = template();
    let shared = png_data_url([0, 255, 0, 255]);
    template.set_background_image(Some(png_data_url([9, 9, 9, 255])));
    let photo = template.add_element(ElementKind::Image, Point::new(0.0, 0.0));
    template
        .update_element(photo, &src_patch(&shared), PatchTarget::Element)
        .unwrap();

    let per_row: Vec<String> = (0..20u8).map(|i| png_data_url([i, 0, 0, 255])).collect();
    let values: Vec<&str> = per_row.iter().map(String::as_str).collect();
    let mut rasters = RasterCache::new();
    let out = generate(
        &template,
        &source("photo", &values),
        &mapping(&[(2, "photo")]),
        &mut rasters,
        &DataUrlFetcher,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(out.len(), 20);
    assert_eq!(pixel(&out[7].png, 100, 600), [7, 0, 0, 255]);
    // Only the background and the template's unmapped image remain.
    assert_eq!(rasters.len(), 2);
    assert!(rasters.contains(&shared));
    assert!(per_row.iter().all(|src| !rasters.contains(src)));
}

#[tokio::test]
async fn rasters_already_in_the_callers_cache_are_kept() {
    let template = template();
    let red = png_data_url([255, 0, 0, 255]);
    let mut rasters = RasterCache::new();
    rasters.load(&red, &DataUrlFetcher).await;

    generate(
        &template,
        &source("photo", &[red.as_str()]),
        &mapping(&[(2, "photo")]),
        &mut rasters,
        &DataUrlFetcher,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(rasters.contains(&red));
}
