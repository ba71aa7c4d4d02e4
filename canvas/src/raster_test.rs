use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn png_data_url(width: u32, height: u32) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(width, height, [255, 0, 0, 255])))
}

/// Counts fetches and fails for anything that isn't a data URL.
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

// =============================================================
// data URLs
// =============================================================

#[test]
fn decode_data_url_base64() {
    let bytes = decode_data_url("data:text/plain;base64,aGVsbG8=").unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn decode_data_url_plain_payload() {
    assert_eq!(decode_data_url("data:text/plain,hi").unwrap(), b"hi");
}

#[test]
fn decode_data_url_rejects_garbage() {
    assert!(matches!(decode_data_url("data:image/png;base64"), Err(AssetError::MalformedDataUrl)));
    assert!(matches!(decode_data_url("data:image/png;base64,@@@"), Err(AssetError::MalformedDataUrl)));
    assert!(matches!(decode_data_url("https://x"), Err(AssetError::MalformedDataUrl)));
}

#[tokio::test]
async fn data_url_fetcher_rejects_other_schemes() {
    let err = DataUrlFetcher.fetch("https://example.com/a.png").await.unwrap_err();
    assert!(matches!(err, AssetError::UnsupportedSource(_)));
}

// =============================================================
// Raster
// =============================================================

#[test]
fn raster_decode_png_premultiplies() {
    let raster = Raster::decode(&png_bytes(3, 2, [200, 100, 50, 128])).unwrap();
    assert_eq!((raster.width(), raster.height()), (3, 2));
    let px = raster.pixmap().pixel(0, 0).unwrap();
    assert_eq!(px.alpha(), 128);
    assert!(px.red() < 200);
}

#[test]
fn raster_decode_rejects_garbage() {
    assert!(matches!(Raster::decode(b"not an image"), Err(AssetError::Decode(_))));
}

#[test]
fn raster_decode_enforces_dimension_limit() {
    let wide = png_bytes(MAX_RASTER_DIMENSION + 1, 1, [0, 0, 0, 255]);
    assert!(matches!(Raster::decode(&wide), Err(AssetError::Decode(_))));
    let edge = Raster::decode(&png_bytes(MAX_RASTER_DIMENSION, 1, [0, 0, 0, 255])).unwrap();
    assert_eq!(edge.width(), MAX_RASTER_DIMENSION);
}

// =============================================================
// RasterCache
// =============================================================

#[tokio::test]
async fn cache_loads_once() {
    let fetcher = CountingFetcher::default();
    let mut cache = RasterCache::new();
    let src = png_data_url(4, 4);

    assert!(cache.load(&src, &fetcher).await);
    assert!(cache.load(&src, &fetcher).await);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(&src).unwrap().width(), 4);
}

#[tokio::test]
async fn cache_remembers_failures() {
    let fetcher = CountingFetcher::default();
    let mut cache = RasterCache::new();

    assert!(!cache.load("https://example.com/missing.png", &fetcher).await);
    assert!(!cache.load("https://example.com/missing.png", &fetcher).await);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(cache.has_failed("https://example.com/missing.png"));
}

#[tokio::test]
async fn empty_src_is_never_fetched() {
    let fetcher = CountingFetcher::default();
    let mut cache = RasterCache::new();
    assert!(!cache.load("", &fetcher).await);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_all_counts_ready_sources() {
    let mut cache = RasterCache::new();
    let srcs = vec![png_data_url(1, 1), "nope.png".to_owned(), png_data_url(2, 2)];
    assert_eq!(cache.load_all(&srcs, &DataUrlFetcher).await, 2);
    assert!(cache.missing(&srcs).is_empty());
}

#[tokio::test]
async fn evict_drops_raster_but_keeps_failure_memory() {
    let fetcher = CountingFetcher::default();
    let mut cache = RasterCache::new();
    let src = png_data_url(2, 2);
    cache.load(&src, &fetcher).await;
    cache.load("nope.png", &fetcher).await;

    assert!(cache.evict(&src).is_some());
    assert!(cache.evict(&src).is_none());
    assert!(cache.is_empty());
    assert!(cache.has_failed("nope.png"));

    assert!(cache.load(&src, &fetcher).await);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn missing_skips_cached_failed_and_empty() {
    let mut cache = RasterCache::new();
    cache.insert("a", Raster::decode(&png_bytes(1, 1, [0, 0, 0, 255])).unwrap());
    let srcs = vec!["a".to_owned(), "b".to_owned(), String::new()];
    assert_eq!(cache.missing(&srcs), vec!["b".to_owned()]);
}
