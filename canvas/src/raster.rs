//! Decoded image rasters and the cache that binds them to `src` strings.
//!
//! Element records persist only `src`. Before a render that depends on an
//! image, the host awaits `RasterCache::load` for it; drawing an image whose
//! raster is not in the cache is a no-op. Fetching bytes is delegated to an
//! `AssetFetcher` so the canvas crate never touches the network itself.

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tiny_skia::{ColorU8, IntSize, Pixmap};
use tracing::{debug, warn};

use crate::consts::{MAX_RASTER_ALLOC_BYTES, MAX_RASTER_DIMENSION};

/// Why an image could not be made available for drawing.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),
    #[error("malformed data URL")]
    MalformedDataUrl,
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("refusing to fetch from non-public host: {0}")]
    ForbiddenHost(String),
    #[error("asset exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Resolves an image `src` to its encoded bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetError>;
}

/// Fetcher that only understands inline `data:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlFetcher;

#[async_trait]
impl AssetFetcher for DataUrlFetcher {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetError> {
        if src.starts_with("data:") {
            decode_data_url(src)
        } else {
            Err(AssetError::UnsupportedSource(src.to_owned()))
        }
    }
}

/// Decode the payload of a `data:[<mediatype>][;base64],<data>` URL.
///
/// # Errors
///
/// Returns `MalformedDataUrl` when the prefix or base64 payload is invalid.
pub fn decode_data_url(src: &str) -> Result<Vec<u8>, AssetError> {
    let rest = src.strip_prefix("data:").ok_or(AssetError::MalformedDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(AssetError::MalformedDataUrl)?;
    if meta.ends_with(";base64") {
        STANDARD.decode(payload.trim()).map_err(|_| AssetError::MalformedDataUrl)
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// A decoded image in premultiplied RGBA, ready to be drawn.
#[derive(Debug, Clone)]
pub struct Raster {
    pixmap: Pixmap,
}

impl Raster {
    /// Decode any format the `image` crate recognizes.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for unrecognized or corrupt data, and for images past
    /// [`MAX_RASTER_DIMENSION`] or [`MAX_RASTER_ALLOC_BYTES`].
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetError> {
        let mut reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AssetError::Decode(e.to_string()))?;
        reader.limits(decode_limits());
        let rgba = reader.decode().map_err(|e| AssetError::Decode(e.to_string()))?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let size = IntSize::from_wh(width, height).ok_or_else(|| AssetError::Decode("empty image".into()))?;

        let mut data = rgba.into_raw();
        for px in data.chunks_exact_mut(4) {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            px.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let pixmap = Pixmap::from_vec(data, size).ok_or_else(|| AssetError::Decode("bad pixel buffer".into()))?;
        Ok(Self { pixmap })
    }

    /// Wrap an already-premultiplied pixmap.
    #[must_use]
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

fn decode_limits() -> image::Limits {
    let mut limits = image::Limits::default();
    limits.max_image_width = Some(MAX_RASTER_DIMENSION);
    limits.max_image_height = Some(MAX_RASTER_DIMENSION);
    limits.max_alloc = Some(MAX_RASTER_ALLOC_BYTES);
    limits
}

/// Decoded rasters keyed by `src`. Sources that failed once are remembered and
/// not fetched again.
#[derive(Debug, Default, Clone)]
pub struct RasterCache {
    rasters: HashMap<String, Raster>,
    failed: HashSet<String>,
}

impl RasterCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, src: &str) -> Option<&Raster> {
        self.rasters.get(src)
    }

    pub fn insert(&mut self, src: impl Into<String>, raster: Raster) {
        let src = src.into();
        self.failed.remove(&src);
        self.rasters.insert(src, raster);
    }

    /// Drop a cached raster. Failure memory is kept.
    pub fn evict(&mut self, src: &str) -> Option<Raster> {
        self.rasters.remove(src)
    }

    #[must_use]
    pub fn contains(&self, src: &str) -> bool {
        self.rasters.contains_key(src)
    }

    #[must_use]
    pub fn has_failed(&self, src: &str) -> bool {
        self.failed.contains(src)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Sources from `srcs` that are neither cached nor known to fail.
    #[must_use]
    pub fn missing(&self, srcs: &[String]) -> Vec<String> {
        srcs.iter()
            .filter(|s| !s.is_empty() && !self.contains(s) && !self.has_failed(s))
            .cloned()
            .collect()
    }

    /// Make `src` available. Returns `true` if a raster is cached afterwards.
    /// Failures are logged and remembered, never propagated.
    pub async fn load(&mut self, src: &str, fetcher: &dyn AssetFetcher) -> bool {
        if src.is_empty() || self.has_failed(src) {
            return false;
        }
        if self.contains(src) {
            return true;
        }

        match fetcher.fetch(src).await.and_then(|bytes| Raster::decode(&bytes)) {
            Ok(raster) => {
                debug!(src = %short(src), width = raster.width(), height = raster.height(), "raster loaded");
                self.rasters.insert(src.to_owned(), raster);
                true
            }
            Err(e) => {
                warn!(src = %short(src), error = %e, "image load failed; drawing without it");
                self.failed.insert(src.to_owned());
                false
            }
        }
    }

    /// Load every source in order. Returns how many are cached afterwards.
    pub async fn load_all(&mut self, srcs: &[String], fetcher: &dyn AssetFetcher) -> usize {
        let mut ready = 0;
        for src in srcs {
            if self.load(src, fetcher).await {
                ready += 1;
            }
        }
        ready
    }
}

/// Truncate long sources (data URLs) for log output.
fn short(src: &str) -> &str {
    match src.char_indices().nth(64) {
        Some((idx, _)) => &src[..idx],
        None => src,
    }
}
