//! Bulk generation: one rendered pin per tabular row.
//!
//! Each row works on its own copy of the template elements, rebuilt through
//! the element record round trip, so substitutions never leak into the
//! template or into later rows. Rows are processed strictly in input order
//! and each is drawn on a fresh surface.
//!
//! Rasters shared by every row (the background and the template's own image
//! sources) stay in the caller's cache. Rasters fetched only for one row are
//! evicted once that row is encoded, so memory is bounded by a single row
//! rather than the batch.
//!
//! Failure policy: a failed image load degrades that row (the image is simply
//! not drawn); surface allocation, PNG encoding, and cancellation abort the
//! whole batch with a single error and no partial output.

#[cfg(test)]
#[path = "bulk_test.rs"]
mod bulk_test;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::element::{Element, ElementId, ElementPatch, PatchTarget};
use crate::error::CanvasError;
use crate::fonts::FontBook;
use crate::raster::{AssetFetcher, RasterCache};
use crate::render;
use crate::scene::Scene;
use crate::surface::{self, Surface};

/// Ordered rows of string-keyed records plus the header list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularSource {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl TabularSource {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<HashMap<String, String>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Element id (or a button label's id) to column name, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkMapping(BTreeMap<ElementId, String>);

impl BulkMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ElementId, column: impl Into<String>) {
        self.0.insert(id, column.into());
    }

    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    /// Column mapped to the lowest id. Its value names each output.
    #[must_use]
    pub fn first_column(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &str)> {
        self.0.iter().map(|(id, col)| (*id, col.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ElementId, String)> for BulkMapping {
    fn from_iter<I: IntoIterator<Item = (ElementId, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutput {
    /// Filesystem-safe name without extension, e.g. `pin_Widget_A`.
    pub name: String,
    pub png: Vec<u8>,
}

impl BulkOutput {
    /// The image as a `data:image/png;base64,` string.
    #[must_use]
    pub fn data_url(&self) -> String {
        surface::png_data_url(&self.png)
    }
}

/// Replace every character that is not ASCII alphanumeric with `_`, one for one.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    raw.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Render one image per row of `source`.
///
/// # Errors
///
/// `NoRows` before any work for an empty source; `Cancelled` when `cancel`
/// fires between rows; `SurfaceAllocation` or `Encode` abort the batch.
pub async fn generate(
    template: &Scene,
    source: &TabularSource,
    mapping: &BulkMapping,
    rasters: &mut RasterCache,
    fetcher: &dyn AssetFetcher,
    cancel: &CancellationToken,
) -> Result<Vec<BulkOutput>, CanvasError> {
    if source.is_empty() {
        return Err(CanvasError::NoRows);
    }
    check_mapping(template, source, mapping);

    let (width, height) = template.canvas_size().dimensions();
    let fonts = template.fonts();
    if let Some(bg) = template.background_image_src() {
        rasters.load(bg, fetcher).await;
    }
    let shared: HashSet<String> = template.pending_image_sources().into_iter().collect();
    let records = template.elements().iter().map(Element::to_record).collect::<Result<Vec<_>, _>>()?;

    let mut outputs = Vec::with_capacity(source.len());
    for (index, row) in source.rows.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(completed = index, total = source.len(), "bulk generation cancelled");
            return Err(CanvasError::Cancelled { completed: index });
        }

        let mut elements = records.iter().map(Element::from_record).collect::<Result<Vec<_>, _>>()?;
        substitute(&mut elements, mapping, row, fonts);

        let mut row_only = Vec::new();
        for el in &elements {
            if let Element::Image(img) = el {
                let cached = rasters.contains(&img.src);
                if rasters.load(&img.src, fetcher).await && !cached && !shared.contains(&img.src) {
                    row_only.push(img.src.clone());
                }
            }
        }

        let mut surface = Surface::new(width, height)?;
        render::draw_background(&mut surface, template.background_color(), template.background_image_src(), rasters);
        render::draw_elements(&mut surface, &elements, fonts, rasters);
        let png = surface.encode_png()?;
        for src in &row_only {
            rasters.evict(src);
        }

        let name = output_name(mapping, row, index);
        debug!(row = index + 1, %name, bytes = png.len(), "row rendered");
        outputs.push(BulkOutput { name, png });
    }

    info!(rows = outputs.len(), "bulk generation complete");
    Ok(outputs)
}

/// Warn about mapping entries that can never apply.
fn check_mapping(template: &Scene, source: &TabularSource, mapping: &BulkMapping) {
    for (id, column) in mapping.iter() {
        if template.element_by_id(id).is_none() {
            warn!(%id, column, "mapping references unknown element; ignored");
        } else if !source.columns.iter().any(|c| c == column) {
            warn!(%id, column, "mapped column not in source header");
        }
    }
}

/// Overwrite mapped attributes with the row's non-empty values and relayout.
fn substitute(elements: &mut [Element], mapping: &BulkMapping, row: &HashMap<String, String>, fonts: &FontBook) {
    let value_for = |id: ElementId| {
        mapping
            .get(id)
            .and_then(|column| row.get(column))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    };

    for el in elements {
        let update = match el {
            Element::Text(t) => value_for(t.id).map(|v| (text_patch(v), PatchTarget::Element)),
            Element::Button(b) => value_for(b.text_element.id)
                .or_else(|| value_for(b.id))
                .map(|v| (text_patch(v), PatchTarget::Label)),
            Element::Image(i) => value_for(i.id).map(|v| (src_patch(v), PatchTarget::Element)),
        };
        if let Some((patch, target)) = update {
            el.apply_patch(&patch, target, fonts);
        }
    }
}

fn text_patch(value: &str) -> ElementPatch {
    ElementPatch { text: Some(value.to_owned()), ..Default::default() }
}

fn src_patch(value: &str) -> ElementPatch {
    ElementPatch { src: Some(value.to_owned()), ..Default::default() }
}

/// `pin_<value of the first mapped column>`, or `pin_<1-based row>` when that value is empty.
fn output_name(mapping: &BulkMapping, row: &HashMap<String, String>, index: usize) -> String {
    let value = mapping
        .first_column()
        .and_then(|column| row.get(column))
        .filter(|v| !v.is_empty());
    match value {
        Some(v) => format!("pin_{}", sanitize_name(v)),
        None => format!("pin_{}", index + 1),
    }
}
