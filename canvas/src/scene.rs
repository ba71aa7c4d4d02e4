//! Scene: the ordered element list, background, canvas size, and selection.
//!
//! Element order is z-order (index 0 is the bottom). The scene is the single
//! owner of every element; other components refer to elements by `ElementId`
//! and mutate them only through scene methods. `selected_id` is a lookup key,
//! cleared whenever the element it names disappears.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::consts::{DEFAULT_BACKGROUND, MAX_ELEMENT_ID};
use crate::element::{Element, ElementId, ElementKind, ElementPatch, PatchTarget, TextAlign};
use crate::error::CanvasError;
use crate::fonts::FontBook;
use crate::geom::Point;

/// Named canvas sizes offered by the designer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanvasSize {
    /// 2:3 standard pin.
    #[default]
    Standard,
    /// 1:2.1 long pin.
    Long,
    Square,
    /// 9:16 story pin.
    Story,
}

impl CanvasSize {
    pub const ALL: [CanvasSize; 4] = [Self::Standard, Self::Long, Self::Square, Self::Story];

    /// Pixel dimensions as `(width, height)`.
    #[must_use]
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Standard => (1000, 1500),
            Self::Long => (1000, 2100),
            Self::Square => (1000, 1000),
            Self::Story => (1080, 1920),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "1000x1500",
            Self::Long => "1000x2100",
            Self::Square => "1000x1000",
            Self::Story => "1080x1920",
        }
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanvasSize {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| CanvasError::UnknownCanvasSize(s.to_owned()))
    }
}

impl Serialize for CanvasSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CanvasSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Direction for a single z-order step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerDirection {
    /// Toward the top (later in the list).
    Up,
    /// Toward the bottom (earlier in the list).
    Down,
}

/// Plain record of a whole scene: the persisted design and the history snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    pub canvas_size: CanvasSize,
    pub background_color: String,
    #[serde(default)]
    pub background_image_src: Option<String>,
    #[serde(default, deserialize_with = "deserialize_elements")]
    pub elements: Vec<Element>,
}

/// Decode element records one by one, skipping any that fail.
fn deserialize_elements<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Element>, D::Error> {
    let records = Vec::<Value>::deserialize(deserializer)?;
    Ok(decode_elements(&records))
}

/// Decode element records, logging and skipping unknown or malformed ones.
#[must_use]
pub fn decode_elements(records: &[Value]) -> Vec<Element> {
    records
        .iter()
        .filter_map(|record| match Element::from_record(record) {
            Ok(el) => Some(el),
            Err(e) => {
                warn!(error = %e, "skipping element record");
                None
            }
        })
        .collect()
}

/// The live design document.
pub struct Scene {
    elements: Vec<Element>,
    background_color: String,
    background_image_src: Option<String>,
    canvas_size: CanvasSize,
    selected_id: Option<ElementId>,
    next_id: u64,
    fonts: Arc<FontBook>,
}

impl Scene {
    /// An empty scene with a white background at the standard pin size.
    #[must_use]
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self {
            elements: Vec::new(),
            background_color: DEFAULT_BACKGROUND.to_owned(),
            background_image_src: None,
            canvas_size: CanvasSize::default(),
            selected_id: None,
            next_id: 1,
            fonts,
        }
    }

    /// The starter layout: a title, a caption, and a call-to-action button.
    #[must_use]
    pub fn with_default_template(fonts: Arc<FontBook>) -> Self {
        let mut scene = Self::new(fonts);
        let (width, height) = scene.canvas_size.dimensions();
        let center_x = f64::from(width) / 2.0;

        let title = scene.add_element(ElementKind::Text, Point::new(center_x, 180.0));
        scene.patch_silently(
            title,
            &ElementPatch {
                name: Some("Title".into()),
                text: Some("Your Pin Title".into()),
                size: Some(72.0),
                bold: Some(true),
                align: Some(TextAlign::Center),
                ..Default::default()
            },
        );

        let caption = scene.add_element(ElementKind::Text, Point::new(center_x, 290.0));
        scene.patch_silently(
            caption,
            &ElementPatch {
                name: Some("Caption".into()),
                text: Some("Add a short description".into()),
                size: Some(36.0),
                color: Some("#555555".into()),
                align: Some(TextAlign::Center),
                ..Default::default()
            },
        );

        let button = scene.add_element(ElementKind::Button, Point::new(0.0, f64::from(height) - 240.0));
        if let Some(el) = scene.element_mut(button) {
            let at = Point::new(center_x - el.bounds().width / 2.0, el.position().y);
            el.set_position(at);
        }

        scene.selected_id = None;
        scene
    }

    fn patch_silently(&mut self, id: ElementId, patch: &ElementPatch) {
        if let Err(e) = self.update_element(id, patch, PatchTarget::Element) {
            warn!(error = %e, "default template patch failed");
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|el| el.id() == id)
    }

    /// Resolve any owned id: a top-level element, or a button label. The
    /// returned target says which part of the owning element the id names.
    #[must_use]
    pub fn element_by_id(&self, id: ElementId) -> Option<(&Element, PatchTarget)> {
        self.elements.iter().find_map(|el| match el {
            _ if el.id() == id => Some((el, PatchTarget::Element)),
            Element::Button(b) if b.text_element.id == id => Some((el, PatchTarget::Label)),
            _ => None,
        })
    }

    fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|el| el.id() == id)
    }

    /// Z-index of an element, 0 being the bottom.
    #[must_use]
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|el| el.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn count_of(&self, kind: ElementKind) -> usize {
        self.elements.iter().filter(|el| el.kind() == kind).count()
    }

    #[must_use]
    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    #[must_use]
    pub fn background_image_src(&self) -> Option<&str> {
        self.background_image_src.as_deref()
    }

    #[must_use]
    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas_size
    }

    #[must_use]
    pub fn fonts(&self) -> &Arc<FontBook> {
        &self.fonts
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<ElementId> {
        self.selected_id
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Element> {
        self.selected_id.and_then(|id| self.element(id))
    }

    /// Every image source the scene references (background first), deduplicated in order.
    #[must_use]
    pub fn pending_image_sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let bg = self.background_image_src.iter().cloned();
        let images = self.elements.iter().filter_map(|el| match el {
            Element::Image(i) if !i.src.is_empty() => Some(i.src.clone()),
            _ => None,
        });
        for src in bg.chain(images) {
            if !out.contains(&src) {
                out.push(src);
            }
        }
        out
    }

    // --- Mutations ---

    fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a new element of `kind` at `position` (topmost) and select it.
    pub fn add_element(&mut self, kind: ElementKind, position: Point) -> ElementId {
        let id = self.allocate_id();
        let name = format!("{} {}", kind.label(), self.count_of(kind) + 1);
        let mut el = match kind {
            ElementKind::Text => Element::text(id, name, position, "New Text"),
            ElementKind::Button => {
                let label_id = self.allocate_id();
                Element::button(id, label_id, name, position, "Learn More")
            }
            ElementKind::Image => Element::image(id, name, position, ""),
        };
        el.relayout(&self.fonts);
        self.elements.push(el);
        self.selected_id = Some(id);
        id
    }

    /// Remove an element (and anything it owns). Absent ids are a no-op.
    pub fn delete_element(&mut self, id: ElementId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.elements.remove(index);
        if self.selected_id == Some(id) {
            self.selected_id = None;
        }
        true
    }

    /// Swap an element with its neighbour. No-op at either end of the stack.
    pub fn move_layer(&mut self, id: ElementId, direction: LayerDirection) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let other = match direction {
            LayerDirection::Up if index + 1 < self.elements.len() => index + 1,
            LayerDirection::Down if index > 0 => index - 1,
            _ => return false,
        };
        self.elements.swap(index, other);
        true
    }

    /// Apply a sparse update to an element and recompute its layout.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if no top-level element has this id.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch, target: PatchTarget) -> Result<bool, CanvasError> {
        let fonts = Arc::clone(&self.fonts);
        let el = self.element_mut(id).ok_or(CanvasError::ElementNotFound(id))?;
        Ok(el.apply_patch(patch, target, &fonts))
    }

    /// String-keyed form of [`Scene::update_element`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidAttribute` for an unknown key or mistyped value, and
    /// `ElementNotFound` for an unknown id.
    pub fn update_attribute(&mut self, id: ElementId, key: &str, value: &Value, target: PatchTarget) -> Result<bool, CanvasError> {
        let patch = ElementPatch::from_key_value(key, value)?;
        self.update_element(id, &patch, target)
    }

    /// Move an element's anchor. Used by drag; does not touch history.
    pub fn set_element_position(&mut self, id: ElementId, at: Point) -> bool {
        let Some(el) = self.element_mut(id) else {
            return false;
        };
        el.set_position(at);
        true
    }

    /// Select an element, or clear the selection. Unknown ids clear it.
    pub fn set_selection(&mut self, id: Option<ElementId>) {
        self.selected_id = id.filter(|id| self.index_of(*id).is_some());
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = color.into();
    }

    pub fn set_background_image(&mut self, src: Option<String>) {
        self.background_image_src = src.filter(|s| !s.is_empty());
    }

    pub fn set_canvas_size(&mut self, size: CanvasSize) {
        self.canvas_size = size;
    }

    // --- Records ---

    #[must_use]
    pub fn to_record(&self) -> SceneRecord {
        SceneRecord {
            canvas_size: self.canvas_size,
            background_color: self.background_color.clone(),
            background_image_src: self.background_image_src.clone(),
            elements: self.elements.clone(),
        }
    }

    /// Replace the whole scene from a record. Ids are kept verbatim and the id
    /// counter never moves backwards, so ids are never reused.
    ///
    /// # Errors
    ///
    /// `IdOutOfRange` when any element or label id exceeds
    /// [`MAX_ELEMENT_ID`]. The scene is left unchanged.
    pub fn load_record(&mut self, record: &SceneRecord) -> Result<(), CanvasError> {
        let max_id = record
            .elements
            .iter()
            .flat_map(Element::owned_ids)
            .max()
            .map_or(0, |id| id.0);
        if max_id > MAX_ELEMENT_ID {
            return Err(CanvasError::IdOutOfRange(ElementId(max_id)));
        }
        let next_id = max_id.checked_add(1).ok_or(CanvasError::IdOutOfRange(ElementId(max_id)))?;

        self.canvas_size = record.canvas_size;
        self.background_color.clone_from(&record.background_color);
        self.background_image_src.clone_from(&record.background_image_src);
        self.elements = record.elements.clone();
        for el in &mut self.elements {
            el.relayout(&self.fonts);
        }
        self.next_id = self.next_id.max(next_id);

        if let Some(id) = self.selected_id {
            if self.index_of(id).is_none() {
                self.selected_id = None;
            }
        }
        Ok(())
    }

    /// Build a scene from a record.
    ///
    /// # Errors
    ///
    /// `IdOutOfRange` as for [`Scene::load_record`].
    pub fn from_record(record: &SceneRecord, fonts: Arc<FontBook>) -> Result<Self, CanvasError> {
        let mut scene = Self::new(fonts);
        scene.load_record(record)?;
        Ok(scene)
    }
}
