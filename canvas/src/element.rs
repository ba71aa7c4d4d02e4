//! Element model: the text, button, and image entities placed on a pin.
//!
//! `Element` is a tagged union keyed by `kind`. Its serde form is the plain
//! element record used for history snapshots, saved designs, and bulk
//! cloning, so `Element::from_record(&e.to_record()?)` is an exact copy
//! including the `id`. A button exclusively owns its label (`text_element`),
//! which is serialized inline rather than by id.
//!
//! `width` and `height` of text and buttons are derived from the font book and
//! recomputed by `relayout` after every change that affects layout. Image
//! sizes are authored directly.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::{
    DEFAULT_BUTTON_BG, DEFAULT_BUTTON_PADDING, DEFAULT_BUTTON_RADIUS, DEFAULT_BUTTON_TEXT_COLOR, DEFAULT_FONT,
    DEFAULT_IMAGE_SIZE, DEFAULT_TEXT_COLOR, DEFAULT_TEXT_SIZE,
};
use crate::error::CanvasError;
use crate::fonts::FontBook;
use crate::geom::{Point, Rect};

/// Unique identifier for an element within a scene. Assigned monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Button,
    Image,
}

impl ElementKind {
    /// Human label used when generating default element names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Button => "Button",
            Self::Image => "Image",
        }
    }
}

/// Horizontal text alignment. Selects which point of the text `x` anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// A single line of styled text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: ElementId,
    pub name: String,
    /// Alignment anchor: left edge, center point, or right edge of the text.
    pub x: f64,
    /// Top of the text line.
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    pub text: String,
    /// Font size in pixels.
    pub size: f64,
    pub font: String,
    pub color: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub align: TextAlign,
}

impl TextElement {
    #[must_use]
    pub fn new(id: ElementId, name: impl Into<String>, x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            width: 0.0,
            height: 0.0,
            text: text.into(),
            size: DEFAULT_TEXT_SIZE,
            font: DEFAULT_FONT.to_owned(),
            color: DEFAULT_TEXT_COLOR.to_owned(),
            bold: false,
            align: TextAlign::Left,
        }
    }

    /// Recompute `width`/`height` from the current text style.
    pub fn relayout(&mut self, fonts: &FontBook) {
        self.width = fonts.measure(&self.text, &self.font, self.size, self.bold);
        self.height = self.size;
    }

    /// The box around the visible glyphs, shifted left for center/right alignment.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let left = match self.align {
            TextAlign::Left => self.x,
            TextAlign::Center => self.x - self.width / 2.0,
            TextAlign::Right => self.x - self.width,
        };
        Rect::new(left, self.y, self.width, self.height)
    }
}

/// A filled rounded rectangle with an owned text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonElement {
    pub id: ElementId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(with = "label_record")]
    pub text_element: TextElement,
    pub bg_color: String,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_padding")]
    pub padding: f64,
}

fn default_radius() -> f64 {
    DEFAULT_BUTTON_RADIUS
}

fn default_padding() -> f64 {
    DEFAULT_BUTTON_PADDING
}

impl ButtonElement {
    #[must_use]
    pub fn new(id: ElementId, name: impl Into<String>, x: f64, y: f64, label: TextElement) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            width: 0.0,
            height: 0.0,
            text_element: label,
            bg_color: DEFAULT_BUTTON_BG.to_owned(),
            radius: DEFAULT_BUTTON_RADIUS,
            padding: DEFAULT_BUTTON_PADDING,
        }
    }

    /// Size the button around its label and re-anchor the label in the content box.
    pub fn relayout(&mut self, fonts: &FontBook) {
        self.text_element.relayout(fonts);
        self.width = self.text_element.width + self.padding * 2.0;
        self.height = self.text_element.height + self.padding * 2.0;
        self.position_label();
    }

    fn position_label(&mut self) {
        let label = &mut self.text_element;
        label.y = self.y + self.padding;
        label.x = match label.align {
            TextAlign::Left => self.x + self.padding,
            TextAlign::Center => self.x + self.width / 2.0,
            TextAlign::Right => self.x + self.width - self.padding,
        };
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// A raster image drawn stretched into its box. Only `src` is persisted;
/// decoded pixels live in the `RasterCache`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub id: ElementId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_image_size")]
    pub width: f64,
    #[serde(default = "default_image_size")]
    pub height: f64,
    pub src: String,
}

fn default_image_size() -> f64 {
    DEFAULT_IMAGE_SIZE
}

impl ImageElement {
    #[must_use]
    pub fn new(id: ElementId, name: impl Into<String>, x: f64, y: f64, src: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            src: src.into(),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Any element that can be placed on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Button(ButtonElement),
    Image(ImageElement),
}

impl Element {
    /// A text element with default style for the given content.
    #[must_use]
    pub fn text(id: ElementId, name: impl Into<String>, at: Point, content: impl Into<String>) -> Self {
        Self::Text(TextElement::new(id, name, at.x, at.y, content))
    }

    /// A button whose label has the given id and content.
    #[must_use]
    pub fn button(id: ElementId, label_id: ElementId, name: impl Into<String>, at: Point, content: &str) -> Self {
        let name = name.into();
        let mut label = TextElement::new(label_id, format!("{name} Label"), at.x, at.y, content);
        label.color = DEFAULT_BUTTON_TEXT_COLOR.to_owned();
        label.bold = true;
        label.size = DEFAULT_TEXT_SIZE * 0.75;
        label.align = TextAlign::Center;
        Self::Button(ButtonElement::new(id, name, at.x, at.y, label))
    }

    #[must_use]
    pub fn image(id: ElementId, name: impl Into<String>, at: Point, src: impl Into<String>) -> Self {
        Self::Image(ImageElement::new(id, name, at.x, at.y, src))
    }

    #[must_use]
    pub fn id(&self) -> ElementId {
        match self {
            Self::Text(t) => t.id,
            Self::Button(b) => b.id,
            Self::Image(i) => i.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Text(_) => ElementKind::Text,
            Self::Button(_) => ElementKind::Button,
            Self::Image(_) => ElementKind::Image,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text(t) => &t.name,
            Self::Button(b) => &b.name,
            Self::Image(i) => &i.name,
        }
    }

    /// The anchor point (`x`, `y`) of the element.
    #[must_use]
    pub fn position(&self) -> Point {
        match self {
            Self::Text(t) => Point::new(t.x, t.y),
            Self::Button(b) => Point::new(b.x, b.y),
            Self::Image(i) => Point::new(i.x, i.y),
        }
    }

    /// Move the element's anchor. Buttons carry their label along.
    pub fn set_position(&mut self, pt: Point) {
        match self {
            Self::Text(t) => {
                t.x = pt.x;
                t.y = pt.y;
            }
            Self::Button(b) => {
                b.x = pt.x;
                b.y = pt.y;
                b.position_label();
            }
            Self::Image(i) => {
                i.x = pt.x;
                i.y = pt.y;
            }
        }
    }

    /// Ids owned by this element: its own and, for buttons, the label's.
    #[must_use]
    pub fn owned_ids(&self) -> Vec<ElementId> {
        match self {
            Self::Button(b) => vec![b.id, b.text_element.id],
            _ => vec![self.id()],
        }
    }

    /// Bounding box used for both hit-testing and the selection outline.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Text(t) => t.bounds(),
            Self::Button(b) => b.bounds(),
            Self::Image(i) => i.bounds(),
        }
    }

    #[must_use]
    pub fn is_hit(&self, pt: Point) -> bool {
        self.bounds().contains(pt)
    }

    /// Recompute derived sizes. Images keep their authored size.
    pub fn relayout(&mut self, fonts: &FontBook) {
        match self {
            Self::Text(t) => t.relayout(fonts),
            Self::Button(b) => b.relayout(fonts),
            Self::Image(_) => {}
        }
    }

    /// Serialize to a plain element record.
    ///
    /// # Errors
    ///
    /// Returns `MalformedElement` if serialization fails.
    pub fn to_record(&self) -> Result<Value, CanvasError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild an element from a record, dispatching on `kind`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` for a missing or unrecognized `kind`, and
    /// `MalformedElement` when a known kind is missing required fields.
    pub fn from_record(record: &Value) -> Result<Element, CanvasError> {
        let kind = record.get("kind").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "text" | "button" | "image" => Ok(Element::deserialize(record)?),
            other => Err(CanvasError::UnknownKind(other.to_owned())),
        }
    }

    /// Apply a sparse update. `target` selects between a button and its label;
    /// it is ignored for other kinds. Returns `true` if anything changed.
    pub fn apply_patch(&mut self, patch: &ElementPatch, target: PatchTarget, fonts: &FontBook) -> bool {
        let changed = match (&mut *self, target) {
            (Self::Text(t), _) => patch.apply_text(t),
            (Self::Button(b), PatchTarget::Label) => {
                let mut changed = patch.apply_text_style(&mut b.text_element);
                if let Some(name) = &patch.name {
                    b.text_element.name.clone_from(name);
                    changed = true;
                }
                changed
            }
            (Self::Button(b), PatchTarget::Element) => patch.apply_button(b),
            (Self::Image(i), _) => patch.apply_image(i),
        };
        if changed {
            self.relayout(fonts);
        }
        changed
    }
}

/// Which part of a button a patch applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchTarget {
    /// The element itself (for buttons: background, radius, padding, position).
    #[default]
    Element,
    /// A button's nested label.
    Label,
}

/// Sparse update for an element. Only present fields are applied; fields that
/// don't exist on the target kind are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub text: Option<String>,
    pub size: Option<f64>,
    pub font: Option<String>,
    pub color: Option<String>,
    pub bold: Option<bool>,
    pub align: Option<TextAlign>,
    pub bg_color: Option<String>,
    pub radius: Option<f64>,
    pub padding: Option<f64>,
    pub src: Option<String>,
}

impl ElementPatch {
    /// Build a single-attribute patch from a record key and JSON value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAttribute` for an unknown key or a value of the wrong type.
    pub fn from_key_value(key: &str, value: &Value) -> Result<Self, CanvasError> {
        let mut patch = Self::default();
        match key {
            "name" => patch.name = Some(expect_str(key, value)?),
            "x" => patch.x = Some(expect_f64(key, value)?),
            "y" => patch.y = Some(expect_f64(key, value)?),
            "width" => patch.width = Some(expect_f64(key, value)?),
            "height" => patch.height = Some(expect_f64(key, value)?),
            "text" => patch.text = Some(expect_str(key, value)?),
            "size" => patch.size = Some(expect_f64(key, value)?),
            "font" => patch.font = Some(expect_str(key, value)?),
            "color" => patch.color = Some(expect_str(key, value)?),
            "bold" => {
                patch.bold = Some(value.as_bool().ok_or_else(|| invalid(key, "expected a boolean"))?);
            }
            "align" => {
                let raw = expect_str(key, value)?;
                patch.align = Some(TextAlign::parse(&raw).ok_or_else(|| invalid(key, "expected left, center or right"))?);
            }
            "bgColor" => patch.bg_color = Some(expect_str(key, value)?),
            "radius" => patch.radius = Some(expect_f64(key, value)?),
            "padding" => patch.padding = Some(expect_f64(key, value)?),
            "src" => patch.src = Some(expect_str(key, value)?),
            other => return Err(invalid(other, "unknown attribute")),
        }
        Ok(patch)
    }

    fn apply_text(&self, t: &mut TextElement) -> bool {
        let mut changed = self.apply_text_style(t);
        changed |= set(&mut t.name, self.name.as_ref());
        changed |= set(&mut t.x, self.x.as_ref());
        changed |= set(&mut t.y, self.y.as_ref());
        changed
    }

    fn apply_text_style(&self, t: &mut TextElement) -> bool {
        let mut changed = false;
        changed |= set(&mut t.text, self.text.as_ref());
        changed |= set(&mut t.size, self.size.as_ref());
        changed |= set(&mut t.font, self.font.as_ref());
        changed |= set(&mut t.color, self.color.as_ref());
        changed |= set(&mut t.bold, self.bold.as_ref());
        changed |= set(&mut t.align, self.align.as_ref());
        changed
    }

    fn apply_button(&self, b: &mut ButtonElement) -> bool {
        let mut changed = false;
        changed |= set(&mut b.name, self.name.as_ref());
        changed |= set(&mut b.x, self.x.as_ref());
        changed |= set(&mut b.y, self.y.as_ref());
        changed |= set(&mut b.radius, self.radius.as_ref());
        changed |= set(&mut b.padding, self.padding.as_ref());
        // On the button itself `color` is the fill; `bgColor` wins when both are present.
        changed |= set(&mut b.bg_color, self.bg_color.as_ref().or(self.color.as_ref()));
        changed
    }

    fn apply_image(&self, i: &mut ImageElement) -> bool {
        let mut changed = false;
        changed |= set(&mut i.name, self.name.as_ref());
        changed |= set(&mut i.x, self.x.as_ref());
        changed |= set(&mut i.y, self.y.as_ref());
        changed |= set(&mut i.width, self.width.as_ref());
        changed |= set(&mut i.height, self.height.as_ref());
        changed |= set(&mut i.src, self.src.as_ref());
        changed
    }
}

fn set<T: Clone + PartialEq>(slot: &mut T, value: Option<&T>) -> bool {
    match value {
        Some(v) if slot != v => {
            slot.clone_from(v);
            true
        }
        _ => false,
    }
}

fn invalid(key: &str, reason: &str) -> CanvasError {
    CanvasError::InvalidAttribute { key: key.to_owned(), reason: reason.to_owned() }
}

fn expect_str(key: &str, value: &Value) -> Result<String, CanvasError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| invalid(key, "expected a string"))
}

fn expect_f64(key: &str, value: &Value) -> Result<f64, CanvasError> {
    value.as_f64().ok_or_else(|| invalid(key, "expected a number"))
}

/// Serializes a button label as a full `kind: "text"` element record.
/// Deserialization tolerates records with or without the tag.
mod label_record {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::TextElement;

    #[derive(Serialize)]
    #[serde(tag = "kind", rename_all = "lowercase")]
    enum Tagged<'a> {
        Text(&'a TextElement),
    }

    pub fn serialize<S: Serializer>(label: &TextElement, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged::Text(label).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TextElement, D::Error> {
        TextElement::deserialize(deserializer)
    }
}
