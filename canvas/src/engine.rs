use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::element::{Element, ElementId, ElementKind, ElementPatch, PatchTarget};
use crate::error::CanvasError;
use crate::fonts::FontBook;
use crate::geom::{Point, Viewport};
use crate::hit;
use crate::history::History;
use crate::input::{InputState, PointerButton};
use crate::raster::{AssetFetcher, RasterCache};
use crate::render::{self, RenderOptions};
use crate::scene::{CanvasSize, LayerDirection, Scene, SceneRecord};
use crate::surface::Surface;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The scene changed visibly; redraw.
    RenderNeeded,
    SelectionChanged(Option<ElementId>),
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// These sources are referenced but not cached; call `load_images`.
    LoadImages(Vec<String>),
}

/// Core engine state: all logic that doesn't depend on a drawing surface.
///
/// Separated from `Engine` so it can be tested without allocating pixels.
pub struct EngineCore {
    pub scene: Scene,
    pub history: History,
    pub input: InputState,
    pub viewport: Viewport,
    pub rasters: RasterCache,
}

impl EngineCore {
    /// Start from the default template, committed as history entry 0.
    #[must_use]
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self::with_scene(Scene::with_default_template(fonts))
    }

    /// Start from a saved design. An empty design falls back to the default template.
    ///
    /// # Errors
    ///
    /// `IdOutOfRange` when the design carries an id the scene cannot hold.
    pub fn from_record(record: &SceneRecord, fonts: Arc<FontBook>) -> Result<Self, CanvasError> {
        if record.elements.is_empty() {
            debug!("empty design; seeding default template");
            return Ok(Self::new(fonts));
        }
        Ok(Self::with_scene(Scene::from_record(record, fonts)?))
    }

    fn with_scene(scene: Scene) -> Self {
        let (w, h) = scene.canvas_size().dimensions();
        let mut history = History::new();
        history.commit(scene.to_record());
        Self {
            scene,
            history,
            input: InputState::Idle,
            viewport: Viewport::native(f64::from(w), f64::from(h)),
            rasters: RasterCache::new(),
        }
    }

    // --- Queries ---

    /// The currently selected element, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ElementId> {
        self.scene.selected_id()
    }

    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.scene.element(id)
    }

    /// The persistable design.
    #[must_use]
    pub fn save(&self) -> SceneRecord {
        self.scene.to_record()
    }

    // --- History ---

    fn commit(&mut self) -> Action {
        self.history.commit(self.scene.to_record());
        self.history_changed()
    }

    fn history_changed(&self) -> Action {
        Action::HistoryChanged { can_undo: self.history.can_undo(), can_redo: self.history.can_redo() }
    }

    pub fn undo(&mut self) -> Vec<Action> {
        let Some(record) = self.history.undo().cloned() else {
            return Vec::new();
        };
        self.restore(&record)
    }

    pub fn redo(&mut self) -> Vec<Action> {
        let Some(record) = self.history.redo().cloned() else {
            return Vec::new();
        };
        self.restore(&record)
    }

    fn restore(&mut self, record: &SceneRecord) -> Vec<Action> {
        let before = self.scene.selected_id();
        if let Err(e) = self.scene.load_record(record) {
            warn!(error = %e, index = self.history.index(), "history snapshot rejected");
            return vec![self.history_changed()];
        }
        self.input = InputState::Idle;
        self.sync_viewport_canvas();

        let mut actions = Vec::new();
        if self.scene.selected_id() != before {
            actions.push(Action::SelectionChanged(self.scene.selected_id()));
        }
        actions.push(self.history_changed());
        actions.extend(self.missing_images());
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Commit pending continuous edits (property field blur). No entry is
    /// added when nothing changed since the last snapshot.
    pub fn finish_edit(&mut self) -> Vec<Action> {
        self.commit_if_changed()
    }

    fn commit_if_changed(&mut self) -> Vec<Action> {
        let snapshot = self.scene.to_record();
        if self.history.current() == Some(&snapshot) {
            return Vec::new();
        }
        self.history.commit(snapshot);
        vec![self.history_changed()]
    }

    // --- Discrete edits (each commits once) ---

    pub fn add_element(&mut self, kind: ElementKind, at: Point) -> Vec<Action> {
        let id = self.scene.add_element(kind, at);
        info!(%id, kind = kind.label(), "element added");
        vec![Action::SelectionChanged(Some(id)), self.commit(), Action::RenderNeeded]
    }

    /// Add an image element already bound to `src`.
    pub fn add_image(&mut self, src: impl Into<String>, at: Point) -> Vec<Action> {
        let id = self.scene.add_element(ElementKind::Image, at);
        let patch = ElementPatch { src: Some(src.into()), ..Default::default() };
        if let Err(e) = self.scene.update_element(id, &patch, PatchTarget::Element) {
            debug!(error = %e, "image src not applied");
        }
        let mut actions = vec![Action::SelectionChanged(Some(id)), self.commit()];
        actions.extend(self.missing_images());
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn delete_element(&mut self, id: ElementId) -> Vec<Action> {
        let was_selected = self.scene.selected_id() == Some(id);
        if !self.scene.delete_element(id) {
            return Vec::new();
        }
        if self.input.dragged_id() == Some(id) {
            self.input = InputState::Idle;
        }
        info!(%id, "element deleted");
        let mut actions = Vec::new();
        if was_selected {
            actions.push(Action::SelectionChanged(None));
        }
        actions.push(self.commit());
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn move_layer(&mut self, id: ElementId, direction: LayerDirection) -> Vec<Action> {
        if !self.scene.move_layer(id, direction) {
            return Vec::new();
        }
        vec![self.commit(), Action::RenderNeeded]
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) -> Vec<Action> {
        self.scene.set_background_color(color);
        vec![self.commit(), Action::RenderNeeded]
    }

    pub fn set_background_image(&mut self, src: Option<String>) -> Vec<Action> {
        self.scene.set_background_image(src);
        let mut actions = vec![self.commit()];
        actions.extend(self.missing_images());
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn set_canvas_size(&mut self, size: CanvasSize) -> Vec<Action> {
        self.scene.set_canvas_size(size);
        self.sync_viewport_canvas();
        vec![self.commit(), Action::RenderNeeded]
    }

    // --- Continuous edits (no commit; see `finish_edit`) ---

    /// Apply a sparse update without touching history.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` for an unknown id.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch, target: PatchTarget) -> Result<Vec<Action>, CanvasError> {
        if !self.scene.update_element(id, patch, target)? {
            return Ok(Vec::new());
        }
        let mut actions = Vec::new();
        if patch.src.is_some() {
            actions.extend(self.missing_images());
        }
        actions.push(Action::RenderNeeded);
        Ok(actions)
    }

    /// String-keyed form of [`EngineCore::update_element`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidAttribute` or `ElementNotFound`.
    pub fn update_attribute(&mut self, id: ElementId, key: &str, value: &Value, target: PatchTarget) -> Result<Vec<Action>, CanvasError> {
        let patch = ElementPatch::from_key_value(key, value)?;
        self.update_element(id, &patch, target)
    }

    pub fn set_selection(&mut self, id: Option<ElementId>) -> Vec<Action> {
        let before = self.scene.selected_id();
        self.scene.set_selection(id);
        if self.scene.selected_id() == before {
            return Vec::new();
        }
        vec![Action::SelectionChanged(self.scene.selected_id()), Action::RenderNeeded]
    }

    // --- Viewport ---

    /// Record the on-screen size of the canvas in display pixels.
    pub fn set_viewport(&mut self, display_width: f64, display_height: f64) {
        self.viewport.display_width = display_width;
        self.viewport.display_height = display_height;
    }

    fn sync_viewport_canvas(&mut self) {
        let (w, h) = self.scene.canvas_size().dimensions();
        self.viewport.canvas_width = f64::from(w);
        self.viewport.canvas_height = f64::from(h);
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, display_pt: Point, button: PointerButton) -> Vec<Action> {
        if button != PointerButton::Primary {
            return Vec::new();
        }
        let pt = self.viewport.to_canvas(display_pt);
        let before = self.scene.selected_id();

        match hit::hit_test(pt, &self.scene) {
            Some(hit) => {
                self.scene.set_selection(Some(hit.element_id));
                self.input = InputState::Dragging { id: hit.element_id, offset: pt.sub(hit.anchor) };
            }
            None => {
                self.scene.set_selection(None);
                self.input = InputState::Idle;
            }
        }

        let mut actions = Vec::new();
        if self.scene.selected_id() != before {
            actions.push(Action::SelectionChanged(self.scene.selected_id()));
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn on_pointer_move(&mut self, display_pt: Point) -> Vec<Action> {
        let InputState::Dragging { id, offset } = self.input else {
            return Vec::new();
        };
        let pt = self.viewport.to_canvas(display_pt);
        if !self.scene.set_element_position(id, pt.sub(offset)) {
            self.input = InputState::Idle;
            return Vec::new();
        }
        vec![Action::RenderNeeded]
    }

    /// End a drag and commit the result once.
    pub fn on_pointer_up(&mut self, display_pt: Point, button: PointerButton) -> Vec<Action> {
        if button != PointerButton::Primary || !self.input.is_dragging() {
            return Vec::new();
        }
        let mut actions = self.on_pointer_move(display_pt);
        actions.extend(self.end_drag());
        actions
    }

    /// Pointer left the canvas mid-drag: treated like a release at the last position.
    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        self.end_drag()
    }

    fn end_drag(&mut self) -> Vec<Action> {
        if !self.input.is_dragging() {
            return Vec::new();
        }
        self.input = InputState::Idle;
        self.commit_if_changed()
    }

    // --- Images ---

    fn missing_images(&self) -> Option<Action> {
        let missing = self.rasters.missing(&self.scene.pending_image_sources());
        (!missing.is_empty()).then_some(Action::LoadImages(missing))
    }

    /// Fetch and decode every referenced raster not yet cached. Failed loads
    /// are logged by the cache and the element draws as a no-op.
    pub async fn load_images(&mut self, fetcher: &dyn AssetFetcher) -> Vec<Action> {
        let missing = self.rasters.missing(&self.scene.pending_image_sources());
        if missing.is_empty() {
            return Vec::new();
        }
        let ready = self.rasters.load_all(&missing, fetcher).await;
        debug!(requested = missing.len(), ready, "images loaded");
        vec![Action::RenderNeeded]
    }

    // --- Render ---

    /// Interactive redraw including the selection outline.
    pub fn render(&self, surface: &mut Surface) {
        render::draw_scene(surface, &self.scene, &self.rasters, RenderOptions::interactive());
    }

    /// Single-image export of the template as PNG, without selection UI.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAllocation` or `Encode`.
    pub fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        render::export_png(&self.scene, &self.rasters)
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the interactive surface.
pub struct Engine {
    surface: Surface,
    pub core: EngineCore,
}

impl Engine {
    /// Create an engine with a surface sized to the core's canvas.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAllocation` if the surface cannot be allocated.
    pub fn new(core: EngineCore) -> Result<Self, CanvasError> {
        let (w, h) = core.scene.canvas_size().dimensions();
        Ok(Self { surface: Surface::new(w, h)?, core })
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Draw the current state, reallocating the surface if the canvas size changed.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAllocation` if a resize fails.
    pub fn render(&mut self) -> Result<(), CanvasError> {
        let (w, h) = self.core.scene.canvas_size().dimensions();
        if (self.surface.width(), self.surface.height()) != (w, h) {
            self.surface = Surface::new(w, h)?;
        }
        self.core.render(&mut self.surface);
        Ok(())
    }

    /// Process a batch of actions: redraw if any asked for it.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAllocation` if a resize fails.
    pub fn apply(&mut self, actions: &[Action]) -> Result<(), CanvasError> {
        if actions.contains(&Action::RenderNeeded) {
            self.render()?;
        }
        Ok(())
    }
}
