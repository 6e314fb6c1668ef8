use protocol::{Point, Shape};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::consts::{ERASER_RADIUS_PX, ZOOM_STEP};
use crate::hit;
use crate::input::{Button, EraseMode, InputState, Key, Modifiers, Style, Tool, UiState, WheelDelta, box_shape, push_distinct};
use crate::render;
use crate::store::ShapeStore;
use crate::viewport::Viewport;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
///
/// Shape-bearing actions have already been applied to the local store; the
/// host only forwards them to the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A shape was committed locally; send it as `draw`.
    ShapeAdded(Shape),
    /// Shapes were removed locally; send one `erase` per shape.
    ShapesErased(Vec<Shape>),
    /// The local list was emptied; send `clear_all`.
    Cleared,
    /// Pointer moved to this canvas-space point; candidate `cursor` update.
    CursorMoved(Point),
    /// The text tool was clicked; the host should prompt and call
    /// [`EngineCore::place_text`].
    TextRequested { at: Point },
    /// The user asked for an image export.
    ExportRequested,
    SetCursor(String),
    RenderNeeded,
}

/// Core engine state — all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
#[derive(Debug)]
pub struct EngineCore {
    pub store: ShapeStore,
    pub viewport: Viewport,
    pub ui: UiState,
    pub input: InputState,
    /// Shape being dragged out, drawn on top until committed.
    pub preview: Option<Shape>,
    pub dpr: f64,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            store: ShapeStore::new(),
            viewport: Viewport::default(),
            ui: UiState::default(),
            input: InputState::default(),
            preview: None,
            dpr: 1.0,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Remote inputs ---

    /// Replace everything with a replayed room. History restarts.
    pub fn load_room(&mut self, shapes: Vec<Shape>) {
        self.store.load(shapes);
    }

    /// Apply a peer's `draw`.
    pub fn apply_remote_draw(&mut self, shape: Shape) {
        self.store.append(shape);
    }

    /// Apply a peer's `erase`. Returns `false` when nothing matched.
    pub fn apply_remote_erase(&mut self, shape: &Shape) -> bool {
        if !self.store.shapes().contains(shape) {
            return false;
        }
        let remaining = self.store.shapes().iter().filter(|s| *s != shape).cloned().collect();
        self.store.restore_from_remote(remaining);
        true
    }

    /// Apply a peer's `clear_all`.
    pub fn apply_remote_clear(&mut self) {
        self.store.restore_from_remote(Vec::new());
    }

    // --- Tool / style ---

    /// Set the active tool, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: Tool) -> Action {
        self.ui.tool = tool;
        self.cancel_gesture();
        Action::SetCursor(cursor_for(tool).to_owned())
    }

    pub fn set_erase_mode(&mut self, mode: EraseMode) {
        self.ui.erase_mode = mode;
    }

    pub fn set_style(&mut self, style: Style) {
        self.ui.style = style;
    }

    /// Commit text typed into the host editor. Blank text is dropped.
    pub fn place_text(&mut self, at: Point, content: &str) -> Option<Action> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let shape = Shape::Text {
            x: at.x,
            y: at.y,
            content: content.to_owned(),
            color: self.ui.style.color.clone(),
            font_size: self.ui.style.font_size,
        };
        self.store.append(shape.clone());
        Some(Action::ShapeAdded(shape))
    }

    // --- History ---

    pub fn undo(&mut self) -> Vec<Action> {
        if self.store.undo() { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    pub fn redo(&mut self) -> Vec<Action> {
        if self.store.redo() { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    pub fn clear_all(&mut self) -> Vec<Action> {
        self.store.clear_all();
        vec![Action::Cleared, Action::RenderNeeded]
    }

    // --- Viewport ---

    /// Update surface size in CSS pixels and the device pixel ratio.
    pub fn resize(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport.resize(width_css, height_css);
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    }

    pub fn zoom_in(&mut self) -> Vec<Action> {
        self.viewport.zoom(ZOOM_STEP, None);
        vec![Action::RenderNeeded]
    }

    pub fn zoom_out(&mut self) -> Vec<Action> {
        self.viewport.zoom(1.0 / ZOOM_STEP, None);
        vec![Action::RenderNeeded]
    }

    pub fn reset_view(&mut self) -> Vec<Action> {
        self.viewport.reset();
        vec![Action::RenderNeeded]
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if !matches!(self.input, InputState::Idle) {
            return Vec::new();
        }
        let canvas_pt = self.viewport.screen_to_canvas(screen_pt);
        match (button, self.ui.tool) {
            (Button::Secondary, _) => Vec::new(),
            (Button::Middle, _) | (Button::Primary, Tool::Pan) => {
                self.input = InputState::Panning { last_screen: screen_pt };
                vec![Action::SetCursor("grabbing".to_owned())]
            }
            (Button::Primary, tool @ (Tool::Rect | Tool::Ellipse)) => {
                self.input = InputState::DrawingBox { tool, anchor: canvas_pt };
                Vec::new()
            }
            (Button::Primary, Tool::Pencil) => {
                self.input = InputState::Sketching { path: vec![canvas_pt] };
                self.preview = Some(self.freehand(vec![canvas_pt]));
                vec![Action::RenderNeeded]
            }
            (Button::Primary, Tool::Eraser) => {
                self.input = InputState::Erasing { path: vec![canvas_pt] };
                Vec::new()
            }
            (Button::Primary, Tool::Text) => vec![Action::TextRequested { at: canvas_pt }],
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let canvas_pt = self.viewport.screen_to_canvas(screen_pt);
        let mut actions = vec![Action::CursorMoved(canvas_pt)];
        match &mut self.input {
            InputState::Idle => {}
            InputState::Panning { last_screen } => {
                let (dx, dy) = (screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                *last_screen = screen_pt;
                self.viewport.pan(dx, dy);
                actions.push(Action::RenderNeeded);
            }
            InputState::DrawingBox { tool, anchor } => {
                self.preview = box_shape(*tool, *anchor, canvas_pt, &self.ui.style);
                actions.push(Action::RenderNeeded);
            }
            InputState::Sketching { path } => {
                push_distinct(path, canvas_pt);
                let path = path.clone();
                self.preview = Some(self.freehand(path));
                actions.push(Action::RenderNeeded);
            }
            InputState::Erasing { path } => {
                push_distinct(path, canvas_pt);
                if self.ui.erase_mode == EraseMode::Mask {
                    let path = path.clone();
                    self.preview = Some(Shape::Eraser { path, stroke_width: self.ui.style.eraser_width });
                    actions.push(Action::RenderNeeded);
                }
            }
        }
        actions
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        let canvas_pt = self.viewport.screen_to_canvas(screen_pt);
        let gesture = std::mem::take(&mut self.input);
        self.preview = None;
        match gesture {
            InputState::Idle => Vec::new(),
            InputState::Panning { .. } => vec![Action::SetCursor(cursor_for(self.ui.tool).to_owned())],
            InputState::DrawingBox { tool, anchor } => match box_shape(tool, anchor, canvas_pt, &self.ui.style) {
                Some(shape) => self.commit(shape),
                None => vec![Action::RenderNeeded],
            },
            InputState::Sketching { mut path } => {
                push_distinct(&mut path, canvas_pt);
                let shape = self.freehand(path);
                self.commit(shape)
            }
            InputState::Erasing { mut path } => {
                push_distinct(&mut path, canvas_pt);
                self.finish_erase(path)
            }
        }
    }

    /// Wheel zooms toward the pointer; a purely horizontal scroll pans.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, _modifiers: Modifiers) -> Vec<Action> {
        if delta.dy < 0.0 {
            self.viewport.zoom(ZOOM_STEP, Some(screen_pt));
        } else if delta.dy > 0.0 {
            self.viewport.zoom(1.0 / ZOOM_STEP, Some(screen_pt));
        } else if delta.dx != 0.0 {
            self.viewport.pan(-delta.dx, 0.0);
        } else {
            return Vec::new();
        }
        vec![Action::RenderNeeded]
    }

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        let key = key.0.to_ascii_lowercase();
        if modifiers.command() {
            return match key.as_str() {
                "z" if modifiers.shift => self.redo(),
                "z" => self.undo(),
                "y" => self.redo(),
                "k" => self.clear_all(),
                "s" => vec![Action::ExportRequested],
                "=" | "+" => self.zoom_in(),
                "-" => self.zoom_out(),
                "0" => self.reset_view(),
                _ => Vec::new(),
            };
        }
        if key == "escape" {
            self.cancel_gesture();
            return vec![Action::RenderNeeded];
        }
        match Tool::from_shortcut(&key) {
            Some(tool) => vec![self.set_tool(tool)],
            None => Vec::new(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        self.store.shapes()
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    // --- Internals ---

    fn freehand(&self, path: Vec<Point>) -> Shape {
        Shape::Freehand { path, color: self.ui.style.color.clone(), stroke_width: self.ui.style.stroke_width }
    }

    fn commit(&mut self, shape: Shape) -> Vec<Action> {
        self.store.append(shape.clone());
        vec![Action::ShapeAdded(shape), Action::RenderNeeded]
    }

    fn finish_erase(&mut self, path: Vec<Point>) -> Vec<Action> {
        match self.ui.erase_mode {
            EraseMode::Mask => {
                let shape = Shape::Eraser { path, stroke_width: self.ui.style.eraser_width };
                self.commit(shape)
            }
            EraseMode::Remove => {
                let radius = self.viewport.screen_distance_to_canvas(ERASER_RADIUS_PX);
                let targets = hit::erase_targets(self.store.shapes(), &path, radius);
                if targets.is_empty() {
                    return Vec::new();
                }
                self.store.erase_many(&targets);
                vec![Action::ShapesErased(targets), Action::RenderNeeded]
            }
        }
    }

    fn cancel_gesture(&mut self) {
        self.input = InputState::Idle;
        self.preview = None;
    }
}

fn cursor_for(tool: Tool) -> &'static str {
    match tool {
        Tool::Pan => "grab",
        Tool::Text => "text",
        Tool::Pencil | Tool::Rect | Tool::Ellipse | Tool::Eraser => "crosshair",
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the element has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(JsValue::from)?;
        Ok(Self { canvas, ctx, core: EngineCore::new() })
    }

    /// Size the backing store for the given CSS size and device pixel ratio.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.core.resize(width_css, height_css, dpr);
        self.canvas.set_width((width_css * self.core.dpr).round().max(0.0) as u32);
        self.canvas.set_height((height_css * self.core.dpr).round().max(0.0) as u32);
    }

    // --- Delegated input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_down(screen_pt, button, modifiers)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_move(screen_pt, modifiers)
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_up(screen_pt, button, modifiers)
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_wheel(screen_pt, delta, modifiers)
    }

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_down(key, modifiers)
    }

    // --- Render ---

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a Canvas2D call fails.
    pub fn render(&mut self) -> Result<(), JsValue> {
        let core = &self.core;
        render::render_scene(&mut self.ctx, core.shapes(), core.preview.as_ref(), &core.viewport, core.dpr)
    }

    /// Paint every shape with pan and zoom discarded, ready for
    /// `canvas.toDataURL()`. Call [`Engine::render`] afterwards to restore
    /// the on-screen view.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a Canvas2D call fails.
    pub fn render_for_export(&mut self) -> Result<(), JsValue> {
        let width = f64::from(self.canvas.width());
        let height = f64::from(self.canvas.height());
        render::render_for_export(&mut self.ctx, self.core.shapes(), width, height)
    }
}
