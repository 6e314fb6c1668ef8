//! Input model: tools, modifier keys, mouse buttons, and the gesture state machine.
//!
//! `Tool`, `EraseMode`, and `Style` capture the user's intent at the time of
//! a pointer event. `InputState` is the active gesture being tracked between
//! pointer-down and pointer-up. Gesture points are stored in canvas space so
//! a pan or zoom in the middle of a stroke cannot bend what gets persisted.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use protocol::{DEFAULT_COLOR, DEFAULT_ERASER_WIDTH, DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH, Point, Shape};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand pencil (default).
    #[default]
    Pencil,
    /// Drag out a rectangle outline.
    Rect,
    /// Drag out a circle outline.
    Ellipse,
    /// Remove or mask ink along the drag path.
    Eraser,
    /// Place a line of text at the click point.
    Text,
    /// Drag the view.
    Pan,
}

impl Tool {
    /// Tool bound to a single unmodified key, if any.
    #[must_use]
    pub fn from_shortcut(key: &str) -> Option<Self> {
        match key {
            "p" => Some(Self::Pan),
            "d" => Some(Self::Pencil),
            "r" => Some(Self::Rect),
            "c" => Some(Self::Ellipse),
            "e" => Some(Self::Eraser),
            "t" => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether this tool is dragged out from an anchor corner.
    #[must_use]
    pub fn is_box(self) -> bool {
        matches!(self, Self::Rect | Self::Ellipse)
    }
}

/// How the eraser tool affects existing ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseMode {
    /// Hit-test the drag path and delete whole shapes it touches.
    #[default]
    Remove,
    /// Persist an eraser stroke that masks ink beneath it.
    Mask,
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button; always pans.
    Middle,
    /// Right mouse button; ignored.
    Secondary,
}

/// A keyboard key as reported by the browser (e.g. `"z"`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

/// Wheel / trackpad scroll delta in pixels.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    pub dx: f64,
    /// Positive scrolls down, which zooms out.
    pub dy: f64,
}

/// Ink settings applied to newly created shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub color: String,
    pub stroke_width: f64,
    pub font_size: f64,
    pub eraser_width: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            font_size: DEFAULT_FONT_SIZE,
            eraser_width: DEFAULT_ERASER_WIDTH,
        }
    }
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub tool: Tool,
    pub erase_mode: EraseMode,
    pub style: Style,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Dragging the view.
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
    /// Dragging out a rectangle or circle.
    DrawingBox {
        tool: Tool,
        /// Canvas-space point where the drag started.
        anchor: Point,
    },
    /// Collecting a pencil path.
    Sketching { path: Vec<Point> },
    /// Collecting an eraser path.
    Erasing { path: Vec<Point> },
}

/// Append `point` unless it repeats the last one.
pub fn push_distinct(path: &mut Vec<Point>, point: Point) {
    if path.last() != Some(&point) {
        path.push(point);
    }
}

/// Shape for a box gesture from `anchor` to `current`, or `None` for a
/// zero-size drag.
///
/// Circles take the larger drag extent as their diameter and grow away from
/// the anchor in the drag direction.
#[must_use]
pub fn box_shape(tool: Tool, anchor: Point, current: Point, style: &Style) -> Option<Shape> {
    let width = current.x - anchor.x;
    let height = current.y - anchor.y;
    match tool {
        Tool::Rect if width != 0.0 || height != 0.0 => Some(Shape::Rect {
            x: anchor.x,
            y: anchor.y,
            width,
            height,
            color: style.color.clone(),
            stroke_width: style.stroke_width,
        }),
        Tool::Ellipse => {
            let radius = width.abs().max(height.abs()) / 2.0;
            if radius == 0.0 {
                return None;
            }
            Some(Shape::Ellipse {
                center_x: anchor.x + radius.copysign(width),
                center_y: anchor.y + radius.copysign(height),
                radius,
                color: style.color.clone(),
                stroke_width: style.stroke_width,
            })
        }
        _ => None,
    }
}
