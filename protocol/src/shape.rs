//! Shape model shared by the broker, the session controller, and the canvas.
//!
//! Every coordinate here is in canvas space. Screen-space numbers are
//! converted by the viewport before a shape is built, so nothing in this
//! module knows about pan or zoom.

use serde::{Deserialize, Serialize};

/// Stroke/fill color used when the wire omits one.
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Line width used when the wire omits one.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Eraser width used when the wire omits one.
pub const DEFAULT_ERASER_WIDTH: f64 = 20.0;

/// Text size in canvas units used when the wire omits one.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

fn default_eraser_width() -> f64 {
    DEFAULT_ERASER_WIDTH
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

/// A point in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One persisted drawing primitive.
///
/// Shapes compare by value; erasing a shape removes every value-equal copy
/// from a replica or from the persisted log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Shape {
    /// Outline rectangle. Width and height may be negative when drawn up/left.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_stroke_width")]
        stroke_width: f64,
    },
    /// Outline circle. The radius is used by magnitude.
    #[serde(alias = "circle")]
    Ellipse {
        center_x: f64,
        center_y: f64,
        radius: f64,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_stroke_width")]
        stroke_width: f64,
    },
    /// Pencil stroke. A single point renders as a dot.
    #[serde(alias = "pencil")]
    Freehand {
        path: Vec<Point>,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_stroke_width")]
        stroke_width: f64,
    },
    /// Masking stroke that removes underlying ink along its path.
    Eraser {
        path: Vec<Point>,
        #[serde(default = "default_eraser_width")]
        stroke_width: f64,
    },
    /// Single-line text anchored at its left/middle point.
    Text {
        x: f64,
        y: f64,
        #[serde(alias = "text")]
        content: String,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
}

/// Why a decoded shape was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("shape field `{0}` is not a finite number")]
    NonFinite(&'static str),
    #[error("shape field `{0}` must be positive")]
    NonPositive(&'static str),
    #[error("stroke path must contain at least one point")]
    EmptyPath,
}

impl Shape {
    /// Wire name of the shape variant, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rect { .. } => "rect",
            Self::Ellipse { .. } => "ellipse",
            Self::Freehand { .. } => "freehand",
            Self::Eraser { .. } => "eraser",
            Self::Text { .. } => "text",
        }
    }

    /// Ink color, if the shape has one.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Rect { color, .. }
            | Self::Ellipse { color, .. }
            | Self::Freehand { color, .. }
            | Self::Text { color, .. } => Some(color),
            Self::Eraser { .. } => None,
        }
    }

    /// Check the invariants the codec cannot express in types.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError`] for non-finite numbers, empty paths, or
    /// non-positive widths and font sizes.
    pub fn validate(&self) -> Result<(), ShapeError> {
        match self {
            Self::Rect { x, y, width, height, stroke_width, .. } => {
                finite("x", *x)?;
                finite("y", *y)?;
                finite("width", *width)?;
                finite("height", *height)?;
                positive("strokeWidth", *stroke_width)
            }
            Self::Ellipse { center_x, center_y, radius, stroke_width, .. } => {
                finite("centerX", *center_x)?;
                finite("centerY", *center_y)?;
                finite("radius", *radius)?;
                positive("strokeWidth", *stroke_width)
            }
            Self::Freehand { path, stroke_width, .. } | Self::Eraser { path, stroke_width } => {
                if path.is_empty() {
                    return Err(ShapeError::EmptyPath);
                }
                for point in path {
                    finite("path.x", point.x)?;
                    finite("path.y", point.y)?;
                }
                positive("strokeWidth", *stroke_width)
            }
            Self::Text { x, y, font_size, .. } => {
                finite("x", *x)?;
                finite("y", *y)?;
                positive("fontSize", *font_size)
            }
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ShapeError> {
    if value.is_finite() { Ok(()) } else { Err(ShapeError::NonFinite(field)) }
}

fn positive(field: &'static str, value: f64) -> Result<(), ShapeError> {
    finite(field, value)?;
    if value > 0.0 { Ok(()) } else { Err(ShapeError::NonPositive(field)) }
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;
