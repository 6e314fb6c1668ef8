//! Rendering: paints a shape list onto a 2D drawing surface.
//!
//! Rendering is stateless. It receives read-only views of the shape list and
//! the viewport and produces pixels; it does not mutate any application
//! state. Drawing goes through the [`Surface`] trait so the browser context
//! and test doubles share the same code path.
//!
//! All fallible surface calls propagate errors via `Result<(), S::Error>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::f64::consts::TAU;

use protocol::{Point, Shape};
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::viewport::Viewport;

/// Compositing mode for eraser strokes: clears what is beneath.
const COMPOSITE_ERASE: &str = "destination-out";

/// The subset of the Canvas 2D API the renderer needs.
pub trait Surface {
    type Error;

    /// Replace the current transform with `[a c e; b d f]`.
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), Self::Error>;
    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn save(&mut self);
    fn restore(&mut self);
    fn set_composite(&mut self, op: &str) -> Result<(), Self::Error>;
    fn set_stroke_color(&mut self, color: &str);
    fn set_fill_color(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    /// Round caps and joins, used for every stroke.
    fn set_round_ends(&mut self);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64);
    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), Self::Error>;
    fn stroke(&mut self);
    fn fill(&mut self);
    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn set_font(&mut self, font: &str);
    fn set_text_baseline(&mut self, baseline: &str);
    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), Self::Error>;
}

impl Surface for CanvasRenderingContext2d {
    type Error = JsValue;

    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::set_transform(self, a, b, c, d, e, f)
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        CanvasRenderingContext2d::clear_rect(self, x, y, width, height);
    }

    fn save(&mut self) {
        CanvasRenderingContext2d::save(self);
    }

    fn restore(&mut self) {
        CanvasRenderingContext2d::restore(self);
    }

    fn set_composite(&mut self, op: &str) -> Result<(), JsValue> {
        self.set_global_composite_operation(op)
    }

    fn set_stroke_color(&mut self, color: &str) {
        self.set_stroke_style_str(color);
    }

    fn set_fill_color(&mut self, color: &str) {
        self.set_fill_style_str(color);
    }

    fn set_line_width(&mut self, width: f64) {
        CanvasRenderingContext2d::set_line_width(self, width);
    }

    fn set_round_ends(&mut self) {
        self.set_line_cap("round");
        self.set_line_join("round");
    }

    fn begin_path(&mut self) {
        CanvasRenderingContext2d::begin_path(self);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        CanvasRenderingContext2d::move_to(self, x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        CanvasRenderingContext2d::line_to(self, x, y);
    }

    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        CanvasRenderingContext2d::quadratic_curve_to(self, cx, cy, x, y);
    }

    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::arc(self, x, y, radius, start, end)
    }

    fn stroke(&mut self) {
        CanvasRenderingContext2d::stroke(self);
    }

    fn fill(&mut self) {
        CanvasRenderingContext2d::fill(self);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        CanvasRenderingContext2d::stroke_rect(self, x, y, width, height);
    }

    fn set_font(&mut self, font: &str) {
        CanvasRenderingContext2d::set_font(self, font);
    }

    fn set_text_baseline(&mut self, baseline: &str) {
        CanvasRenderingContext2d::set_text_baseline(self, baseline);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::fill_text(self, text, x, y)
    }
}

// =============================================================
// Entry points
// =============================================================

/// Clear the surface and draw every shape through the viewport.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn render_all<S: Surface>(surface: &mut S, shapes: &[Shape], viewport: &Viewport) -> Result<(), S::Error> {
    render_scene(surface, shapes, None, viewport, 1.0)
}

/// Draw the full scene: committed shapes, then the in-progress gesture
/// preview on top. `dpr` is the device pixel ratio of the backing store.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn render_scene<S: Surface>(
    surface: &mut S,
    shapes: &[Shape],
    preview: Option<&Shape>,
    viewport: &Viewport,
    dpr: f64,
) -> Result<(), S::Error> {
    // Layer 1: clear in device space.
    surface.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    surface.clear_rect(0.0, 0.0, viewport.width, viewport.height);

    // Layer 2: shapes in canvas space.
    let scale = viewport.scale * dpr;
    surface.set_transform(scale, 0.0, 0.0, scale, viewport.offset_x * dpr, viewport.offset_y * dpr)?;
    for shape in shapes.iter().chain(preview) {
        draw_shape(surface, shape)?;
    }
    Ok(())
}

/// Draw every shape with the identity transform, ignoring pan and zoom, onto
/// a transparent `width` × `height` surface.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn render_for_export<S: Surface>(surface: &mut S, shapes: &[Shape], width: f64, height: f64) -> Result<(), S::Error> {
    surface.save();
    surface.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
    surface.clear_rect(0.0, 0.0, width, height);
    for shape in shapes {
        draw_shape(surface, shape)?;
    }
    surface.restore();
    Ok(())
}

// =============================================================
// Shape renderers
// =============================================================

fn draw_shape<S: Surface>(surface: &mut S, shape: &Shape) -> Result<(), S::Error> {
    match shape {
        Shape::Rect { x, y, width, height, color, stroke_width } => {
            surface.set_stroke_color(color);
            surface.set_line_width(*stroke_width);
            surface.stroke_rect(*x, *y, *width, *height);
            Ok(())
        }
        Shape::Ellipse { center_x, center_y, radius, color, stroke_width } => {
            surface.set_stroke_color(color);
            surface.set_line_width(*stroke_width);
            surface.begin_path();
            surface.arc(*center_x, *center_y, radius.abs(), 0.0, TAU)?;
            surface.stroke();
            Ok(())
        }
        Shape::Freehand { path, color, stroke_width } => draw_path(surface, path, color, *stroke_width),
        Shape::Eraser { path, stroke_width } => {
            surface.save();
            surface.set_composite(COMPOSITE_ERASE)?;
            let drawn = draw_path(surface, path, "#000000", *stroke_width);
            surface.restore();
            drawn
        }
        Shape::Text { x, y, content, color, font_size } => {
            surface.set_fill_color(color);
            surface.set_font(&format!("{font_size}px Arial"));
            surface.set_text_baseline("middle");
            surface.fill_text(content, *x, *y)
        }
    }
}

/// Stroke a path as quadratic curves through segment midpoints. A single
/// point is a filled dot of diameter `width`.
fn draw_path<S: Surface>(surface: &mut S, path: &[Point], color: &str, width: f64) -> Result<(), S::Error> {
    match path {
        [] => Ok(()),
        [only] => {
            surface.set_fill_color(color);
            surface.begin_path();
            surface.arc(only.x, only.y, width / 2.0, 0.0, TAU)?;
            surface.fill();
            Ok(())
        }
        [first, rest @ ..] => {
            surface.set_stroke_color(color);
            surface.set_line_width(width);
            surface.set_round_ends();
            surface.begin_path();
            surface.move_to(first.x, first.y);
            trace_smooth(surface, path, rest);
            surface.stroke();
            Ok(())
        }
    }
}

fn trace_smooth<S: Surface>(surface: &mut S, path: &[Point], rest: &[Point]) {
    if let [only] = rest {
        surface.line_to(only.x, only.y);
        return;
    }
    for pair in path[1..path.len() - 1].windows(2) {
        let (ctrl, next) = (pair[0], pair[1]);
        surface.quadratic_curve_to(ctrl.x, ctrl.y, (ctrl.x + next.x) / 2.0, (ctrl.y + next.y) / 2.0);
    }
    if let [.., ctrl, end] = path {
        surface.quadratic_curve_to(ctrl.x, ctrl.y, end.x, end.y);
    }
}
