//! Pan/zoom viewport and screen ↔ canvas coordinate conversion.
//!
//! Screen space is CSS pixels relative to the top-left of the drawing
//! surface. Canvas space is the infinite, origin-independent plane every
//! shape is stored in. The mapping is `screen = canvas * scale + offset`.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use protocol::Point;

use crate::consts::{MAX_SCALE, MIN_SCALE};
use crate::hit::Bounds;

/// Viewport state for one client.
///
/// `offset_x` / `offset_y` are in screen pixels. `scale` is always within
/// `[MIN_SCALE, MAX_SCALE]`. `width` / `height` are the surface size in
/// screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset_x: 0.0, offset_y: 0.0, scale: 1.0, width: 0.0, height: 0.0 }
    }
}

impl Viewport {
    /// Identity viewport over a surface of the given size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, ..Self::default() }
    }

    /// Shift the view by a screen-space delta. The delta is not scaled.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Multiply the scale by `factor`, keeping the canvas point under
    /// `center` fixed on screen. Without a center the view zooms toward the
    /// middle of the surface.
    ///
    /// The scale is clamped first and the offset is derived from the clamped
    /// value, so a zoom that hits a bound never drifts. Non-finite or
    /// non-positive factors are ignored.
    pub fn zoom(&mut self, factor: f64, center: Option<Point>) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let center = center.unwrap_or_else(|| self.center());
        let anchor = self.screen_to_canvas(center);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.offset_x = center.x - anchor.x * self.scale;
        self.offset_y = center.y - anchor.y * self.scale;
    }

    /// Back to scale 1 with no offset. The surface size is kept.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    /// Update the surface size after the host element changed.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    /// Convert a screen-space point to canvas coordinates.
    #[must_use]
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point::new((screen.x - self.offset_x) / self.scale, (screen.y - self.offset_y) / self.scale)
    }

    /// Convert a canvas-space point to screen coordinates.
    #[must_use]
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(canvas.x * self.scale + self.offset_x, canvas.y * self.scale + self.offset_y)
    }

    /// Convert a screen-space length to canvas units.
    #[must_use]
    pub fn screen_distance_to_canvas(&self, distance: f64) -> f64 {
        distance / self.scale
    }

    /// Canvas-space rectangle currently covered by the surface.
    #[must_use]
    pub fn visible_bounds(&self) -> Bounds {
        let top_left = self.screen_to_canvas(Point::new(0.0, 0.0));
        let bottom_right = self.screen_to_canvas(Point::new(self.width, self.height));
        Bounds { min_x: top_left.x, min_y: top_left.y, max_x: bottom_right.x, max_y: bottom_right.y }
    }

    fn center(&self) -> Point {
        Point::new(self.width * 0.5, self.height * 0.5)
    }
}
