#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Defaults ---

#[test]
fn default_is_identity() {
    let vp = Viewport::default();
    assert_eq!(vp.offset_x, 0.0);
    assert_eq!(vp.offset_y, 0.0);
    assert_eq!(vp.scale, 1.0);
}

#[test]
fn new_keeps_surface_size() {
    let vp = Viewport::new(800.0, 600.0);
    assert_eq!(vp.width, 800.0);
    assert_eq!(vp.height, 600.0);
    assert_eq!(vp.scale, 1.0);
}

// --- Conversions ---

#[test]
fn screen_to_canvas_identity() {
    let vp = Viewport::default();
    assert!(point_approx_eq(vp.screen_to_canvas(Point::new(50.0, 75.0)), Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_canvas_with_offset_and_scale() {
    let vp = Viewport { offset_x: 100.0, offset_y: 50.0, scale: 2.0, width: 0.0, height: 0.0 };
    let canvas = vp.screen_to_canvas(Point::new(300.0, 250.0));
    assert!(point_approx_eq(canvas, Point::new(100.0, 100.0)));
}

#[test]
fn canvas_to_screen_inverts_screen_to_canvas() {
    let vp = Viewport { offset_x: -37.5, offset_y: 12.25, scale: 3.7, width: 0.0, height: 0.0 };
    let screen = Point::new(123.0, -456.0);
    let round_trip = vp.canvas_to_screen(vp.screen_to_canvas(screen));
    assert!(point_approx_eq(round_trip, screen));
}

#[test]
fn screen_distance_scales_inversely() {
    let vp = Viewport { scale: 4.0, ..Viewport::default() };
    assert_eq!(vp.screen_distance_to_canvas(20.0), 5.0);
}

// --- Pan ---

#[test]
fn pan_adds_unscaled_delta() {
    let mut vp = Viewport { scale: 5.0, ..Viewport::default() };
    vp.pan(10.0, -20.0);
    assert_eq!(vp.offset_x, 10.0);
    assert_eq!(vp.offset_y, -20.0);
    vp.pan(1.0, 1.0);
    assert_eq!(vp.offset_x, 11.0);
    assert_eq!(vp.offset_y, -19.0);
}

// --- Zoom ---

#[test]
fn zoom_keeps_cursor_point_fixed() {
    let mut vp = Viewport { offset_x: 40.0, offset_y: -10.0, scale: 1.3, width: 800.0, height: 600.0 };
    let cursor = Point::new(317.0, 211.0);
    let before = vp.screen_to_canvas(cursor);
    vp.zoom(1.75, Some(cursor));
    assert!(point_approx_eq(vp.canvas_to_screen(before), cursor));
    assert!(approx_eq(vp.scale, 1.3 * 1.75));
}

#[test]
fn repeated_zoom_keeps_cursor_point_fixed() {
    let mut vp = Viewport::new(1024.0, 768.0);
    let cursor = Point::new(10.0, 700.0);
    let before = vp.screen_to_canvas(cursor);
    for factor in [1.1, 1.1, 0.5, 3.0, 0.9] {
        vp.zoom(factor, Some(cursor));
    }
    assert!(point_approx_eq(vp.canvas_to_screen(before), cursor));
}

#[test]
fn zoom_clamps_to_max_and_stays_consistent() {
    let mut vp = Viewport::new(800.0, 600.0);
    let cursor = Point::new(200.0, 100.0);
    let before = vp.screen_to_canvas(cursor);
    vp.zoom(1000.0, Some(cursor));
    assert_eq!(vp.scale, MAX_SCALE);
    assert!(point_approx_eq(vp.canvas_to_screen(before), cursor));
}

#[test]
fn zoom_clamps_to_min_and_stays_consistent() {
    let mut vp = Viewport::new(800.0, 600.0);
    let cursor = Point::new(650.0, 20.0);
    let before = vp.screen_to_canvas(cursor);
    vp.zoom(0.0001, Some(cursor));
    assert_eq!(vp.scale, MIN_SCALE);
    assert!(point_approx_eq(vp.canvas_to_screen(before), cursor));
}

#[test]
fn zoom_at_bound_does_not_move_offset() {
    let mut vp = Viewport { scale: MAX_SCALE, offset_x: 5.0, offset_y: 6.0, width: 100.0, height: 100.0 };
    vp.zoom(2.0, Some(Point::new(30.0, 40.0)));
    assert!(approx_eq(vp.offset_x, 5.0));
    assert!(approx_eq(vp.offset_y, 6.0));
}

#[test]
fn zoom_without_center_uses_surface_middle() {
    let mut vp = Viewport::new(800.0, 600.0);
    let middle = Point::new(400.0, 300.0);
    let before = vp.screen_to_canvas(middle);
    vp.zoom(2.0, None);
    assert!(point_approx_eq(vp.canvas_to_screen(before), middle));
}

#[test]
fn zoom_ignores_invalid_factor() {
    let mut vp = Viewport::new(800.0, 600.0);
    vp.zoom(f64::NAN, None);
    vp.zoom(0.0, None);
    vp.zoom(-2.0, None);
    assert_eq!(vp, Viewport::new(800.0, 600.0));
}

// --- Reset / resize / bounds ---

#[test]
fn reset_restores_identity_but_keeps_size() {
    let mut vp = Viewport::new(800.0, 600.0);
    vp.pan(30.0, 40.0);
    vp.zoom(3.0, None);
    vp.reset();
    assert_eq!(vp, Viewport::new(800.0, 600.0));
}

#[test]
fn resize_rejects_negative_sizes() {
    let mut vp = Viewport::default();
    vp.resize(-10.0, 300.0);
    assert_eq!(vp.width, 0.0);
    assert_eq!(vp.height, 300.0);
}

#[test]
fn visible_bounds_follow_pan_and_zoom() {
    let mut vp = Viewport::new(200.0, 100.0);
    vp.pan(-100.0, -50.0);
    vp.zoom(2.0, Some(Point::new(0.0, 0.0)));
    let bounds = vp.visible_bounds();
    assert!(approx_eq(bounds.min_x, 100.0));
    assert!(approx_eq(bounds.min_y, 50.0));
    assert!(approx_eq(bounds.max_x, 200.0));
    assert!(approx_eq(bounds.max_y, 100.0));
}
