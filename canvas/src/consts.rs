//! Shared numeric constants for the canvas crate.

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed viewport scale.
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed viewport scale.
pub const MAX_SCALE: f64 = 10.0;

/// Multiplicative zoom step for one wheel notch or zoom shortcut.
pub const ZOOM_STEP: f64 = 1.1;

// ── History ─────────────────────────────────────────────────────

/// Maximum number of snapshots kept by the shape store.
pub const HISTORY_LIMIT: usize = 50;

// ── Erasing ─────────────────────────────────────────────────────

/// Whole-shape eraser reach in screen pixels.
pub const ERASER_RADIUS_PX: f64 = 10.0;

/// Approximate glyph advance as a fraction of the font size, used to size
/// text bounding boxes without a font engine.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;
