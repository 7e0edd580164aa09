//! Shared numeric and color constants for the annotation engine.

// ── Screen-constant sizes (divided by scale) ────────────────────

/// Vertex handle radius in screen pixels.
pub const VERTEX_RADIUS_PX: f64 = 4.0;

/// Stroke width in screen pixels.
pub const STROKE_WIDTH_PX: f64 = 2.0;

/// Snapping hit radius in screen pixels.
pub const SNAPPING_RADIUS_PX: f64 = 10.0;

// ── Offset / inflation ──────────────────────────────────────────

/// Base inflation offset before shape and scale factors are applied.
pub const INFLATE_OFFSET: f64 = 20.0;

/// Global multiplier applied to every inflation offset.
pub const OFFSET_SCALAR: f64 = 1.0;

/// Divisor applied to size-proportional polygon offsets.
pub const OFFSET_DIVISOR: f64 = 80.0;

/// Rectangle size discount: `size * (1 / (size * 2) / RECT_DISCOUNT)`.
pub const RECT_DISCOUNT: f64 = 100.0;

/// Below this, `1 + n1·n2` at a vertex is treated as a spike and the ring is skipped.
pub const MITER_EPSILON: f64 = 1e-9;

/// Lengths and areas under this are degenerate.
pub const GEOMETRY_EPSILON: f64 = 1e-12;

// ── Viewer ──────────────────────────────────────────────────────

/// Zoom under which annotations are rendered fully transparent.
pub const HIDE_BELOW_ZOOM: f64 = 0.5;

/// Fraction of the bounding box added on each side of a focus target.
pub const FOCUS_PADDING: f64 = 0.25;

// ── Colors ──────────────────────────────────────────────────────

/// Hex alpha suffix appended to a stroke color to derive its fill.
pub const FILL_OPACITY: &str = "33";

/// Stroke color for user-solution annotations.
pub const USER_SOLUTION_COLOR: &str = "#1DB954";

/// Stroke color for solution annotations.
pub const SOLUTION_COLOR: &str = "#FF8C00";

/// Stroke color for background annotations and the idle cursor.
pub const BACKGROUND_COLOR: &str = "#FFFFFF";

/// Stroke color for info annotations.
pub const INFO_COLOR: &str = "#3A86FF";

/// Fill value for outlines that must not be filled.
pub const NO_FILL: &str = "none";

/// Derive the translucent fill for a stroke color.
#[must_use]
pub fn fill_color(color: &str) -> String {
    format!("{color}{FILL_OPACITY}")
}
