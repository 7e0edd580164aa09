//! Offset/inflation engine: derives inner and outer buffer rings from an outline.
//!
//! DESIGN
//! ======
//! Every edge is shifted along its unit normal; at each vertex the two shifted
//! edges are joined by extending them to their intersection (a miter join),
//! computed as `v + (n1 + n2) * d / (1 + n1·n2)`. Open polylines use the single
//! adjacent edge normal at their endpoints. Rings are always regenerated from
//! the full outline.
//!
//! Degenerate input (zero-length edges, hairpin reversals, zero-area rings, or
//! a side that folds over itself) yields `None`; callers render no buffer.

#[cfg(test)]
#[path = "offset_test.rs"]
mod offset_test;

use tracing::debug;

use crate::camera::Point;
use crate::config::EngineConfig;
use crate::consts::{GEOMETRY_EPSILON, MITER_EPSILON, RECT_DISCOUNT};
use crate::doc::{Annotation, OffsetBand, Shape};
use crate::geometry::{self, signed_area};

/// Unit normal of `a`→`b` pointing to its right in a y-up frame, or `None`
/// for a zero-length edge.
fn right_normal(a: Point, b: Point) -> Option<Point> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < GEOMETRY_EPSILON {
        return None;
    }
    Some(Point::new(dy / len, -dx / len))
}

/// Miter-join vertex `v` between two edges with unit normals `n1`, `n2`.
fn miter(v: Point, n1: Point, n2: Point, distance: f64) -> Option<Point> {
    let denom = 1.0 + n1.x * n2.x + n1.y * n2.y;
    if denom < MITER_EPSILON {
        return None;
    }
    let k = distance / denom;
    Some(Point::new(v.x + (n1.x + n2.x) * k, v.y + (n1.y + n2.y) * k))
}

/// Offset a closed ring by `distance`: positive grows it, negative shrinks it.
///
/// Winding is detected from the signed area, so either orientation works.
#[must_use]
pub fn offset_ring(ring: &[Point], distance: f64) -> Option<Vec<Point>> {
    let n = ring.len();
    let area = signed_area(ring);
    if n < 3 || area.abs() < GEOMETRY_EPSILON {
        return None;
    }
    let outward = area.signum();

    let mut normals = Vec::with_capacity(n);
    for i in 0..n {
        let edge = right_normal(ring[i], ring[(i + 1) % n])?;
        normals.push(Point::new(edge.x * outward, edge.y * outward));
    }

    (0..n)
        .map(|i| {
            let before = normals[(i + n - 1) % n];
            miter(ring[i], before, normals[i], distance)
        })
        .collect()
}

/// Offset an open polyline by `distance` to its right (negative: to its left).
#[must_use]
pub fn offset_polyline(line: &[Point], distance: f64) -> Option<Vec<Point>> {
    let n = line.len();
    if n < 2 {
        return None;
    }
    let normals = line
        .windows(2)
        .map(|w| right_normal(w[0], w[1]))
        .collect::<Option<Vec<_>>>()?;

    (0..n)
        .map(|i| {
            let before = normals[i.saturating_sub(1)];
            let after = normals[i.min(n - 2)];
            miter(line[i], before, after, distance)
        })
        .collect()
}

/// Whether every shifted edge still points the same way as its source edge.
///
/// A reversed edge means the offset overran the shape and folded it.
fn keeps_edge_directions(source: &[Point], shifted: &[Point], ring: bool) -> bool {
    let n = source.len();
    let edges = if ring { n } else { n.saturating_sub(1) };
    (0..edges).all(|i| {
        let j = (i + 1) % n;
        let (sx, sy) = (source[j].x - source[i].x, source[j].y - source[i].y);
        let (tx, ty) = (shifted[j].x - shifted[i].x, shifted[j].y - shifted[i].y);
        sx * tx + sy * ty > 0.0
    })
}

/// Derive the `(inner, outer)` pair for an outline.
///
/// Rings offset inward and outward. Open lines offset to their left (inner)
/// and right (outer). A side whose edges fold back yields no band at all.
#[must_use]
pub fn inflate(
    outline: &[Point],
    ring: bool,
    inner: f64,
    outer: f64,
) -> Option<(Vec<Point>, Vec<Point>)> {
    let (inner_side, outer_side) = if ring {
        (offset_ring(outline, -inner)?, offset_ring(outline, outer)?)
    } else {
        (offset_polyline(outline, -inner)?, offset_polyline(outline, outer)?)
    };
    if !keeps_edge_directions(outline, &inner_side, ring)
        || !keeps_edge_directions(outline, &outer_side, ring)
    {
        return None;
    }
    Some((inner_side, outer_side))
}

/// Offset applied to lines and points: `inflate / scale × scalar`.
#[must_use]
pub fn base_offset(scale: f64, config: &EngineConfig) -> f64 {
    config.inflate_offset / scale * config.offset_scalar
}

/// Offset magnitude for an outline of `shape` at `scale`.
///
/// Polygons scale with their bounding size. Rectangles apply a discount of
/// `size * (1 / (size * 2) / 100)` to that size first. Lines and points use
/// [`base_offset`]. Returns `None` for an empty or zero-sized ring outline.
#[must_use]
pub fn offset_magnitude(
    shape: Shape,
    outline: &[Point],
    scale: f64,
    config: &EngineConfig,
) -> Option<f64> {
    let factor = match shape {
        Shape::Point | Shape::Line => return Some(base_offset(scale, config)),
        Shape::Polygon => ring_size(outline)?,
        Shape::Rectangle => {
            let size = ring_size(outline)?;
            size * (1.0 / (size * 2.0) / RECT_DISCOUNT)
        }
    };
    Some(config.inflate_offset * factor * config.offset_scalar / config.offset_divisor / scale)
}

fn ring_size(outline: &[Point]) -> Option<f64> {
    let size = geometry::bounding_box(outline)?.size();
    (size > GEOMETRY_EPSILON).then_some(size)
}

/// Recompute an offset annotation's offsets at `scale` and regenerate its rings.
///
/// Returns `false` when the annotation has no band or its rings could not be
/// generated; the offsets are still updated in the latter case.
pub fn derive_band(annotation: &mut Annotation, scale: f64, config: &EngineConfig) -> bool {
    let shape = annotation.shape();
    let outline = annotation.outline();
    let Some(magnitude) = offset_magnitude(shape, &outline, scale, config) else {
        if let Some(band) = annotation.offset_mut() {
            band.inner_ring = None;
            band.outer_ring = None;
        }
        return false;
    };
    let Some(band) = annotation.offset_mut() else {
        return false;
    };
    band.inner_offset = magnitude;
    band.outer_offset = magnitude;
    regenerate_rings(band, shape, &outline)
}

/// Regenerate rings from `outline` with the band's current offsets.
pub fn regenerate_rings(band: &mut OffsetBand, shape: Shape, outline: &[Point]) -> bool {
    let rings = match shape {
        Shape::Point => None,
        Shape::Line => inflate(outline, false, band.inner_offset, band.outer_offset),
        Shape::Rectangle | Shape::Polygon => {
            inflate(outline, true, band.inner_offset, band.outer_offset)
        }
    };
    match rings {
        Some((inner, outer)) => {
            band.inner_ring = Some(inner);
            band.outer_ring = Some(outer);
            true
        }
        None => {
            if shape != Shape::Point {
                debug!(?shape, vertices = outline.len(), "offset skipped for degenerate outline");
            }
            band.inner_ring = None;
            band.outer_ring = None;
            false
        }
    }
}
