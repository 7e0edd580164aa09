#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;

use crate::camera::Point;
use crate::doc::{Annotation, AnnotationId};
use crate::geometry::{distance, nearest_on_segment};

/// Closest attach point on existing geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The point on the target's outline nearest the candidate.
    pub snap_point: Point,
    /// Distance from the candidate to `snap_point`, in viewport units.
    pub distance: f64,
    /// Annotation owning the edge.
    pub annotation_id: AnnotationId,
    /// Index of the edge's starting vertex; a new vertex goes after it.
    pub index_to_insert_after: usize,
}

/// Find the nearest point on any closed annotation's outline within
/// `radius_px / scale` of `candidate`.
///
/// Edges are visited annotation by annotation in iteration order; on equal
/// distances the first found wins. Ring shapes include their closing edge;
/// single-vertex shapes offer only that vertex.
pub fn snap_annotation<'a, I>(
    annotations: I,
    candidate: Point,
    scale: f64,
    radius_px: f64,
) -> Option<SnapResult>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut best: Option<SnapResult> = None;
    let mut consider = |snap_point: Point, annotation_id: AnnotationId, index: usize| {
        let d = distance(candidate, snap_point);
        if best.is_none_or(|b| d < b.distance) {
            best = Some(SnapResult {
                snap_point,
                distance: d,
                annotation_id,
                index_to_insert_after: index,
            });
        }
    };

    for annotation in annotations.into_iter().filter(|a| a.closed) {
        let outline = annotation.outline();
        match outline.as_slice() {
            [] => {}
            [only] => consider(*only, annotation.id, 0),
            _ => {
                for (i, edge) in outline.windows(2).enumerate() {
                    consider(nearest_on_segment(candidate, edge[0], edge[1]), annotation.id, i);
                }
                if annotation.shape().is_ring() {
                    let last = outline.len() - 1;
                    let closing = nearest_on_segment(candidate, outline[last], outline[0]);
                    consider(closing, annotation.id, last);
                }
            }
        }
    }

    best.filter(|b| b.distance <= radius_px / scale)
}
