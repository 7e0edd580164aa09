//! Persisted annotation records and the load/export path.
//!
//! Records carry image-space points; viewport points are always re-derived on
//! load through the view transform. Whether the first record of a batch has
//! `innerPoints`/`outerPoints` decides if the whole batch is read as offset
//! data (rings taken from the record) or plain data (rings derived).

#[cfg(test)]
#[path = "data_test.rs"]
mod data_test;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::camera::{ImagePoint, Point, ViewTransform};
use crate::config::EngineConfig;
use crate::doc::{Annotation, AnnotationClass, AnnotationId, AnnotationKind, Shape};
use crate::{geometry, offset};

/// A point sequence in both spaces. `viewport` is derived, never trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordData {
    pub image: Vec<ImagePoint>,
    #[serde(default)]
    pub viewport: Vec<Point>,
}

impl CoordData {
    fn from_viewport(points: &[Point], view: &ViewTransform) -> Self {
        Self { image: view.viewport_to_image_all(points), viewport: points.to_vec() }
    }

    fn hydrate(&mut self, view: &ViewTransform) {
        self.viewport = view.image_to_viewport_all(&self.image);
    }
}

/// Wire form of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub coord: CoordData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_points: Option<CoordData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_points: Option<CoordData>,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_color: Option<String>,
}

/// Derive viewport points from image points for the outline and any rings.
pub fn hydrate(record: &mut AnnotationData, view: &ViewTransform) {
    record.coord.hydrate(view);
    for ring in [&mut record.inner_points, &mut record.outer_points].into_iter().flatten() {
        ring.hydrate(view);
    }
}

/// Whether a batch is offset data, judged by its first record.
#[must_use]
pub fn is_offset_batch(records: &[AnnotationData]) -> bool {
    records
        .first()
        .is_some_and(|r| r.inner_points.is_some() || r.outer_points.is_some())
}

/// Build an annotation from a hydrated record.
///
/// Returns `None` (with a warning) when the record has too few vertices for
/// its kind. Rectangles are normalised to two opposite corners; points keep
/// their first vertex. Offset kinds take their rings from the record in an
/// offset batch and derive them otherwise.
#[must_use]
pub fn to_annotation(
    record: &AnnotationData,
    offset_batch: bool,
    scale: f64,
    config: &EngineConfig,
) -> Option<Annotation> {
    let kind = record.kind;
    let points = &record.coord.viewport;
    if points.len() < kind.shape().min_vertices() {
        warn!(id = %record.id, ?kind, vertices = points.len(), "record skipped: too few vertices");
        return None;
    }

    let color = if record.color.is_empty() { kind.default_color() } else { record.color.as_str() };
    let mut annotation = Annotation::with_id(record.id, kind, color);
    annotation.vertices = match kind.shape() {
        Shape::Point => points[..1].to_vec(),
        Shape::Rectangle => {
            let bbox = geometry::bounding_box(points)?;
            vec![bbox.min(), bbox.max()]
        }
        Shape::Line | Shape::Polygon => points.clone(),
    };
    annotation.closed = true;

    if let (Some(name), Some(color)) = (&record.class_name, &record.class_color) {
        annotation.class = Some(AnnotationClass { name: name.clone(), color: color.clone() });
    }

    if let Some(info) = annotation.info_mut() {
        info.header = record.header_text.clone().unwrap_or_default();
        info.detail = record.detail_text.clone().unwrap_or_default();
        info.images = record.images.clone();
    }

    if kind.is_offset() {
        apply_band(&mut annotation, record, offset_batch, scale, config);
    }
    Some(annotation)
}

fn apply_band(
    annotation: &mut Annotation,
    record: &AnnotationData,
    offset_batch: bool,
    scale: f64,
    config: &EngineConfig,
) {
    let stored = |coord: &Option<CoordData>| {
        coord.as_ref().map(|c| c.viewport.clone()).filter(|v| !v.is_empty())
    };
    let (inner, outer) = (stored(&record.inner_points), stored(&record.outer_points));
    if !offset_batch || (inner.is_none() && outer.is_none()) {
        offset::derive_band(annotation, scale, config);
        return;
    }

    let magnitude =
        offset::offset_magnitude(annotation.shape(), &annotation.outline(), scale, config);
    if let Some(band) = annotation.offset_mut() {
        if let Some(m) = magnitude {
            band.inner_offset = m;
            band.outer_offset = m;
        }
        band.inner_ring = inner;
        band.outer_ring = outer;
    }
}

/// Hydrate a batch and turn every valid record into an annotation.
#[must_use]
pub fn load(
    mut records: Vec<AnnotationData>,
    view: &ViewTransform,
    config: &EngineConfig,
) -> Vec<Annotation> {
    let offset_batch = is_offset_batch(&records);
    let scale = view.scale();
    for record in &mut records {
        hydrate(record, view);
    }
    let annotations: Vec<Annotation> = records
        .iter()
        .filter_map(|r| to_annotation(r, offset_batch, scale, config))
        .collect();
    debug!(records = records.len(), loaded = annotations.len(), offset_batch, "batch loaded");
    annotations
}

/// Export an annotation with image coordinates derived through `view`.
///
/// Rectangles are written as their four corners. Offset rings are included
/// when present; info content and class are carried along.
#[must_use]
pub fn from_annotation(annotation: &Annotation, view: &ViewTransform) -> AnnotationData {
    let band = annotation.offset();
    let ring = |r: Option<&Vec<Point>>| r.map(|points| CoordData::from_viewport(points, view));
    let info = annotation.info();
    AnnotationData {
        id: annotation.id,
        kind: annotation.kind,
        coord: CoordData::from_viewport(&annotation.outline(), view),
        inner_points: ring(band.and_then(|b| b.inner_ring.as_ref())),
        outer_points: ring(band.and_then(|b| b.outer_ring.as_ref())),
        color: annotation.color.clone(),
        header_text: info.map(|i| i.header.clone()),
        detail_text: info.map(|i| i.detail.clone()),
        images: info.map(|i| i.images.clone()).unwrap_or_default(),
        class_name: annotation.class.as_ref().map(|c| c.name.clone()),
        class_color: annotation.class.as_ref().map(|c| c.color.clone()),
    }
}
