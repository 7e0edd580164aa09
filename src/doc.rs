//! Document model: annotation kinds, annotations, and the categorized store.
//!
//! This module defines what an annotation is (`AnnotationKind`, `Shape`,
//! `Category`, `Variant`, `Annotation`) and the runtime store that owns every
//! finished annotation (`DocStore`). A kind fixes the shape, the owning
//! category, and the variant payload, so call sites match on the kind instead
//! of probing the payload.
//!
//! Finished annotations arrive from the drawing state machine (on close) and
//! from the loader (persisted data). The store is their sole owner; nothing is
//! dropped except by an explicit remove or clear.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::camera::Point;
use crate::config::EngineConfig;
use crate::consts::{
    BACKGROUND_COLOR, INFO_COLOR, NO_FILL, SOLUTION_COLOR, USER_SOLUTION_COLOR, fill_color,
};
use crate::geometry::{self, Bounds};
use crate::offset;

/// Unique identifier for an annotation, unique across all categories.
pub type AnnotationId = Uuid;

/// Geometric shape of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single vertex.
    Point,
    /// An open polyline.
    Line,
    /// Two opposite corners of an axis-aligned rectangle.
    Rectangle,
    /// A closed ring.
    Polygon,
}

impl Shape {
    /// Fewest vertices a finished annotation of this shape may carry.
    #[must_use]
    pub fn min_vertices(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line | Self::Rectangle => 2,
            Self::Polygon => 3,
        }
    }

    /// Whether the outline wraps around from the last vertex to the first.
    #[must_use]
    pub fn is_ring(self) -> bool {
        matches!(self, Self::Rectangle | Self::Polygon)
    }
}

/// The four disjoint collections an annotation can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Background,
    Solution,
    UserSolution,
    Info,
}

impl Category {
    /// All categories in layer order (bottom first).
    pub const ALL: [Self; 4] = [Self::Background, Self::Solution, Self::UserSolution, Self::Info];
}

/// The closed set of annotation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Background region outline, drawn as a rectangle.
    Base,
    /// Solution polygon with an inflation band.
    Solution,
    /// Solution polyline with an inflation band.
    SolutionLine,
    /// Solution rectangle with an inflation band.
    SolutionRect,
    /// Solution point with a circular buffer.
    SolutionPoint,
    /// User-drawn polygon.
    UserSolution,
    /// User-drawn polyline.
    UserSolutionLine,
    /// User-drawn rectangle.
    UserSolutionRect,
    /// User-placed point.
    UserSolutionPoint,
    /// Informational marker.
    InfoPoint,
    /// Informational polyline.
    InfoLine,
    /// Informational polygon.
    InfoPolygon,
}

impl AnnotationKind {
    pub const ALL: [Self; 12] = [
        Self::Base,
        Self::Solution,
        Self::SolutionLine,
        Self::SolutionRect,
        Self::SolutionPoint,
        Self::UserSolution,
        Self::UserSolutionLine,
        Self::UserSolutionRect,
        Self::UserSolutionPoint,
        Self::InfoPoint,
        Self::InfoLine,
        Self::InfoPolygon,
    ];

    #[must_use]
    pub fn shape(self) -> Shape {
        match self {
            Self::SolutionPoint | Self::UserSolutionPoint | Self::InfoPoint => Shape::Point,
            Self::SolutionLine | Self::UserSolutionLine | Self::InfoLine => Shape::Line,
            Self::Base | Self::SolutionRect | Self::UserSolutionRect => Shape::Rectangle,
            Self::Solution | Self::UserSolution | Self::InfoPolygon => Shape::Polygon,
        }
    }

    #[must_use]
    pub fn category(self) -> Category {
        match self {
            Self::Base => Category::Background,
            Self::Solution | Self::SolutionLine | Self::SolutionRect | Self::SolutionPoint => {
                Category::Solution
            }
            Self::UserSolution
            | Self::UserSolutionLine
            | Self::UserSolutionRect
            | Self::UserSolutionPoint => Category::UserSolution,
            Self::InfoPoint | Self::InfoLine | Self::InfoPolygon => Category::Info,
        }
    }

    /// Whether closing this kind derives an inflation band.
    #[must_use]
    pub fn is_offset(self) -> bool {
        self.category() == Category::Solution
    }

    #[must_use]
    pub fn default_color(self) -> &'static str {
        match self.category() {
            Category::Background => BACKGROUND_COLOR,
            Category::Solution => SOLUTION_COLOR,
            Category::UserSolution => USER_SOLUTION_COLOR,
            Category::Info => INFO_COLOR,
        }
    }

    /// Fill for a stroke color: lines and background outlines stay unfilled.
    #[must_use]
    pub fn fill_for(self, color: &str) -> String {
        if self == Self::Base || self.shape() == Shape::Line {
            NO_FILL.to_string()
        } else {
            fill_color(color)
        }
    }

    /// The variant payload a fresh annotation of this kind starts with.
    #[must_use]
    pub fn empty_variant(self) -> Variant {
        match self.category() {
            Category::Solution => Variant::Offset(OffsetBand::default()),
            Category::Info => Variant::Info(InfoContent::default()),
            Category::Background | Category::UserSolution => {
                Variant::Plain { result_polylines: Vec::new() }
            }
        }
    }
}

/// Inflation band around an offset annotation's outline.
///
/// Rings are regenerated from the outline on every change, never patched.
/// `None` rings mean "no buffer rendered" (degenerate outline, or a point).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetBand {
    pub inner_offset: f64,
    pub outer_offset: f64,
    pub inner_ring: Option<Vec<Point>>,
    pub outer_ring: Option<Vec<Point>>,
}

/// Text and image references attached to an info annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoContent {
    pub header: String,
    pub detail: String,
    pub images: Vec<String>,
}

/// Per-category payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Plain outline; user annotations may carry evaluator result polylines.
    Plain { result_polylines: Vec<Vec<Point>> },
    /// Outline plus inflation band.
    Offset(OffsetBand),
    /// Outline plus info content.
    Info(InfoContent),
}

/// Classification assigned to an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationClass {
    pub name: String,
    pub color: String,
}

/// A geometric annotation in viewport space.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Stable identifier assigned at creation.
    pub id: AnnotationId,
    /// Kind; fixes shape, category, and variant.
    pub kind: AnnotationKind,
    /// Vertices in insertion order. Rectangles store two opposite corners.
    pub vertices: Vec<Point>,
    /// Whether the shape is finished.
    pub closed: bool,
    /// Stroke color.
    pub color: String,
    /// Fill color.
    pub fill_color: String,
    /// At most one annotation in a `DocStore` is selected.
    pub selected: bool,
    /// Loaded read-only; geometry edits are refused.
    pub locked: bool,
    /// Optional classification.
    pub class: Option<AnnotationClass>,
    /// Temporary stroke override used to highlight evaluation results.
    pub render_color: Option<String>,
    /// Per-category payload.
    pub variant: Variant,
}

impl Annotation {
    /// Create an empty, open annotation with a fresh id.
    #[must_use]
    pub fn new(kind: AnnotationKind, color: &str) -> Self {
        Self::with_id(Uuid::new_v4(), kind, color)
    }

    #[must_use]
    pub fn with_id(id: AnnotationId, kind: AnnotationKind, color: &str) -> Self {
        Self {
            id,
            kind,
            vertices: Vec::new(),
            closed: false,
            color: color.to_string(),
            fill_color: kind.fill_for(color),
            selected: false,
            locked: false,
            class: None,
            render_color: None,
            variant: kind.empty_variant(),
        }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.kind.shape()
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Whether the vertex count is enough to close this shape.
    #[must_use]
    pub fn can_close(&self) -> bool {
        self.vertices.len() >= self.shape().min_vertices()
    }

    /// Outline vertices in drawing order. Rectangles expand to four corners.
    #[must_use]
    pub fn outline(&self) -> Vec<Point> {
        match (self.shape(), self.vertices.as_slice()) {
            (Shape::Rectangle, [a, b, ..]) => geometry::rect_corners(*a, *b).to_vec(),
            _ => self.vertices.clone(),
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<Bounds> {
        geometry::bounding_box(&self.vertices)
    }

    /// Stroke color as rendered: override, then class color, then own color.
    #[must_use]
    pub fn stroke_color(&self) -> &str {
        self.render_color
            .as_deref()
            .or_else(|| self.class.as_ref().map(|c| c.color.as_str()))
            .unwrap_or(&self.color)
    }

    /// Set stroke and fill together.
    pub fn recolor(&mut self, color: &str) {
        self.color = color.to_string();
        self.fill_color = self.kind.fill_for(color);
    }

    #[must_use]
    pub fn offset(&self) -> Option<&OffsetBand> {
        match &self.variant {
            Variant::Offset(band) => Some(band),
            _ => None,
        }
    }

    pub fn offset_mut(&mut self) -> Option<&mut OffsetBand> {
        match &mut self.variant {
            Variant::Offset(band) => Some(band),
            _ => None,
        }
    }

    #[must_use]
    pub fn info(&self) -> Option<&InfoContent> {
        match &self.variant {
            Variant::Info(info) => Some(info),
            _ => None,
        }
    }

    pub fn info_mut(&mut self) -> Option<&mut InfoContent> {
        match &mut self.variant {
            Variant::Info(info) => Some(info),
            _ => None,
        }
    }

    #[must_use]
    pub fn result_polylines(&self) -> &[Vec<Point>] {
        match &self.variant {
            Variant::Plain { result_polylines } => result_polylines,
            _ => &[],
        }
    }

    /// Result polylines are kept for user lines and rectangles only.
    pub fn result_polylines_mut(&mut self) -> Option<&mut Vec<Vec<Point>>> {
        let accepts = self.category() == Category::UserSolution
            && matches!(self.shape(), Shape::Line | Shape::Rectangle);
        match &mut self.variant {
            Variant::Plain { result_polylines } if accepts => Some(result_polylines),
            _ => None,
        }
    }

    /// Insert `point` so it lands at `index`. Only lines and polygons accept
    /// interior vertices; returns `false` otherwise.
    pub fn insert_vertex(&mut self, index: usize, point: Point) -> bool {
        if self.locked
            || !matches!(self.shape(), Shape::Line | Shape::Polygon)
            || index > self.vertices.len()
        {
            return false;
        }
        self.vertices.insert(index, point);
        true
    }
}

// =============================================================
// Store
// =============================================================

/// One category's annotations, iterated in insertion order.
#[derive(Debug, Default)]
struct Collection {
    objects: HashMap<AnnotationId, Annotation>,
    order: Vec<AnnotationId>,
}

impl Collection {
    fn insert(&mut self, annotation: Annotation) {
        let id = annotation.id;
        if self.objects.insert(id, annotation).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let removed = self.objects.remove(id)?;
        self.order.retain(|other| other != id);
        Some(removed)
    }

    fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    fn clear(&mut self) -> usize {
        let count = self.order.len();
        self.objects.clear();
        self.order.clear();
        count
    }
}

/// Owner of every finished annotation, split into four disjoint categories.
#[derive(Debug, Default)]
pub struct DocStore {
    background: Collection,
    solution: Collection,
    user_solution: Collection,
    info: Collection,
}

impl DocStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, category: Category) -> &Collection {
        match category {
            Category::Background => &self.background,
            Category::Solution => &self.solution,
            Category::UserSolution => &self.user_solution,
            Category::Info => &self.info,
        }
    }

    fn collection_mut(&mut self, category: Category) -> &mut Collection {
        match category {
            Category::Background => &mut self.background,
            Category::Solution => &mut self.solution,
            Category::UserSolution => &mut self.user_solution,
            Category::Info => &mut self.info,
        }
    }

    /// Add an annotation to the category its kind implies.
    ///
    /// An annotation with the same id in any category is replaced.
    pub fn push(&mut self, annotation: Annotation) -> Category {
        let category = annotation.category();
        if let Some(previous) = self.category_of(&annotation.id)
            && previous != category
        {
            self.collection_mut(previous).remove(&annotation.id);
        }
        debug!(id = %annotation.id, kind = ?annotation.kind, ?category, "annotation pushed");
        self.collection_mut(category).insert(annotation);
        category
    }

    /// Which category holds `id`, if any.
    #[must_use]
    pub fn category_of(&self, id: &AnnotationId) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.collection(*c).objects.contains_key(id))
    }

    /// Look up an annotation in any category.
    #[must_use]
    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        Category::ALL
            .iter()
            .find_map(|c| self.collection(*c).objects.get(id))
    }

    pub fn get_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        let category = self.category_of(id)?;
        self.collection_mut(category).objects.get_mut(id)
    }

    /// All annotations of `kind`, in insertion order.
    #[must_use]
    pub fn by_kind(&self, kind: AnnotationKind) -> Vec<&Annotation> {
        self.collection(kind.category())
            .iter()
            .filter(|a| a.kind == kind)
            .collect()
    }

    /// Annotations matching any of `kinds`, grouped in the order the kinds are given.
    #[must_use]
    pub fn by_kinds(&self, kinds: &[AnnotationKind]) -> Vec<&Annotation> {
        kinds.iter().flat_map(|k| self.by_kind(*k)).collect()
    }

    /// Annotations of one category, in insertion order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &Annotation> {
        self.collection(category).iter()
    }

    /// Every annotation, category by category in layer order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        Category::ALL.into_iter().flat_map(|c| self.collection(c).iter())
    }

    /// Remove an annotation from whichever category holds it. Absent ids are a no-op.
    pub fn remove(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let category = self.category_of(id)?;
        self.collection_mut(category).remove(id)
    }

    /// Drop every annotation in one category, returning how many were removed.
    pub fn clear_category(&mut self, category: Category) -> usize {
        self.collection_mut(category).clear()
    }

    pub fn clear_all(&mut self) -> usize {
        Category::ALL.into_iter().map(|c| self.clear_category(c)).sum()
    }

    /// Look up `id`, clearing selection on every other annotation, and mark it selected.
    ///
    /// Selection is cleared everywhere even when `id` is absent.
    pub fn find_by_id_and_unselect(&mut self, id: &AnnotationId) -> Option<&Annotation> {
        for category in Category::ALL {
            for annotation in self.collection_mut(category).objects.values_mut() {
                annotation.selected = annotation.id == *id;
            }
        }
        self.get(id)
    }

    /// The selected annotation, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&Annotation> {
        self.iter().find(|a| a.selected)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.collection(*c).order.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Conversions ---

    /// Replace a background rectangle with a solution polygon over its four
    /// corners. Both band offsets start at the base offset for `scale`, not
    /// the size-proportional polygon magnitude.
    ///
    /// Returns the new id, or `None` when `id` is not a background annotation.
    pub fn convert_background_to_solution(
        &mut self,
        id: &AnnotationId,
        scale: f64,
        config: &EngineConfig,
    ) -> Option<AnnotationId> {
        if self.category_of(id) != Some(Category::Background) {
            return None;
        }
        let source = self.remove(id)?;
        let mut converted = Annotation::new(AnnotationKind::Solution, SOLUTION_COLOR);
        let outline = source.outline();
        converted.vertices.clone_from(&outline);
        converted.closed = true;
        if let Some(band) = converted.offset_mut() {
            let base = offset::base_offset(scale, config);
            band.inner_offset = base;
            band.outer_offset = base;
            offset::regenerate_rings(band, Shape::Polygon, &outline);
        }

        let new_id = converted.id;
        info!(from = %id, to = %new_id, "background converted to solution");
        self.push(converted);
        Some(new_id)
    }

    /// Replace a solution annotation with a background rectangle spanning its
    /// bounding box. Interior detail is discarded.
    ///
    /// Returns the new id, or `None` when `id` is not a solution outline.
    pub fn convert_solution_to_background(&mut self, id: &AnnotationId) -> Option<AnnotationId> {
        let source = self.get(id)?;
        if source.category() != Category::Solution || source.shape() == Shape::Point {
            return None;
        }
        let bbox = source.bounding_box()?;
        self.remove(id)?;

        let mut rectangle = Annotation::new(AnnotationKind::Base, BACKGROUND_COLOR);
        rectangle.vertices = vec![bbox.min(), bbox.max()];
        rectangle.closed = true;

        let new_id = rectangle.id;
        info!(from = %id, to = %new_id, "solution converted to background");
        self.push(rectangle);
        Some(new_id)
    }
}
