//! Engine façade: routes pointer events through transform, snapping, and the
//! drawing state machine into the document, and returns `Action`s for the host.
//!
//! DESIGN
//! ======
//! `EngineCore` is a plain state container. Every operation returns what
//! changed instead of writing into shared cells; the host re-renders by
//! calling [`crate::render::project`] whenever it sees `RenderNeeded`.
//!
//! Persistence operations mutate the document first and then await the
//! store. A failed store call is logged and returned unchanged; local state
//! stays as it is.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::{debug, info, warn};

use crate::camera::{ImagePoint, Point, ScreenPoint, ViewTransform};
use crate::config::EngineConfig;
use crate::consts::{BACKGROUND_COLOR, FOCUS_PADDING, USER_SOLUTION_COLOR};
use crate::data::{self, AnnotationData};
use crate::doc::{
    Annotation, AnnotationClass, AnnotationId, AnnotationKind, Category, DocStore, InfoContent,
    Shape,
};
use crate::draw::{BeginOutcome, Drawing, VertexOutcome};
use crate::geometry::{self, Bounds, distance_sq};
use crate::offset;
use crate::persist::{AnnotationStore, PersistError, TaskId, UserSolution, UserSolutionCreate};
use crate::snap::{SnapResult, snap_annotation};

/// Actions returned from engine operations for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RenderNeeded,
    DrawingStarted { kind: AnnotationKind },
    DrawingEnded,
    AnnotationCommitted { id: AnnotationId, category: Category },
    AnnotationUpdated { id: AnnotationId },
    AnnotationRemoved { id: AnnotationId, category: Category },
    SelectionChanged { id: Option<AnnotationId> },
    CategoryCleared { category: Category, count: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),
    #[error("annotation {id} of kind {kind:?} does not support this operation")]
    Unsupported { id: AnnotationId, kind: AnnotationKind },
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Core engine state: document, view, config, and the transient drawing state.
pub struct EngineCore {
    pub doc: DocStore,
    pub view: ViewTransform,
    pub config: EngineConfig,
    drawing: Drawing,
    cursor: Option<Point>,
    cursor_color: String,
    snap: Option<SnapResult>,
    color: String,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(ViewTransform::default(), EngineConfig::default())
    }
}

impl EngineCore {
    #[must_use]
    pub fn new(view: ViewTransform, config: EngineConfig) -> Self {
        Self {
            doc: DocStore::new(),
            view,
            config,
            drawing: Drawing::new(),
            cursor: None,
            cursor_color: BACKGROUND_COLOR.to_string(),
            snap: None,
            color: USER_SOLUTION_COLOR.to_string(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.view.scale()
    }

    /// Annotation opacity at the current zoom: hidden below the threshold.
    #[must_use]
    pub fn opacity(&self) -> f64 {
        if self.view.zoom < self.config.hide_below_zoom { 0.0 } else { 1.0 }
    }

    #[must_use]
    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    /// Cursor position in viewport space after snapping and close affordance.
    #[must_use]
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    #[must_use]
    pub fn cursor_color(&self) -> &str {
        &self.cursor_color
    }

    /// Result of the last snapping pass, if anything was in range.
    #[must_use]
    pub fn snap(&self) -> Option<SnapResult> {
        self.snap
    }

    /// Color applied to new drawings.
    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    #[must_use]
    pub fn annotation(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.doc.get(id)
    }

    // --- View ---

    pub fn set_view(&mut self, view: ViewTransform) -> Vec<Action> {
        self.view = view;
        vec![Action::RenderNeeded]
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Vec<Action> {
        self.view.zoom = zoom;
        vec![Action::RenderNeeded]
    }

    pub fn set_pan(&mut self, pan: ScreenPoint) -> Vec<Action> {
        self.view.pan = pan;
        vec![Action::RenderNeeded]
    }

    // --- Pointer ---

    /// Track the cursor, snapping it onto annotations of `snap_kinds`.
    ///
    /// An empty `snap_kinds` disables snapping. With nothing in range the
    /// cursor keeps the raw position and its color resets to the background
    /// color. While a polygon is drawn, a cursor near the first vertex is
    /// pulled onto it.
    pub fn on_pointer_move(
        &mut self,
        screen: ScreenPoint,
        snap_kinds: &[AnnotationKind],
    ) -> Vec<Action> {
        let scale = self.scale();
        let mut cursor = self.view.screen_to_viewport(screen);

        self.snap = None;
        if !snap_kinds.is_empty() {
            let candidates = self.doc.by_kinds(snap_kinds);
            self.snap = snap_annotation(candidates, cursor, scale, self.config.snapping_radius_px);
            match self.snap.and_then(|s| self.doc.get(&s.annotation_id).map(|a| (s, a))) {
                Some((snap, target)) => {
                    cursor = snap.snap_point;
                    self.cursor_color = target.stroke_color().to_string();
                }
                None => self.cursor_color = BACKGROUND_COLOR.to_string(),
            }
        }

        if let Some(current) = self.drawing.current()
            && current.shape() == Shape::Polygon
            && let Some(first) = current.vertices.first()
            && distance_sq(*first, cursor) < self.config.close_radius_sq(scale)
        {
            cursor = *first;
        }

        self.cursor = Some(cursor);
        vec![Action::RenderNeeded]
    }

    // --- Drawing ---

    /// Start drawing `kind`, or toggle off a session that already closed.
    pub fn begin_drawing(&mut self, kind: AnnotationKind) -> Vec<Action> {
        let base = offset::base_offset(self.scale(), &self.config);
        match self.drawing.begin(kind, &self.color, base) {
            BeginOutcome::Started(kind) => {
                vec![Action::DrawingStarted { kind }, Action::RenderNeeded]
            }
            BeginOutcome::ToggledOff => vec![Action::DrawingEnded, Action::RenderNeeded],
            BeginOutcome::Busy => Vec::new(),
        }
    }

    /// Add the current cursor position to the live drawing.
    ///
    /// Positions outside the image are ignored.
    pub fn add_vertex(&mut self) -> Vec<Action> {
        let Some(cursor) = self.cursor else {
            return Vec::new();
        };
        if !self.view.contains(cursor) {
            debug!(x = cursor.x, y = cursor.y, "vertex outside image ignored");
            return Vec::new();
        }
        match self.drawing.add_vertex(cursor, self.config.close_radius_sq(self.scale())) {
            VertexOutcome::Appended => vec![Action::RenderNeeded],
            VertexOutcome::Closed(annotation) => self.commit(annotation),
            VertexOutcome::Ignored => Vec::new(),
        }
    }

    /// Finish the live line or polygon.
    pub fn stop_drawing(&mut self) -> Vec<Action> {
        match self.drawing.stop() {
            Some(annotation) => self.commit(annotation),
            None => Vec::new(),
        }
    }

    pub fn cancel_drawing(&mut self) -> Vec<Action> {
        if self.drawing.cancel() {
            vec![Action::DrawingEnded, Action::RenderNeeded]
        } else {
            Vec::new()
        }
    }

    pub fn remove_last_vertex(&mut self) -> Vec<Action> {
        match self.drawing.remove_last_vertex() {
            Some(_) => vec![Action::RenderNeeded],
            None => Vec::new(),
        }
    }

    /// Set the color for new drawings and recolor the live one.
    pub fn set_color(&mut self, color: &str) -> Vec<Action> {
        self.color = color.to_string();
        self.cursor_color = color.to_string();
        self.drawing.recolor(color);
        vec![Action::RenderNeeded]
    }

    /// Switch the live drawing to another kind of the same shape.
    pub fn set_drawing_kind(&mut self, kind: AnnotationKind) -> Vec<Action> {
        if self.drawing.retype(kind) {
            vec![Action::DrawingStarted { kind }, Action::RenderNeeded]
        } else {
            Vec::new()
        }
    }

    /// Place a finished point annotation of `kind` at a screen position.
    ///
    /// Non-point kinds and positions outside the image are ignored.
    pub fn place_point(&mut self, kind: AnnotationKind, screen: ScreenPoint) -> Vec<Action> {
        let point = self.view.screen_to_viewport(screen);
        if kind.shape() != Shape::Point || !self.view.contains(point) {
            return Vec::new();
        }
        let mut annotation = Annotation::new(kind, &self.color);
        annotation.vertices.push(point);
        annotation.closed = true;
        self.commit(annotation)
    }

    /// Insert the current snap point into its target line or polygon.
    pub fn insert_snapped_vertex(&mut self) -> Vec<Action> {
        let Some(snap) = self.snap else {
            return Vec::new();
        };
        let Some(target) = self.doc.get_mut(&snap.annotation_id) else {
            return Vec::new();
        };
        if !target.insert_vertex(snap.index_to_insert_after + 1, snap.snap_point) {
            return Vec::new();
        }
        let (shape, outline) = (target.shape(), target.outline());
        if let Some(band) = target.offset_mut() {
            offset::regenerate_rings(band, shape, &outline);
        }
        // The snap pointed into the old outline.
        self.snap = None;
        let index = snap.index_to_insert_after + 1;
        debug!(id = %snap.annotation_id, index, "snapped vertex inserted");
        vec![Action::AnnotationUpdated { id: snap.annotation_id }, Action::RenderNeeded]
    }

    fn commit(&mut self, mut annotation: Annotation) -> Vec<Action> {
        if annotation.kind.is_offset() {
            offset::derive_band(&mut annotation, self.scale(), &self.config);
        }
        let id = annotation.id;
        let category = self.doc.push(annotation);
        info!(%id, ?category, "annotation committed");
        vec![Action::AnnotationCommitted { id, category }, Action::RenderNeeded]
    }

    // --- Selection and focus ---

    /// Select `id`, clearing every other selection.
    pub fn select(&mut self, id: &AnnotationId) -> Vec<Action> {
        let selected = self.doc.find_by_id_and_unselect(id).map(|a| a.id);
        vec![Action::SelectionChanged { id: selected }, Action::RenderNeeded]
    }

    /// Region the viewer should fit to show `id`, padded on every side.
    ///
    /// A single point gets a square of the snapping radius around it.
    #[must_use]
    pub fn focus_target(&self, id: &AnnotationId) -> Option<Bounds> {
        let bounds = geometry::bounding_box(&self.doc.get(id)?.outline())?;
        Some(self.pad_focus(bounds))
    }

    /// Region around the `index`-th background annotation, in insertion
    /// order. `None` when there is no such background.
    #[must_use]
    pub fn focus_background(&self, index: usize) -> Option<Bounds> {
        let background = self.doc.category(Category::Background).nth(index)?;
        let bounds = geometry::bounding_box(&background.outline())?;
        Some(self.pad_focus(bounds))
    }

    fn pad_focus(&self, bounds: Bounds) -> Bounds {
        if bounds.size() > 0.0 {
            return bounds.padded(FOCUS_PADDING);
        }
        let r = self.config.snapping_radius(self.scale());
        Bounds { x: bounds.x - r, y: bounds.y - r, width: 2.0 * r, height: 2.0 * r }
    }

    // --- Removal and conversion ---

    pub fn remove(&mut self, id: &AnnotationId) -> Vec<Action> {
        let Some(category) = self.doc.category_of(id) else {
            return Vec::new();
        };
        self.doc.remove(id);
        vec![Action::AnnotationRemoved { id: *id, category }, Action::RenderNeeded]
    }

    pub fn clear_category(&mut self, category: Category) -> Vec<Action> {
        let count = self.doc.clear_category(category);
        vec![Action::CategoryCleared { category, count }, Action::RenderNeeded]
    }

    pub fn clear_all(&mut self) -> Vec<Action> {
        let mut actions: Vec<Action> = Category::ALL
            .into_iter()
            .map(|category| {
                let count = self.doc.clear_category(category);
                Action::CategoryCleared { category, count }
            })
            .collect();
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Replace a background rectangle with a solution polygon.
    pub fn convert_to_solution(&mut self, id: &AnnotationId) -> Vec<Action> {
        let scale = self.scale();
        match self.doc.convert_background_to_solution(id, scale, &self.config) {
            Some(new_id) => converted(*id, Category::Background, new_id, Category::Solution),
            None => Vec::new(),
        }
    }

    /// Replace a solution annotation with a background rectangle over its bounding box.
    pub fn convert_to_background(&mut self, id: &AnnotationId) -> Vec<Action> {
        match self.doc.convert_solution_to_background(id) {
            Some(new_id) => converted(*id, Category::Solution, new_id, Category::Background),
            None => Vec::new(),
        }
    }

    // --- Loading ---

    /// Load a batch of records, returning the ids that were accepted.
    pub fn load(&mut self, records: Vec<AnnotationData>) -> Vec<AnnotationId> {
        let annotations = data::load(records, &self.view, &self.config);
        annotations
            .into_iter()
            .map(|annotation| {
                let id = annotation.id;
                self.doc.push(annotation);
                id
            })
            .collect()
    }

    /// Load user solution records; non-editable ones are locked.
    pub fn load_user_solution(
        &mut self,
        records: Vec<AnnotationData>,
        editable: bool,
    ) -> Vec<AnnotationId> {
        let annotations = data::load(records, &self.view, &self.config);
        annotations
            .into_iter()
            .map(|mut annotation| {
                annotation.locked = !editable;
                let id = annotation.id;
                self.doc.push(annotation);
                id
            })
            .collect()
    }

    // --- Styling ---

    pub fn set_class(&mut self, id: &AnnotationId, name: &str, color: &str) -> Vec<Action> {
        let Some(annotation) = self.doc.get_mut(id) else {
            return Vec::new();
        };
        annotation.class =
            Some(AnnotationClass { name: name.to_string(), color: color.to_string() });
        vec![Action::AnnotationUpdated { id: *id }, Action::RenderNeeded]
    }

    /// Override the rendered color of one annotation.
    pub fn set_render_color(&mut self, id: &AnnotationId, color: &str) -> Vec<Action> {
        let Some(annotation) = self.doc.get_mut(id) else {
            return Vec::new();
        };
        annotation.render_color = Some(color.to_string());
        vec![Action::RenderNeeded]
    }

    /// Override the rendered color of every user annotation.
    pub fn recolor_user_annotations(&mut self, color: &str) -> Vec<Action> {
        for id in &self.user_ids() {
            if let Some(annotation) = self.doc.get_mut(id) {
                annotation.render_color = Some(color.to_string());
            }
        }
        vec![Action::RenderNeeded]
    }

    /// Drop render-color overrides and result polylines from user annotations.
    pub fn reset_user_annotations(&mut self) -> Vec<Action> {
        for id in &self.user_ids() {
            if let Some(annotation) = self.doc.get_mut(id) {
                annotation.render_color = None;
                if let Some(polylines) = annotation.result_polylines_mut() {
                    polylines.clear();
                }
            }
        }
        vec![Action::RenderNeeded]
    }

    fn user_ids(&self) -> Vec<AnnotationId> {
        self.doc.category(Category::UserSolution).map(|a| a.id).collect()
    }

    /// Attach evaluator polylines (image space) to a user line or rectangle.
    pub fn add_result_polylines(
        &mut self,
        id: &AnnotationId,
        polylines: &[Vec<ImagePoint>],
    ) -> Vec<Action> {
        let view = self.view;
        let Some(slot) = self.doc.get_mut(id).and_then(Annotation::result_polylines_mut) else {
            return Vec::new();
        };
        slot.extend(polylines.iter().map(|line| view.image_to_viewport_all(line)));
        vec![Action::RenderNeeded]
    }

    // --- Export ---

    #[must_use]
    pub fn export(&self, id: &AnnotationId) -> Option<AnnotationData> {
        self.doc.get(id).map(|a| data::from_annotation(a, &self.view))
    }

    #[must_use]
    pub fn export_kind(&self, kind: AnnotationKind) -> Vec<AnnotationData> {
        self.doc
            .by_kind(kind)
            .into_iter()
            .map(|a| data::from_annotation(a, &self.view))
            .collect()
    }

    #[must_use]
    pub fn export_all(&self) -> Vec<AnnotationData> {
        self.doc.iter().map(|a| data::from_annotation(a, &self.view)).collect()
    }

    // --- Persistence ---

    /// Store a committed annotation as new.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the document, or the store's error.
    pub async fn save_annotation(
        &self,
        store: &dyn AnnotationStore,
        task: TaskId,
        id: &AnnotationId,
    ) -> Result<(), EngineError> {
        let record = self.export(id).ok_or(EngineError::NotFound(*id))?;
        store
            .create(task, &record)
            .await
            .inspect_err(|e| warn!(%id, error = %e, "save failed"))?;
        Ok(())
    }

    /// Push the current state of an annotation to the store.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the document, or the store's error.
    pub async fn update_annotation(
        &self,
        store: &dyn AnnotationStore,
        task: TaskId,
        id: &AnnotationId,
    ) -> Result<(), EngineError> {
        let record = self.export(id).ok_or(EngineError::NotFound(*id))?;
        store
            .update(task, &record)
            .await
            .inspect_err(|e| warn!(%id, error = %e, "update failed"))?;
        Ok(())
    }

    /// Remove an annotation locally, then from the store.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the document, or the store's
    /// error. The local removal is kept either way.
    pub async fn delete_annotation(
        &mut self,
        store: &dyn AnnotationStore,
        task: TaskId,
        id: &AnnotationId,
    ) -> Result<Vec<Action>, EngineError> {
        let actions = self.remove(id);
        if actions.is_empty() {
            return Err(EngineError::NotFound(*id));
        }
        store
            .delete(task, *id)
            .await
            .inspect_err(|e| warn!(%id, error = %e, "delete failed"))?;
        Ok(actions)
    }

    /// Replace every stored annotation of `kind` with the document's.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn save_kind(
        &self,
        store: &dyn AnnotationStore,
        task: TaskId,
        kind: AnnotationKind,
    ) -> Result<usize, EngineError> {
        let records = self.export_kind(kind);
        store
            .save_all(task, kind, &records)
            .await
            .inspect_err(|e| warn!(?kind, error = %e, "save kind failed"))?;
        Ok(records.len())
    }

    /// Store every annotation of `kind` as a new user solution.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn save_user_solution(
        &self,
        store: &dyn AnnotationStore,
        create: &UserSolutionCreate,
        kind: AnnotationKind,
    ) -> Result<UserSolution, EngineError> {
        let records = self.export_kind(kind);
        let solution = store
            .save_user_solution(create, &records)
            .await
            .inspect_err(|e| {
                warn!(task = %create.task_id, error = %e, "user solution save failed");
            })?;
        Ok(solution)
    }

    /// Replace an info annotation's content, then push it to the store.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Unsupported` for non-info kinds, or the store's
    /// error. The local edit is kept either way.
    pub async fn update_info(
        &mut self,
        store: &dyn AnnotationStore,
        task: TaskId,
        id: &AnnotationId,
        content: InfoContent,
    ) -> Result<Vec<Action>, EngineError> {
        let annotation = self.doc.get_mut(id).ok_or(EngineError::NotFound(*id))?;
        let kind = annotation.kind;
        let info = annotation.info_mut().ok_or(EngineError::Unsupported { id: *id, kind })?;
        *info = content;
        self.update_annotation(store, task, id).await?;
        Ok(vec![Action::AnnotationUpdated { id: *id }, Action::RenderNeeded])
    }
}

fn converted(
    from: AnnotationId,
    from_category: Category,
    to: AnnotationId,
    to_category: Category,
) -> Vec<Action> {
    vec![
        Action::AnnotationRemoved { id: from, category: from_category },
        Action::AnnotationCommitted { id: to, category: to_category },
        Action::RenderNeeded,
    ]
}
