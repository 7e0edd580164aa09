#![allow(clippy::float_cmp)]

use std::sync::Mutex;

use uuid::Uuid;

use super::*;
use crate::persist::{PersistError, UserSolution, UserSolutionCreate};

// =============================================================
// Helpers
// =============================================================

/// 1000×1000 image in a 1000px container: one viewport unit is 1000 screen px.
fn engine() -> EngineCore {
    EngineCore::new(ViewTransform::new(1000.0, 1000.0, 1000.0, 1000.0), EngineConfig::default())
}

fn sp(x: f64, y: f64) -> ScreenPoint {
    ScreenPoint::new(x, y)
}

fn click(core: &mut EngineCore, x: f64, y: f64) -> Vec<Action> {
    core.on_pointer_move(sp(x, y), &[]);
    core.add_vertex()
}

fn committed_id(actions: &[Action]) -> AnnotationId {
    actions
        .iter()
        .find_map(|a| match a {
            Action::AnnotationCommitted { id, .. } => Some(*id),
            _ => None,
        })
        .expect("no commit action")
}

fn draw_polygon(core: &mut EngineCore, kind: AnnotationKind) -> AnnotationId {
    core.begin_drawing(kind);
    for (x, y) in [(200.0, 200.0), (300.0, 200.0), (300.0, 300.0), (200.0, 300.0)] {
        assert_eq!(click(core, x, y), vec![Action::RenderNeeded]);
    }
    committed_id(&click(core, 201.0, 201.0))
}

#[derive(Default)]
struct MockStore {
    calls: Mutex<Vec<(&'static str, Uuid)>>,
    fail: bool,
}

impl MockStore {
    fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    fn record(&self, op: &'static str, id: Uuid) -> Result<(), PersistError> {
        self.calls.lock().unwrap().push((op, id));
        if self.fail { Err(PersistError::Rejected("offline".into())) } else { Ok(()) }
    }

    fn calls(&self) -> Vec<(&'static str, Uuid)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AnnotationStore for MockStore {
    async fn create(&self, _task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError> {
        self.record("create", annotation.id)
    }

    async fn update(&self, _task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError> {
        self.record("update", annotation.id)
    }

    async fn delete(&self, _task: TaskId, id: AnnotationId) -> Result<(), PersistError> {
        self.record("delete", id)
    }

    async fn save_all(
        &self,
        task: TaskId,
        _kind: AnnotationKind,
        annotations: &[AnnotationData],
    ) -> Result<(), PersistError> {
        for annotation in annotations {
            self.calls.lock().unwrap().push(("save_all", annotation.id));
        }
        self.record("save_all_done", task)
    }

    async fn save_user_solution(
        &self,
        create: &UserSolutionCreate,
        annotations: &[AnnotationData],
    ) -> Result<UserSolution, PersistError> {
        self.record("save_user_solution", create.task_id)?;
        Ok(UserSolution {
            id: Uuid::new_v4(),
            task_id: create.task_id,
            user_id: create.user_id,
            annotations: annotations.to_vec(),
        })
    }
}

// =============================================================
// Drawing through the engine
// =============================================================

#[test]
fn solution_polygon_commits_to_solution_with_rings() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);

    assert_eq!(core.doc.category_of(&id), Some(Category::Solution));
    let polygon = core.annotation(&id).unwrap();
    assert!(polygon.closed);
    assert_eq!(polygon.vertices.len(), 4);
    let band = polygon.offset().unwrap();
    assert_eq!(band.inner_ring.as_ref().unwrap().len(), 4);
    assert_eq!(band.outer_ring.as_ref().unwrap().len(), 4);
    assert_eq!(band.inner_offset, band.outer_offset);
}

#[test]
fn user_polygon_commits_to_user_category() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::UserSolution);
    assert_eq!(core.doc.category_of(&id), Some(Category::UserSolution));
    assert!(core.annotation(&id).unwrap().offset().is_none());
}

#[test]
fn begin_reports_start_busy_and_toggle() {
    let mut core = engine();
    assert_eq!(
        core.begin_drawing(AnnotationKind::Base),
        vec![Action::DrawingStarted { kind: AnnotationKind::Base }, Action::RenderNeeded]
    );
    assert!(core.begin_drawing(AnnotationKind::Solution).is_empty());

    click(&mut core, 100.0, 100.0);
    let actions = click(&mut core, 400.0, 300.0);
    assert!(matches!(
        actions[0],
        Action::AnnotationCommitted { category: Category::Background, .. }
    ));

    assert_eq!(
        core.begin_drawing(AnnotationKind::Base),
        vec![Action::DrawingEnded, Action::RenderNeeded]
    );
    assert!(!core.drawing().is_active());
}

#[test]
fn vertices_outside_image_are_ignored() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolutionLine);
    assert!(click(&mut core, 1500.0, 200.0).is_empty());
    assert!(click(&mut core, -10.0, 200.0).is_empty());
    assert_eq!(core.drawing().current().unwrap().vertices.len(), 0);
}

#[test]
fn add_vertex_without_cursor_is_ignored() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolutionLine);
    assert!(core.add_vertex().is_empty());
}

#[test]
fn solution_line_derives_band_on_stop() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::SolutionLine);
    click(&mut core, 100.0, 100.0);
    assert!(core.stop_drawing().is_empty());
    click(&mut core, 500.0, 100.0);
    let id = committed_id(&core.stop_drawing());

    let band = core.annotation(&id).unwrap().offset().unwrap();
    assert!((band.inner_offset - offset::base_offset(1000.0, &core.config)).abs() < 1e-12);
    assert_eq!(band.inner_ring.as_ref().unwrap().len(), 2);
}

#[test]
fn cancel_and_remove_last_vertex() {
    let mut core = engine();
    assert!(core.cancel_drawing().is_empty());
    core.begin_drawing(AnnotationKind::UserSolution);
    click(&mut core, 100.0, 100.0);
    click(&mut core, 200.0, 100.0);
    assert_eq!(core.remove_last_vertex(), vec![Action::RenderNeeded]);
    assert_eq!(core.drawing().current().unwrap().vertices.len(), 1);
    assert_eq!(core.cancel_drawing(), vec![Action::DrawingEnded, Action::RenderNeeded]);
    assert!(core.doc.is_empty());
}

#[test]
fn set_color_and_kind_apply_to_live_drawing() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolution);
    core.set_color("#FF0000");
    assert_eq!(core.drawing().current().unwrap().color, "#FF0000");
    assert_eq!(core.cursor_color(), "#FF0000");

    assert!(core.set_drawing_kind(AnnotationKind::SolutionLine).is_empty());
    assert_eq!(
        core.set_drawing_kind(AnnotationKind::Solution),
        vec![Action::DrawingStarted { kind: AnnotationKind::Solution }, Action::RenderNeeded]
    );
    assert_eq!(core.drawing().kind(), Some(AnnotationKind::Solution));
}

#[test]
fn place_point_inside_image_only() {
    let mut core = engine();
    let id = committed_id(&core.place_point(AnnotationKind::SolutionPoint, sp(500.0, 500.0)));
    let point = core.annotation(&id).unwrap();
    assert_eq!(point.vertices, vec![Point::new(0.5, 0.5)]);
    assert!(point.offset().unwrap().outer_offset > 0.0);

    assert!(core.place_point(AnnotationKind::InfoPoint, sp(1200.0, 500.0)).is_empty());
    assert!(core.place_point(AnnotationKind::Solution, sp(500.0, 500.0)).is_empty());
    assert_eq!(core.doc.len(), 1);
}

// =============================================================
// Cursor, snapping, and close affordance
// =============================================================

#[test]
fn snapping_moves_cursor_and_takes_target_color() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::UserSolution);

    core.on_pointer_move(sp(250.0, 203.0), &[AnnotationKind::UserSolution]);
    let snap = core.snap().unwrap();
    assert_eq!(snap.annotation_id, id);
    assert_eq!(snap.index_to_insert_after, 0);
    let cursor = core.cursor().unwrap();
    assert!((cursor.x - 0.25).abs() < 1e-9 && (cursor.y - 0.2).abs() < 1e-9);
    assert_eq!(core.cursor_color(), core.annotation(&id).unwrap().color);

    core.on_pointer_move(sp(600.0, 600.0), &[AnnotationKind::UserSolution]);
    assert!(core.snap().is_none());
    assert_eq!(core.cursor_color(), BACKGROUND_COLOR);
    assert_eq!(core.cursor(), Some(Point::new(0.6, 0.6)));
}

#[test]
fn snapping_respects_requested_kinds() {
    let mut core = engine();
    draw_polygon(&mut core, AnnotationKind::UserSolution);
    core.on_pointer_move(sp(250.0, 203.0), &[AnnotationKind::Solution]);
    assert!(core.snap().is_none());
    core.on_pointer_move(sp(250.0, 203.0), &[]);
    assert!(core.snap().is_none());
}

#[test]
fn polygon_cursor_is_pulled_onto_first_vertex() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolution);
    click(&mut core, 200.0, 200.0);
    core.on_pointer_move(sp(203.0, 202.0), &[]);
    assert_eq!(core.cursor(), Some(Point::new(0.2, 0.2)));
    core.on_pointer_move(sp(220.0, 200.0), &[]);
    assert_ne!(core.cursor(), Some(Point::new(0.2, 0.2)));
}

#[test]
fn insert_snapped_vertex_extends_solution_and_regenerates_rings() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);
    let before = core.annotation(&id).unwrap().offset().unwrap().clone();

    core.on_pointer_move(sp(250.0, 202.0), &[AnnotationKind::Solution]);
    assert_eq!(
        core.insert_snapped_vertex(),
        vec![Action::AnnotationUpdated { id }, Action::RenderNeeded]
    );
    let polygon = core.annotation(&id).unwrap();
    assert_eq!(polygon.vertices.len(), 5);
    assert!((polygon.vertices[1].x - 0.25).abs() < 1e-9);
    let band = polygon.offset().unwrap();
    assert_eq!(band.inner_offset, before.inner_offset);
    assert_eq!(band.outer_ring.as_ref().unwrap().len(), 5);
}

#[test]
fn insert_snapped_vertex_consumes_the_snap() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);

    core.on_pointer_move(sp(250.0, 202.0), &[AnnotationKind::Solution]);
    assert_eq!(core.insert_snapped_vertex().len(), 2);
    assert!(core.snap().is_none());
    // A second insert without a fresh pointer move changes nothing.
    assert!(core.insert_snapped_vertex().is_empty());

    let polygon = core.annotation(&id).unwrap();
    assert_eq!(polygon.vertices.len(), 5);
    assert_eq!(polygon.offset().unwrap().outer_ring.as_ref().unwrap().len(), 5);
}

#[test]
fn insert_snapped_vertex_refused_for_rectangles() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolutionRect);
    click(&mut core, 200.0, 200.0);
    click(&mut core, 400.0, 400.0);
    core.on_pointer_move(sp(300.0, 202.0), &[AnnotationKind::UserSolutionRect]);
    assert!(core.snap().is_some());
    assert!(core.insert_snapped_vertex().is_empty());
    assert_eq!(core.doc.by_kind(AnnotationKind::UserSolutionRect)[0].vertices.len(), 2);
}

// =============================================================
// Selection, focus, visibility
// =============================================================

#[test]
fn select_is_exclusive() {
    let mut core = engine();
    let a = draw_polygon(&mut core, AnnotationKind::UserSolution);
    core.begin_drawing(AnnotationKind::UserSolution);
    let b = draw_polygon(&mut core, AnnotationKind::UserSolution);

    core.select(&b);
    assert_eq!(
        core.select(&a),
        vec![Action::SelectionChanged { id: Some(a) }, Action::RenderNeeded]
    );
    assert!(!core.annotation(&b).unwrap().selected);
    assert_eq!(core.doc.selected().unwrap().id, a);

    let missing = Uuid::new_v4();
    assert_eq!(core.select(&missing)[0], Action::SelectionChanged { id: None });
}

#[test]
fn focus_target_pads_bounding_box() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::UserSolution);
    let bounds = core.focus_target(&id).unwrap();
    assert!((bounds.x - (0.2 - 0.1 * FOCUS_PADDING)).abs() < 1e-9);
    assert!((bounds.width - 0.1 * (1.0 + 2.0 * FOCUS_PADDING)).abs() < 1e-9);
    assert!(core.focus_target(&Uuid::new_v4()).is_none());
}

#[test]
fn focus_target_for_point_uses_snapping_radius() {
    let mut core = engine();
    let id = committed_id(&core.place_point(AnnotationKind::UserSolutionPoint, sp(500.0, 500.0)));
    let bounds = core.focus_target(&id).unwrap();
    assert!((bounds.width - 2.0 * core.config.snapping_radius(1000.0)).abs() < 1e-12);
}

#[test]
fn focus_background_targets_one_background_by_index() {
    let mut core = engine();
    assert!(core.focus_background(0).is_none());
    for (a, b) in [((100.0, 100.0), (200.0, 200.0)), ((500.0, 400.0), (600.0, 900.0))] {
        core.begin_drawing(AnnotationKind::Base);
        click(&mut core, a.0, a.1);
        click(&mut core, b.0, b.1);
        core.begin_drawing(AnnotationKind::Base);
    }

    let expected = [
        Bounds { x: 0.1, y: 0.1, width: 0.1, height: 0.1 }.padded(FOCUS_PADDING),
        Bounds { x: 0.5, y: 0.4, width: 0.1, height: 0.5 }.padded(FOCUS_PADDING),
    ];
    for (index, raw) in expected.iter().enumerate() {
        let bounds = core.focus_background(index).unwrap();
        assert!((bounds.x - raw.x).abs() < 1e-9);
        assert!((bounds.y - raw.y).abs() < 1e-9);
        assert!((bounds.width - raw.width).abs() < 1e-9);
        assert!((bounds.height - raw.height).abs() < 1e-9);
    }
    assert!(core.focus_background(2).is_none());
}

#[test]
fn annotations_hide_below_zoom_threshold() {
    let mut core = engine();
    assert_eq!(core.opacity(), 1.0);
    core.set_zoom(0.4);
    assert_eq!(core.opacity(), 0.0);
    core.set_zoom(0.5);
    assert_eq!(core.opacity(), 1.0);
}

// =============================================================
// Removal, conversion, loading, styling
// =============================================================

#[test]
fn remove_and_clear_report_categories() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);
    assert_eq!(
        core.remove(&id),
        vec![Action::AnnotationRemoved { id, category: Category::Solution }, Action::RenderNeeded]
    );
    assert!(core.remove(&id).is_empty());

    core.begin_drawing(AnnotationKind::Solution);
    draw_polygon(&mut core, AnnotationKind::Solution);
    let actions = core.clear_all();
    assert!(actions.contains(&Action::CategoryCleared { category: Category::Solution, count: 1 }));
    assert!(actions.contains(&Action::CategoryCleared { category: Category::Info, count: 0 }));
    assert!(core.doc.is_empty());
}

#[test]
fn conversions_round_trip_keeps_bounding_box() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);
    let bbox = core.annotation(&id).unwrap().bounding_box().unwrap();

    let actions = core.convert_to_background(&id);
    let background = committed_id(&actions);
    assert_eq!(actions[0], Action::AnnotationRemoved { id, category: Category::Solution });
    assert_eq!(core.doc.category_of(&background), Some(Category::Background));

    let solution = committed_id(&core.convert_to_solution(&background));
    let back = core.annotation(&solution).unwrap();
    let got = back.bounding_box().unwrap();
    assert!((got.x - bbox.x).abs() < 1e-9 && (got.width - bbox.width).abs() < 1e-9);
    assert!(back.offset().unwrap().outer_ring.is_some());
    assert!(core.convert_to_solution(&solution).is_empty());
}

#[test]
fn load_and_export_all() {
    let mut source = engine();
    draw_polygon(&mut source, AnnotationKind::Solution);
    source.place_point(AnnotationKind::InfoPoint, sp(700.0, 700.0));
    let records = source.export_all();
    assert_eq!(records.len(), 2);

    let mut core = engine();
    let ids = core.load(records);
    assert_eq!(ids.len(), 2);
    assert_eq!(core.doc.category(Category::Solution).count(), 1);
    assert_eq!(core.doc.category(Category::Info).count(), 1);
    assert_eq!(core.export_kind(AnnotationKind::InfoPoint).len(), 1);
}

#[test]
fn locked_user_solution_refuses_vertex_insert() {
    let mut source = engine();
    draw_polygon(&mut source, AnnotationKind::UserSolution);
    let records = source.export_kind(AnnotationKind::UserSolution);

    let mut core = engine();
    let ids = core.load_user_solution(records, false);
    assert!(core.annotation(&ids[0]).unwrap().locked);
    core.on_pointer_move(sp(250.0, 202.0), &[AnnotationKind::UserSolution]);
    assert!(core.snap().is_some());
    assert!(core.insert_snapped_vertex().is_empty());
}

#[test]
fn class_and_render_color_overrides() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::UserSolution);

    assert_eq!(core.set_class(&id, "roof", "#AA00AA")[0], Action::AnnotationUpdated { id });
    assert_eq!(core.annotation(&id).unwrap().stroke_color(), "#AA00AA");

    core.recolor_user_annotations("#FF0000");
    assert_eq!(core.annotation(&id).unwrap().stroke_color(), "#FF0000");
    core.reset_user_annotations();
    assert_eq!(core.annotation(&id).unwrap().stroke_color(), "#AA00AA");

    assert!(core.set_render_color(&Uuid::new_v4(), "#000000").is_empty());
}

#[test]
fn result_polylines_attach_to_user_lines_and_reset() {
    let mut core = engine();
    core.begin_drawing(AnnotationKind::UserSolutionLine);
    click(&mut core, 100.0, 100.0);
    click(&mut core, 500.0, 100.0);
    let line = committed_id(&core.stop_drawing());
    core.begin_drawing(AnnotationKind::UserSolution);
    let polygon = draw_polygon(&mut core, AnnotationKind::UserSolution);

    let polylines = vec![vec![ImagePoint::new(100.0, 100.0), ImagePoint::new(300.0, 100.0)]];
    assert_eq!(core.add_result_polylines(&line, &polylines), vec![Action::RenderNeeded]);
    assert!(core.add_result_polylines(&polygon, &polylines).is_empty());
    let stored = core.annotation(&line).unwrap().result_polylines();
    assert_eq!(stored.len(), 1);
    assert!((stored[0][1].x - 0.3).abs() < 1e-9);

    core.reset_user_annotations();
    assert!(core.annotation(&line).unwrap().result_polylines().is_empty());
}

// =============================================================
// Persistence
// =============================================================

#[tokio::test]
async fn save_and_update_send_exported_records() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);
    let store = MockStore::default();
    let task = Uuid::new_v4();

    core.save_annotation(&store, task, &id).await.unwrap();
    core.update_annotation(&store, task, &id).await.unwrap();
    assert_eq!(store.calls(), vec![("create", id), ("update", id)]);

    let missing = Uuid::new_v4();
    let saved = core.save_annotation(&store, task, &missing).await;
    assert!(matches!(saved, Err(EngineError::NotFound(m)) if m == missing));
}

#[tokio::test]
async fn failed_delete_keeps_local_removal() {
    let mut core = engine();
    let id = draw_polygon(&mut core, AnnotationKind::Solution);
    let store = MockStore::failing();

    let err = core.delete_annotation(&store, Uuid::new_v4(), &id).await.unwrap_err();
    assert!(matches!(err, EngineError::Persist(PersistError::Rejected(_))));
    assert!(core.annotation(&id).is_none());
    assert_eq!(store.calls(), vec![("delete", id)]);
}

#[tokio::test]
async fn delete_missing_is_not_found_without_store_call() {
    let mut core = engine();
    let store = MockStore::default();
    let err = core.delete_annotation(&store, Uuid::new_v4(), &Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn save_kind_sends_every_annotation_of_kind() {
    let mut core = engine();
    let a = draw_polygon(&mut core, AnnotationKind::Solution);
    core.begin_drawing(AnnotationKind::Solution);
    let b = draw_polygon(&mut core, AnnotationKind::Solution);
    let store = MockStore::default();
    let task = Uuid::new_v4();

    assert_eq!(core.save_kind(&store, task, AnnotationKind::Solution).await.unwrap(), 2);
    assert_eq!(store.calls(), vec![("save_all", a), ("save_all", b), ("save_all_done", task)]);
}

#[tokio::test]
async fn save_user_solution_returns_stored_solution() {
    let mut core = engine();
    draw_polygon(&mut core, AnnotationKind::UserSolution);
    let store = MockStore::default();
    let create = UserSolutionCreate { task_id: Uuid::new_v4(), user_id: Uuid::new_v4() };

    let solution =
        core.save_user_solution(&store, &create, AnnotationKind::UserSolution).await.unwrap();
    assert_eq!(solution.annotations.len(), 1);
    assert_eq!(solution.task_id, create.task_id);

    let failing = MockStore::failing();
    let failed = core.save_user_solution(&failing, &create, AnnotationKind::UserSolution).await;
    assert!(failed.is_err());
}

#[tokio::test]
async fn update_info_edits_locally_then_stores() {
    let mut core = engine();
    let info = committed_id(&core.place_point(AnnotationKind::InfoPoint, sp(100.0, 100.0)));
    let store = MockStore::failing();
    let content = InfoContent {
        header: "Valve".into(),
        detail: "Closed".into(),
        images: vec!["v.png".into()],
    };

    assert!(core.update_info(&store, Uuid::new_v4(), &info, content.clone()).await.is_err());
    assert_eq!(core.annotation(&info).unwrap().info(), Some(&content));

    let polygon = draw_polygon(&mut core, AnnotationKind::UserSolution);
    let err = core.update_info(&store, Uuid::new_v4(), &polygon, content).await.unwrap_err();
    assert!(matches!(err, EngineError::Unsupported { kind: AnnotationKind::UserSolution, .. }));
}
