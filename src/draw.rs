//! Drawing state machine: accumulates vertices into a finished annotation.
//!
//! At most one `DrawingSession` is live. A session accumulates vertices until
//! its shape's closing rule fires, then hands the finished `Annotation` out
//! exactly once and stays in `Closed` until the next begin command tears it
//! down (the toggle-off affordance) or it is canceled.
//!
//! Closing rules per shape:
//! - point: the first vertex closes it.
//! - rectangle: the second vertex closes it, wherever it lands.
//! - polygon: a vertex within the close radius of the first vertex closes it
//!   once three vertices exist, as does an explicit stop.
//! - line: only an explicit stop closes it.

#[cfg(test)]
#[path = "draw_test.rs"]
mod draw_test;

use tracing::debug;

use crate::camera::Point;
use crate::doc::{Annotation, AnnotationId, AnnotationKind, Shape};
use crate::geometry::distance_sq;

/// Result of a begin-drawing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// A new session was opened for this kind.
    Started(AnnotationKind),
    /// A closed session was torn down; no new session was opened.
    ToggledOff,
    /// A session is still accumulating; the request was ignored.
    Busy,
}

/// Result of feeding a vertex into the live session.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexOutcome {
    /// The vertex was appended; the shape is still open.
    Appended,
    /// The shape closed. The finished annotation is handed over here and
    /// nowhere else.
    Closed(Annotation),
    /// No accumulating session, or the vertex was refused.
    Ignored,
}

#[derive(Debug, Clone)]
enum SessionState {
    Accumulating(Annotation),
    Closed(AnnotationId),
}

/// The one in-progress annotation plus the kind being drawn.
#[derive(Debug, Clone)]
pub struct DrawingSession {
    kind: AnnotationKind,
    state: SessionState,
}

impl DrawingSession {
    #[must_use]
    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed(_))
    }

    /// The annotation being accumulated, if still open.
    #[must_use]
    pub fn current(&self) -> Option<&Annotation> {
        match &self.state {
            SessionState::Accumulating(annotation) => Some(annotation),
            SessionState::Closed(_) => None,
        }
    }

    /// Id of the annotation handed over on close.
    #[must_use]
    pub fn closed_id(&self) -> Option<AnnotationId> {
        match self.state {
            SessionState::Closed(id) => Some(id),
            SessionState::Accumulating(_) => None,
        }
    }

    fn current_mut(&mut self) -> Option<&mut Annotation> {
        match &mut self.state {
            SessionState::Accumulating(annotation) => Some(annotation),
            SessionState::Closed(_) => None,
        }
    }

    /// Move the annotation out, leaving `Closed` behind. Returns `None` when
    /// already closed, so a redundant close can never hand it out twice.
    fn close(&mut self) -> Option<Annotation> {
        let id = self.current()?.id;
        match std::mem::replace(&mut self.state, SessionState::Closed(id)) {
            SessionState::Accumulating(mut annotation) => {
                annotation.closed = true;
                let vertices = annotation.vertices.len();
                debug!(%id, kind = ?self.kind, vertices, "drawing closed");
                Some(annotation)
            }
            SessionState::Closed(_) => None,
        }
    }
}

/// Owner of the optional live session.
#[derive(Debug, Clone, Default)]
pub struct Drawing {
    session: Option<DrawingSession>,
}

impl Drawing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self) -> Option<&DrawingSession> {
        self.session.as_ref()
    }

    /// Kind of the live session, open or closed.
    #[must_use]
    pub fn kind(&self) -> Option<AnnotationKind> {
        self.session.as_ref().map(DrawingSession::kind)
    }

    /// Whether a session is accumulating vertices.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.session.as_ref().is_some_and(DrawingSession::is_closed)
    }

    /// The in-progress annotation, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Annotation> {
        self.session.as_ref().and_then(DrawingSession::current)
    }

    fn current_mut(&mut self) -> Option<&mut Annotation> {
        self.session.as_mut().and_then(DrawingSession::current_mut)
    }

    /// Open a session for `kind`, or tear down a closed one.
    ///
    /// Offset kinds start with both offsets at `base_offset`; closing
    /// re-derives them from the finished outline.
    pub fn begin(&mut self, kind: AnnotationKind, color: &str, base_offset: f64) -> BeginOutcome {
        match &self.session {
            Some(session) if session.is_closed() => {
                debug!(kind = ?session.kind, "closed drawing session toggled off");
                self.session = None;
                BeginOutcome::ToggledOff
            }
            Some(session) => {
                debug!(active = ?session.kind, requested = ?kind, "drawing session busy");
                BeginOutcome::Busy
            }
            None => {
                let mut annotation = Annotation::new(kind, color);
                if let Some(band) = annotation.offset_mut() {
                    band.inner_offset = base_offset;
                    band.outer_offset = base_offset;
                }
                debug!(id = %annotation.id, ?kind, "drawing session started");
                let state = SessionState::Accumulating(annotation);
                self.session = Some(DrawingSession { kind, state });
                BeginOutcome::Started(kind)
            }
        }
    }

    /// Feed a vertex into the accumulating session.
    ///
    /// `close_radius_sq` is the squared viewport distance from the first
    /// vertex under which a polygon closes instead of appending.
    pub fn add_vertex(&mut self, point: Point, close_radius_sq: f64) -> VertexOutcome {
        let Some(session) = self.session.as_mut() else {
            return VertexOutcome::Ignored;
        };
        let Some(annotation) = session.current_mut() else {
            return VertexOutcome::Ignored;
        };

        let closes = match annotation.shape() {
            Shape::Point => {
                annotation.vertices.push(point);
                true
            }
            Shape::Rectangle => {
                annotation.vertices.push(point);
                annotation.vertices.len() >= 2
            }
            Shape::Line => {
                annotation.vertices.push(point);
                false
            }
            Shape::Polygon => match annotation.vertices.first() {
                Some(first) if distance_sq(*first, point) < close_radius_sq => {
                    if !annotation.can_close() {
                        return VertexOutcome::Ignored;
                    }
                    true
                }
                _ => {
                    annotation.vertices.push(point);
                    false
                }
            },
        };

        if !closes {
            return VertexOutcome::Appended;
        }
        session.close().map_or(VertexOutcome::Ignored, VertexOutcome::Closed)
    }

    /// Explicitly finish a line or polygon.
    ///
    /// Returns `None` (and leaves the session open) when there are too few
    /// vertices or the shape only closes through its own rule.
    pub fn stop(&mut self) -> Option<Annotation> {
        let session = self.session.as_mut()?;
        let annotation = session.current()?;
        if !matches!(annotation.shape(), Shape::Line | Shape::Polygon) || !annotation.can_close() {
            debug!(kind = ?session.kind, vertices = annotation.vertices.len(), "stop refused");
            return None;
        }
        session.close()
    }

    /// Discard the live session without handing anything over.
    pub fn cancel(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                debug!(kind = ?session.kind, "drawing session canceled");
                true
            }
            None => false,
        }
    }

    /// Drop the last vertex of an open line or polygon.
    pub fn remove_last_vertex(&mut self) -> Option<Point> {
        let annotation = self.current_mut()?;
        if !matches!(annotation.shape(), Shape::Line | Shape::Polygon) {
            return None;
        }
        annotation.vertices.pop()
    }

    /// Switch the open session to another kind of the same shape.
    ///
    /// The payload resets to the new kind's empty variant and the fill is
    /// recomputed. Returns `false` when nothing is open or the shapes differ.
    pub fn retype(&mut self, kind: AnnotationKind) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(annotation) = session.current_mut() else {
            return false;
        };
        if annotation.shape() != kind.shape() {
            return false;
        }
        let base_offset = annotation.offset().map_or(0.0, |band| band.inner_offset);
        annotation.kind = kind;
        annotation.fill_color = kind.fill_for(&annotation.color);
        annotation.variant = kind.empty_variant();
        if let Some(band) = annotation.offset_mut() {
            band.inner_offset = base_offset;
            band.outer_offset = base_offset;
        }
        session.kind = kind;
        true
    }

    /// Recolor the open session's annotation.
    pub fn recolor(&mut self, color: &str) -> bool {
        match self.current_mut() {
            Some(annotation) => {
                annotation.recolor(color);
                true
            }
            None => false,
        }
    }
}
