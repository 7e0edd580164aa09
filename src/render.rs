//! Render projection: reads engine state and emits ordered draw commands.
//!
//! Nothing here paints. The host walks the returned list front to back and
//! maps each primitive onto its drawing surface. Coordinates are viewport
//! units; stroke widths and vertex radii are already divided by the current
//! scale so they keep a constant size on screen.
//!
//! Layer order (bottom first): background, solution, user solution, info,
//! the live drawing preview, and the cursor circle.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use crate::camera::Point;
use crate::consts::NO_FILL;
use crate::doc::{Annotation, AnnotationId, Category, OffsetBand, Shape};
use crate::engine::EngineCore;
use crate::geometry;

/// Draw layer, bottom first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Background,
    Solution,
    UserSolution,
    Info,
    Drawing,
    Cursor,
}

impl From<Category> for Layer {
    fn from(category: Category) -> Self {
        match category {
            Category::Background => Self::Background,
            Category::Solution => Self::Solution,
            Category::UserSolution => Self::UserSolution,
            Category::Info => Self::Info,
        }
    }
}

/// Geometry of one draw instruction, in viewport units.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Closed outline.
    Polygon(Vec<Point>),
    /// Open outline.
    Polyline(Vec<Point>),
    Circle { center: Point, radius: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub stroke: String,
    pub fill: String,
    pub stroke_width: f64,
    pub opacity: f64,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub layer: Layer,
    /// Annotation the command belongs to; `None` for the cursor.
    pub id: Option<AnnotationId>,
    pub primitive: Primitive,
    pub style: Style,
}

/// Project the whole scene into draw commands, bottom layer first.
#[must_use]
pub fn project(engine: &EngineCore) -> Vec<DrawCommand> {
    let scale = engine.scale();
    let mut out = Projection {
        stroke_width: engine.config.stroke_width(scale),
        vertex_radius: engine.config.vertex_radius(scale),
        commands: Vec::new(),
    };

    let opacity = engine.opacity();
    for annotation in engine.doc.iter() {
        out.annotation(annotation, opacity);
    }
    if let Some(current) = engine.drawing().current() {
        out.preview(current, engine.cursor());
    }
    if let Some(cursor) = engine.cursor() {
        out.cursor(cursor, engine.cursor_color());
    }
    out.commands
}

struct Projection {
    stroke_width: f64,
    vertex_radius: f64,
    commands: Vec<DrawCommand>,
}

impl Projection {
    fn style(&self, stroke: &str, fill: &str, opacity: f64) -> Style {
        Style {
            stroke: stroke.to_string(),
            fill: fill.to_string(),
            stroke_width: self.stroke_width,
            opacity,
            dashed: false,
        }
    }

    fn push(&mut self, layer: Layer, id: Option<AnnotationId>, primitive: Primitive, style: Style) {
        self.commands.push(DrawCommand { layer, id, primitive, style });
    }

    // =============================================================
    // Committed annotations
    // =============================================================

    fn annotation(&mut self, annotation: &Annotation, opacity: f64) {
        let layer = Layer::from(annotation.category());
        let id = Some(annotation.id);
        let stroke = annotation.stroke_color();
        let fill = match &annotation.render_color {
            Some(color) => annotation.kind.fill_for(color),
            None => annotation.fill_color.clone(),
        };
        let style = self.style(stroke, &fill, opacity);

        if let Some(band) = annotation.offset() {
            self.band(layer, annotation, band, &style);
        }

        let outline = annotation.outline();
        let primitive = match annotation.shape() {
            Shape::Point => match outline.first() {
                Some(&center) => Primitive::Circle { center, radius: self.vertex_radius },
                None => return,
            },
            Shape::Line => Primitive::Polyline(outline.clone()),
            Shape::Rectangle | Shape::Polygon => Primitive::Polygon(outline.clone()),
        };
        self.push(layer, id, primitive, style);

        for line in annotation.result_polylines() {
            let line_style = self.style(stroke, NO_FILL, opacity);
            self.push(layer, id, Primitive::Polyline(line.clone()), line_style);
        }

        if annotation.selected {
            self.handles(layer, id, &outline, stroke, opacity);
        }
    }

    /// Dashed inner and outer rings; a point's band is a circle of its outer offset.
    fn band(&mut self, layer: Layer, annotation: &Annotation, band: &OffsetBand, base: &Style) {
        let style = Style { fill: NO_FILL.to_string(), dashed: true, ..base.clone() };
        let id = Some(annotation.id);

        if annotation.shape() == Shape::Point {
            if let Some(&center) = annotation.vertices.first()
                && band.outer_offset > 0.0
            {
                let circle = Primitive::Circle { center, radius: band.outer_offset };
                self.push(layer, id, circle, style);
            }
            return;
        }

        for ring in [&band.inner_ring, &band.outer_ring].into_iter().flatten() {
            let primitive = if annotation.shape() == Shape::Line {
                Primitive::Polyline(ring.clone())
            } else {
                Primitive::Polygon(ring.clone())
            };
            self.push(layer, id, primitive, style.clone());
        }
    }

    fn handles(
        &mut self,
        layer: Layer,
        id: Option<AnnotationId>,
        points: &[Point],
        color: &str,
        opacity: f64,
    ) {
        for &center in points {
            let style = self.style(color, color, opacity);
            let circle = Primitive::Circle { center, radius: self.vertex_radius };
            self.push(layer, id, circle, style);
        }
    }

    // =============================================================
    // Live drawing and cursor
    // =============================================================

    /// The shape being drawn, with a rubber band out to the cursor.
    fn preview(&mut self, current: &Annotation, cursor: Option<Point>) {
        let id = Some(current.id);
        let stroke = current.color.as_str();

        match (current.shape(), current.vertices.first(), cursor) {
            (Shape::Rectangle, Some(&anchor), Some(cursor)) => {
                let corners = geometry::rect_corners(anchor, cursor).to_vec();
                let style = self.style(stroke, &current.fill_color, 1.0);
                self.push(Layer::Drawing, id, Primitive::Polygon(corners), style);
            }
            (Shape::Line | Shape::Polygon, Some(_), _) => {
                let mut points = current.vertices.clone();
                points.extend(cursor);
                let style = self.style(stroke, NO_FILL, 1.0);
                self.push(Layer::Drawing, id, Primitive::Polyline(points), style);
            }
            _ => {}
        }

        self.handles(Layer::Drawing, id, &current.vertices, stroke, 1.0);
    }

    fn cursor(&mut self, center: Point, color: &str) {
        let style = self.style(color, color, 1.0);
        let circle = Primitive::Circle { center, radius: self.vertex_radius };
        self.push(Layer::Cursor, None, circle, style);
    }
}
