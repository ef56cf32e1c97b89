// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Markers: copies of a node drawn at the vertices of a path.
//!
//! A [`MarkerPainter`] places an optional start, middle, and end marker. Each
//! placement maps the marker's reference point onto a vertex and rotates the
//! marker either by a fixed angle or along the path direction there.
//!
//! With automatic orientation the angle bisects the incoming and outgoing
//! directions. When only one of them exists it is used alone, and when they
//! point exactly opposite ways the incoming direction turned by +90° is used.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Affine, Point, Vec2};
use smallvec::SmallVec;

use crate::canvas::{Canvas, CanvasScope};
use crate::geom::{inverse_or_self, union_opt};
use crate::node::{Cancelled, Cx};
use crate::painter::Area;
use crate::path::{ArcTo, ExtendedPath, PathSegment};
use crate::types::NodeId;

/// How a marker is rotated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerOrient {
    /// A fixed angle in degrees.
    Angle(f64),
    /// Follow the path direction at the vertex.
    Auto,
}

/// A node to be drawn at path vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    /// The node drawn at each vertex. It is painted through its own transform.
    pub node: NodeId,
    /// Point in the marker node's parent space that lands on the vertex.
    pub reference: Point,
    /// Rotation.
    pub orient: MarkerOrient,
}

impl Marker {
    /// A marker drawing `node` with `reference` on the vertex.
    pub fn new(node: NodeId, reference: impl Into<Point>, orient: MarkerOrient) -> Self {
        Self {
            node,
            reference: reference.into(),
            orient,
        }
    }

    /// Transform placing this marker on `position`, rotated by `degrees`.
    pub fn placement_transform(&self, position: Point, degrees: f64) -> Affine {
        Affine::translate(position - self.reference)
            * Affine::rotate_about(degrees.to_radians(), self.reference)
    }
}

/// One resolved marker position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerPlacement {
    /// The marker node.
    pub node: NodeId,
    /// The vertex.
    pub position: Point,
    /// Rotation in degrees.
    pub angle: f64,
    /// Marker-to-shape transform.
    pub transform: Affine,
}

/// Draws markers at the vertices of its shape.
#[derive(Default)]
pub struct MarkerPainter {
    start: Option<Marker>,
    middle: Option<Marker>,
    end: Option<Marker>,
    placements: RefCell<Option<Vec<MarkerPlacement>>>,
}

impl fmt::Debug for MarkerPainter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerPainter")
            .field("start", &self.start)
            .field("middle", &self.middle)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl Clone for MarkerPainter {
    fn clone(&self) -> Self {
        Self {
            start: self.start,
            middle: self.middle,
            end: self.end,
            placements: RefCell::new(None),
        }
    }
}

impl MarkerPainter {
    /// A painter without markers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style start marker.
    pub fn with_start(mut self, marker: Marker) -> Self {
        self.start = Some(marker);
        self
    }

    /// Builder-style marker for every vertex but the first and last.
    pub fn with_middle(mut self, marker: Marker) -> Self {
        self.middle = Some(marker);
        self
    }

    /// Builder-style end marker.
    pub fn with_end(mut self, marker: Marker) -> Self {
        self.end = Some(marker);
        self
    }

    /// Start marker.
    pub fn start(&self) -> Option<&Marker> {
        self.start.as_ref()
    }

    /// Middle marker.
    pub fn middle(&self) -> Option<&Marker> {
        self.middle.as_ref()
    }

    /// End marker.
    pub fn end(&self) -> Option<&Marker> {
        self.end.as_ref()
    }

    /// Distinct nodes drawn by this painter.
    pub fn marker_nodes(&self) -> SmallVec<[NodeId; 3]> {
        let mut out = SmallVec::new();
        for m in [self.start, self.middle, self.end].into_iter().flatten() {
            if !out.contains(&m.node) {
                out.push(m.node);
            }
        }
        out
    }

    /// Marker positions on `path`, in paint order: start, middles, end.
    pub fn placements(&self, path: &ExtendedPath) -> Vec<MarkerPlacement> {
        self.compute_placements(path)
    }

    /// Placements on the owning shape's geometry, cached until it changes.
    pub(crate) fn cached_placements(&self, path: &ExtendedPath) -> Vec<MarkerPlacement> {
        if let Ok(cached) = self.placements.try_borrow()
            && let Some(p) = cached.as_ref()
        {
            return p.clone();
        }
        let placements = self.compute_placements(path);
        if let Ok(mut slot) = self.placements.try_borrow_mut() {
            *slot = Some(placements.clone());
        }
        placements
    }

    pub(crate) fn invalidate(&self) {
        if let Ok(mut slot) = self.placements.try_borrow_mut() {
            *slot = None;
        }
    }

    fn compute_placements(&self, path: &ExtendedPath) -> Vec<MarkerPlacement> {
        let steps = resolve_closes(path.segments());
        let mut out = Vec::new();
        // Every marker needs the path to start with a move-to.
        if !matches!(steps.first(), Some(Step::Move(_))) {
            return out;
        }
        let n = steps.len();
        if let Some(marker) = &self.start {
            let position = steps[0].end();
            let angle = match marker.orient {
                MarkerOrient::Angle(a) => a,
                MarkerOrient::Auto => rotation(None, steps[0], steps.get(1).copied()),
            };
            out.push(place(marker, position, angle));
        }
        if let Some(marker) = &self.middle {
            for i in 1..n.saturating_sub(1) {
                let position = steps[i].end();
                let angle = match marker.orient {
                    MarkerOrient::Angle(a) => a,
                    MarkerOrient::Auto => {
                        rotation(Some(steps[i - 1]), steps[i], Some(steps[i + 1]))
                    }
                };
                out.push(place(marker, position, angle));
            }
        }
        if let Some(marker) = &self.end
            && n >= 2
        {
            let position = steps[n - 1].end();
            let angle = match marker.orient {
                MarkerOrient::Angle(a) => a,
                MarkerOrient::Auto => rotation(Some(steps[n - 2]), steps[n - 1], None),
            };
            out.push(place(marker, position, angle));
        }
        out
    }

    pub(crate) fn paint(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        for placement in self.cached_placements(path) {
            let mut scope = CanvasScope::new(&mut *canvas);
            scope.concat_transform(placement.transform);
            cx.tree.paint_in(cx, placement.node, &mut *scope)?;
        }
        Ok(())
    }

    pub(crate) fn painted_bounds(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        transform: Affine,
    ) -> Result<Option<kurbo::Rect>, Cancelled> {
        let mut acc = None;
        for placement in self.cached_placements(path) {
            let r = cx
                .tree
                .transformed_bounds_in(cx, placement.node, transform * placement.transform)?;
            acc = union_opt(acc, r);
        }
        Ok(acc)
    }

    pub(crate) fn painted_area(&self, cx: Cx<'_>, path: &ExtendedPath) -> Area {
        let mut area = Area::empty();
        for placement in self.cached_placements(path) {
            let Some(node) = cx.tree.get(placement.node) else {
                continue;
            };
            if let Some(mut outline) = node.kind.ops().outline(cx, node) {
                outline.apply_affine(placement.transform * node.effective_transform());
                area.extend(Area::from_path(outline));
            }
        }
        area
    }

    pub(crate) fn in_painted_area(&self, cx: Cx<'_>, path: &ExtendedPath, point: Point) -> bool {
        self.cached_placements(path).iter().any(|placement| {
            cx.tree.get(placement.node).is_some_and(|node| {
                let local = node.inverse * (inverse_or_self(placement.transform) * point);
                cx.tree
                    .hit_local(cx, placement.node, node, local)
                    .is_some()
            })
        })
    }
}

fn place(marker: &Marker, position: Point, angle: f64) -> MarkerPlacement {
    MarkerPlacement {
        node: marker.node,
        position,
        angle,
        transform: marker.placement_transform(position, angle),
    }
}

/// A segment with closes turned into lines back to the subpath start.
#[derive(Clone, Copy, Debug)]
enum Step {
    Move(Point),
    Line(Point),
    Quad(Point, Point),
    Cubic(Point, Point, Point),
    Arc(ArcTo),
}

impl Step {
    fn end(&self) -> Point {
        match *self {
            Self::Move(p) | Self::Line(p) | Self::Quad(_, p) | Self::Cubic(_, _, p) => p,
            Self::Arc(arc) => arc.to,
        }
    }
}

fn resolve_closes(segments: &[PathSegment]) -> Vec<Step> {
    let mut start = Point::ZERO;
    segments
        .iter()
        .map(|seg| match *seg {
            PathSegment::MoveTo(p) => {
                start = p;
                Step::Move(p)
            }
            PathSegment::LineTo(p) => Step::Line(p),
            PathSegment::QuadTo(c, p) => Step::Quad(c, p),
            PathSegment::CurveTo(c1, c2, p) => Step::Cubic(c1, c2, p),
            PathSegment::ArcTo(arc) => Step::Arc(arc),
            PathSegment::Close => Step::Line(start),
        })
        .collect()
}

/// Direction of travel along an arc at `angle` (the ellipse parameter).
fn arc_direction(arc: &kurbo::Arc, angle: f64) -> Vec2 {
    let unit = Vec2::from_angle(angle);
    let d = Vec2::new(-arc.radii.x * unit.y, arc.radii.y * unit.x);
    let d = (Affine::rotate(arc.x_rotation) * d.to_point()).to_vec2();
    if arc.sweep_angle < 0.0 { -d } else { d }
}

fn unit(v: Vec2) -> Option<Vec2> {
    if v.x == 0.0 && v.y == 0.0 {
        None
    } else {
        Some(v.normalize())
    }
}

/// Direction of travel arriving at the end of `curr`.
fn in_slope(prev: Option<Step>, curr: Step) -> Option<Vec2> {
    let end = curr.end();
    let v = match curr {
        Step::Move(_) => return None,
        Step::Line(_) => end - prev?.end(),
        Step::Quad(c, _) => end - c,
        Step::Cubic(_, c2, _) => end - c2,
        Step::Arc(arc) => {
            let from = prev?.end();
            match arc.resolve(from) {
                Some(a) => arc_direction(&a, a.start_angle + a.sweep_angle),
                None => end - from,
            }
        }
    };
    unit(v)
}

/// Direction of travel leaving the end of `curr` along `next`.
fn out_slope(curr: Step, next: Option<Step>) -> Option<Vec2> {
    let from = curr.end();
    let v = match next? {
        Step::Move(_) => return None,
        Step::Line(p) | Step::Quad(p, _) | Step::Cubic(p, _, _) => p - from,
        Step::Arc(arc) => match arc.resolve(from) {
            Some(a) => arc_direction(&a, a.start_angle),
            None => arc.to - from,
        },
    };
    unit(v)
}

/// Automatic marker angle in degrees.
fn rotation(prev: Option<Step>, curr: Step, next: Option<Step>) -> f64 {
    let (inward, outward) = match (in_slope(prev, curr), out_slope(curr, next)) {
        (None, None) => return 0.0,
        (Some(i), None) => (i, i),
        (None, Some(o)) => (o, o),
        (Some(i), Some(o)) => (i, o),
    };
    let sum = inward + outward;
    if sum.x == 0.0 && sum.y == 0.0 {
        inward.atan2().to_degrees() + 90.0
    } else {
        sum.atan2().to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use peniko::{Brush, Color};

    use super::*;
    use crate::painter::FillPainter;
    use crate::recording::{DrawOp, RecordingCanvas};
    use crate::shape::ShapeNode;
    use crate::tree::Tree;

    const ID: NodeId = NodeId::new(7, 1);

    fn auto(reference: (f64, f64)) -> Marker {
        Marker::new(ID, reference, MarkerOrient::Auto)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn angles(painter: &MarkerPainter, path: &ExtendedPath) -> Vec<f64> {
        painter.placements(path).iter().map(|p| p.angle).collect()
    }

    #[test]
    fn straight_line_points_along_x() {
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        let painter = MarkerPainter::new()
            .with_start(auto((0.0, 0.0)))
            .with_end(auto((0.0, 0.0)));
        let placements = painter.placements(&path);
        assert_eq!(placements.len(), 2);
        assert!(close(placements[0].angle, 0.0), "start follows outgoing direction");
        assert!(close(placements[1].angle, 0.0), "end follows incoming direction");
        assert_eq!(placements[1].position, Point::new(10.0, 0.0));
    }

    #[test]
    fn reversal_turns_incoming_by_ninety() {
        let mut path = ExtendedPath::new();
        path.move_to((10.0, 0.0));
        path.line_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        let painter = MarkerPainter::new().with_middle(auto((0.0, 0.0)));
        let a = angles(&painter, &path);
        assert_eq!(a.len(), 1);
        assert!(close(a[0], 270.0), "180 + 90, got {}", a[0]);
    }

    #[test]
    fn reversal_along_x() {
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((0.0, 0.0));
        let painter = MarkerPainter::new().with_middle(auto((0.0, 0.0)));
        let a = angles(&painter, &path);
        assert_eq!(a.len(), 1);
        assert!(close(a[0], 90.0), "0 + 90, got {}", a[0]);
    }

    #[test]
    fn placements_follow_the_given_path() {
        let painter = MarkerPainter::new().with_end(auto((0.0, 0.0)));
        let mut a = ExtendedPath::new();
        a.move_to((0.0, 0.0));
        a.line_to((10.0, 0.0));
        let mut b = ExtendedPath::new();
        b.move_to((0.0, 0.0));
        b.line_to((0.0, 50.0));
        assert_eq!(painter.placements(&a)[0].position, Point::new(10.0, 0.0));
        assert_eq!(painter.placements(&b)[0].position, Point::new(0.0, 50.0));
        assert_eq!(painter.cached_placements(&a)[0].position, Point::new(10.0, 0.0));
        assert_eq!(
            painter.cached_placements(&b)[0].position,
            Point::new(10.0, 0.0),
            "cache belongs to the owning shape's geometry"
        );
        painter.invalidate();
        assert_eq!(painter.cached_placements(&b)[0].position, Point::new(0.0, 50.0));
    }

    #[test]
    fn corner_bisects() {
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        let painter = MarkerPainter::new().with_middle(auto((0.0, 0.0)));
        let a = angles(&painter, &path);
        assert!(close(a[0], 45.0), "got {a:?}");
    }

    #[test]
    fn arc_tangents() {
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.arc_to((5.0, 5.0), 0.0, false, true, (10.0, 0.0));
        let painter = MarkerPainter::new()
            .with_start(auto((0.0, 0.0)))
            .with_end(auto((0.0, 0.0)));
        let a = angles(&painter, &path);
        assert!((a[0] + 90.0).abs() < 1e-6, "leaves heading up: {a:?}");
        assert!((a[1] - 90.0).abs() < 1e-6, "arrives heading down: {a:?}");
    }

    #[test]
    fn close_becomes_line_to_start() {
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        path.close_path();
        let painter = MarkerPainter::new()
            .with_middle(Marker::new(ID, (0.0, 0.0), MarkerOrient::Angle(30.0)))
            .with_end(auto((0.0, 0.0)));
        let placements = painter.placements(&path);
        assert_eq!(placements.len(), 3, "two middles and an end");
        assert!(close(placements[0].angle, 30.0) && close(placements[1].angle, 30.0));
        assert_eq!(placements[2].position, Point::ZERO);
        assert!(close(placements[2].angle, -135.0), "got {}", placements[2].angle);
    }

    #[test]
    fn markers_need_a_leading_move() {
        let mut path = ExtendedPath::new();
        path.line_to((10.0, 0.0));
        path.line_to((20.0, 0.0));
        let painter = MarkerPainter::new()
            .with_start(auto((0.0, 0.0)))
            .with_end(auto((0.0, 0.0)));
        assert!(painter.placements(&path).is_empty());

        let mut lone = ExtendedPath::new();
        lone.move_to((1.0, 1.0));
        let painter = MarkerPainter::new()
            .with_start(auto((0.0, 0.0)))
            .with_end(auto((0.0, 0.0)));
        let placements = painter.placements(&lone);
        assert_eq!(placements.len(), 1, "end marker needs two points");
        assert!(close(placements[0].angle, 0.0), "no direction at all");
    }

    #[test]
    fn placement_maps_reference_onto_vertex() {
        let marker = Marker::new(ID, (1.0, 1.0), MarkerOrient::Angle(90.0));
        let t = marker.placement_transform(Point::new(10.0, 20.0), 90.0);
        let p = t * Point::new(1.0, 1.0);
        assert!((p - Point::new(10.0, 20.0)).hypot() < 1e-9, "{p:?}");
        let q = t * Point::new(2.0, 1.0);
        assert!((q - Point::new(10.0, 21.0)).hypot() < 1e-9, "rotated about the reference: {q:?}");
    }

    #[test]
    fn markers_paint_and_bound_through_tree() {
        let mut tree = Tree::new();
        let brush = Brush::Solid(Color::from_rgba8(0, 0, 0, 255));
        let arrow = tree.create_shape(
            ShapeNode::new(Rect::new(0.0, 0.0, 2.0, 2.0)).with_painter(FillPainter::new(brush)),
        );
        let mut path = ExtendedPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        let painter = MarkerPainter::new()
            .with_end(Marker::new(arrow, (1.0, 1.0), MarkerOrient::Angle(0.0)));
        let line = tree.create_shape(ShapeNode::new(path).with_painter(painter));
        tree.append(tree.root(), line).unwrap();

        assert_eq!(tree.primitive_bounds(line), Some(Rect::new(9.0, -1.0, 11.0, 1.0)));

        let mut canvas = RecordingCanvas::new();
        tree.paint(line, &mut canvas);
        let Some(DrawOp::Fill { transform, .. }) = canvas.ops.first() else {
            panic!("marker not painted: {:?}", canvas.ops);
        };
        assert_eq!(*transform, Affine::translate((9.0, -1.0)));

        // Editing the marker node invalidates the shape that draws it.
        tree.set_shape(arrow, Rect::new(0.0, 0.0, 4.0, 2.0));
        assert_eq!(tree.primitive_bounds(line), Some(Rect::new(9.0, -1.0, 13.0, 1.0)));
        assert_eq!(tree.hit_test(Point::new(12.0, 0.0)), Some(line));
    }
}
