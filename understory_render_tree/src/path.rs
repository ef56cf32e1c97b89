// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths that remember elliptical arcs.
//!
//! Marker placement needs the tangent at arc endpoints, which is lost once an
//! arc has been flattened into cubics. [`ExtendedPath`] keeps the authored
//! segment list next to the [`BezPath`] used for drawing and bounds.

use alloc::vec::Vec;

use kurbo::{
    Arc, BezPath, Circle, Ellipse, Line, PathEl, Point, Rect, RoundedRect, Shape, SvgArc, Vec2,
};

/// Flattening tolerance for converting shapes and arcs to paths.
const TOLERANCE: f64 = 0.1;

/// Elliptical arc parameters, following the SVG `A` command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcTo {
    /// Ellipse radii.
    pub radii: Vec2,
    /// Rotation of the ellipse's x axis, in radians.
    pub x_rotation: f64,
    /// Take the longer of the two candidate arcs.
    pub large_arc: bool,
    /// Travel in the direction of increasing angle.
    pub sweep: bool,
    /// End point.
    pub to: Point,
}

impl ArcTo {
    /// Resolve against the point the arc starts from.
    ///
    /// Returns `None` when the arc degenerates to a straight line.
    pub fn resolve(&self, from: Point) -> Option<Arc> {
        Arc::from_svg_arc(&SvgArc {
            from,
            to: self.to,
            radii: self.radii,
            x_rotation: self.x_rotation,
            large_arc: self.large_arc,
            sweep: self.sweep,
        })
    }
}

/// One command of an [`ExtendedPath`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    /// Start a subpath.
    MoveTo(Point),
    /// Straight line.
    LineTo(Point),
    /// Quadratic Bézier: control point, end point.
    QuadTo(Point, Point),
    /// Cubic Bézier: two control points, end point.
    CurveTo(Point, Point, Point),
    /// Elliptical arc.
    ArcTo(ArcTo),
    /// Close the current subpath.
    Close,
}

impl PathSegment {
    /// Point the segment ends on; `None` for [`PathSegment::Close`].
    pub fn end_point(&self) -> Option<Point> {
        match *self {
            Self::MoveTo(p) | Self::LineTo(p) | Self::QuadTo(_, p) | Self::CurveTo(_, _, p) => {
                Some(p)
            }
            Self::ArcTo(arc) => Some(arc.to),
            Self::Close => None,
        }
    }
}

/// A path with arc segments preserved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtendedPath {
    segments: Vec<PathSegment>,
    path: BezPath,
    start: Point,
    current: Point,
}

impl ExtendedPath {
    /// An empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new subpath.
    pub fn move_to(&mut self, p: impl Into<Point>) {
        let p = p.into();
        self.segments.push(PathSegment::MoveTo(p));
        self.path.move_to(p);
        self.start = p;
        self.current = p;
    }

    /// Straight line to `p`.
    pub fn line_to(&mut self, p: impl Into<Point>) {
        let p = p.into();
        self.segments.push(PathSegment::LineTo(p));
        self.path.line_to(p);
        self.current = p;
    }

    /// Quadratic Bézier.
    pub fn quad_to(&mut self, c: impl Into<Point>, p: impl Into<Point>) {
        let (c, p) = (c.into(), p.into());
        self.segments.push(PathSegment::QuadTo(c, p));
        self.path.quad_to(c, p);
        self.current = p;
    }

    /// Cubic Bézier.
    pub fn curve_to(&mut self, c1: impl Into<Point>, c2: impl Into<Point>, p: impl Into<Point>) {
        let (c1, c2, p) = (c1.into(), c2.into(), p.into());
        self.segments.push(PathSegment::CurveTo(c1, c2, p));
        self.path.curve_to(c1, c2, p);
        self.current = p;
    }

    /// Elliptical arc from the current point.
    ///
    /// Arcs with a zero radius are drawn as straight lines.
    pub fn arc_to(
        &mut self,
        radii: impl Into<Vec2>,
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: impl Into<Point>,
    ) {
        let arc = ArcTo {
            radii: radii.into(),
            x_rotation,
            large_arc,
            sweep,
            to: to.into(),
        };
        self.segments.push(PathSegment::ArcTo(arc));
        match arc.resolve(self.current) {
            Some(resolved) => {
                for el in resolved.append_iter(TOLERANCE) {
                    self.path.push(el);
                }
            }
            None => self.path.line_to(arc.to),
        }
        self.current = arc.to;
    }

    /// Close the current subpath.
    pub fn close_path(&mut self) {
        self.segments.push(PathSegment::Close);
        self.path.close_path();
        self.current = self.start;
    }

    /// The recorded commands.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The path as plain Béziers.
    pub fn as_bez_path(&self) -> &BezPath {
        &self.path
    }

    /// Whether the path has no commands.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bounding box of the drawn geometry.
    pub fn bounding_box(&self) -> Rect {
        self.path.bounding_box()
    }

    /// Whether `point` is inside the path under the non-zero rule.
    pub fn contains(&self, point: Point) -> bool {
        self.path.contains(point)
    }

    fn from_elements(elements: impl IntoIterator<Item = PathEl>) -> Self {
        let mut out = Self::new();
        for el in elements {
            match el {
                PathEl::MoveTo(p) => out.move_to(p),
                PathEl::LineTo(p) => out.line_to(p),
                PathEl::QuadTo(c, p) => out.quad_to(c, p),
                PathEl::CurveTo(c1, c2, p) => out.curve_to(c1, c2, p),
                PathEl::ClosePath => out.close_path(),
            }
        }
        out
    }
}

impl From<BezPath> for ExtendedPath {
    fn from(path: BezPath) -> Self {
        Self::from_elements(path.elements().iter().copied())
    }
}

macro_rules! from_shape {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ExtendedPath {
                fn from(shape: $ty) -> Self {
                    Self::from_elements(shape.path_elements(TOLERANCE))
                }
            }
        )*
    };
}

from_shape!(Rect, Circle, Ellipse, RoundedRect, Line);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_keeps_segment_and_draws_curves() {
        let mut p = ExtendedPath::new();
        p.move_to((0.0, 0.0));
        p.arc_to((5.0, 5.0), 0.0, false, true, (10.0, 0.0));
        assert_eq!(p.segments().len(), 2);
        assert!(matches!(p.segments()[1], PathSegment::ArcTo(_)));
        let bbox = p.bounding_box();
        assert!(
            (bbox.height() - 5.0).abs() < 1e-6,
            "semicircle bulges by its radius: {bbox:?}"
        );
        assert!(
            p.as_bez_path()
                .elements()
                .iter()
                .any(|el| matches!(el, PathEl::CurveTo(..))),
            "arc drawn as cubics"
        );
    }

    #[test]
    fn zero_radius_arc_is_a_line() {
        let mut p = ExtendedPath::new();
        p.move_to((0.0, 0.0));
        p.arc_to((0.0, 5.0), 0.0, false, true, (10.0, 0.0));
        assert_eq!(
            p.as_bez_path().elements(),
            &[PathEl::MoveTo(Point::ZERO), PathEl::LineTo(Point::new(10.0, 0.0))]
        );
    }

    #[test]
    fn close_returns_to_subpath_start() {
        let mut p = ExtendedPath::new();
        p.move_to((1.0, 1.0));
        p.line_to((4.0, 1.0));
        p.close_path();
        p.arc_to((0.0, 0.0), 0.0, false, false, (2.0, 2.0));
        assert_eq!(
            p.as_bez_path().elements().last(),
            Some(&PathEl::LineTo(Point::new(2.0, 2.0))),
            "arc after close starts from the subpath start"
        );
        assert_eq!(PathSegment::Close.end_point(), None);
    }

    #[test]
    fn shapes_convert() {
        let r = ExtendedPath::from(Rect::new(0.0, 0.0, 2.0, 3.0));
        assert_eq!(r.bounding_box(), Rect::new(0.0, 0.0, 2.0, 3.0));
        assert!(matches!(r.segments().first(), Some(PathSegment::MoveTo(_))));
        assert!(r.contains(Point::new(1.0, 1.0)));
    }
}
