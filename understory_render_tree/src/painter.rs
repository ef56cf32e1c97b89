// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape painters: how a [`ShapeNode`](crate::ShapeNode) turns its geometry into pixels.
//!
//! A painter knows two kinds of area for the geometry it is given:
//!
//! - the *painted* area, which actually receives paint;
//! - the *sensitive* area, which hit testing may consider even when nothing
//!   is painted there (an unpainted fill still has a fill area).

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use kurbo::{Affine, BezPath, Point, Rect, Shape as _, Stroke, StrokeOpts};
use peniko::{Brush, Fill};
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::geom::union_opt;
use crate::marker::MarkerPainter;
use crate::node::{Cancelled, Cx};
use crate::path::ExtendedPath;
use crate::pattern::PatternPaint;
use crate::types::{NodeId, Sensitivity};

/// Tolerance used when stroking.
const STROKE_TOLERANCE: f64 = 0.1;

/// A union of outlines, kept as separate paths.
#[derive(Clone, Debug, Default)]
pub struct Area {
    paths: SmallVec<[BezPath; 2]>,
}

impl Area {
    /// An area with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An area made of one path.
    pub fn from_path(path: BezPath) -> Self {
        let mut paths = SmallVec::new();
        paths.push(path);
        Self { paths }
    }

    /// Add everything in `other`.
    pub fn extend(&mut self, other: Self) {
        self.paths.extend(other.paths);
    }

    /// Whether any component contains `point` (non-zero rule).
    pub fn contains(&self, point: Point) -> bool {
        self.paths.iter().any(|p| p.contains(point))
    }

    /// Bounding box of all components.
    pub fn bounding_box(&self) -> Option<Rect> {
        self.paths
            .iter()
            .fold(None, |acc, p| union_opt(acc, Some(p.bounding_box())))
    }

    /// Whether the area has no components.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Components.
    pub fn paths(&self) -> &[BezPath] {
        &self.paths
    }

    /// All components concatenated into one path.
    pub fn to_path(&self) -> BezPath {
        let mut out = BezPath::new();
        for p in &self.paths {
            out.extend(p.iter());
        }
        out
    }
}

/// What a [`FillPainter`] fills with.
#[derive(Clone, Debug)]
pub enum Paint {
    /// A solid color or gradient.
    Brush(Brush),
    /// A tiled rendering of a subtree.
    Pattern(Arc<PatternPaint>),
}

impl From<Brush> for Paint {
    fn from(brush: Brush) -> Self {
        Self::Brush(brush)
    }
}

impl From<Arc<PatternPaint>> for Paint {
    fn from(pattern: Arc<PatternPaint>) -> Self {
        Self::Pattern(pattern)
    }
}

/// Fills the geometry.
#[derive(Clone, Debug)]
pub struct FillPainter {
    paint: Option<Paint>,
    rule: Fill,
}

impl FillPainter {
    /// Fill with `brush` using the non-zero rule.
    pub fn new(brush: impl Into<Brush>) -> Self {
        Self {
            paint: Some(Paint::Brush(brush.into())),
            rule: Fill::NonZero,
        }
    }

    /// Fill with a tiled pattern.
    ///
    /// The shape draws the pattern's content, so that content must not
    /// contain the shape.
    pub fn pattern(pattern: Arc<PatternPaint>) -> Self {
        Self {
            paint: Some(Paint::Pattern(pattern)),
            rule: Fill::NonZero,
        }
    }

    /// A fill that paints nothing but still defines a fill area for hit testing.
    pub fn unpainted() -> Self {
        Self {
            paint: None,
            rule: Fill::NonZero,
        }
    }

    /// Builder-style fill rule.
    pub fn with_rule(mut self, rule: Fill) -> Self {
        self.rule = rule;
        self
    }

    /// The paint source, if any.
    pub fn paint_source(&self) -> Option<&Paint> {
        self.paint.as_ref()
    }

    /// The brush, when filling with one.
    pub fn brush(&self) -> Option<&Brush> {
        match &self.paint {
            Some(Paint::Brush(brush)) => Some(brush),
            _ => None,
        }
    }

    /// The fill rule.
    pub fn rule(&self) -> Fill {
        self.rule
    }

    fn paint(&self, cx: Cx<'_>, path: &ExtendedPath, canvas: &mut dyn Canvas) {
        match &self.paint {
            Some(Paint::Brush(brush)) => canvas.fill(path.as_bez_path(), self.rule, brush),
            Some(Paint::Pattern(pattern)) => pattern.fill(cx.tree, canvas, path.as_bez_path()),
            None => {}
        }
    }

    fn sensitive_area(&self, path: &ExtendedPath) -> Area {
        Area::from_path(path.as_bez_path().clone())
    }

    fn in_sensitive_area(&self, path: &ExtendedPath, point: Point) -> bool {
        let winding = path.as_bez_path().winding(point);
        match self.rule {
            Fill::NonZero => winding != 0,
            Fill::EvenOdd => winding % 2 != 0,
        }
    }
}

/// Strokes the geometry.
pub struct StrokePainter {
    style: Stroke,
    brush: Option<Brush>,
    outline: RefCell<Option<BezPath>>,
}

impl fmt::Debug for StrokePainter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrokePainter")
            .field("width", &self.style.width)
            .field("brush", &self.brush)
            .finish_non_exhaustive()
    }
}

impl Clone for StrokePainter {
    fn clone(&self) -> Self {
        Self {
            style: self.style.clone(),
            brush: self.brush.clone(),
            outline: RefCell::new(None),
        }
    }
}

impl StrokePainter {
    /// Stroke with `style` and `brush`.
    pub fn new(style: Stroke, brush: impl Into<Brush>) -> Self {
        Self {
            style,
            brush: Some(brush.into()),
            outline: RefCell::new(None),
        }
    }

    /// A stroke that paints nothing but still defines a stroke area for hit testing.
    pub fn unpainted(style: Stroke) -> Self {
        Self {
            style,
            brush: None,
            outline: RefCell::new(None),
        }
    }

    /// The stroke style.
    pub fn style(&self) -> &Stroke {
        &self.style
    }

    /// The paint, if any.
    pub fn brush(&self) -> Option<&Brush> {
        self.brush.as_ref()
    }

    /// Replace the stroke style, dropping the cached outline.
    pub fn set_style(&mut self, style: Stroke) {
        self.style = style;
        self.invalidate();
    }

    /// The filled outline of `path` stroked with this style.
    pub fn stroke_outline(&self, path: &ExtendedPath) -> BezPath {
        kurbo::stroke(
            path.as_bez_path().iter(),
            &self.style,
            &StrokeOpts::default(),
            STROKE_TOLERANCE,
        )
    }

    /// Outline of the owning shape's geometry, cached until it changes.
    pub(crate) fn cached_outline(&self, path: &ExtendedPath) -> BezPath {
        if let Ok(cached) = self.outline.try_borrow()
            && let Some(outline) = cached.as_ref()
        {
            return outline.clone();
        }
        let outline = self.stroke_outline(path);
        if let Ok(mut slot) = self.outline.try_borrow_mut() {
            *slot = Some(outline.clone());
        }
        outline
    }

    fn invalidate(&self) {
        if let Ok(mut slot) = self.outline.try_borrow_mut() {
            *slot = None;
        }
    }

    fn paint(&self, path: &ExtendedPath, canvas: &mut dyn Canvas) {
        if let Some(brush) = &self.brush {
            canvas.stroke(path.as_bez_path(), &self.style, brush);
        }
    }
}

/// Several painters applied in order.
#[derive(Clone, Debug, Default)]
pub struct CompositePainter {
    painters: Vec<ShapePainter>,
}

impl CompositePainter {
    /// No painters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, painter: impl Into<ShapePainter>) -> Self {
        self.painters.push(painter.into());
        self
    }

    /// Append a painter; it paints on top of the previous ones.
    pub fn push(&mut self, painter: impl Into<ShapePainter>) {
        self.painters.push(painter.into());
    }

    /// The painters in paint order.
    pub fn painters(&self) -> &[ShapePainter] {
        &self.painters
    }
}

/// Any painter a shape can hold.
#[derive(Clone, Debug)]
pub enum ShapePainter {
    /// Fill.
    Fill(FillPainter),
    /// Stroke.
    Stroke(StrokePainter),
    /// Ordered combination.
    Composite(CompositePainter),
    /// Markers at path vertices.
    Marker(MarkerPainter),
}

impl From<FillPainter> for ShapePainter {
    fn from(p: FillPainter) -> Self {
        Self::Fill(p)
    }
}

impl From<StrokePainter> for ShapePainter {
    fn from(p: StrokePainter) -> Self {
        Self::Stroke(p)
    }
}

impl From<CompositePainter> for ShapePainter {
    fn from(p: CompositePainter) -> Self {
        Self::Composite(p)
    }
}

impl From<MarkerPainter> for ShapePainter {
    fn from(p: MarkerPainter) -> Self {
        Self::Marker(p)
    }
}

impl ShapePainter {
    pub(crate) fn paint(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        match self {
            Self::Fill(p) => p.paint(cx, path, canvas),
            Self::Stroke(p) => p.paint(path, canvas),
            Self::Composite(c) => {
                for p in &c.painters {
                    p.paint(cx, path, canvas)?;
                }
            }
            Self::Marker(m) => m.paint(cx, path, canvas)?,
        }
        Ok(())
    }

    /// Bounds of the painted area, mapped through `transform`.
    pub(crate) fn painted_bounds(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        Ok(match self {
            Self::Fill(p) => p
                .paint
                .as_ref()
                .map(|_| transformed_path_bounds(transform, path.as_bez_path())),
            Self::Stroke(p) => p
                .brush
                .as_ref()
                .map(|_| transformed_path_bounds(transform, &p.cached_outline(path))),
            Self::Composite(c) => {
                let mut acc = None;
                for p in &c.painters {
                    acc = union_opt(acc, p.painted_bounds(cx, path, transform)?);
                }
                acc
            }
            Self::Marker(m) => m.painted_bounds(cx, path, transform)?,
        })
    }

    pub(crate) fn painted_area(&self, cx: Cx<'_>, path: &ExtendedPath) -> Area {
        match self {
            Self::Fill(p) if p.paint.is_some() => p.sensitive_area(path),
            Self::Stroke(p) if p.brush.is_some() => Area::from_path(p.cached_outline(path)),
            Self::Fill(_) | Self::Stroke(_) => Area::empty(),
            Self::Composite(c) => {
                let mut area = Area::empty();
                for p in &c.painters {
                    area.extend(p.painted_area(cx, path));
                }
                area
            }
            Self::Marker(m) => m.painted_area(cx, path),
        }
    }

    fn in_painted_area(&self, cx: Cx<'_>, path: &ExtendedPath, point: Point) -> bool {
        match self {
            Self::Fill(p) => p.paint.is_some() && p.in_sensitive_area(path, point),
            Self::Stroke(p) => p.brush.is_some() && p.cached_outline(path).contains(point),
            Self::Composite(c) => c.painters.iter().any(|p| p.in_painted_area(cx, path, point)),
            Self::Marker(m) => m.in_painted_area(cx, path, point),
        }
    }

    fn sensitive_area(&self, path: &ExtendedPath) -> Area {
        match self {
            Self::Fill(p) => p.sensitive_area(path),
            Self::Stroke(p) => Area::from_path(p.cached_outline(path)),
            Self::Composite(c) => {
                let mut area = Area::empty();
                for p in &c.painters {
                    area.extend(p.sensitive_area(path));
                }
                area
            }
            Self::Marker(_) => Area::empty(),
        }
    }

    fn in_sensitive_area(&self, path: &ExtendedPath, point: Point) -> bool {
        match self {
            Self::Fill(p) => p.in_sensitive_area(path, point),
            Self::Stroke(p) => p.cached_outline(path).contains(point),
            Self::Composite(c) => c.painters.iter().any(|p| p.in_sensitive_area(path, point)),
            Self::Marker(_) => false,
        }
    }

    /// The painter that defines the fill area: itself, or the last fill of a composite.
    fn fill_part(&self) -> Option<&FillPainter> {
        match self {
            Self::Fill(p) => Some(p),
            Self::Composite(c) => c.painters.iter().rev().find_map(|p| match p {
                Self::Fill(f) => Some(f),
                _ => None,
            }),
            _ => None,
        }
    }

    fn stroke_part(&self) -> Option<&StrokePainter> {
        match self {
            Self::Stroke(p) => Some(p),
            Self::Composite(c) => c.painters.iter().rev().find_map(|p| match p {
                Self::Stroke(s) => Some(s),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Area that hit testing considers under `sensitivity`.
    pub(crate) fn area_for(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        sensitivity: Sensitivity,
    ) -> Area {
        if sensitivity.contains(Sensitivity::PAINTED) {
            return self.painted_area(cx, path);
        }
        let fill = sensitivity.contains(Sensitivity::FILL);
        let stroke = sensitivity.contains(Sensitivity::STROKE);
        match (fill, stroke) {
            (true, true) => self.sensitive_area(path),
            (true, false) => self
                .fill_part()
                .map_or_else(Area::empty, |f| f.sensitive_area(path)),
            (false, true) => self
                .stroke_part()
                .map_or_else(Area::empty, |s| Area::from_path(s.cached_outline(path))),
            (false, false) => Area::empty(),
        }
    }

    /// Whether `point` is in the area selected by `sensitivity`.
    pub(crate) fn hit(
        &self,
        cx: Cx<'_>,
        path: &ExtendedPath,
        sensitivity: Sensitivity,
        point: Point,
    ) -> bool {
        if sensitivity.contains(Sensitivity::PAINTED) {
            return self.in_painted_area(cx, path, point);
        }
        let fill = sensitivity.contains(Sensitivity::FILL);
        let stroke = sensitivity.contains(Sensitivity::STROKE);
        match (fill, stroke) {
            (true, true) => self.in_sensitive_area(path, point),
            (true, false) => self
                .fill_part()
                .is_some_and(|f| f.in_sensitive_area(path, point)),
            (false, true) => self
                .stroke_part()
                .is_some_and(|s| s.cached_outline(path).contains(point)),
            (false, false) => false,
        }
    }

    /// Drop caches derived from the geometry.
    pub(crate) fn invalidate(&self) {
        match self {
            Self::Fill(_) => {}
            Self::Stroke(p) => p.invalidate(),
            Self::Composite(c) => c.painters.iter().for_each(Self::invalidate),
            Self::Marker(m) => m.invalidate(),
        }
    }

    /// Drop renderings of referenced content.
    pub(crate) fn content_changed(&self) {
        match self {
            Self::Fill(p) => {
                if let Some(Paint::Pattern(pattern)) = &p.paint {
                    pattern.invalidate();
                }
            }
            Self::Composite(c) => c.painters.iter().for_each(Self::content_changed),
            Self::Stroke(_) | Self::Marker(_) => {}
        }
    }

    /// Nodes drawn by this painter: marker content and pattern content.
    pub(crate) fn referenced_nodes(&self, out: &mut SmallVec<[NodeId; 2]>) {
        match self {
            Self::Fill(p) => {
                if let Some(Paint::Pattern(pattern)) = &p.paint
                    && !out.contains(&pattern.group())
                {
                    out.push(pattern.group());
                }
            }
            Self::Stroke(_) => {}
            Self::Composite(c) => c.painters.iter().for_each(|p| p.referenced_nodes(out)),
            Self::Marker(m) => {
                for node in m.marker_nodes() {
                    if !out.contains(&node) {
                        out.push(node);
                    }
                }
            }
        }
    }
}

/// Exact bounds of `path` under `transform`.
pub(crate) fn transformed_path_bounds(transform: Affine, path: &BezPath) -> Rect {
    if transform == Affine::IDENTITY {
        path.bounding_box()
    } else {
        (transform * path.clone()).bounding_box()
    }
}
