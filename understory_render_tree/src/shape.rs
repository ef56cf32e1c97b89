// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape leaves: a path drawn by a [`ShapePainter`].

use kurbo::{Affine, BezPath, Point, Rect};
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::geom::{has_shear, transform_rect_scale_only};
use crate::node::{Cancelled, Cx, KindOps, Node, NodeKind};
use crate::painter::{ShapePainter, transformed_path_bounds};
use crate::path::ExtendedPath;
use crate::tree::Tree;
use crate::types::{NodeId, Sensitivity};

/// A path and the painter that draws it.
///
/// A shape without a painter still reports its geometry as primitive bounds,
/// but draws nothing and is never hit.
#[derive(Clone, Debug, Default)]
pub struct ShapeNode {
    path: ExtendedPath,
    painter: Option<ShapePainter>,
}

impl ShapeNode {
    /// A shape with no painter.
    pub fn new(path: impl Into<ExtendedPath>) -> Self {
        Self {
            path: path.into(),
            painter: None,
        }
    }

    /// Builder-style painter.
    pub fn with_painter(mut self, painter: impl Into<ShapePainter>) -> Self {
        self.painter = Some(painter.into());
        self
    }

    /// The geometry.
    pub fn path(&self) -> &ExtendedPath {
        &self.path
    }

    /// The painter, if any.
    pub fn painter(&self) -> Option<&ShapePainter> {
        self.painter.as_ref()
    }

    fn geometry(&self) -> Option<&ExtendedPath> {
        (!self.path.is_empty()).then_some(&self.path)
    }

    fn sensitive_rect(
        &self,
        cx: Cx<'_>,
        sensitivity: Sensitivity,
        t: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let (Some(path), Some(painter)) = (self.geometry(), &self.painter) else {
            return Ok(None);
        };
        if sensitivity.contains(Sensitivity::PAINTED) {
            return painter.painted_bounds(cx, path, t);
        }
        let area = painter.area_for(cx, path, sensitivity);
        if area.is_empty() {
            return Ok(None);
        }
        Ok(Some(transformed_path_bounds(t, &area.to_path())))
    }
}

impl KindOps for ShapeNode {
    fn primitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        if !node.visible {
            return Ok(None);
        }
        let Some(path) = self.geometry() else {
            return Ok(None);
        };
        match &self.painter {
            Some(painter) => painter.painted_bounds(cx, path, Affine::IDENTITY),
            None => Ok(Some(path.bounding_box())),
        }
    }

    fn transformed_primitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        if !has_shear(transform) {
            return Ok(cx
                .tree
                .cached_primitive_bounds(cx, node)?
                .map(|r| transform_rect_scale_only(transform, r)));
        }
        if !node.visible {
            return Ok(None);
        }
        let Some(path) = self.geometry() else {
            return Ok(None);
        };
        match &self.painter {
            Some(painter) => painter.painted_bounds(cx, path, transform),
            None => Ok(Some(transformed_path_bounds(transform, path.as_bez_path()))),
        }
    }

    fn geometry_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        Ok(self
            .geometry()
            .map(|path| cx.tree.normalized(node, path.bounding_box())))
    }

    fn transformed_geometry_bounds(
        &self,
        _cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        Ok(self
            .geometry()
            .map(|path| transformed_path_bounds(transform, path.as_bez_path())))
    }

    fn sensitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.sensitive_rect(cx, node.pointer_events.sensitivity(), Affine::IDENTITY)
    }

    fn transformed_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.sensitive_rect(cx, node.pointer_events.sensitivity(), transform)
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        cx.check()?;
        if !node.visible {
            return Ok(());
        }
        match (self.geometry(), &self.painter) {
            (Some(path), Some(painter)) => painter.paint(cx, path, canvas),
            _ => Ok(()),
        }
    }

    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        if !node.pointer_events.accepts_visibility(node.visible) {
            return false;
        }
        if !matches!(cx.tree.cached_sensitive_bounds(cx, node), Ok(Some(r)) if r.contains(point)) {
            return false;
        }
        match (self.geometry(), &self.painter) {
            (Some(path), Some(painter)) => {
                painter.hit(cx, path, node.pointer_events.sensitivity(), point)
            }
            _ => false,
        }
    }

    fn outline(&self, _cx: Cx<'_>, _node: &Node) -> Option<BezPath> {
        self.geometry().map(|path| path.as_bez_path().clone())
    }

    fn referenced_nodes(&self) -> SmallVec<[NodeId; 2]> {
        let mut out = SmallVec::new();
        if let Some(painter) = &self.painter {
            painter.referenced_nodes(&mut out);
        }
        out
    }
}

impl Tree {
    /// Create a detached shape node.
    pub fn create_shape(&mut self, shape: ShapeNode) -> NodeId {
        self.create(NodeKind::Shape(shape))
    }

    /// Replace a shape node's geometry.
    pub fn set_shape(&mut self, id: NodeId, path: impl Into<ExtendedPath>) {
        if !matches!(self.kind(id), Some(NodeKind::Shape(_))) {
            return;
        }
        let path = path.into();
        self.update_node(id, |n| {
            if let NodeKind::Shape(s) = &mut n.kind {
                s.path = path;
                if let Some(painter) = &s.painter {
                    painter.invalidate();
                }
            }
        });
    }

    /// Replace a shape node's painter.
    ///
    /// Ignored for shapes without geometry, and for painters whose markers or
    /// pattern content contain the shape.
    pub fn set_painter(&mut self, id: NodeId, painter: Option<ShapePainter>) {
        let Some(NodeKind::Shape(s)) = self.kind(id) else {
            return;
        };
        if s.path.is_empty() {
            tracing::warn!(?id, "painter set on a shape without geometry; ignored");
            return;
        }
        if let Some(p) = &painter {
            let mut refs = SmallVec::new();
            p.referenced_nodes(&mut refs);
            if refs.iter().any(|&r| self.draws(r, id)) {
                tracing::warn!(?id, "painter would draw its own shape; ignored");
                return;
            }
        }
        self.unlink_references(id);
        self.update_node(id, |n| {
            if let NodeKind::Shape(s) = &mut n.kind {
                s.painter = painter;
            }
        });
        self.link_references(id);
    }

    /// The geometry of a shape node.
    pub fn shape(&self, id: NodeId) -> Option<&ExtendedPath> {
        match self.kind(id)? {
            NodeKind::Shape(s) => Some(&s.path),
            _ => None,
        }
    }

    /// The painter of a shape node.
    pub fn painter(&self, id: NodeId) -> Option<&ShapePainter> {
        match self.kind(id)? {
            NodeKind::Shape(s) => s.painter.as_ref(),
            _ => None,
        }
    }
}
