// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proxy leaves: draw another node in place.
//!
//! A proxy shows its source through the source's own transform, as if the
//! source were a child of the proxy, without taking ownership of it. The
//! source may live anywhere, attached or not. Changes to the source
//! invalidate every proxy drawing it but notify only the source's own
//! listeners.
//!
//! A proxy must never end up drawing itself, directly or through its
//! source's subtree; edits that would close such a loop are rejected.

use kurbo::{Affine, BezPath, Point, Rect};
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::error::TreeError;
use crate::node::{Cancelled, Cx, KindOps, Node, NodeKind};
use crate::tree::Tree;
use crate::types::NodeId;

/// A stand-in for another node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProxyNode {
    source: Option<NodeId>,
}

impl ProxyNode {
    /// A proxy drawing `source`.
    pub fn new(source: NodeId) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// The node being drawn.
    pub fn source(&self) -> Option<NodeId> {
        self.source
    }
}

impl KindOps for ProxyNode {
    fn primitive_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree.transformed_bounds_in(cx, source, Affine::IDENTITY)
    }

    fn transformed_primitive_bounds(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree.transformed_bounds_in(cx, source, transform)
    }

    fn geometry_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree
            .transformed_geometry_bounds_in(cx, source, Affine::IDENTITY)
    }

    fn transformed_geometry_bounds(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree.transformed_geometry_bounds_in(cx, source, transform)
    }

    fn sensitive_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree
            .transformed_sensitive_bounds_in(cx, source, Affine::IDENTITY)
    }

    fn transformed_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        cx.tree.transformed_sensitive_bounds_in(cx, source, transform)
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        match self.source {
            Some(source) => cx.tree.paint_in(cx, source, canvas),
            None => Ok(()),
        }
    }

    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        if !node.pointer_events.accepts_visibility(node.visible) {
            return false;
        }
        let Some(source) = self.source.and_then(|s| cx.tree.get(s)) else {
            return false;
        };
        cx.tree.contains_local(cx, source, source.inverse * point)
    }

    fn outline(&self, cx: Cx<'_>, _node: &Node) -> Option<BezPath> {
        let source = cx.tree.get(self.source?)?;
        let mut outline = source.kind.ops().outline(cx, source)?;
        outline.apply_affine(source.effective_transform());
        Some(outline)
    }

    fn referenced_nodes(&self) -> SmallVec<[NodeId; 2]> {
        self.source.into_iter().collect()
    }
}

impl Tree {
    /// Create a detached proxy drawing `source`.
    pub fn create_proxy(&mut self, source: NodeId) -> NodeId {
        self.create(NodeKind::Proxy(ProxyNode::new(source)))
    }

    /// Point a proxy at another source, or at nothing.
    pub fn set_proxy_source(&mut self, id: NodeId, source: Option<NodeId>) -> Result<(), TreeError> {
        let Some(NodeKind::Proxy(p)) = self.kind(id) else {
            return Err(if self.is_alive(id) {
                TreeError::InvalidArgument("not a proxy node")
            } else {
                TreeError::StaleNode(id)
            });
        };
        if let Some(s) = source {
            if !self.is_alive(s) {
                return Err(TreeError::StaleNode(s));
            }
            if self.draws(s, id) {
                return Err(TreeError::InvalidArgument("a proxy cannot draw itself"));
            }
        }
        if p.source == source {
            return Ok(());
        }
        self.unlink_references(id);
        self.update_node(id, |n| {
            if let NodeKind::Proxy(p) = &mut n.kind {
                p.source = source;
            }
        });
        self.link_references(id);
        Ok(())
    }
}
