// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point queries and outlines.

use kurbo::{BezPath, Point};

use crate::node::{Cx, Node};
use crate::tree::Tree;
use crate::types::NodeId;

impl Tree {
    /// Whether `point`, in the node's local space, hits the node.
    ///
    /// Leaves honor their [`PointerEvents`](crate::PointerEvents) mode;
    /// containers hit when any child does.
    pub fn contains(&self, id: NodeId, point: Point) -> bool {
        let cx = self.cx();
        self.get(id)
            .is_some_and(|node| self.contains_local(cx, node, point))
    }

    /// Topmost node under `point`, given in `id`'s local space.
    ///
    /// Children are searched from the last painted to the first; a container
    /// reports the leaf that was hit, never itself.
    pub fn node_hit_at(&self, id: NodeId, point: Point) -> Option<NodeId> {
        let cx = self.cx();
        let node = self.get(id)?;
        self.hit_local(cx, id, node, point)
    }

    /// Topmost node under `point`, given in the root's parent space.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        let root = self.root();
        let node = self.get(root)?;
        self.hit_local(self.cx(), root, node, node.inverse * point)
    }

    /// Outline of the node's geometry in local space.
    ///
    /// Containers concatenate their children's outlines, each mapped through
    /// the child's transform.
    pub fn outline(&self, id: NodeId) -> Option<BezPath> {
        let cx = self.cx();
        let node = self.get(id)?;
        node.kind.ops().outline(cx, node)
    }

    pub(crate) fn contains_local(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        node.kind.ops().contains(cx, node, point)
    }

    pub(crate) fn hit_local(
        &self,
        cx: Cx<'_>,
        id: NodeId,
        node: &Node,
        point: Point,
    ) -> Option<NodeId> {
        if node.kind.group().is_some() {
            node.kind.ops().hit_child(cx, node, point)
        } else if self.contains_local(cx, node, point) {
            Some(id)
        } else {
            None
        }
    }
}
