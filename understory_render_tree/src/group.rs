// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container nodes and their child lists.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Rect};
use peniko::{Brush, Fill};

use crate::canvas::Canvas;
use crate::error::TreeError;
use crate::geom::{has_shear, transform_rect_scale_only, union_opt};
use crate::node::{Cancelled, Cx, KindOps, Node, NodeKind};
use crate::tree::Tree;
use crate::types::NodeId;

/// Ordered children of a container.
///
/// Every structural change bumps a modification counter, which lets
/// [`ChildCursor`]s notice edits made behind their back.
#[derive(Clone, Debug, Default)]
pub struct ChildList {
    items: Vec<NodeId>,
    mod_count: u64,
}

impl ChildList {
    /// Number of children.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when there are no children.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Child at `index`.
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.items.get(index).copied()
    }

    /// Position of `child`, if present.
    pub fn index_of(&self, child: NodeId) -> Option<usize> {
        self.items.iter().position(|c| *c == child)
    }

    /// Whether `child` is in the list.
    pub fn contains(&self, child: NodeId) -> bool {
        self.items.contains(&child)
    }

    /// Children in paint order (first is bottom-most).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator + '_ {
        self.items.iter().copied()
    }

    /// Children as a slice.
    pub fn as_slice(&self) -> &[NodeId] {
        &self.items
    }

    /// Number of structural changes so far.
    pub fn modification_count(&self) -> u64 {
        self.mod_count
    }

    pub(crate) fn insert(&mut self, index: usize, child: NodeId) {
        self.items.insert(index, child);
        self.mod_count += 1;
    }

    pub(crate) fn remove(&mut self, index: usize) -> NodeId {
        self.mod_count += 1;
        self.items.remove(index)
    }

    pub(crate) fn replace(&mut self, index: usize, child: NodeId) -> NodeId {
        self.mod_count += 1;
        core::mem::replace(&mut self.items[index], child)
    }
}

/// A plain container node.
#[derive(Debug, Default)]
pub struct GroupNode {
    pub(crate) children: ChildList,
}

impl GroupNode {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// The group's children.
    pub fn children(&self) -> &ChildList {
        &self.children
    }

    fn aggregate(
        &self,
        cx: Cx<'_>,
        mut child_bounds: impl FnMut(NodeId) -> Result<Option<Rect>, Cancelled>,
    ) -> Result<Option<Rect>, Cancelled> {
        let interval = cx.tree.config().cancel_check_interval.max(1);
        let mut acc = None;
        for (i, child) in self.children.iter().enumerate() {
            if i % interval == 0 {
                cx.check()?;
            }
            acc = union_opt(acc, child_bounds(child)?);
        }
        Ok(acc)
    }
}

impl KindOps for GroupNode {
    fn primitive_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.aggregate(cx, |c| cx.tree.transformed_bounds_in(cx, c, Affine::IDENTITY))
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
        self.aggregate(cx, |c| cx.tree.transformed_bounds_in(cx, c, transform))
    }

    fn geometry_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.aggregate(cx, |c| {
            cx.tree.transformed_geometry_bounds_in(cx, c, Affine::IDENTITY)
        })
    }

    fn transformed_geometry_bounds(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.aggregate(cx, |c| cx.tree.transformed_geometry_bounds_in(cx, c, transform))
    }

    fn sensitive_bounds(&self, cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.aggregate(cx, |c| {
            cx.tree.transformed_sensitive_bounds_in(cx, c, Affine::IDENTITY)
        })
    }

    fn transformed_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.aggregate(cx, |c| cx.tree.transformed_sensitive_bounds_in(cx, c, transform))
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        for child in self.children.iter() {
            cx.check()?;
            cx.tree.paint_in(cx, child, canvas)?;
        }
        Ok(())
    }

    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        if self.children.is_empty() {
            return false;
        }
        if !matches!(cx.tree.cached_sensitive_bounds(cx, node), Ok(Some(r)) if r.contains(point)) {
            return false;
        }
        self.children.iter().any(|child| {
            cx.tree
                .get(child)
                .is_some_and(|c| cx.tree.contains_local(cx, c, c.inverse * point))
        })
    }

    fn hit_child(&self, cx: Cx<'_>, node: &Node, point: Point) -> Option<NodeId> {
        if !matches!(cx.tree.cached_sensitive_bounds(cx, node), Ok(Some(r)) if r.contains(point)) {
            return None;
        }
        self.children.iter().rev().find_map(|child| {
            let c = cx.tree.get(child)?;
            cx.tree.hit_local(cx, child, c, c.inverse * point)
        })
    }

    fn outline(&self, cx: Cx<'_>, node: &Node) -> Option<BezPath> {
        if let Ok(cached) = node.cache.outline.try_borrow()
            && let Some(outline) = cached.as_ref()
        {
            return Some(outline.clone());
        }
        let mut outline = BezPath::new();
        for child in self.children.iter() {
            let Some(c) = cx.tree.get(child) else {
                continue;
            };
            if let Some(mut child_outline) = c.kind.ops().outline(cx, c) {
                child_outline.apply_affine(c.effective_transform());
                outline.extend(child_outline.iter());
            }
        }
        if let Ok(mut slot) = node.cache.outline.try_borrow_mut() {
            *slot = Some(outline.clone());
        }
        Some(outline)
    }
}

/// A container with a viewing transform and an optional background.
///
/// The viewing transform is applied after the node's own transform, so it
/// maps child coordinates (the "view box") into the node's positioned space.
#[derive(Debug)]
pub struct CanvasNode {
    pub(crate) group: GroupNode,
    pub(crate) view_transform: Affine,
    pub(crate) background: Option<Brush>,
}

impl CanvasNode {
    /// An empty canvas node.
    pub fn new(view_transform: Affine) -> Self {
        Self {
            group: GroupNode::new(),
            view_transform,
            background: None,
        }
    }

    /// Builder-style background paint. It fills the clip active when the node is painted.
    pub fn with_background(mut self, brush: Brush) -> Self {
        self.background = Some(brush);
        self
    }

    /// The children.
    pub fn children(&self) -> &ChildList {
        &self.group.children
    }

    /// Viewing transform.
    pub fn view_transform(&self) -> Affine {
        self.view_transform
    }

    /// Background paint.
    pub fn background(&self) -> Option<&Brush> {
        self.background.as_ref()
    }
}

impl KindOps for CanvasNode {
    fn primitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.group.primitive_bounds(cx, node)
    }

    fn transformed_primitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.group.transformed_primitive_bounds(cx, node, transform)
    }

    fn geometry_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.group.geometry_bounds(cx, node)
    }

    fn transformed_geometry_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.group.transformed_geometry_bounds(cx, node, transform)
    }

    fn sensitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        self.group.sensitive_bounds(cx, node)
    }

    fn transformed_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        self.group.transformed_sensitive_bounds(cx, node, transform)
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        if let Some(brush) = &self.background
            && let Some(area) = canvas.clip_bounds()
            && area.x0 <= area.x1
        {
            canvas.fill(&kurbo::Shape::to_path(&area, 0.1), Fill::NonZero, brush);
        }
        self.group.primitive_paint(cx, node, canvas)
    }

    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        self.group.contains(cx, node, point)
    }

    fn hit_child(&self, cx: Cx<'_>, node: &Node, point: Point) -> Option<NodeId> {
        self.group.hit_child(cx, node, point)
    }

    fn outline(&self, cx: Cx<'_>, node: &Node) -> Option<BezPath> {
        self.group.outline(cx, node)
    }
}

/// Fail-fast iteration over a container's children.
///
/// A cursor does not borrow the tree, so it can interleave reads with edits.
/// Edits made through the cursor keep it valid; any other structural change
/// to the container makes its next call fail with
/// [`TreeError::ConcurrentModification`].
///
/// ```rust
/// use kurbo::Rect;
/// use understory_render_tree::{ShapeNode, Tree};
///
/// let mut tree = Tree::new();
/// let root = tree.root();
/// for i in 0..4 {
///     let r = Rect::new(f64::from(i), 0.0, f64::from(i) + 1.0, 1.0);
///     let n = tree.create_shape(ShapeNode::new(r));
///     tree.append(root, n).unwrap();
/// }
///
/// // Remove every other child.
/// let mut cursor = tree.cursor(root).unwrap();
/// let mut keep = true;
/// while cursor.next(&tree).unwrap().is_some() {
///     if !keep {
///         cursor.remove(&mut tree).unwrap();
///     }
///     keep = !keep;
/// }
/// assert_eq!(tree.children_of(root).len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct ChildCursor {
    group: NodeId,
    next: usize,
    last: Option<usize>,
    expected: u64,
}

impl ChildCursor {
    fn children<'t>(&self, tree: &'t Tree) -> Result<&'t ChildList, TreeError> {
        let node = tree.get(self.group).ok_or(TreeError::StaleNode(self.group))?;
        let group = node.kind.group().ok_or(TreeError::NotAGroup(self.group))?;
        if group.children.modification_count() != self.expected {
            return Err(TreeError::ConcurrentModification);
        }
        Ok(&group.children)
    }

    fn resync(&mut self, tree: &Tree) {
        if let Some(g) = tree.get(self.group).and_then(|n| n.kind.group()) {
            self.expected = g.children.modification_count();
        }
    }

    /// The container being iterated.
    pub fn group(&self) -> NodeId {
        self.group
    }

    /// Advance and return the next child.
    pub fn next(&mut self, tree: &Tree) -> Result<Option<NodeId>, TreeError> {
        let children = self.children(tree)?;
        let Some(child) = children.get(self.next) else {
            self.last = None;
            return Ok(None);
        };
        self.last = Some(self.next);
        self.next += 1;
        Ok(Some(child))
    }

    /// Remove the child most recently returned by [`ChildCursor::next`].
    pub fn remove(&mut self, tree: &mut Tree) -> Result<NodeId, TreeError> {
        self.children(tree)?;
        let index = self
            .last
            .take()
            .ok_or(TreeError::InvalidArgument("cursor has no current child"))?;
        let removed = tree.remove_at(self.group, index)?;
        self.next = index;
        self.resync(tree);
        Ok(removed)
    }

    /// Replace the child most recently returned by [`ChildCursor::next`].
    pub fn replace(&mut self, tree: &mut Tree, child: NodeId) -> Result<NodeId, TreeError> {
        self.children(tree)?;
        let index = self
            .last
            .ok_or(TreeError::InvalidArgument("cursor has no current child"))?;
        let old = tree.replace(self.group, index, child)?;
        self.reposition(tree, child);
        Ok(old)
    }

    /// Insert `child` before the next child; it is not visited by this cursor.
    pub fn insert(&mut self, tree: &mut Tree, child: NodeId) -> Result<(), TreeError> {
        self.children(tree)?;
        tree.insert(self.group, self.next, child)?;
        self.last = None;
        self.reposition(tree, child);
        Ok(())
    }

    // A child moved within the same container shifts indices; re-anchor on it.
    fn reposition(&mut self, tree: &Tree, child: NodeId) {
        if let Some(index) = tree
            .get(self.group)
            .and_then(|n| n.kind.group())
            .and_then(|g| g.children.index_of(child))
        {
            self.next = index + 1;
            if self.last.is_some() {
                self.last = Some(index);
            }
        }
        self.resync(tree);
    }
}

impl Tree {
    /// Start a fail-fast cursor over `group`'s children.
    pub fn cursor(&self, group: NodeId) -> Result<ChildCursor, TreeError> {
        let node = self.get(group).ok_or(TreeError::StaleNode(group))?;
        let list = node.kind.group().ok_or(TreeError::NotAGroup(group))?;
        Ok(ChildCursor {
            group,
            next: 0,
            last: None,
            expected: list.children.modification_count(),
        })
    }

    /// Create a detached canvas node.
    pub fn create_canvas(&mut self, canvas: CanvasNode) -> NodeId {
        self.create(NodeKind::Canvas(canvas))
    }

    /// Change a canvas node's viewing transform.
    pub fn set_view_transform(&mut self, id: NodeId, view: Affine) {
        if let Some(n) = self.get(id)
            && let NodeKind::Canvas(c) = &n.kind
            && c.view_transform != view
        {
            self.update_node(id, |n| {
                if let NodeKind::Canvas(c) = &mut n.kind {
                    c.view_transform = view;
                }
                n.update_inverse();
            });
        }
    }

    /// Change a canvas node's background paint.
    pub fn set_background(&mut self, id: NodeId, background: Option<Brush>) {
        if let Some(n) = self.get(id)
            && matches!(n.kind, NodeKind::Canvas(_))
        {
            self.update_node(id, |n| {
                if let NodeKind::Canvas(c) = &mut n.kind {
                    c.background = background;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawOp, RecordingCanvas};
    use crate::render::ClipRegion;
    use crate::shape::ShapeNode;
    use peniko::Color;

    fn rect_node(tree: &mut Tree, r: Rect) -> NodeId {
        tree.create_shape(ShapeNode::new(r))
    }

    #[test]
    fn cursor_detects_outside_edits() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = rect_node(&mut tree, Rect::new(0.0, 0.0, 1.0, 1.0));
        let b = rect_node(&mut tree, Rect::new(0.0, 0.0, 1.0, 1.0));
        tree.append(root, a).unwrap();
        let mut cursor = tree.cursor(root).unwrap();
        assert_eq!(cursor.next(&tree), Ok(Some(a)));
        tree.append(root, b).unwrap();
        assert_eq!(cursor.next(&tree), Err(TreeError::ConcurrentModification));
    }

    #[test]
    fn cursor_edits_keep_it_valid() {
        let mut tree = Tree::new();
        let root = tree.root();
        let ids: Vec<NodeId> = (0..3)
            .map(|i| {
                let x = f64::from(i);
                let n = rect_node(&mut tree, Rect::new(x, 0.0, x + 1.0, 1.0));
                tree.append(root, n).unwrap();
                n
            })
            .collect();
        let extra = rect_node(&mut tree, Rect::new(9.0, 9.0, 10.0, 10.0));
        let replacement = rect_node(&mut tree, Rect::new(5.0, 5.0, 6.0, 6.0));

        let mut cursor = tree.cursor(root).unwrap();
        assert_eq!(cursor.next(&tree).unwrap(), Some(ids[0]));
        cursor.insert(&mut tree, extra).unwrap();
        assert_eq!(cursor.next(&tree).unwrap(), Some(ids[1]));
        assert_eq!(cursor.replace(&mut tree, replacement).unwrap(), ids[1]);
        assert_eq!(cursor.next(&tree).unwrap(), Some(ids[2]));
        assert_eq!(cursor.next(&tree).unwrap(), None);
        assert_eq!(
            tree.children_of(root),
            &[ids[0], extra, replacement, ids[2]],
            "cursor edits applied in place"
        );
        assert_eq!(tree.parent_of(ids[1]), None, "replaced child detached");
    }

    #[test]
    fn child_list_counts_modifications() {
        let mut list = ChildList::default();
        let a = NodeId::new(1, 1);
        let b = NodeId::new(2, 1);
        list.insert(0, a);
        list.insert(0, b);
        assert_eq!(list.as_slice(), &[b, a]);
        assert_eq!(list.replace(1, b), a);
        assert_eq!(list.remove(0), b);
        assert_eq!(list.modification_count(), 4);
        assert_eq!(list.index_of(b), Some(0));
    }

    #[test]
    fn child_list_grows_in_order() {
        let mut list = ChildList::default();
        let ids: alloc::vec::Vec<NodeId> = (0..100).map(|i| NodeId::new(i, 1)).collect();
        for (i, &id) in ids.iter().enumerate() {
            list.insert(i, id);
        }
        assert_eq!(list.as_slice(), ids.as_slice());
        assert_eq!(list.modification_count(), 100);
    }

    #[test]
    fn canvas_view_transform_applies_to_children() {
        let mut tree = Tree::new();
        let c = tree.create_canvas(CanvasNode::new(Affine::scale(2.0)));
        let child = rect_node(&mut tree, Rect::new(0.0, 0.0, 5.0, 5.0));
        tree.append(tree.root(), c).unwrap();
        tree.append(c, child).unwrap();
        assert_eq!(
            tree.transformed_bounds(c, Affine::IDENTITY),
            Some(Rect::new(0.0, 0.0, 10.0, 10.0))
        );
        tree.set_view_transform(c, Affine::scale(3.0));
        assert_eq!(tree.bounds(tree.root()), Some(Rect::new(0.0, 0.0, 15.0, 15.0)));
        assert_eq!(tree.global_transform(child), Some(Affine::scale(3.0)));
    }

    #[test]
    fn canvas_background_fills_clip() {
        let mut tree = Tree::new();
        let brush = Brush::Solid(Color::from_rgba8(255, 255, 255, 255));
        let c = tree.create_canvas(CanvasNode::new(Affine::IDENTITY).with_background(brush));
        let child = rect_node(&mut tree, Rect::new(0.0, 0.0, 5.0, 5.0));
        tree.append(c, child).unwrap();
        tree.set_clip(c, Some(ClipRegion::new(Rect::new(0.0, 0.0, 50.0, 50.0))));
        let mut canvas = RecordingCanvas::new();
        tree.paint(c, &mut canvas);
        let fills: Vec<_> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Fill { shape, .. } => Some(kurbo::Shape::bounding_box(shape)),
                _ => None,
            })
            .collect();
        assert_eq!(fills.len(), 2, "background plus child: {fills:?}");
        assert_eq!(fills[0], Rect::new(0.0, 0.0, 50.0, 50.0), "background first");
    }
}
