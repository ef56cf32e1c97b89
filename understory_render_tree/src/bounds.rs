// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds queries.
//!
//! Each node caches four rectangles in its local space:
//!
//! - primitive bounds: what the node's own content paints, strokes included;
//! - geometry bounds: the fill area, strokes excluded;
//! - sensitive bounds: what pointer hit testing considers;
//! - bounds: primitive bounds replaced by the filter region, if any, then
//!   intersected with the clip and mask extents.
//!
//! The `transformed_*` variants compose a caller-supplied transform with the
//! node's own and are not cached. All queries return `None` for empty content,
//! stale ids, and traversals abandoned through the tree's [`CancelToken`].
//!
//! [`CancelToken`]: crate::CancelToken

use kurbo::{Affine, Rect};

use crate::geom::{normalize_rect, overlap, transform_rect_bbox};
use crate::node::{Cancelled, Cx, Node};
use crate::tree::Tree;
use crate::types::NodeId;

impl Tree {
    /// Rendered extent in local space after filter, clip, and mask.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        let cx = self.cx();
        let node = self.get(id)?;
        self.cached_bounds(cx, node).ok().flatten()
    }

    /// Extent of the node's own painting in local space.
    pub fn primitive_bounds(&self, id: NodeId) -> Option<Rect> {
        let cx = self.cx();
        let node = self.get(id)?;
        self.cached_primitive_bounds(cx, node).ok().flatten()
    }

    /// Fill-only extent in local space.
    pub fn geometry_bounds(&self, id: NodeId) -> Option<Rect> {
        let cx = self.cx();
        let node = self.get(id)?;
        self.cached_geometry_bounds(cx, node).ok().flatten()
    }

    /// Hit-testing extent in local space.
    pub fn sensitive_bounds(&self, id: NodeId) -> Option<Rect> {
        let cx = self.cx();
        let node = self.get(id)?;
        self.cached_sensitive_bounds(cx, node).ok().flatten()
    }

    /// [`Tree::bounds`] mapped through `transform` composed with the node's own transform.
    pub fn transformed_bounds(&self, id: NodeId, transform: Affine) -> Option<Rect> {
        self.transformed_bounds_in(self.cx(), id, transform)
            .ok()
            .flatten()
    }

    /// [`Tree::primitive_bounds`] mapped through `transform` and the node's transform.
    pub fn transformed_primitive_bounds(&self, id: NodeId, transform: Affine) -> Option<Rect> {
        let cx = self.cx();
        let node = self.get(id)?;
        let t = transform * node.effective_transform();
        node.kind
            .ops()
            .transformed_primitive_bounds(cx, node, t)
            .ok()
            .flatten()
    }

    /// [`Tree::geometry_bounds`] mapped through `transform` and the node's transform.
    pub fn transformed_geometry_bounds(&self, id: NodeId, transform: Affine) -> Option<Rect> {
        self.transformed_geometry_bounds_in(self.cx(), id, transform)
            .ok()
            .flatten()
    }

    /// [`Tree::sensitive_bounds`] mapped through `transform` and the node's transform.
    pub fn transformed_sensitive_bounds(&self, id: NodeId, transform: Affine) -> Option<Rect> {
        self.transformed_sensitive_bounds_in(self.cx(), id, transform)
            .ok()
            .flatten()
    }

    /// Whether the node's bounds, mapped into its parent's space, overlap `rect`.
    pub fn intersects(&self, id: NodeId, rect: Rect) -> bool {
        self.transformed_bounds(id, Affine::IDENTITY)
            .is_some_and(|b| overlap(b, rect).is_some())
    }

    pub(crate) fn cached_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        node.cache.bounds.get_or_compute(|| {
            let base = match &node.filter {
                Some(filter) => Some(filter.bounds()),
                None => self.cached_primitive_bounds(cx, node)?,
            };
            let Some(mut rect) = base else {
                return Ok(None);
            };
            if let Some(clip) = &node.clip {
                let Some(r) = overlap(rect, clip.bounds()) else {
                    return Ok(None);
                };
                rect = r;
            }
            if let Some(mask) = &node.mask {
                let Some(r) = overlap(rect, mask.bounds()) else {
                    return Ok(None);
                };
                rect = r;
            }
            cx.check()?;
            Ok(Some(self.normalized(node, rect)))
        })
    }

    pub(crate) fn cached_primitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
    ) -> Result<Option<Rect>, Cancelled> {
        node.cache
            .primitive
            .get_or_compute(|| node.kind.ops().primitive_bounds(cx, node))
    }

    pub(crate) fn cached_geometry_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
    ) -> Result<Option<Rect>, Cancelled> {
        node.cache
            .geometry
            .get_or_compute(|| node.kind.ops().geometry_bounds(cx, node))
    }

    pub(crate) fn cached_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
    ) -> Result<Option<Rect>, Cancelled> {
        node.cache
            .sensitive
            .get_or_compute(|| node.kind.ops().sensitive_bounds(cx, node))
    }

    pub(crate) fn transformed_bounds_in(
        &self,
        cx: Cx<'_>,
        id: NodeId,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        let t = transform * node.effective_transform();
        let base = match &node.filter {
            Some(filter) => Some(transform_rect_bbox(t, filter.bounds())),
            None => node.kind.ops().transformed_primitive_bounds(cx, node, t)?,
        };
        let Some(mut rect) = base else {
            return Ok(None);
        };
        if let Some(clip) = &node.clip {
            let Some(r) = overlap(rect, transform_rect_bbox(t, clip.bounds())) else {
                return Ok(None);
            };
            rect = r;
        }
        if let Some(mask) = &node.mask {
            let Some(r) = overlap(rect, transform_rect_bbox(t, mask.bounds())) else {
                return Ok(None);
            };
            rect = r;
        }
        Ok(Some(rect))
    }

    pub(crate) fn transformed_geometry_bounds_in(
        &self,
        cx: Cx<'_>,
        id: NodeId,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        let t = transform * node.effective_transform();
        node.kind.ops().transformed_geometry_bounds(cx, node, t)
    }

    pub(crate) fn transformed_sensitive_bounds_in(
        &self,
        cx: Cx<'_>,
        id: NodeId,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        let t = transform * node.effective_transform();
        node.kind.ops().transformed_sensitive_bounds(cx, node, t)
    }

    /// Pad degenerate rectangles so they survive device-space rounding.
    ///
    /// The padding depends on the global transform, so transform changes and
    /// reparenting invalidate the whole moved subtree.
    pub(crate) fn normalized(&self, node: &Node, rect: Rect) -> Rect {
        normalize_rect(rect, self.global_of(node), self.config().epsilon)
    }

    fn global_of(&self, node: &Node) -> Affine {
        let mut global = node.effective_transform();
        let mut cur = node;
        while let Some(parent) = cur.parent.and_then(|p| self.get(p)) {
            global = parent.effective_transform() * global;
            cur = parent;
        }
        global
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use kurbo::{Circle, Shape as _};

    use super::*;
    use crate::canvas::Canvas;
    use crate::render::{ClipRegion, Filter, Mask, Renderable};
    use crate::shape::ShapeNode;

    #[derive(Debug)]
    struct Region(Rect);

    impl Filter for Region {
        fn bounds(&self) -> Rect {
            self.0
        }

        fn render(&self, source: &dyn Renderable, canvas: &mut dyn Canvas) {
            source.render(canvas);
        }
    }

    impl Mask for Region {
        fn bounds(&self) -> Rect {
            self.0
        }

        fn render(&self, source: &dyn Renderable, canvas: &mut dyn Canvas) {
            source.render(canvas);
        }
    }

    fn shape(tree: &mut Tree, r: Rect) -> NodeId {
        tree.create_shape(ShapeNode::new(r))
    }

    #[test]
    fn group_bounds_union_children() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.append(root, a).unwrap();
        tree.append(root, b).unwrap();
        tree.set_transform(b, Some(Affine::translate((20.0, 5.0))));
        assert_eq!(tree.bounds(root), Some(Rect::new(0.0, 0.0, 30.0, 15.0)));
        assert_eq!(tree.bounds(b), Some(Rect::new(0.0, 0.0, 10.0, 10.0)), "local space");
    }

    #[test]
    fn changes_propagate_to_ancestors() {
        let mut tree = Tree::new();
        let root = tree.root();
        let g = tree.create_group();
        let a = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.append(root, g).unwrap();
        tree.append(g, a).unwrap();
        assert_eq!(tree.bounds(root), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        tree.set_transform(a, Some(Affine::scale(2.0)));
        assert_eq!(tree.bounds(root), Some(Rect::new(0.0, 0.0, 20.0, 20.0)));
        tree.set_shape(a, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(tree.bounds(g), Some(Rect::new(0.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn repeated_queries_agree() {
        let mut tree = Tree::new();
        let a = tree.create_shape(ShapeNode::new(Circle::new((5.0, 5.0), 5.0)));
        tree.append(tree.root(), a).unwrap();
        let first = tree.bounds(tree.root());
        assert_eq!(first, tree.bounds(tree.root()));
        assert_eq!(first, tree.transformed_bounds(tree.root(), Affine::IDENTITY));
    }

    #[test]
    fn filter_replaces_and_clip_mask_narrow() {
        let mut tree = Tree::new();
        let a = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.append(tree.root(), a).unwrap();

        tree.set_filter(a, Some(Arc::new(Region(Rect::new(-5.0, -5.0, 15.0, 15.0)))));
        assert_eq!(tree.bounds(a), Some(Rect::new(-5.0, -5.0, 15.0, 15.0)));
        assert_eq!(tree.primitive_bounds(a), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));

        tree.set_clip(a, Some(ClipRegion::new(Rect::new(0.0, 0.0, 12.0, 3.0))));
        assert_eq!(tree.bounds(a), Some(Rect::new(0.0, 0.0, 12.0, 3.0)));

        tree.set_mask(a, Some(Arc::new(Region(Rect::new(2.0, 1.0, 4.0, 2.0)))));
        assert_eq!(tree.bounds(a), Some(Rect::new(2.0, 1.0, 4.0, 2.0)));

        tree.set_mask(a, Some(Arc::new(Region(Rect::new(50.0, 50.0, 60.0, 60.0)))));
        assert_eq!(tree.bounds(a), None, "disjoint mask leaves nothing");
        assert_eq!(tree.bounds(tree.root()), None);
    }

    #[test]
    fn bounds_contain_transformed_children() {
        let mut tree = Tree::new();
        let root = tree.root();
        let g = tree.create_group();
        tree.append(root, g).unwrap();
        tree.set_transform(g, Some(Affine::rotate(0.3).then_translate((4.0, 2.0).into())));
        let mut kids = alloc::vec::Vec::new();
        for i in 0..5 {
            let x = f64::from(i) * 7.0;
            let c = tree.create_shape(ShapeNode::new(Circle::new((x, 3.0), 2.0)));
            tree.set_transform(c, Some(Affine::skew(0.2, 0.0)));
            tree.append(g, c).unwrap();
            kids.push(c);
        }
        let outer = tree.bounds(root).unwrap();
        let parent = tree.global_transform(g).unwrap();
        for c in kids {
            let inner = tree.transformed_bounds(c, parent).unwrap();
            assert!(
                outer.inflate(1e-9, 1e-9).contains_rect(inner),
                "{inner:?} not inside {outer:?}"
            );
        }
    }

    #[test]
    fn sheared_query_does_not_use_cached_box() {
        let mut tree = Tree::new();
        let root = tree.root();
        let c = tree.create_shape(ShapeNode::new(Circle::new((0.0, 0.0), 10.0)));
        tree.append(root, c).unwrap();
        let rot = Affine::rotate(core::f64::consts::FRAC_PI_4);
        let tight = tree.transformed_bounds(root, rot).unwrap();
        let loose = transform_rect_bbox(rot, tree.bounds(root).unwrap());
        assert!(tight.width() < loose.width() - 1.0, "{tight:?} vs {loose:?}");
        let circle_box = Circle::new((0.0, 0.0), 10.0).bounding_box();
        assert!((tight.width() - circle_box.width()).abs() < 0.5);
    }

    #[test]
    fn degenerate_line_gets_padded() {
        let mut tree = Tree::new();
        let a = shape(&mut tree, Rect::new(3.0, 0.0, 3.0, 5.0));
        tree.append(tree.root(), a).unwrap();
        let b = tree.bounds(a).unwrap();
        assert!(b.width() > 0.0, "zero width padded: {b:?}");
        assert_eq!((b.x0, b.y0, b.height()), (3.0, 0.0, 5.0));
    }

    #[test]
    fn padding_follows_ancestor_transforms() {
        let mut tree = Tree::new();
        let eps = tree.config().epsilon;
        let g = tree.create_group();
        tree.append(tree.root(), g).unwrap();
        let a = shape(&mut tree, Rect::new(3.0, 3.0, 3.0, 3.0));
        tree.append(g, a).unwrap();
        let close = |r: Rect, w: f64| (r.width() - w).abs() < 1e-12 && (r.height() - w).abs() < 1e-12;
        assert!(close(tree.bounds(a).unwrap(), eps));

        tree.set_transform(g, Some(Affine::scale(4.0)));
        assert!(close(tree.bounds(a).unwrap(), eps / 4.0), "{:?}", tree.bounds(a));

        let h = tree.create_group();
        tree.append(tree.root(), h).unwrap();
        tree.set_transform(h, Some(Affine::scale(2.0)));
        tree.append(h, a).unwrap();
        assert!(close(tree.bounds(a).unwrap(), eps / 2.0), "{:?}", tree.bounds(a));
    }

    #[test]
    fn cancelled_query_returns_none_and_recovers() {
        let mut tree = Tree::new();
        let a = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.append(tree.root(), a).unwrap();
        let token = tree.cancel_token();
        token.cancel();
        assert_eq!(tree.bounds(tree.root()), None, "cancelled");
        token.reset();
        assert_eq!(
            tree.bounds(tree.root()),
            Some(Rect::new(0.0, 0.0, 10.0, 10.0)),
            "cache not poisoned by cancellation"
        );
    }

    #[test]
    fn intersects_uses_bounds() {
        let mut tree = Tree::new();
        let a = shape(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(tree.intersects(a, Rect::new(5.0, 5.0, 20.0, 20.0)));
        assert!(!tree.intersects(a, Rect::new(11.0, 0.0, 20.0, 20.0)));
    }
}
