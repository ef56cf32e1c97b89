// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node storage and the kind dispatch table.

use alloc::sync::Arc;
use core::cell::{Cell, RefCell};
use core::fmt;

use kurbo::{Affine, BezPath, Point, Rect};
use smallvec::SmallVec;

use crate::cancel::CancelToken;
use crate::canvas::Canvas;
use crate::geom::{inverse_or_self, transformed_rect};
use crate::group::{CanvasNode, GroupNode};
use crate::image::{ImageNode, RasterNode};
use crate::proxy::ProxyNode;
use crate::render::{ClipRegion, Filter, Mask};
use crate::shape::ShapeNode;
use crate::text::TextNode;
use crate::tree::Tree;
use crate::types::{Composite, NodeId, PointerEvents, RenderingHints};

/// The variant-specific part of a node.
#[derive(Debug)]
pub enum NodeKind {
    /// Ordered container of children.
    Group(GroupNode),
    /// Container with a viewing transform and an optional background.
    Canvas(CanvasNode),
    /// Geometry drawn by a painter.
    Shape(ShapeNode),
    /// Text drawn by a layout delegate.
    Text(TextNode),
    /// Image drawn by an external source.
    Image(ImageNode),
    /// Owned pixels.
    Raster(RasterNode),
    /// Stand-in that draws another node.
    Proxy(ProxyNode),
}

impl NodeKind {
    pub(crate) fn ops(&self) -> &dyn KindOps {
        match self {
            Self::Group(g) => g,
            Self::Canvas(c) => c,
            Self::Shape(s) => s,
            Self::Text(t) => t,
            Self::Image(i) => i,
            Self::Raster(r) => r,
            Self::Proxy(p) => p,
        }
    }

    /// The child list, for container kinds.
    pub(crate) fn group(&self) -> Option<&GroupNode> {
        match self {
            Self::Group(g) => Some(g),
            Self::Canvas(c) => Some(&c.group),
            _ => None,
        }
    }

    pub(crate) fn group_mut(&mut self) -> Option<&mut GroupNode> {
        match self {
            Self::Group(g) => Some(g),
            Self::Canvas(c) => Some(&mut c.group),
            _ => None,
        }
    }

    /// Short name used in logs.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Canvas(_) => "canvas",
            Self::Shape(_) => "shape",
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Raster(_) => "raster",
            Self::Proxy(_) => "proxy",
        }
    }
}

/// State of one cached rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Cached {
    /// Must be recomputed.
    Unknown,
    /// Computed, and there is nothing there.
    Empty,
    /// Computed.
    Known(Rect),
}

#[derive(Debug)]
pub(crate) struct BoundsCell(Cell<Cached>);

impl Default for BoundsCell {
    fn default() -> Self {
        Self(Cell::new(Cached::Unknown))
    }
}

impl BoundsCell {
    pub(crate) fn get(&self) -> Cached {
        self.0.get()
    }

    pub(crate) fn set(&self, value: Option<Rect>) {
        self.0.set(match value {
            Some(r) => Cached::Known(r),
            None => Cached::Empty,
        });
    }

    pub(crate) fn invalidate(&self) {
        self.0.set(Cached::Unknown);
    }

    /// Return the cached value or compute and store it.
    ///
    /// A cancelled computation leaves the cell unknown.
    pub(crate) fn get_or_compute(
        &self,
        compute: impl FnOnce() -> Result<Option<Rect>, Cancelled>,
    ) -> Result<Option<Rect>, Cancelled> {
        match self.get() {
            Cached::Known(r) => Ok(Some(r)),
            Cached::Empty => Ok(None),
            Cached::Unknown => match compute() {
                Ok(value) => {
                    self.set(value);
                    Ok(value)
                }
                Err(Cancelled) => {
                    self.invalidate();
                    Err(Cancelled)
                }
            },
        }
    }
}

/// Derived data cached on every node.
#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    pub(crate) bounds: BoundsCell,
    pub(crate) primitive: BoundsCell,
    pub(crate) geometry: BoundsCell,
    pub(crate) sensitive: BoundsCell,
    pub(crate) outline: RefCell<Option<BezPath>>,
}

impl NodeCache {
    pub(crate) fn invalidate(&self) {
        self.bounds.invalidate();
        self.primitive.invalidate();
        self.geometry.invalidate();
        self.sensitive.invalidate();
        if let Ok(mut outline) = self.outline.try_borrow_mut() {
            *outline = None;
        }
    }
}

/// A traversal was abandoned because its [`CancelToken`] fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Read-only traversal context handed to kind implementations.
#[derive(Clone, Copy)]
pub(crate) struct Cx<'a> {
    pub(crate) tree: &'a Tree,
    pub(crate) cancel: &'a CancelToken,
}

impl fmt::Debug for Cx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Cx<'_> {
    pub(crate) fn check(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Behaviour that differs between node kinds.
///
/// Bounds are in the node's local space unless a transform is supplied, in
/// which case they are in the space that transform maps into. Default methods
/// derive the transformed and sensitive variants from the plain ones.
pub(crate) trait KindOps {
    fn primitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled>;

    fn transformed_primitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        Ok(cx
            .tree
            .cached_primitive_bounds(cx, node)?
            .map(|r| transformed_rect(transform, r)))
    }

    fn geometry_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled>;

    fn transformed_geometry_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        Ok(cx
            .tree
            .cached_geometry_bounds(cx, node)?
            .map(|r| transformed_rect(transform, r)))
    }

    fn sensitive_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        cx.tree.cached_geometry_bounds(cx, node)
    }

    fn transformed_sensitive_bounds(
        &self,
        cx: Cx<'_>,
        node: &Node,
        transform: Affine,
    ) -> Result<Option<Rect>, Cancelled> {
        Ok(cx
            .tree
            .cached_sensitive_bounds(cx, node)?
            .map(|r| transformed_rect(transform, r)))
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled>;

    /// Point in local space. Leaves honor the node's pointer-events setting.
    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        node.pointer_events.accepts_visibility(node.visible)
            && matches!(cx.tree.cached_sensitive_bounds(cx, node), Ok(Some(r)) if r.contains(point))
    }

    /// Deepest descendant accepting `point` (local space), for containers.
    fn hit_child(&self, cx: Cx<'_>, node: &Node, point: Point) -> Option<NodeId> {
        let _ = (cx, node, point);
        None
    }

    fn outline(&self, cx: Cx<'_>, node: &Node) -> Option<BezPath>;

    /// Nodes whose content this node draws without owning them.
    fn referenced_nodes(&self) -> SmallVec<[NodeId; 2]> {
        SmallVec::new()
    }
}

/// One arena slot.
pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) root: Option<NodeId>,
    pub(crate) transform: Option<Affine>,
    /// Inverse of [`Node::effective_transform`].
    pub(crate) inverse: Affine,
    pub(crate) composite: Option<Composite>,
    pub(crate) visible: bool,
    pub(crate) clip: Option<ClipRegion>,
    pub(crate) hints: Option<RenderingHints>,
    pub(crate) mask: Option<Arc<dyn Mask>>,
    pub(crate) filter: Option<Arc<dyn Filter>>,
    pub(crate) pointer_events: PointerEvents,
    /// Proxies and marker painters that draw this node.
    pub(crate) dependents: SmallVec<[NodeId; 1]>,
    pub(crate) cache: NodeCache,
    pub(crate) kind: NodeKind,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind.name())
            .field("parent", &self.parent)
            .field("root", &self.root)
            .field("transform", &self.transform)
            .field("visible", &self.visible)
            .field("has_clip", &self.clip.is_some())
            .field("has_mask", &self.mask.is_some())
            .field("has_filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(generation: u32, kind: NodeKind) -> Self {
        let mut node = Self {
            generation,
            parent: None,
            root: None,
            transform: None,
            inverse: Affine::IDENTITY,
            composite: None,
            visible: true,
            clip: None,
            hints: None,
            mask: None,
            filter: None,
            pointer_events: PointerEvents::default(),
            dependents: SmallVec::new(),
            cache: NodeCache::default(),
            kind,
        };
        node.update_inverse();
        node
    }

    /// Local-to-parent transform including any kind-specific viewing transform.
    pub(crate) fn effective_transform(&self) -> Affine {
        let own = self.transform.unwrap_or(Affine::IDENTITY);
        match &self.kind {
            NodeKind::Canvas(c) => own * c.view_transform,
            _ => own,
        }
    }

    pub(crate) fn update_inverse(&mut self) {
        self.inverse = inverse_or_self(self.effective_transform());
    }

    pub(crate) fn composite_or_default(&self) -> Composite {
        self.composite.unwrap_or_default()
    }
}
