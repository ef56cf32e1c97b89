// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderables: bounded image sources that can be chained into effects.
//!
//! Filters, masks, and antialiased clips all consume an upstream
//! [`Renderable`] and are themselves renderable. When a node needs any of them
//! the paint pipeline assembles a chain `node -> filter -> mask -> clip` and
//! renders the outermost stage into an intermediate layer.

use core::fmt;

use kurbo::Rect;

use crate::canvas::{Canvas, ClipShape};
use crate::geom::overlap;
use crate::tree::Tree;
use crate::types::NodeId;

/// Something that can draw itself into a canvas over bounded extent.
pub trait Renderable {
    /// Extent of the output in the current user space, or `None` when nothing is drawn.
    fn bounds(&self) -> Option<Rect>;
    /// Draw into `canvas` using its current state.
    fn render(&self, canvas: &mut dyn Canvas);
    /// Visit the renderables this one reads from.
    fn visit_sources(&self, visit: &mut dyn FnMut(&dyn Renderable)) {
        let _ = visit;
    }
}

/// An image filter graph attached to a node.
///
/// A filter replaces the node's ordinary painting: its declared bounds
/// substitute for the node's primitive bounds, and painting the node renders
/// the filter with the node's own drawing as its source.
pub trait Filter: fmt::Debug + Send + Sync {
    /// Output extent in the node's local space.
    fn bounds(&self) -> Rect;
    /// Render the filter output, reading the node's drawing from `source`.
    fn render(&self, source: &dyn Renderable, canvas: &mut dyn Canvas);
}

/// A mask attached to a node.
pub trait Mask: fmt::Debug + Send + Sync {
    /// Extent of the mask in the node's local space.
    fn bounds(&self) -> Rect;
    /// Render `source` modulated by the mask.
    fn render(&self, source: &dyn Renderable, canvas: &mut dyn Canvas);
}

/// A node's clip: geometry plus whether its edge should be antialiased.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipRegion {
    /// Clip geometry in the node's local space.
    pub shape: ClipShape,
    /// Request a soft clip edge. Only honored for rotated or non-rectangular clips.
    pub antialias: bool,
}

impl ClipRegion {
    /// A hard-edged clip.
    pub fn new(shape: impl Into<ClipShape>) -> Self {
        Self {
            shape: shape.into(),
            antialias: false,
        }
    }

    /// A clip that asks for an antialiased edge.
    pub fn antialiased(shape: impl Into<ClipShape>) -> Self {
        Self {
            shape: shape.into(),
            antialias: true,
        }
    }

    /// Bounding box of the clip geometry.
    pub fn bounds(&self) -> Rect {
        self.shape.bounding_box()
    }
}

/// A node presented as a [`Renderable`].
#[derive(Clone, Copy)]
pub struct NodeRenderable<'a> {
    tree: &'a Tree,
    node: NodeId,
    primitive: bool,
}

impl fmt::Debug for NodeRenderable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRenderable")
            .field("node", &self.node)
            .field("primitive", &self.primitive)
            .finish_non_exhaustive()
    }
}

impl<'a> NodeRenderable<'a> {
    /// Renders only the node's own content (no clip, mask, filter, or composite).
    pub fn primitive(tree: &'a Tree, node: NodeId) -> Self {
        Self {
            tree,
            node,
            primitive: true,
        }
    }

    /// Renders the node through its full paint pipeline.
    pub fn full(tree: &'a Tree, node: NodeId) -> Self {
        Self {
            tree,
            node,
            primitive: false,
        }
    }

    /// The wrapped node.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Renderable for NodeRenderable<'_> {
    fn bounds(&self) -> Option<Rect> {
        if self.primitive {
            self.tree.primitive_bounds(self.node)
        } else {
            self.tree.bounds(self.node)
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        if self.primitive {
            self.tree.primitive_paint(self.node, canvas);
        } else {
            self.tree.paint(self.node, canvas);
        }
    }
}

pub(crate) struct FilterStage<'a> {
    pub(crate) filter: &'a dyn Filter,
    pub(crate) source: &'a dyn Renderable,
}

impl Renderable for FilterStage<'_> {
    fn bounds(&self) -> Option<Rect> {
        Some(self.filter.bounds())
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        self.filter.render(self.source, canvas);
    }

    fn visit_sources(&self, visit: &mut dyn FnMut(&dyn Renderable)) {
        visit(self.source);
    }
}

pub(crate) struct MaskStage<'a> {
    pub(crate) mask: &'a dyn Mask,
    pub(crate) source: &'a dyn Renderable,
}

impl Renderable for MaskStage<'_> {
    fn bounds(&self) -> Option<Rect> {
        overlap(self.source.bounds()?, self.mask.bounds())
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        self.mask.render(self.source, canvas);
    }

    fn visit_sources(&self, visit: &mut dyn FnMut(&dyn Renderable)) {
        visit(self.source);
    }
}

/// Soft-edged clip applied to an upstream renderable.
pub(crate) struct ClipStage<'a> {
    pub(crate) clip: &'a ClipRegion,
    pub(crate) source: &'a dyn Renderable,
}

impl Renderable for ClipStage<'_> {
    fn bounds(&self) -> Option<Rect> {
        overlap(self.source.bounds()?, self.clip.bounds())
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.save();
        canvas.clip(&self.clip.shape, true);
        self.source.render(canvas);
        canvas.restore();
    }

    fn visit_sources(&self, visit: &mut dyn FnMut(&dyn Renderable)) {
        visit(self.source);
    }
}

/// Number of stages in a chain, counting `renderable` itself.
pub(crate) fn chain_depth(renderable: &dyn Renderable) -> usize {
    let mut deepest = 0;
    renderable.visit_sources(&mut |source| deepest = deepest.max(chain_depth(source)));
    deepest + 1
}
