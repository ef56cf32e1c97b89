// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The paint pipeline.
//!
//! Painting a node:
//!
//! 1. skips it when its composite is a plain alpha below the configured threshold;
//! 2. applies rendering hints, the node transform, and the composite;
//! 3. intersects the hard clip, forking the canvas so the clip does not leak;
//! 4. culls against the resulting clip;
//! 5. paints directly when no intermediate layer is needed;
//! 6. otherwise chains `content -> filter -> mask -> soft clip` and renders the
//!    last stage into a layer bounded by its extent.
//!
//! Canvas state is restored on every path, including cancellation.

use kurbo::Affine;

use crate::canvas::{Canvas, CanvasScope, ClipShape};
use crate::geom::{has_shear, overlap};
use crate::node::{Cancelled, Cx};
use crate::render::{
    ClipRegion, ClipStage, FilterStage, MaskStage, NodeRenderable, Renderable, chain_depth,
};
use crate::tree::Tree;
use crate::types::{HintKey, HintValue, NodeId};

impl Tree {
    /// Paint `id` and its subtree into `canvas` using the canvas' current state as parent space.
    pub fn paint(&self, id: NodeId, canvas: &mut dyn Canvas) {
        if self.paint_in(self.cx(), id, canvas).is_err() {
            tracing::debug!(?id, "paint cancelled");
        }
    }

    /// Paint only the node's own content: no transform, clip, mask, filter, or composite.
    pub fn primitive_paint(&self, id: NodeId, canvas: &mut dyn Canvas) {
        let cx = self.cx();
        if let Some(node) = self.get(id)
            && node.kind.ops().primitive_paint(cx, node, canvas).is_err()
        {
            tracing::debug!(?id, "primitive paint cancelled");
        }
    }

    pub(crate) fn paint_in(
        &self,
        cx: Cx<'_>,
        id: NodeId,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        cx.check()?;
        let Some(node) = self.get(id) else {
            return Ok(());
        };
        let composite = node.composite_or_default();
        if composite.is_simple_alpha() && composite.alpha < self.config().alpha_threshold {
            return Ok(());
        }
        let Some(bounds) = self.cached_bounds(cx, node)? else {
            return Ok(());
        };

        let mut scope = CanvasScope::new(canvas);
        if let Some(hints) = &node.hints {
            scope.add_hints(hints);
        }
        let transform = node.effective_transform();
        if transform != Affine::IDENTITY {
            scope.concat_transform(transform);
        }
        if node.composite.is_some() {
            scope.set_composite(composite);
        }
        if let Some(clip) = &node.clip {
            scope.fork();
            scope.clip(&clip.shape, false);
        }
        if let Some(visible) = scope.clip_bounds()
            && overlap(visible, bounds).is_none()
        {
            return Ok(());
        }

        let soft_clip = node
            .clip
            .as_ref()
            .filter(|clip| is_antialiased_clip(clip, &*scope));
        let offscreen = node.filter.is_some()
            || node.mask.is_some()
            || !composite.is_src_over()
            || soft_clip.is_some();
        if !offscreen {
            return node.kind.ops().primitive_paint(cx, node, &mut *scope);
        }

        let filtered;
        let masked;
        let clipped;
        let content = NodeRenderable::primitive(self, id);
        let mut top: &dyn Renderable = &content;
        if let Some(filter) = &node.filter {
            filtered = FilterStage {
                filter: &**filter,
                source: top,
            };
            top = &filtered;
        }
        if let Some(mask) = &node.mask {
            masked = MaskStage {
                mask: &**mask,
                source: top,
            };
            top = &masked;
        }
        if let Some(clip) = soft_clip {
            clipped = ClipStage { clip, source: top };
            top = &clipped;
        }
        let Some(extent) = top.bounds() else {
            return Ok(());
        };
        tracing::trace!(?id, stages = chain_depth(top), "painting through layer");

        scope.fork();
        if soft_clip.is_some() {
            scope.reset_clip();
        }
        scope.clip(&ClipShape::Rect(extent), false);
        scope.push_layer(extent);
        top.render(&mut *scope);
        scope.pop_layer();
        cx.check()
    }
}

/// A clip needs a soft edge only when it is not a pixel-aligned rectangle and
/// the output is not a vector format.
fn is_antialiased_clip(clip: &ClipRegion, canvas: &dyn Canvas) -> bool {
    if !clip.antialias {
        return false;
    }
    let hints = canvas.rendering_hints();
    if matches!(
        hints.get(HintKey::Transcoding),
        Some(HintValue::Printing | HintValue::Vector)
    ) {
        return false;
    }
    !(clip.shape.is_rect() && !has_shear(canvas.transform()))
}
