// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Image leaves: externally drawn images and owned rasters.

use alloc::sync::Arc;
use core::fmt;

use kurbo::{Affine, BezPath, Rect, Shape as _};

use crate::canvas::{Canvas, Raster};
use crate::node::{Cancelled, Cx, KindOps, Node, NodeKind};
use crate::tree::Tree;
use crate::types::NodeId;

/// An image drawn by someone else, such as a decoded bitmap or an embedded document.
pub trait ImageSource: fmt::Debug + Send + Sync {
    /// Extent of the image in the node's local space.
    fn bounds(&self) -> Option<Rect>;

    /// Draw the image.
    fn paint(&self, canvas: &mut dyn Canvas);
}

/// A leaf delegating to an [`ImageSource`].
#[derive(Clone, Debug, Default)]
pub struct ImageNode {
    source: Option<Arc<dyn ImageSource>>,
}

impl ImageNode {
    /// A node drawing `source`.
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// The image source, if set.
    pub fn source(&self) -> Option<&Arc<dyn ImageSource>> {
        self.source.as_ref()
    }
}

impl KindOps for ImageNode {
    fn primitive_bounds(&self, _cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        Ok(self.source.as_ref().and_then(|s| s.bounds()))
    }

    fn geometry_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        cx.tree.cached_primitive_bounds(cx, node)
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        cx.check()?;
        if let Some(source) = &self.source {
            source.paint(canvas);
        }
        Ok(())
    }

    fn outline(&self, cx: Cx<'_>, node: &Node) -> Option<BezPath> {
        let r = cx.tree.cached_primitive_bounds(cx, node).ok().flatten()?;
        Some(r.to_path(0.1))
    }
}

/// Owned pixels stretched over a rectangle.
///
/// Without explicit bounds the raster covers its pixel rectangle at the origin.
#[derive(Clone, Debug)]
pub struct RasterNode {
    raster: Arc<Raster>,
    bounds: Option<Rect>,
}

impl RasterNode {
    /// A node drawing `raster` at its pixel size.
    pub fn new(raster: impl Into<Arc<Raster>>) -> Self {
        Self {
            raster: raster.into(),
            bounds: None,
        }
    }

    /// Builder-style destination rectangle.
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// The pixels.
    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }

    /// Destination rectangle in local space.
    pub fn image_bounds(&self) -> Rect {
        self.bounds.unwrap_or_else(|| self.raster.rect())
    }

    /// Mapping from pixel space to local space.
    pub fn pixel_transform(&self) -> Affine {
        let b = self.image_bounds();
        let (w, h) = (self.raster.width(), self.raster.height());
        if w == 0 || h == 0 {
            return Affine::translate(b.origin().to_vec2());
        }
        Affine::translate(b.origin().to_vec2())
            * Affine::scale_non_uniform(b.width() / f64::from(w), b.height() / f64::from(h))
    }
}

impl KindOps for RasterNode {
    fn primitive_bounds(&self, _cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        let b = self.image_bounds();
        Ok((b.area() != 0.0).then_some(b))
    }

    fn geometry_bounds(&self, cx: Cx<'_>, node: &Node) -> Result<Option<Rect>, Cancelled> {
        cx.tree.cached_primitive_bounds(cx, node)
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        cx.check()?;
        if self.raster.width() > 0 && self.raster.height() > 0 {
            canvas.draw_raster(&self.raster, self.pixel_transform());
        }
        Ok(())
    }

    fn outline(&self, _cx: Cx<'_>, _node: &Node) -> Option<BezPath> {
        Some(self.image_bounds().to_path(0.1))
    }
}

impl Tree {
    /// Create a detached image node.
    pub fn create_image(&mut self, image: ImageNode) -> NodeId {
        self.create(NodeKind::Image(image))
    }

    /// Create a detached raster node.
    pub fn create_raster(&mut self, raster: RasterNode) -> NodeId {
        self.create(NodeKind::Raster(raster))
    }

    /// Replace an image node's source.
    pub fn set_image_source(&mut self, id: NodeId, source: Option<Arc<dyn ImageSource>>) {
        if !matches!(self.kind(id), Some(NodeKind::Image(_))) {
            return;
        }
        self.update_node(id, |n| {
            if let NodeKind::Image(i) = &mut n.kind {
                i.source = source;
            }
        });
    }

    /// Change where a raster node is drawn; `None` uses the pixel rectangle.
    pub fn set_raster_bounds(&mut self, id: NodeId, bounds: Option<Rect>) {
        let Some(NodeKind::Raster(r)) = self.kind(id) else {
            return;
        };
        if r.bounds == bounds {
            return;
        }
        self.update_node(id, |n| {
            if let NodeKind::Raster(r) = &mut n.kind {
                r.bounds = bounds;
            }
        });
    }
}
