// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing surface the tree paints into.

use alloc::sync::Arc;
use core::fmt;
use core::ops::{Deref, DerefMut};

use kurbo::{Affine, BezPath, Rect, Shape as _, Stroke, Vec2};
use peniko::{Brush, Fill};

use crate::error::TreeError;
use crate::types::{ColorModel, Composite, RenderingHints};

/// Clip geometry.
///
/// Rectangles are kept distinct from general paths because canvases clip to
/// unrotated rectangles without antialiasing artifacts.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle in the node's local space.
    Rect(Rect),
    /// Arbitrary path (nonzero winding).
    Path(BezPath),
}

impl ClipShape {
    /// Bounding box of the clip geometry.
    pub fn bounding_box(&self) -> Rect {
        match self {
            Self::Rect(r) => *r,
            Self::Path(p) => p.bounding_box(),
        }
    }

    /// The clip as a path.
    pub fn to_path(&self) -> BezPath {
        match self {
            Self::Rect(r) => r.to_path(0.1),
            Self::Path(p) => p.clone(),
        }
    }

    /// Returns true for [`ClipShape::Rect`].
    pub fn is_rect(&self) -> bool {
        matches!(self, Self::Rect(_))
    }
}

impl From<Rect> for ClipShape {
    fn from(r: Rect) -> Self {
        Self::Rect(r)
    }
}

impl From<BezPath> for ClipShape {
    fn from(p: BezPath) -> Self {
        Self::Path(p)
    }
}

/// Premultiplied RGBA8 pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Wrap pixel data; `data` must hold `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Result<Self, TreeError> {
        let data = data.into();
        if data.len() != width as usize * height as usize * 4 {
            return Err(TreeError::InvalidArgument(
                "raster data length does not match its size",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent raster.
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: alloc::vec![0_u8; len].into(),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel bytes, row major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel-space rectangle covered by this raster.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// One rasterized piece of a pattern tile.
#[derive(Clone, Debug)]
pub struct TileChunk {
    /// Pixel offset of this chunk inside the tile.
    pub offset: (u32, u32),
    /// The chunk's pixels.
    pub raster: Arc<Raster>,
}

/// A rasterized pattern tile ready to be repeated over a region.
#[derive(Clone, Debug)]
pub struct PatternFill<'a> {
    /// Chunks making up the tile; a small tile is a single chunk at `(0, 0)`.
    pub chunks: &'a [TileChunk],
    /// Size of the whole tile raster in pixels.
    pub tile_size: (u32, u32),
    /// Maps tile pixel space to device space.
    pub tile_to_device: Affine,
    /// Device-space step vectors between neighbouring tiles.
    pub lattice: [Vec2; 2],
}

/// An immediate-mode 2D drawing surface.
///
/// The tree drives a canvas through this trait and never inspects pixels.
/// State (transform, composite, hints, clip) is saved and restored as a unit
/// by [`Canvas::save`]/[`Canvas::restore`].
pub trait Canvas {
    /// Current user-to-device transform.
    fn transform(&self) -> Affine;
    /// Replace the user-to-device transform.
    fn set_transform(&mut self, transform: Affine);
    /// Composite applied to subsequent drawing.
    fn composite(&self) -> Composite;
    /// Replace the composite.
    fn set_composite(&mut self, composite: Composite);
    /// Current rendering hints.
    fn rendering_hints(&self) -> RenderingHints;
    /// Replace the rendering hints.
    fn set_rendering_hints(&mut self, hints: RenderingHints);
    /// Intersect the clip with `shape`, given in user space.
    fn clip(&mut self, shape: &ClipShape, antialias: bool);
    /// Remove any clip.
    fn reset_clip(&mut self);
    /// Bounds of the current clip in user space; `None` when unclipped.
    ///
    /// An empty clip is reported as a rectangle whose `x0` exceeds its `x1`.
    fn clip_bounds(&self) -> Option<Rect>;
    /// Push the complete graphics state.
    fn save(&mut self);
    /// Pop the graphics state pushed by the matching [`Canvas::save`].
    fn restore(&mut self);
    /// Fill a path.
    fn fill(&mut self, shape: &BezPath, rule: Fill, brush: &Brush);
    /// Stroke a path.
    fn stroke(&mut self, shape: &BezPath, style: &Stroke, brush: &Brush);
    /// Draw a raster whose pixel space maps to user space through `transform`.
    ///
    /// Pre-rendered device images are drawn with the canvas transform set to identity.
    fn draw_raster(&mut self, raster: &Raster, transform: Affine);
    /// Fill a path by repeating a rasterized tile.
    fn fill_pattern(&mut self, shape: &BezPath, pattern: &PatternFill<'_>);
    /// Begin an intermediate layer covering `bounds` (user space).
    ///
    /// Drawing until the matching [`Canvas::pop_layer`] lands in a fresh
    /// buffer that is composited down, with the composite active at push
    /// time, when the layer is popped.
    fn push_layer(&mut self, bounds: Rect);
    /// Composite the innermost layer down.
    fn pop_layer(&mut self);
    /// Color space of the canvas' pixels.
    fn color_model(&self) -> ColorModel {
        ColorModel::Srgb
    }
    /// Render `draw` into a new `width` x `height` raster compatible with this canvas.
    ///
    /// The canvas handed to `draw` starts with an identity transform. Returns
    /// `None` when the canvas cannot create offscreen surfaces.
    fn rasterize(
        &mut self,
        width: u32,
        height: u32,
        draw: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Option<Raster> {
        let _ = (width, height, draw);
        None
    }
}

/// Scoped modification of a canvas' state.
///
/// Everything changed through the scope is put back when it is dropped, on
/// every exit path. Forking pushes a full [`Canvas::save`] so that clips
/// never leak to the caller.
pub struct CanvasScope<'a> {
    canvas: &'a mut dyn Canvas,
    saves: u32,
    transform: Option<Affine>,
    composite: Option<Composite>,
    hints: Option<RenderingHints>,
}

impl fmt::Debug for CanvasScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasScope")
            .field("saves", &self.saves)
            .field("transform", &self.transform)
            .field("composite", &self.composite)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

impl<'a> CanvasScope<'a> {
    /// Start a scope that has not changed anything yet.
    pub fn new(canvas: &'a mut dyn Canvas) -> Self {
        Self {
            canvas,
            saves: 0,
            transform: None,
            composite: None,
            hints: None,
        }
    }

    /// Merge `hints` into the canvas' hints.
    pub fn add_hints(&mut self, hints: &RenderingHints) {
        let current = self.canvas.rendering_hints();
        let mut merged = current.clone();
        merged.merge(hints);
        self.hints.get_or_insert(current);
        self.canvas.set_rendering_hints(merged);
    }

    /// Post-multiply the canvas transform by `transform`.
    pub fn concat_transform(&mut self, transform: Affine) {
        let current = self.canvas.transform();
        self.transform.get_or_insert(current);
        self.canvas.set_transform(current * transform);
    }

    /// Replace the canvas transform.
    pub fn replace_transform(&mut self, transform: Affine) {
        let current = self.canvas.transform();
        self.transform.get_or_insert(current);
        self.canvas.set_transform(transform);
    }

    /// Replace the composite.
    pub fn set_composite(&mut self, composite: Composite) {
        let current = self.canvas.composite();
        self.composite.get_or_insert(current);
        self.canvas.set_composite(composite);
    }

    /// Save the full canvas state; undone when the scope ends.
    pub fn fork(&mut self) {
        self.canvas.save();
        self.saves += 1;
    }

    /// Whether [`CanvasScope::fork`] has been called.
    pub fn is_forked(&self) -> bool {
        self.saves > 0
    }
}

impl<'a> Deref for CanvasScope<'a> {
    type Target = dyn Canvas + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.canvas
    }
}

impl DerefMut for CanvasScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.canvas
    }
}

impl Drop for CanvasScope<'_> {
    fn drop(&mut self) {
        for _ in 0..self.saves {
            self.canvas.restore();
        }
        if let Some(hints) = self.hints.take() {
            self.canvas.set_rendering_hints(hints);
        }
        if let Some(transform) = self.transform.take() {
            self.canvas.set_transform(transform);
        }
        if let Some(composite) = self.composite.take() {
            self.canvas.set_composite(composite);
        }
    }
}
