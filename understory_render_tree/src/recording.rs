// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A canvas that records what was drawn instead of producing pixels.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Rect, Stroke};
use peniko::{Brush, Fill};

use crate::canvas::{Canvas, ClipShape, PatternFill, Raster};
use crate::geom::{overlap, transform_rect_bbox};
use crate::types::{ColorModel, Composite, RenderingHints};

/// A recorded drawing command. Geometry is kept in user space together with
/// the transform that was active when it was issued.
#[derive(Clone, Debug)]
pub enum DrawOp {
    /// [`Canvas::fill`].
    Fill {
        /// Filled path.
        shape: BezPath,
        /// Fill rule.
        rule: Fill,
        /// Paint.
        brush: Brush,
        /// Active transform.
        transform: Affine,
        /// Active composite.
        composite: Composite,
    },
    /// [`Canvas::stroke`].
    Stroke {
        /// Stroked path.
        shape: BezPath,
        /// Stroke width.
        width: f64,
        /// Paint.
        brush: Brush,
        /// Active transform.
        transform: Affine,
    },
    /// [`Canvas::draw_raster`].
    Raster {
        /// Raster size in pixels.
        size: (u32, u32),
        /// Combined pixel-to-device transform.
        transform: Affine,
    },
    /// [`Canvas::fill_pattern`].
    Pattern {
        /// Filled path.
        shape: BezPath,
        /// Number of tile chunks supplied.
        chunks: usize,
        /// Tile-to-device mapping.
        tile_to_device: Affine,
    },
    /// [`Canvas::clip`].
    Clip {
        /// Device-space bounds of the clip geometry.
        bounds: Rect,
        /// Requested edge antialiasing.
        antialias: bool,
    },
    /// [`Canvas::push_layer`].
    PushLayer {
        /// Device-space layer bounds.
        bounds: Rect,
        /// Composite the layer will be blended with.
        composite: Composite,
    },
    /// [`Canvas::pop_layer`].
    PopLayer,
}

#[derive(Clone, Debug, Default)]
enum ClipState {
    #[default]
    None,
    Empty,
    Rect(Rect),
}

#[derive(Clone, Debug)]
struct State {
    transform: Affine,
    composite: Composite,
    hints: RenderingHints,
    clip: ClipState,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            composite: Composite::SRC_OVER,
            hints: RenderingHints::new(),
            clip: ClipState::None,
        }
    }
}

/// A [`Canvas`] that records commands.
///
/// Clips are tracked as device-space bounding boxes, which is enough to drive
/// the tree's culling decisions. Offscreen rasterization produces transparent
/// rasters and keeps the nested recordings in [`RecordingCanvas::offscreens`].
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    state: State,
    stack: Vec<State>,
    layers: Vec<Composite>,
    color_model: ColorModel,
    /// Commands issued so far.
    pub ops: Vec<DrawOp>,
    /// Commands recorded by each [`Canvas::rasterize`] call, in call order.
    pub offscreens: Vec<Vec<DrawOp>>,
}

impl RecordingCanvas {
    /// Create an empty recording canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a canvas that reports `model` as its color model.
    pub fn with_color_model(model: ColorModel) -> Self {
        Self {
            color_model: model,
            ..Self::default()
        }
    }

    /// Number of recorded fills.
    pub fn fill_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count()
    }

    /// Number of intermediate layers pushed.
    pub fn layer_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::PushLayer { .. }))
            .count()
    }

    /// Current layer nesting depth.
    pub fn layer_depth(&self) -> usize {
        self.layers.len()
    }

    /// Drop all recorded commands, keeping the current state.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.offscreens.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn transform(&self) -> Affine {
        self.state.transform
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
    }

    fn composite(&self) -> Composite {
        self.state.composite
    }

    fn set_composite(&mut self, composite: Composite) {
        self.state.composite = composite;
    }

    fn rendering_hints(&self) -> RenderingHints {
        self.state.hints.clone()
    }

    fn set_rendering_hints(&mut self, hints: RenderingHints) {
        self.state.hints = hints;
    }

    fn clip(&mut self, shape: &ClipShape, antialias: bool) {
        let device = transform_rect_bbox(self.state.transform, shape.bounding_box());
        self.state.clip = match &self.state.clip {
            ClipState::None => ClipState::Rect(device),
            ClipState::Empty => ClipState::Empty,
            ClipState::Rect(current) => match overlap(*current, device) {
                Some(r) => ClipState::Rect(r),
                None => ClipState::Empty,
            },
        };
        self.ops.push(DrawOp::Clip {
            bounds: device,
            antialias,
        });
    }

    fn reset_clip(&mut self) {
        self.state.clip = ClipState::None;
    }

    fn clip_bounds(&self) -> Option<Rect> {
        match self.state.clip {
            ClipState::None => None,
            ClipState::Empty => Some(Rect::new(
                f64::INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::NEG_INFINITY,
            )),
            ClipState::Rect(device) => {
                let inverse = crate::geom::inverse_or_self(self.state.transform);
                Some(transform_rect_bbox(inverse, device))
            }
        }
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn fill(&mut self, shape: &BezPath, rule: Fill, brush: &Brush) {
        self.ops.push(DrawOp::Fill {
            shape: shape.clone(),
            rule,
            brush: brush.clone(),
            transform: self.state.transform,
            composite: self.state.composite,
        });
    }

    fn stroke(&mut self, shape: &BezPath, style: &Stroke, brush: &Brush) {
        self.ops.push(DrawOp::Stroke {
            shape: shape.clone(),
            width: style.width,
            brush: brush.clone(),
            transform: self.state.transform,
        });
    }

    fn draw_raster(&mut self, raster: &Raster, transform: Affine) {
        self.ops.push(DrawOp::Raster {
            size: (raster.width(), raster.height()),
            transform: self.state.transform * transform,
        });
    }

    fn fill_pattern(&mut self, shape: &BezPath, pattern: &PatternFill<'_>) {
        self.ops.push(DrawOp::Pattern {
            shape: shape.clone(),
            chunks: pattern.chunks.len(),
            tile_to_device: pattern.tile_to_device,
        });
    }

    fn push_layer(&mut self, bounds: Rect) {
        self.layers.push(self.state.composite);
        self.ops.push(DrawOp::PushLayer {
            bounds: transform_rect_bbox(self.state.transform, bounds),
            composite: self.state.composite,
        });
        // Layer contents start from a plain source-over composite.
        self.state.composite = Composite::SRC_OVER;
    }

    fn pop_layer(&mut self) {
        if let Some(composite) = self.layers.pop() {
            self.state.composite = composite;
            self.ops.push(DrawOp::PopLayer);
        }
    }

    fn color_model(&self) -> ColorModel {
        self.color_model
    }

    fn rasterize(
        &mut self,
        width: u32,
        height: u32,
        draw: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Option<Raster> {
        let mut offscreen = Self::with_color_model(self.color_model);
        draw(&mut offscreen);
        self.offscreens.push(offscreen.ops);
        Some(Raster::transparent(width, height))
    }
}
