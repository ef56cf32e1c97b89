// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Render Tree: a retained 2D scene graph with cached bounds and dirty-region tracking.
//!
//! The render tree holds what gets drawn: groups, shapes, text, images, and proxies, each with a
//! local transform, composite, clip, mask, filter, and pointer-events mode.
//!
//! - Bounds are computed lazily, cached per node, and invalidated along the parent chain.
//! - Painting composes clip, mask, filter, and composite per node through a [`Canvas`].
//! - An [`UpdateTracker`] turns a batch of edits into root-space [`Damage`] covering both where
//!   content was and where it is now; a [`Renderer`] repaints just those areas.
//!
//! ## Where this fits: three-tree model
//!
//! - Widget tree: interaction/state.
//! - Box tree: geometry/spatial indexing.
//! - Render tree: display list (this crate).
//!
//! The render tree does not lay anything out and does not rasterize anything itself. Drawing goes
//! to a [`Canvas`] implementation supplied by the caller; [`RecordingCanvas`] records commands and
//! is handy in tests.
//!
//! ## API overview
//!
//! - [`Tree`]: arena of nodes addressed by generational [`NodeId`]s, with a root group.
//! - [`NodeKind`]: [`GroupNode`], [`CanvasNode`], [`ShapeNode`], [`TextNode`], [`ImageNode`],
//!   [`RasterNode`], and [`ProxyNode`].
//! - [`ShapePainter`]: [`FillPainter`], [`StrokePainter`], [`CompositePainter`], and
//!   [`MarkerPainter`] for marker sub-trees placed along a path.
//! - [`PatternPaint`]: a sub-tree repeated as a tile, cached across translations, used as a
//!   [`FillPainter::pattern`] paint.
//! - [`ChangeListener`]: observe change-started/completed notifications.
//!
//! Key operations:
//! - [`Tree::create`] and the typed `create_*` helpers, [`Tree::insert`] / [`Tree::append`] /
//!   [`Tree::remove_child`] / [`Tree::replace`], and [`Tree::dispose`].
//! - [`Tree::bounds`], [`Tree::primitive_bounds`], [`Tree::geometry_bounds`],
//!   [`Tree::sensitive_bounds`] and their `transformed_*` forms.
//! - [`Tree::paint`] / [`Tree::primitive_paint`].
//! - [`Tree::hit_test`], [`Tree::contains`], [`Tree::intersects`], [`Tree::outline`].
//! - [`Tree::enable_update_tracking`] and [`Tree::take_dirty_areas`].
//!
//! ## Cancellation
//!
//! Long traversals poll the tree's [`CancelToken`]. A cancelled traversal discards the caches it
//! was filling and returns early; committed attributes are never affected.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod bounds;
mod cancel;
mod canvas;
mod config;
mod damage;
mod dirty;
mod error;
mod events;
pub mod geom;
mod group;
mod hit;
mod image;
mod marker;
mod node;
mod paint;
mod painter;
mod path;
mod pattern;
mod proxy;
mod recording;
mod render;
mod renderer;
mod shape;
mod structure;
mod text;
mod tree;
mod types;

pub use cancel::CancelToken;
pub use canvas::{Canvas, CanvasScope, ClipShape, PatternFill, Raster, TileChunk};
pub use config::TreeConfig;
pub use damage::Damage;
pub use dirty::UpdateTracker;
pub use error::TreeError;
pub use events::{ChangeEvent, ChangeListener, ListenerId};
pub use group::{CanvasNode, ChildCursor, ChildList, GroupNode};
pub use image::{ImageNode, ImageSource, RasterNode};
pub use marker::{Marker, MarkerOrient, MarkerPainter, MarkerPlacement};
pub use node::NodeKind;
pub use painter::{Area, CompositePainter, FillPainter, Paint, ShapePainter, StrokePainter};
pub use path::{ArcTo, ExtendedPath, PathSegment};
pub use pattern::{PatternPaint, TileCache};
pub use proxy::ProxyNode;
pub use recording::{DrawOp, RecordingCanvas};
pub use render::{ClipRegion, Filter, Mask, NodeRenderable, Renderable};
pub use renderer::{Renderer, RendererConfig};
pub use shape::ShapeNode;
pub use text::{TextLayout, TextMark, TextNode};
pub use tree::Tree;
pub use types::{
    ColorModel, Composite, HintKey, HintValue, NodeId, PointerEvents, RenderingHints, Sensitivity,
};
