// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pattern paint: fill a region by repeating the rendering of a subtree.
//!
//! The subtree is wrapped in an internal group so that its own clip, mask,
//! filter, and composite apply when the tile is rendered. The tile is
//! rendered once per device-space orientation and scale. Fills that only
//! differ by a translation reuse the raster at an offset.
//!
//! Device tiles larger than the configured threshold are rendered in square
//! chunks kept in a bounded [`TileCache`].

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::HashMap;
use kurbo::{Affine, BezPath, Rect, Vec2};

use crate::canvas::{Canvas, PatternFill, Raster, TileChunk};
use crate::error::TreeError;
use crate::geom::transform_rect_bbox;
use crate::render::ClipRegion;
use crate::tree::Tree;
use crate::types::{ColorModel, NodeId};

/// Identifies one rendering of a tile: color model plus the linear part of
/// the device transform, compared bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct TileKey {
    color_model: ColorModel,
    linear: [u64; 4],
}

impl TileKey {
    fn new(color_model: ColorModel, device: Affine) -> Self {
        let [a, b, c, d, _, _] = device.as_coeffs();
        Self {
            color_model,
            linear: [a.to_bits(), b.to_bits(), c.to_bits(), d.to_bits()],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ChunkKey {
    rendering: u64,
    x: u32,
    y: u32,
}

/// Least-recently-used store of rendered tile chunks.
#[derive(Debug)]
pub struct TileCache {
    capacity: usize,
    chunks: HashMap<ChunkKey, Arc<Raster>>,
    order: VecDeque<ChunkKey>,
}

impl TileCache {
    /// A cache keeping at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chunks: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Number of chunks held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunks are held.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Maximum number of chunks held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.order.clear();
    }

    fn get(&mut self, key: ChunkKey) -> Option<Arc<Raster>> {
        let raster = self.chunks.get(&key)?.clone();
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
        Some(raster)
    }

    fn insert(&mut self, key: ChunkKey, raster: Arc<Raster>) {
        if self.capacity == 0 {
            return;
        }
        while self.chunks.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.chunks.remove(&oldest);
        }
        self.chunks.insert(key, raster);
        self.order.push_back(key);
    }

    fn retain_rendering(&mut self, rendering: u64) {
        self.chunks.retain(|k, _| k.rendering == rendering);
        self.order.retain(|k| k.rendering == rendering);
    }
}

/// The last rendering of the tile.
#[derive(Debug)]
struct Rendering {
    id: u64,
    key: TileKey,
    /// Device transform the tile was rendered with.
    device: Affine,
    /// Device-space pixel rectangle covered by the raster.
    pixels: Rect,
    size: (u32, u32),
    /// Set for small tiles, which are not chunked.
    whole: Option<Arc<Raster>>,
}

/// A paint that tiles the rendering of a subtree.
pub struct PatternPaint {
    group: NodeId,
    node: NodeId,
    tile: Rect,
    overflow: bool,
    pattern_transform: Affine,
    threshold: u32,
    rendering: RefCell<Option<Rendering>>,
    cache: RefCell<TileCache>,
    next_id: Cell<u64>,
}

impl fmt::Debug for PatternPaint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternPaint")
            .field("group", &self.group)
            .field("node", &self.node)
            .field("tile", &self.tile)
            .field("overflow", &self.overflow)
            .field("pattern_transform", &self.pattern_transform)
            .finish_non_exhaustive()
    }
}

impl PatternPaint {
    /// Tile the rendering of `node` over `tile` (pattern space).
    ///
    /// `node` is moved into a new internal group. Without `overflow`, content
    /// outside the tile is cut away; with it, the full extent of the content
    /// is repeated at the tile spacing.
    pub fn new(
        tree: &mut Tree,
        node: NodeId,
        tile: Rect,
        overflow: bool,
        pattern_transform: Affine,
    ) -> Result<Self, TreeError> {
        if tile.width() <= 0.0 || tile.height() <= 0.0 {
            return Err(TreeError::InvalidArgument("pattern tile must have an area"));
        }
        let group = tree.create_group();
        if let Err(err) = tree.append(group, node) {
            tree.dispose(group)?;
            return Err(err);
        }
        if !overflow {
            tree.set_clip(group, Some(ClipRegion::new(tile)));
        }
        let config = tree.config();
        Ok(Self {
            group,
            node,
            tile,
            overflow,
            pattern_transform,
            threshold: config.pattern_tile_cache_threshold.max(1),
            rendering: RefCell::new(None),
            cache: RefCell::new(TileCache::new(config.pattern_tile_cache_capacity)),
            next_id: Cell::new(0),
        })
    }

    /// The internal group holding the content.
    pub fn group(&self) -> NodeId {
        self.group
    }

    /// The content node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Tile rectangle in pattern space.
    pub fn tile(&self) -> Rect {
        self.tile
    }

    /// Whether content may extend past the tile.
    pub fn overflow(&self) -> bool {
        self.overflow
    }

    /// Pattern-to-user transform.
    pub fn pattern_transform(&self) -> Affine {
        self.pattern_transform
    }

    /// Number of chunks currently cached.
    pub fn cached_chunks(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Forget every rendering, for example after the content changed.
    pub fn invalidate(&self) {
        *self.rendering.borrow_mut() = None;
        self.cache.borrow_mut().clear();
    }

    /// Pattern-space region rendered into the tile raster.
    fn pad_region(&self, tree: &Tree) -> Rect {
        if self.overflow {
            tree.bounds(self.group)
                .map_or(self.tile, |b| b.union(self.tile))
        } else {
            self.tile
        }
    }

    /// Fill `shape` (user space) with the pattern.
    pub fn fill(&self, tree: &Tree, canvas: &mut dyn Canvas, shape: &BezPath) {
        let device = canvas.transform() * self.pattern_transform;
        let key = TileKey::new(canvas.color_model(), device);

        let mut slot = self.rendering.borrow_mut();
        if slot.as_ref().is_none_or(|r| r.key != key) {
            *slot = self.render(tree, canvas, key, device);
        }
        let Some(rendering) = slot.as_ref() else {
            tracing::debug!("pattern tile could not be rendered");
            return;
        };

        let chunks = match &rendering.whole {
            Some(raster) => alloc::vec![TileChunk {
                offset: (0, 0),
                raster: raster.clone(),
            }],
            None => match self.chunks(tree, canvas, rendering) {
                Some(chunks) => chunks,
                None => return,
            },
        };

        // Same orientation and scale: only the translation moved.
        let offset = device.translation() - rendering.device.translation();
        let tile_to_device = Affine::translate(offset + rendering.pixels.origin().to_vec2());
        let linear = device.with_translation(Vec2::ZERO);
        let lattice = [
            (linear * kurbo::Point::new(self.tile.width(), 0.0)).to_vec2(),
            (linear * kurbo::Point::new(0.0, self.tile.height())).to_vec2(),
        ];
        canvas.fill_pattern(
            shape,
            &PatternFill {
                chunks: &chunks,
                tile_size: rendering.size,
                tile_to_device,
                lattice,
            },
        );
    }

    fn render(
        &self,
        tree: &Tree,
        canvas: &mut dyn Canvas,
        key: TileKey,
        device: Affine,
    ) -> Option<Rendering> {
        let pixels = transform_rect_bbox(device, self.pad_region(tree)).expand();
        let size = pixel_size(pixels)?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.cache.borrow_mut().retain_rendering(id);
        tracing::trace!(?size, "rendering pattern tile");

        let whole = if size.0 <= self.threshold && size.1 <= self.threshold {
            let to_pixels = Affine::translate(-pixels.origin().to_vec2()) * device;
            Some(Arc::new(self.rasterize(tree, canvas, size, to_pixels)?))
        } else {
            None
        };
        Some(Rendering {
            id,
            key,
            device,
            pixels,
            size,
            whole,
        })
    }

    /// All chunks of a large tile, from the cache or freshly rendered.
    fn chunks(
        &self,
        tree: &Tree,
        canvas: &mut dyn Canvas,
        rendering: &Rendering,
    ) -> Option<Vec<TileChunk>> {
        let step = self.threshold;
        let (w, h) = rendering.size;
        let mut out = Vec::new();
        let mut y = 0;
        while y < h {
            let mut x = 0;
            while x < w {
                let key = ChunkKey {
                    rendering: rendering.id,
                    x,
                    y,
                };
                let cached = self.cache.borrow_mut().get(key);
                let raster = match cached {
                    Some(raster) => raster,
                    None => {
                        let size = (step.min(w - x), step.min(h - y));
                        let origin = rendering.pixels.origin().to_vec2()
                            + Vec2::new(f64::from(x), f64::from(y));
                        let to_pixels = Affine::translate(-origin) * rendering.device;
                        let raster = Arc::new(self.rasterize(tree, canvas, size, to_pixels)?);
                        self.cache.borrow_mut().insert(key, raster.clone());
                        raster
                    }
                };
                out.push(TileChunk {
                    offset: (x, y),
                    raster,
                });
                x += step;
            }
            y += step;
        }
        Some(out)
    }

    fn rasterize(
        &self,
        tree: &Tree,
        canvas: &mut dyn Canvas,
        size: (u32, u32),
        to_pixels: Affine,
    ) -> Option<Raster> {
        let group = self.group;
        canvas.rasterize(size.0, size.1, &mut |c: &mut dyn Canvas| {
            c.set_transform(to_pixels);
            tree.paint(group, c);
        })
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "pixel extents are rounded and checked to be positive first"
)]
fn pixel_size(pixels: Rect) -> Option<(u32, u32)> {
    let (w, h) = (pixels.width(), pixels.height());
    if !(w >= 1.0 && h >= 1.0) || w > f64::from(u32::MAX) || h > f64::from(u32::MAX) {
        return None;
    }
    Some((w as u32, h as u32))
}

#[cfg(test)]
mod tests {
    use kurbo::Shape as _;
    use peniko::{Brush, Color};

    use super::*;
    use crate::config::TreeConfig;
    use crate::painter::{FillPainter, ShapePainter};
    use crate::recording::{DrawOp, RecordingCanvas};
    use crate::shape::ShapeNode;

    fn content(tree: &mut Tree, r: Rect) -> NodeId {
        let brush = Brush::Solid(Color::from_rgba8(10, 20, 30, 255));
        tree.create_shape(ShapeNode::new(r).with_painter(FillPainter::new(brush)))
    }

    fn area() -> BezPath {
        Rect::new(0.0, 0.0, 100.0, 100.0).to_path(0.1)
    }

    fn pattern_ops(canvas: &RecordingCanvas) -> Vec<(usize, Affine)> {
        canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Pattern {
                    chunks,
                    tile_to_device,
                    ..
                } => Some((*chunks, *tile_to_device)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn translation_reuses_the_tile() {
        let mut tree = Tree::new();
        let n = content(&mut tree, Rect::new(0.0, 0.0, 5.0, 5.0));
        let pattern =
            PatternPaint::new(&mut tree, n, Rect::new(0.0, 0.0, 10.0, 10.0), false, Affine::IDENTITY)
                .unwrap();
        assert_eq!(tree.parent_of(n), Some(pattern.group()));
        assert!(tree.clip(pattern.group()).is_some(), "tile clips the content");

        let mut canvas = RecordingCanvas::new();
        pattern.fill(&tree, &mut canvas, &area());
        canvas.set_transform(Affine::translate((3.0, 4.0)));
        pattern.fill(&tree, &mut canvas, &area());
        assert_eq!(canvas.offscreens.len(), 1, "rendered once");
        let tile_fills = canvas.offscreens[0]
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count();
        assert_eq!(tile_fills, 1, "tile holds the content fill");

        let ops = pattern_ops(&canvas);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], (1, Affine::IDENTITY));
        assert_eq!(ops[1].1, Affine::translate((3.0, 4.0)), "offset read");

        canvas.set_transform(Affine::scale(2.0));
        pattern.fill(&tree, &mut canvas, &area());
        assert_eq!(canvas.offscreens.len(), 2, "scale change renders again");
    }

    #[test]
    fn color_model_is_part_of_the_key() {
        let mut tree = Tree::new();
        let n = content(&mut tree, Rect::new(0.0, 0.0, 5.0, 5.0));
        let pattern =
            PatternPaint::new(&mut tree, n, Rect::new(0.0, 0.0, 10.0, 10.0), false, Affine::IDENTITY)
                .unwrap();
        let mut srgb = RecordingCanvas::new();
        let mut linear = RecordingCanvas::with_color_model(ColorModel::LinearSrgb);
        pattern.fill(&tree, &mut srgb, &area());
        pattern.fill(&tree, &mut linear, &area());
        pattern.fill(&tree, &mut srgb, &area());
        assert_eq!(srgb.offscreens.len(), 2, "switching models invalidates");
        assert_eq!(linear.offscreens.len(), 1);
    }

    #[test]
    fn large_tiles_are_chunked_and_cached() {
        let mut tree = Tree::new();
        let n = content(&mut tree, Rect::new(0.0, 0.0, 300.0, 200.0));
        let pattern = PatternPaint::new(
            &mut tree,
            n,
            Rect::new(0.0, 0.0, 300.0, 200.0),
            false,
            Affine::IDENTITY,
        )
        .unwrap();
        let mut canvas = RecordingCanvas::new();
        pattern.fill(&tree, &mut canvas, &area());
        assert_eq!(pattern_ops(&canvas)[0].0, 6, "3 x 2 chunks of 128");
        assert_eq!(canvas.offscreens.len(), 6);
        assert_eq!(pattern.cached_chunks(), 6);

        pattern.fill(&tree, &mut canvas, &area());
        assert_eq!(canvas.offscreens.len(), 6, "chunks served from the cache");
    }

    #[test]
    fn tile_cache_is_bounded() {
        let mut tree = Tree::with_config(TreeConfig::new().with_pattern_tile_cache(128, 4));
        let n = content(&mut tree, Rect::new(0.0, 0.0, 300.0, 200.0));
        let pattern = PatternPaint::new(
            &mut tree,
            n,
            Rect::new(0.0, 0.0, 300.0, 200.0),
            false,
            Affine::IDENTITY,
        )
        .unwrap();
        let mut canvas = RecordingCanvas::new();
        pattern.fill(&tree, &mut canvas, &area());
        assert_eq!(pattern.cached_chunks(), 4);
        pattern.fill(&tree, &mut canvas, &area());
        assert!(canvas.offscreens.len() > 6, "evicted chunks are rendered again");
    }

    #[test]
    fn overflow_pads_to_content() {
        let mut tree = Tree::new();
        let n = content(&mut tree, Rect::new(-5.0, 0.0, 20.0, 10.0));
        let pattern =
            PatternPaint::new(&mut tree, n, Rect::new(0.0, 0.0, 10.0, 10.0), true, Affine::IDENTITY)
                .unwrap();
        assert!(tree.clip(pattern.group()).is_none());
        let mut canvas = RecordingCanvas::new();
        pattern.fill(&tree, &mut canvas, &area());
        let [.., DrawOp::Pattern { tile_to_device, .. }] = canvas.ops.as_slice() else {
            panic!("no pattern fill: {:?}", canvas.ops);
        };
        assert_eq!(
            *tile_to_device,
            Affine::translate((-5.0, 0.0)),
            "raster starts at the content's left edge"
        );
    }

    #[test]
    fn failed_creation_frees_the_wrapper() {
        let mut tree = Tree::new();
        let root = tree.root();
        let before = tree.node_count();
        assert!(matches!(
            PatternPaint::new(&mut tree, root, Rect::new(0.0, 0.0, 10.0, 10.0), false, Affine::IDENTITY),
            Err(TreeError::InvalidArgument(_))
        ));
        assert_eq!(tree.node_count(), before, "internal group released");
    }

    fn patterned_shape(tree: &mut Tree) -> (NodeId, NodeId, Arc<PatternPaint>) {
        let n = content(tree, Rect::new(0.0, 0.0, 5.0, 5.0));
        let pattern = Arc::new(
            PatternPaint::new(tree, n, Rect::new(0.0, 0.0, 10.0, 10.0), false, Affine::IDENTITY)
                .unwrap(),
        );
        let shape = tree.create_shape(
            ShapeNode::new(Rect::new(0.0, 0.0, 100.0, 100.0))
                .with_painter(FillPainter::pattern(pattern.clone())),
        );
        tree.append(tree.root(), shape).unwrap();
        (shape, n, pattern)
    }

    #[test]
    fn shapes_fill_with_patterns() {
        let mut tree = Tree::new();
        let (shape, _, _) = patterned_shape(&mut tree);
        assert_eq!(tree.bounds(shape), Some(Rect::new(0.0, 0.0, 100.0, 100.0)));

        let mut canvas = RecordingCanvas::new();
        tree.paint(tree.root(), &mut canvas);
        assert_eq!(pattern_ops(&canvas).len(), 1, "{:?}", canvas.ops);
        assert_eq!(canvas.offscreens.len(), 1);
        assert!(
            !canvas.ops.iter().any(|op| matches!(op, DrawOp::Fill { .. })),
            "content only appears inside the tile"
        );
    }

    #[test]
    fn content_edits_drop_the_tile() {
        let mut tree = Tree::new();
        let (_, n, pattern) = patterned_shape(&mut tree);
        let mut canvas = RecordingCanvas::new();
        tree.paint(tree.root(), &mut canvas);
        tree.paint(tree.root(), &mut canvas);
        assert_eq!(canvas.offscreens.len(), 1, "tile reused");

        tree.set_shape(n, Rect::new(0.0, 0.0, 8.0, 8.0));
        tree.paint(tree.root(), &mut canvas);
        assert_eq!(canvas.offscreens.len(), 2, "tile rendered again");
        assert_eq!(pattern.node(), n);
    }

    #[test]
    fn pattern_cannot_contain_its_own_shape() {
        let mut tree = Tree::new();
        let (shape, _, pattern) = patterned_shape(&mut tree);
        assert!(matches!(
            tree.append(pattern.group(), shape),
            Err(TreeError::InvalidArgument(_))
        ));

        let inner = content(&mut tree, Rect::new(0.0, 0.0, 2.0, 2.0));
        tree.append(pattern.group(), inner).unwrap();
        tree.set_painter(inner, Some(FillPainter::pattern(pattern.clone()).into()));
        assert!(
            tree.painter(inner)
                .is_some_and(|p| matches!(p, ShapePainter::Fill(f) if f.brush().is_some())),
            "painter kept"
        );
    }

    #[test]
    fn degenerate_tile_is_rejected() {
        let mut tree = Tree::new();
        let n = content(&mut tree, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(matches!(
            PatternPaint::new(&mut tree, n, Rect::new(0.0, 0.0, 0.0, 5.0), false, Affine::IDENTITY),
            Err(TreeError::InvalidArgument(_))
        ));
    }
}
