// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental repainting of a tree into a device canvas.
//!
//! A [`Renderer`] owns the user-to-device transform and the base rendering
//! hints. [`Renderer::repaint`] takes the root-space [`Damage`] reported by
//! the tree, snaps it to whole device pixels, merges nearby rectangles, and
//! repaints the tree root once per remaining rectangle with the canvas
//! clipped to it.

use kurbo::{Affine, Rect};

use crate::canvas::{Canvas, CanvasScope, ClipShape};
use crate::damage::Damage;
use crate::geom::overlap;
use crate::tree::Tree;
use crate::types::RenderingHints;

/// Tuning for [`Renderer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Fixed cost of repainting one rectangle, in pixels.
    pub merge_overhead: f64,
    /// Per-row cost of repainting one rectangle, in pixels.
    pub merge_line_overhead: f64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            merge_overhead: 1000.0,
            merge_line_overhead: 10.0,
        }
    }
}

impl RendererConfig {
    /// Defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style merge costs; see [`Damage::merge`].
    pub fn with_merge_costs(mut self, overhead: f64, line_overhead: f64) -> Self {
        self.merge_overhead = overhead;
        self.merge_line_overhead = line_overhead;
        self
    }
}

/// Paints a tree into a device canvas.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    transform: Affine,
    hints: RenderingHints,
    viewport: Option<Rect>,
    config: RendererConfig,
}

impl Renderer {
    /// A renderer with an identity user-to-device transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer with explicit tuning.
    pub fn with_config(config: RendererConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Mapping from tree root space to device space.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Change the user-to-device transform. The caller repaints everything.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    /// Hints applied under every node's own hints.
    pub fn rendering_hints(&self) -> &RenderingHints {
        &self.hints
    }

    /// Replace the base rendering hints.
    pub fn set_rendering_hints(&mut self, hints: RenderingHints) {
        self.hints = hints;
    }

    /// Device-space area that exists; repaint regions are limited to it.
    pub fn viewport(&self) -> Option<Rect> {
        self.viewport
    }

    /// Limit repainting to `viewport`, or lift the limit.
    pub fn set_viewport(&mut self, viewport: Option<Rect>) {
        self.viewport = viewport;
    }

    /// Active tuning.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Device-space rectangles [`Renderer::repaint`] would paint for `damage`.
    pub fn device_areas(&self, damage: &Damage) -> Damage {
        let mut device = Damage::default();
        for r in &damage.transformed(self.transform).dirty_rects {
            // Whole pixels, grown outward so antialiased edges are covered.
            let r = r.expand();
            let r = match self.viewport {
                Some(viewport) => match overlap(viewport, r) {
                    Some(r) => r,
                    None => continue,
                },
                None => r,
            };
            device.push(r);
        }
        device.merge(self.config.merge_overhead, self.config.merge_line_overhead);
        device
    }

    /// Repaint the parts of the tree covered by `damage`.
    ///
    /// Returns `false` when the tree's cancellation token stopped the repaint
    /// before every area was painted.
    pub fn repaint(&self, tree: &Tree, canvas: &mut dyn Canvas, damage: &Damage) -> bool {
        let areas = self.device_areas(damage);
        let cancel = tree.cancel_token();
        for (i, area) in areas.dirty_rects.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(painted = i, total = areas.dirty_rects.len(), "repaint cancelled");
                return false;
            }
            let mut scope = CanvasScope::new(canvas);
            scope.fork();
            scope.replace_transform(Affine::IDENTITY);
            scope.clip(&ClipShape::Rect(*area), false);
            self.paint_root(tree, &mut scope);
        }
        tracing::debug!(areas = areas.dirty_rects.len(), "repainted");
        !cancel.is_cancelled()
    }

    /// Paint the whole tree, limited only by the viewport.
    pub fn paint_all(&self, tree: &Tree, canvas: &mut dyn Canvas) -> bool {
        let mut scope = CanvasScope::new(canvas);
        if let Some(viewport) = self.viewport {
            scope.fork();
            scope.replace_transform(Affine::IDENTITY);
            scope.clip(&ClipShape::Rect(viewport), false);
        }
        self.paint_root(tree, &mut scope);
        !tree.cancel_token().is_cancelled()
    }

    fn paint_root(&self, tree: &Tree, canvas: &mut CanvasScope<'_>) {
        canvas.replace_transform(self.transform);
        canvas.add_hints(&self.hints);
        tree.paint(tree.root(), &mut **canvas);
    }
}

#[cfg(test)]
mod tests {
    use peniko::{Brush, Color};

    use super::*;
    use crate::painter::FillPainter;
    use crate::recording::{DrawOp, RecordingCanvas};
    use crate::shape::ShapeNode;
    use crate::types::NodeId;

    fn square(tree: &mut Tree, rect: Rect) -> NodeId {
        let brush = Brush::Solid(Color::from_rgba8(0, 128, 0, 255));
        let id = tree.create_shape(ShapeNode::new(rect).with_painter(FillPainter::new(brush)));
        tree.append(tree.root(), id).unwrap();
        id
    }

    fn fills(canvas: &RecordingCanvas) -> usize {
        canvas
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count()
    }

    #[test]
    fn device_areas_snap_and_merge() {
        let mut renderer = Renderer::new();
        renderer.set_transform(Affine::scale(2.0));
        let damage = Damage {
            dirty_rects: alloc::vec![
                Rect::new(0.25, 0.25, 4.0, 4.0),
                Rect::new(4.5, 0.0, 8.0, 4.0),
            ],
        };
        let areas = renderer.device_areas(&damage);
        assert_eq!(areas.dirty_rects, [Rect::new(0.0, 0.0, 16.0, 8.0)]);

        renderer.set_viewport(Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(
            renderer.device_areas(&damage).dirty_rects,
            [Rect::new(0.0, 0.0, 10.0, 8.0)],
            "clamped to the viewport"
        );
    }

    #[test]
    fn repaint_only_touches_damaged_content() {
        let mut tree = Tree::new();
        square(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        square(&mut tree, Rect::new(500.0, 500.0, 510.0, 510.0));
        let renderer = Renderer::new();

        let mut canvas = RecordingCanvas::new();
        let damage = Damage {
            dirty_rects: alloc::vec![Rect::new(2.0, 2.0, 4.0, 4.0)],
        };
        assert!(renderer.repaint(&tree, &mut canvas, &damage));
        assert_eq!(fills(&canvas), 1, "distant square culled by the area clip");
        assert_eq!(canvas.transform(), Affine::IDENTITY, "state restored");
        assert_eq!(canvas.clip_bounds(), None, "clip restored");

        let mut canvas = RecordingCanvas::new();
        assert!(renderer.paint_all(&tree, &mut canvas));
        assert_eq!(fills(&canvas), 2);
    }

    #[test]
    fn tracked_edit_repaints_old_and_new_positions() {
        let mut tree = Tree::new();
        tree.enable_update_tracking();
        let s = square(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.take_dirty_areas();
        tree.set_transform(s, Some(Affine::translate((300.0, 0.0))));
        let damage = tree.take_dirty_areas().unwrap();

        let renderer = Renderer::new();
        let areas = renderer.device_areas(&damage);
        assert_eq!(areas.dirty_rects.len(), 2, "far apart, not merged: {areas:?}");

        let mut canvas = RecordingCanvas::new();
        assert!(renderer.repaint(&tree, &mut canvas, &damage));
        assert_eq!(fills(&canvas), 1, "only the area holding the square paints it");
    }

    #[test]
    fn cancelled_repaint_stops_early() {
        let mut tree = Tree::new();
        square(&mut tree, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.cancel_token().cancel();
        let mut canvas = RecordingCanvas::new();
        let damage = Damage {
            dirty_rects: alloc::vec![Rect::new(0.0, 0.0, 10.0, 10.0)],
        };
        assert!(!Renderer::new().repaint(&tree, &mut canvas, &damage));
        assert!(canvas.ops.is_empty(), "nothing drawn after cancellation");
    }
}
