// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text leaves.
//!
//! Shaping and glyph rendering are not done here. A [`TextNode`] holds a
//! [`TextLayout`] produced elsewhere and asks it for bounds, outlines,
//! painting, and character hits. The node keeps a selection expressed as two
//! [`TextMark`]s.

use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;

use kurbo::{BezPath, Point, Rect};

use crate::canvas::Canvas;
use crate::node::{Cancelled, Cx, KindOps, Node, NodeKind};
use crate::tree::Tree;
use crate::types::NodeId;

/// A position between characters of a laid-out text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextMark {
    /// Character index.
    pub index: usize,
    /// Whether the mark sits before the character rather than after it.
    pub leading_edge: bool,
}

impl TextMark {
    /// A mark before the character at `index`.
    pub const fn before(index: usize) -> Self {
        Self {
            index,
            leading_edge: true,
        }
    }

    /// A mark after the character at `index`.
    pub const fn after(index: usize) -> Self {
        Self {
            index,
            leading_edge: false,
        }
    }
}

/// Laid-out text, in the text node's local space.
pub trait TextLayout: fmt::Debug + Send + Sync {
    /// Extent of everything [`TextLayout::paint`] draws, decorations and strokes included.
    fn bounds(&self) -> Option<Rect>;

    /// Extent of the glyph outlines alone.
    fn geometry_bounds(&self) -> Option<Rect>;

    /// Glyph outlines.
    fn outline(&self) -> Option<BezPath>;

    /// Draw the text.
    fn paint(&self, canvas: &mut dyn Canvas);

    /// Character under `point`, if any.
    fn hit_test(&self, point: Point) -> Option<TextMark>;

    /// Number of characters.
    fn len(&self) -> usize;

    /// Whether the layout holds no characters.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A text leaf.
#[derive(Clone, Debug, Default)]
pub struct TextNode {
    layout: Option<Arc<dyn TextLayout>>,
    selection: Option<(TextMark, TextMark)>,
}

impl TextNode {
    /// A node drawing `layout`.
    pub fn new(layout: Arc<dyn TextLayout>) -> Self {
        Self {
            layout: Some(layout),
            selection: None,
        }
    }

    /// The layout, if one is set.
    pub fn layout(&self) -> Option<&Arc<dyn TextLayout>> {
        self.layout.as_ref()
    }

    /// Selection endpoints, in the order they were made.
    pub fn selection_marks(&self) -> Option<(TextMark, TextMark)> {
        self.selection
    }

    /// Selected character range, ordered.
    pub fn selection(&self) -> Option<Range<usize>> {
        let (a, b) = self.selection?;
        let (lo, hi) = if a.index <= b.index { (a, b) } else { (b, a) };
        let start = if lo.leading_edge { lo.index } else { lo.index + 1 };
        let end = if hi.leading_edge { hi.index } else { hi.index + 1 };
        (start < end).then_some(start..end)
    }
}

impl KindOps for TextNode {
    fn primitive_bounds(&self, _cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        Ok(self.layout.as_ref().and_then(|l| l.bounds()))
    }

    fn geometry_bounds(&self, _cx: Cx<'_>, _node: &Node) -> Result<Option<Rect>, Cancelled> {
        Ok(self.layout.as_ref().and_then(|l| l.geometry_bounds()))
    }

    fn primitive_paint(
        &self,
        cx: Cx<'_>,
        _node: &Node,
        canvas: &mut dyn Canvas,
    ) -> Result<(), Cancelled> {
        cx.check()?;
        if let Some(layout) = &self.layout {
            layout.paint(canvas);
        }
        Ok(())
    }

    fn contains(&self, cx: Cx<'_>, node: &Node, point: Point) -> bool {
        node.pointer_events.accepts_visibility(node.visible)
            && matches!(cx.tree.cached_sensitive_bounds(cx, node), Ok(Some(r)) if r.contains(point))
            && self
                .layout
                .as_ref()
                .is_some_and(|l| l.hit_test(point).is_some())
    }

    fn outline(&self, _cx: Cx<'_>, _node: &Node) -> Option<BezPath> {
        self.layout.as_ref().and_then(|l| l.outline())
    }
}

impl Tree {
    /// Create a detached text node.
    pub fn create_text(&mut self, text: TextNode) -> NodeId {
        self.create(NodeKind::Text(text))
    }

    /// Replace a text node's layout. The selection is cleared.
    pub fn set_text_layout(&mut self, id: NodeId, layout: Option<Arc<dyn TextLayout>>) {
        if !matches!(self.kind(id), Some(NodeKind::Text(_))) {
            return;
        }
        self.update_node(id, |n| {
            if let NodeKind::Text(t) = &mut n.kind {
                t.layout = layout;
                t.selection = None;
            }
        });
    }

    /// Character mark under `point`, given in the node's local space.
    pub fn text_mark_at(&self, id: NodeId, point: Point) -> Option<TextMark> {
        match self.kind(id)? {
            NodeKind::Text(t) => t.layout.as_ref()?.hit_test(point),
            _ => None,
        }
    }

    /// Start a selection at the character under `point`.
    ///
    /// Returns whether a character was hit.
    pub fn select_text_at(&mut self, id: NodeId, point: Point) -> bool {
        let Some(mark) = self.text_mark_at(id, point) else {
            return false;
        };
        self.with_text(id, |t| t.selection = Some((mark, mark)));
        true
    }

    /// Extend the selection to the character under `point`.
    ///
    /// Returns whether the selection changed.
    pub fn select_text_to(&mut self, id: NodeId, point: Point) -> bool {
        let Some(mark) = self.text_mark_at(id, point) else {
            return false;
        };
        let mut changed = false;
        self.with_text(id, |t| {
            if let Some((begin, end)) = t.selection
                && end != mark
            {
                t.selection = Some((begin, mark));
                changed = true;
            }
        });
        changed
    }

    /// Select every character.
    pub fn select_all_text(&mut self, id: NodeId) {
        self.with_text(id, |t| {
            t.selection = t.layout.as_ref().and_then(|l| {
                let len = l.len();
                (len > 0).then(|| (TextMark::before(0), TextMark::after(len - 1)))
            });
        });
    }

    /// Selected character range of a text node.
    pub fn text_selection(&self, id: NodeId) -> Option<Range<usize>> {
        match self.kind(id)? {
            NodeKind::Text(t) => t.selection(),
            _ => None,
        }
    }

    fn with_text(&mut self, id: NodeId, f: impl FnOnce(&mut TextNode)) {
        if let Some(n) = self.node_opt_mut(id)
            && let NodeKind::Text(t) = &mut n.kind
        {
            f(t);
        }
    }
}
