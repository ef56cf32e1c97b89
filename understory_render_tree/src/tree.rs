// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: arena, attributes, notifications, invalidation.

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::fmt;

use hashbrown::HashSet;
use kurbo::Affine;
use smallvec::{SmallVec, smallvec};

use crate::cancel::CancelToken;
use crate::config::TreeConfig;
use crate::damage::Damage;
use crate::dirty::UpdateTracker;
use crate::events::{ChangeEvent, ChangeListener, ListenerId};
use crate::group::GroupNode;
use crate::node::{Cx, Node, NodeKind};
use crate::render::{ClipRegion, Filter, Mask};
use crate::types::{Composite, HintKey, HintValue, NodeId, PointerEvents, RenderingHints};

/// A retained render tree.
///
/// Nodes live in an arena and are addressed by generational [`NodeId`]s. A
/// tree always has a root group; nodes created with [`Tree::create`] start
/// detached and become part of the rendered scene once appended somewhere
/// below [`Tree::root`].
///
/// Mutations apply immediately. Bounds are computed lazily, cached on each
/// node, and invalidated along the parent chain when something they depend on
/// changes. Mutations of attached nodes are reported to listeners, and the
/// built-in [`UpdateTracker`] turns them into repaint regions.
///
/// ## Example
///
/// ```rust
/// use kurbo::{Circle, Rect};
/// use peniko::{Brush, Color};
/// use understory_render_tree::{FillPainter, ShapeNode, Tree};
///
/// let mut tree = Tree::new();
/// let root = tree.root();
/// let brush = Brush::Solid(Color::from_rgba8(0, 0, 255, 255));
///
/// let square = tree.create_shape(
///     ShapeNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)).with_painter(FillPainter::new(brush.clone())),
/// );
/// let circle = tree.create_shape(
///     ShapeNode::new(Circle::new((20.0, 20.0), 5.0)).with_painter(FillPainter::new(brush)),
/// );
/// tree.append(root, square).unwrap();
/// tree.append(root, circle).unwrap();
///
/// let bounds = tree.bounds(root).unwrap();
/// assert!((bounds.x1 - 25.0).abs() < 1e-9 && (bounds.y1 - 25.0).abs() < 1e-9);
/// ```
pub struct Tree {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    config: TreeConfig,
    cancel: CancelToken,
    listeners: Vec<(ListenerId, Box<dyn ChangeListener>)>,
    next_listener: u32,
    tracker: Option<UpdateTracker>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("root", &self.root)
            .field("listeners", &self.listeners.len())
            .field("tracking", &self.tracker.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a tree with an explicit configuration.
    pub fn with_config(config: TreeConfig) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            config,
            cancel: CancelToken::new(),
            listeners: Vec::new(),
            next_listener: 0,
            tracker: None,
        };
        let root = tree.create(NodeKind::Group(GroupNode::new()));
        tree.node_mut(root).root = Some(root);
        tree.root = root;
        tree
    }

    /// The root group. Only nodes below it report changes.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Active configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// A clone of the token polled by traversals of this tree.
    ///
    /// Cancel it from another thread to abandon an in-flight paint or bounds
    /// computation; call [`CancelToken::reset`] before the next traversal.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replace the token polled by traversals.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    pub(crate) fn cx(&self) -> Cx<'_> {
        Cx {
            tree: self,
            cancel: &self.cancel,
        }
    }

    /// Add a node to the arena, detached.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId stores 32-bit slot indices."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId stores 32-bit slot indices."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        self.link_references(id);
        tracing::trace!(?id, kind = self.node(id).kind.name(), "created node");
        id
    }

    /// Create an empty, detached group.
    pub fn create_group(&mut self) -> NodeId {
        self.create(NodeKind::Group(GroupNode::new()))
    }

    /// Free a detached node and its whole subtree.
    ///
    /// Attached nodes are removed from their parent first. Ids of freed nodes
    /// become stale. The tree root cannot be disposed.
    pub fn dispose(&mut self, id: NodeId) -> Result<(), crate::TreeError> {
        if !self.is_alive(id) {
            return Err(crate::TreeError::StaleNode(id));
        }
        if id == self.root {
            return Err(crate::TreeError::InvalidArgument("cannot dispose the tree root"));
        }
        if let Some(parent) = self.node(id).parent {
            self.remove_child(parent, id)?;
        }
        let mut doomed: Vec<NodeId> = alloc::vec![id];
        let mut i = 0;
        while let Some(&id) = doomed.get(i) {
            if let Some(group) = self.node(id).kind.group() {
                doomed.extend(group.children.iter());
            }
            i += 1;
        }
        // Nodes outside the subtree that draw something inside it.
        let mut dependents: Vec<NodeId> = Vec::new();
        for &d in &doomed {
            for &dep in &self.node(d).dependents {
                if !doomed.contains(&dep) && !dependents.contains(&dep) {
                    dependents.push(dep);
                }
            }
        }
        for &dep in &dependents {
            self.fire_started(dep, None);
        }
        for &d in &doomed {
            self.unlink_references(d);
            self.nodes[d.idx()] = None;
            self.free_list.push(d.idx());
        }
        for &dep in &dependents {
            self.invalidate(dep);
            self.fire_completed(dep, None);
        }
        tracing::debug!(?id, nodes = doomed.len(), "disposed subtree");
        Ok(())
    }

    // --- listeners ---

    /// Register a change listener.
    pub fn add_listener(&mut self, listener: Box<dyn ChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        self.listeners.push((id, listener));
        id
    }

    /// Unregister and return a change listener.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn ChangeListener>> {
        let pos = self.listeners.iter().position(|(l, _)| *l == id)?;
        Some(self.listeners.remove(pos).1)
    }

    /// Start recording dirty regions with the built-in [`UpdateTracker`].
    pub fn enable_update_tracking(&mut self) {
        self.tracker.get_or_insert_with(UpdateTracker::new);
    }

    /// Stop recording dirty regions and drop anything accumulated.
    pub fn disable_update_tracking(&mut self) {
        self.tracker = None;
    }

    /// Built-in tracker, when enabled.
    pub fn update_tracker(&self) -> Option<&UpdateTracker> {
        self.tracker.as_ref()
    }

    /// Consume the regions accumulated since the last call.
    ///
    /// Returns `None` when tracking is disabled.
    pub fn take_dirty_areas(&mut self) -> Option<Damage> {
        let mut tracker = self.tracker.take()?;
        let damage = tracker.dirty_areas(self);
        self.tracker = Some(tracker);
        Some(damage)
    }

    fn notify(&mut self, event: ChangeEvent, started: bool) {
        let attached = self.get(event.node).is_some_and(|n| n.root.is_some());
        if !attached {
            return;
        }
        let mut tracker = self.tracker.take();
        let mut listeners = core::mem::take(&mut self.listeners);
        if let Some(t) = tracker.as_mut() {
            if started {
                t.change_started(self, &event);
            } else {
                t.change_completed(self, &event);
            }
        }
        for (_, listener) in &mut listeners {
            if started {
                listener.change_started(self, &event);
            } else {
                listener.change_completed(self, &event);
            }
        }
        self.tracker = tracker;
        self.listeners = listeners;
    }

    pub(crate) fn fire_started(&mut self, node: NodeId, source: Option<NodeId>) {
        self.notify(ChangeEvent { node, source }, true);
    }

    pub(crate) fn fire_completed(&mut self, node: NodeId, source: Option<NodeId>) {
        self.notify(ChangeEvent { node, source }, false);
    }

    /// Apply an attribute change bracketed by notifications, then invalidate.
    pub(crate) fn update_node(&mut self, id: NodeId, apply: impl FnOnce(&mut Node)) {
        self.fire_started(id, None);
        apply(self.node_mut(id));
        self.invalidate(id);
        self.fire_completed(id, None);
    }

    // --- invalidation ---

    /// Forget cached bounds of `id`, its ancestors, and everything that draws it.
    ///
    /// Shapes reached by reference also drop pattern tiles rendered from the
    /// changed content.
    pub(crate) fn invalidate(&self, id: NodeId) {
        self.invalidate_all(smallvec![id]);
    }

    /// Like [`Tree::invalidate`], for `id` and every node below it.
    ///
    /// Cached bounds of degenerate geometry are padded according to the
    /// global transform, so they go stale whenever an ancestor's transform or
    /// the parent chain changes.
    pub(crate) fn invalidate_subtree(&self, id: NodeId) {
        let mut seeds: SmallVec<[NodeId; 8]> = smallvec![id];
        let mut i = 0;
        while let Some(&id) = seeds.get(i) {
            seeds.extend(self.children_of(id).iter().copied());
            i += 1;
        }
        self.invalidate_all(seeds);
    }

    fn invalidate_all(&self, seeds: SmallVec<[NodeId; 8]>) {
        let mut pending: SmallVec<[(NodeId, bool); 8]> =
            seeds.into_iter().map(|id| (id, false)).collect();
        let mut seen: HashSet<NodeId> = HashSet::new();
        while let Some((id, by_reference)) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            node.cache.invalidate();
            if by_reference
                && let NodeKind::Shape(shape) = &node.kind
                && let Some(painter) = shape.painter()
            {
                painter.content_changed();
            }
            if let Some(parent) = node.parent {
                pending.push((parent, false));
            }
            pending.extend(node.dependents.iter().map(|&d| (d, true)));
        }
    }

    /// Register `id` as a dependent of every node it draws by reference.
    pub(crate) fn link_references(&mut self, id: NodeId) {
        let refs = self.node(id).kind.ops().referenced_nodes();
        for r in refs {
            if let Some(target) = self.node_opt_mut(r)
                && !target.dependents.contains(&id)
            {
                target.dependents.push(id);
            }
        }
    }

    pub(crate) fn unlink_references(&mut self, id: NodeId) {
        let refs = self.node(id).kind.ops().referenced_nodes();
        for r in refs {
            if let Some(target) = self.node_opt_mut(r) {
                target.dependents.retain(|d| *d != id);
            }
        }
    }

    // --- common attributes ---

    /// Set the local-to-parent transform (`None` = identity).
    pub fn set_transform(&mut self, id: NodeId, transform: Option<Affine>) {
        if let Some(n) = self.get(id)
            && n.transform != transform
        {
            self.fire_started(id, None);
            let n = self.node_mut(id);
            n.transform = transform;
            n.update_inverse();
            self.invalidate_subtree(id);
            self.fire_completed(id, None);
        }
    }

    /// Set the composite. `None` means plain source-over.
    pub fn set_composite(&mut self, id: NodeId, composite: Option<Composite>) {
        if let Some(n) = self.get(id)
            && n.composite != composite
        {
            self.fire_started(id, None);
            self.node_mut(id).composite = composite;
            self.fire_completed(id, None);
        }
    }

    /// Show or hide a node.
    ///
    /// Hiding a container does not notify listeners: its own drawn extent is
    /// unaffected, only descendants with inherited visibility change.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        let Some(n) = self.get(id) else {
            return;
        };
        if n.visible == visible {
            return;
        }
        if n.kind.group().is_some() {
            self.node_mut(id).visible = visible;
        } else {
            self.update_node(id, |n| n.visible = visible);
        }
    }

    /// Set or clear the clip region.
    pub fn set_clip(&mut self, id: NodeId, clip: Option<ClipRegion>) {
        if let Some(n) = self.get(id)
            && n.clip != clip
        {
            self.update_node(id, |n| n.clip = clip);
        }
    }

    /// Set or clear the mask.
    pub fn set_mask(&mut self, id: NodeId, mask: Option<Arc<dyn Mask>>) {
        if let Some(n) = self.get(id)
            && !same_arc(&n.mask, &mask)
        {
            self.update_node(id, |n| n.mask = mask);
        }
    }

    /// Set or clear the filter.
    pub fn set_filter(&mut self, id: NodeId, filter: Option<Arc<dyn Filter>>) {
        if let Some(n) = self.get(id)
            && !same_arc(&n.filter, &filter)
        {
            self.update_node(id, |n| n.filter = filter);
        }
    }

    /// Set a single rendering hint.
    pub fn set_rendering_hint(&mut self, id: NodeId, key: HintKey, value: HintValue) {
        if self.is_alive(id) {
            self.fire_started(id, None);
            self.node_mut(id)
                .hints
                .get_or_insert_with(RenderingHints::new)
                .insert(key, value);
            self.fire_completed(id, None);
        }
    }

    /// Replace all rendering hints.
    pub fn set_rendering_hints(&mut self, id: NodeId, hints: Option<RenderingHints>) {
        if let Some(n) = self.get(id)
            && n.hints != hints
        {
            self.fire_started(id, None);
            self.node_mut(id).hints = hints;
            self.fire_completed(id, None);
        }
    }

    /// Choose which parts of the node respond to hit testing.
    pub fn set_pointer_events(&mut self, id: NodeId, mode: PointerEvents) {
        if let Some(n) = self.node_opt_mut(id)
            && n.pointer_events != mode
        {
            n.pointer_events = mode;
            self.invalidate(id);
        }
    }

    // --- accessors ---

    /// Number of live nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The node's kind-specific data.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    /// Local transform, if one is set.
    pub fn transform(&self, id: NodeId) -> Option<Affine> {
        self.get(id).and_then(|n| n.transform)
    }

    /// Inverse of the effective local transform.
    ///
    /// A non-invertible transform is its own inverse here.
    pub fn inverse_transform(&self, id: NodeId) -> Option<Affine> {
        self.get(id).map(|n| n.inverse)
    }

    /// Transform from the node's local space to the space of its topmost ancestor.
    pub fn global_transform(&self, id: NodeId) -> Option<Affine> {
        let mut node = self.get(id)?;
        let mut global = node.effective_transform();
        while let Some(parent) = node.parent.and_then(|p| self.get(p)) {
            global = parent.effective_transform() * global;
            node = parent;
        }
        Some(global)
    }

    /// Composite, if one is set.
    pub fn composite(&self, id: NodeId) -> Option<Composite> {
        self.get(id).and_then(|n| n.composite)
    }

    /// Visibility flag.
    pub fn is_visible(&self, id: NodeId) -> Option<bool> {
        self.get(id).map(|n| n.visible)
    }

    /// Clip region, if one is set.
    pub fn clip(&self, id: NodeId) -> Option<&ClipRegion> {
        self.get(id).and_then(|n| n.clip.as_ref())
    }

    /// Mask, if one is set.
    pub fn mask(&self, id: NodeId) -> Option<&Arc<dyn Mask>> {
        self.get(id).and_then(|n| n.mask.as_ref())
    }

    /// Filter, if one is set.
    pub fn filter(&self, id: NodeId) -> Option<&Arc<dyn Filter>> {
        self.get(id).and_then(|n| n.filter.as_ref())
    }

    /// Rendering hints, if any are set.
    pub fn rendering_hints(&self, id: NodeId) -> Option<&RenderingHints> {
        self.get(id).and_then(|n| n.hints.as_ref())
    }

    /// Pointer-events mode.
    pub fn pointer_events(&self, id: NodeId) -> Option<PointerEvents> {
        self.get(id).map(|n| n.pointer_events)
    }

    /// Returns the parent of a node if live, or `None` for detached nodes or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Returns the tree root if the node is attached below it.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.root)
    }

    /// Get the children of a node, or an empty slice for leaves and stale ids.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .and_then(|n| n.kind.group())
            .map(|g| g.children.as_slice())
            .unwrap_or(&[])
    }

    // --- internals ---

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .filter(|n| n.generation == id.1)
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.get(id).expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.node_opt_mut(id).expect("dangling NodeId")
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.idx())
            .and_then(|n| n.as_mut())
            .filter(|n| n.generation == id.1)
    }
}

fn same_arc<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeEvent;
    use crate::shape::ShapeNode;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use kurbo::Rect;

    #[derive(Default)]
    struct Counter {
        started: Arc<AtomicUsize>,
        completed: Arc<AtomicUsize>,
    }

    impl ChangeListener for Counter {
        fn change_started(&mut self, _tree: &Tree, _event: &ChangeEvent) {
            self.started.fetch_add(1, Ordering::Relaxed);
        }

        fn change_completed(&mut self, _tree: &Tree, _event: &ChangeEvent) {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn square(tree: &mut Tree) -> NodeId {
        tree.create_shape(ShapeNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)))
    }

    #[test]
    fn liveness_create_dispose_reuse() {
        let mut tree = Tree::new();
        let a = square(&mut tree);
        assert!(tree.is_alive(a));
        tree.dispose(a).unwrap();
        assert!(!tree.is_alive(a));

        let b = square(&mut tree);
        assert!(tree.is_alive(b));
        assert!(!tree.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
        assert!(tree.dispose(tree.root()).is_err(), "root is permanent");
    }

    #[test]
    fn detached_nodes_do_not_notify() {
        let mut tree = Tree::new();
        let counter = Counter::default();
        let started = counter.started.clone();
        let completed = counter.completed.clone();
        tree.add_listener(Box::new(counter));

        let n = square(&mut tree);
        tree.set_transform(n, Some(Affine::translate((1.0, 0.0))));
        assert_eq!(started.load(Ordering::Relaxed), 0, "detached node is silent");

        tree.append(tree.root(), n).unwrap();
        let after_append = started.load(Ordering::Relaxed);
        assert_eq!(after_append, 1, "append fires once on the parent");

        tree.set_transform(n, Some(Affine::translate((2.0, 0.0))));
        assert_eq!(started.load(Ordering::Relaxed), after_append + 1);
        assert_eq!(
            started.load(Ordering::Relaxed),
            completed.load(Ordering::Relaxed),
            "every started has a completed"
        );

        // Equal value is a no-op.
        tree.set_transform(n, Some(Affine::translate((2.0, 0.0))));
        assert_eq!(started.load(Ordering::Relaxed), after_append + 1);
    }

    #[test]
    fn group_visibility_is_silent() {
        let mut tree = Tree::new();
        let counter = Counter::default();
        let started = counter.started.clone();
        let listener = tree.add_listener(Box::new(counter));
        let g = tree.create_group();
        tree.append(tree.root(), g).unwrap();
        let before = started.load(Ordering::Relaxed);
        tree.set_visible(g, false);
        assert_eq!(started.load(Ordering::Relaxed), before, "group visibility is silent");
        assert_eq!(tree.is_visible(g), Some(false));

        let leaf = square(&mut tree);
        tree.append(g, leaf).unwrap();
        let before = started.load(Ordering::Relaxed);
        tree.set_visible(leaf, false);
        assert_eq!(started.load(Ordering::Relaxed), before + 1, "leaf visibility notifies");

        assert!(tree.remove_listener(listener).is_some());
        assert!(tree.remove_listener(listener).is_none());
    }

    #[test]
    fn singular_transform_inverse_falls_back() {
        let mut tree = Tree::new();
        let n = square(&mut tree);
        let singular = Affine::scale_non_uniform(0.0, 1.0);
        tree.set_transform(n, Some(singular));
        assert_eq!(tree.inverse_transform(n), Some(singular));
    }

    #[test]
    fn global_transform_composes_chain() {
        let mut tree = Tree::new();
        let g = tree.create_group();
        let n = square(&mut tree);
        tree.append(tree.root(), g).unwrap();
        tree.append(g, n).unwrap();
        tree.set_transform(g, Some(Affine::translate((10.0, 0.0))));
        tree.set_transform(n, Some(Affine::scale(2.0)));
        assert_eq!(
            tree.global_transform(n),
            Some(Affine::translate((10.0, 0.0)) * Affine::scale(2.0))
        );
    }

    #[test]
    fn filter_and_mask_setters_compare_identity() {
        #[derive(Debug)]
        struct Nop;
        impl Filter for Nop {
            fn bounds(&self) -> Rect {
                Rect::new(0.0, 0.0, 1.0, 1.0)
            }
            fn render(
                &self,
                _source: &dyn crate::render::Renderable,
                _canvas: &mut dyn crate::canvas::Canvas,
            ) {
            }
        }
        let mut tree = Tree::new();
        let n = square(&mut tree);
        tree.append(tree.root(), n).unwrap();
        let counter = Counter::default();
        let started = counter.started.clone();
        tree.add_listener(Box::new(counter));

        tree.set_filter(n, None);
        assert_eq!(started.load(Ordering::Relaxed), 0, "clearing an absent filter is a no-op");
        let f: Arc<dyn Filter> = Arc::new(Nop);
        tree.set_filter(n, Some(f.clone()));
        tree.set_filter(n, Some(f));
        assert_eq!(started.load(Ordering::Relaxed), 1, "same filter set twice fires once");
    }
}
