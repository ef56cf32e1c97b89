// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural edits: inserting, moving, replacing, and removing children.
//!
//! Every edit is reported to listeners as a change of the container, with the
//! moving child as the event source. Moving a child that already has a parent
//! first removes it there, which is reported as a separate change of the old
//! parent nested inside the new parent's notification pair.

use alloc::vec::Vec;

use crate::error::TreeError;
use crate::tree::Tree;
use crate::types::NodeId;

impl Tree {
    /// Insert `child` into `parent` at `index`, detaching it from any previous parent.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), TreeError> {
        let len = self.check_attach(parent, child)?;
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }

        self.fire_started(parent, Some(child));
        let mut index = index;
        if let Some(old_parent) = self.node(child).parent {
            if old_parent == parent
                && let Some(old_index) = self.index_of(parent, child)
                && old_index < index
            {
                index -= 1;
            }
            self.remove_child(old_parent, child)?;
        }
        self.children_mut(parent).insert(index, child);
        self.adopt(parent, child);
        self.fire_completed(parent, Some(child));
        tracing::debug!(?parent, ?child, index, "inserted child");
        Ok(())
    }

    /// Append `child` as the topmost child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let len = self.check_attach(parent, child)?;
        self.insert(parent, len, child)
    }

    /// Remove and return the child at `index`.
    pub fn remove_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, TreeError> {
        let len = self.child_list_len(parent)?;
        let Some(child) = self.children_of(parent).get(index).copied() else {
            return Err(TreeError::IndexOutOfBounds { index, len });
        };
        self.fire_started(parent, Some(child));
        self.children_mut(parent).remove(index);
        self.orphan(child);
        self.invalidate(parent);
        self.fire_completed(parent, Some(child));
        tracing::debug!(?parent, ?child, index, "removed child");
        Ok(child)
    }

    /// Remove `child` from `parent`. Returns `false` when it was not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool, TreeError> {
        self.child_list_len(parent)?;
        match self.index_of(parent, child) {
            Some(index) => self.remove_at(parent, index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Put `child` at `index`, returning the node it displaced.
    pub fn replace(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, TreeError> {
        let len = self.check_attach(parent, child)?;
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let mut index = index;
        if self.node(child).parent == Some(parent) {
            match self.index_of(parent, child) {
                Some(i) if i == index => return Ok(child),
                Some(i) if i < index => index -= 1,
                _ => {}
            }
        }

        self.fire_started(parent, Some(child));
        if let Some(old_parent) = self.node(child).parent {
            self.remove_child(old_parent, child)?;
        }
        let old = self.children_mut(parent).replace(index, child);
        self.orphan(old);
        self.adopt(parent, child);
        self.fire_completed(parent, Some(child));
        tracing::debug!(?parent, ?child, ?old, index, "replaced child");
        Ok(old)
    }

    /// Position of `child` within `parent`.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.get(parent)?.kind.group()?.children.index_of(child)
    }

    /// Number of children of `parent` (zero for leaves and stale ids).
    pub fn child_count(&self, parent: NodeId) -> usize {
        self.children_of(parent).len()
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Whether painting `from` would paint `target`, following children and
    /// the nodes that proxies, markers, and patterns draw by reference.
    pub(crate) fn draws(&self, from: NodeId, target: NodeId) -> bool {
        let mut pending: Vec<NodeId> = alloc::vec![from];
        let mut seen: Vec<NodeId> = Vec::new();
        while let Some(id) = pending.pop() {
            if id == target {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            let Some(node) = self.get(id) else {
                continue;
            };
            if let Some(group) = node.kind.group() {
                pending.extend(group.children.iter());
            }
            pending.extend(node.kind.ops().referenced_nodes());
        }
        false
    }

    fn child_list_len(&self, parent: NodeId) -> Result<usize, TreeError> {
        let node = self.get(parent).ok_or(TreeError::StaleNode(parent))?;
        let group = node.kind.group().ok_or(TreeError::NotAGroup(parent))?;
        Ok(group.children.len())
    }

    /// Validate an edit that makes `child` a child of `parent`; returns the current length.
    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        let len = self.child_list_len(parent)?;
        if !self.is_alive(child) {
            return Err(TreeError::StaleNode(child));
        }
        if child == self.root() {
            return Err(TreeError::InvalidArgument("the tree root cannot be a child"));
        }
        if self.is_ancestor(child, parent) {
            return Err(TreeError::InvalidArgument("a node cannot contain its own ancestor"));
        }
        if self.draws(child, parent) {
            return Err(TreeError::InvalidArgument("the edit would make a node draw itself"));
        }
        Ok(len)
    }

    fn children_mut(&mut self, parent: NodeId) -> &mut crate::group::ChildList {
        &mut self
            .node_mut(parent)
            .kind
            .group_mut()
            .expect("container checked before editing")
            .children
    }

    fn adopt(&mut self, parent: NodeId, child: NodeId) {
        let root = self.node(parent).root;
        self.node_mut(child).parent = Some(parent);
        self.set_subtree_root(child, root);
        self.invalidate_subtree(child);
    }

    fn orphan(&mut self, child: NodeId) {
        self.node_mut(child).parent = None;
        self.set_subtree_root(child, None);
    }

    fn set_subtree_root(&mut self, id: NodeId, root: Option<NodeId>) {
        let mut pending: Vec<NodeId> = alloc::vec![id];
        while let Some(id) = pending.pop() {
            let node = self.node_mut(id);
            node.root = root;
            if let Some(group) = node.kind.group() {
                pending.extend(group.children.iter());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use kurbo::Rect;

    use super::*;
    use crate::events::{ChangeEvent, ChangeListener};
    use crate::shape::ShapeNode;

    fn leaf(tree: &mut Tree) -> NodeId {
        tree.create_shape(ShapeNode::new(Rect::new(0.0, 0.0, 1.0, 1.0)))
    }

    /// Every live node reachable from the root has consistent parent and root links.
    fn assert_links(tree: &Tree) {
        let mut pending = alloc::vec![tree.root()];
        while let Some(id) = pending.pop() {
            assert_eq!(tree.root_of(id), Some(tree.root()), "{id:?} attached");
            for &c in tree.children_of(id) {
                assert_eq!(tree.parent_of(c), Some(id), "parent link of {c:?}");
                pending.push(c);
            }
        }
    }

    #[test]
    fn insert_move_and_remove_keep_links() {
        let mut tree = Tree::new();
        let root = tree.root();
        let g1 = tree.create_group();
        let g2 = tree.create_group();
        let a = leaf(&mut tree);
        let b = leaf(&mut tree);
        tree.append(root, g1).unwrap();
        tree.append(root, g2).unwrap();
        tree.append(g1, a).unwrap();
        tree.insert(g1, 0, b).unwrap();
        assert_eq!(tree.children_of(g1), &[b, a]);
        assert_links(&tree);

        // Move `a` to g2: it leaves g1.
        tree.append(g2, a).unwrap();
        assert_eq!(tree.children_of(g1), &[b]);
        assert_eq!(tree.children_of(g2), &[a]);
        assert_links(&tree);

        assert_eq!(tree.remove_child(g2, a), Ok(true));
        assert_eq!(tree.remove_child(g2, a), Ok(false));
        assert_eq!(tree.parent_of(a), None);
        assert_eq!(tree.root_of(a), None, "detached nodes have no root");
        assert_links(&tree);
    }

    #[test]
    fn detaching_a_group_clears_descendant_roots() {
        let mut tree = Tree::new();
        let g = tree.create_group();
        let a = leaf(&mut tree);
        tree.append(g, a).unwrap();
        assert_eq!(tree.root_of(a), None, "subtree not yet attached");
        tree.append(tree.root(), g).unwrap();
        assert_eq!(tree.root_of(a), Some(tree.root()));
        tree.remove_at(tree.root(), 0).unwrap();
        assert_eq!(tree.root_of(a), None);
    }

    #[test]
    fn reorder_within_same_parent() {
        let mut tree = Tree::new();
        let root = tree.root();
        let ids: Vec<NodeId> = (0..3)
            .map(|_| {
                let n = leaf(&mut tree);
                tree.append(root, n).unwrap();
                n
            })
            .collect();
        tree.append(root, ids[0]).unwrap();
        assert_eq!(tree.children_of(root), &[ids[1], ids[2], ids[0]]);
        tree.insert(root, 0, ids[0]).unwrap();
        assert_eq!(tree.children_of(root), &[ids[0], ids[1], ids[2]]);
        tree.insert(root, 3, ids[0]).unwrap();
        assert_eq!(tree.children_of(root), &[ids[1], ids[2], ids[0]]);
        assert_links(&tree);
    }

    #[test]
    fn replace_returns_displaced_node() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = leaf(&mut tree);
        let b = leaf(&mut tree);
        tree.append(root, a).unwrap();
        assert_eq!(tree.replace(root, 0, b), Ok(a));
        assert_eq!(tree.children_of(root), &[b]);
        assert_eq!(tree.parent_of(a), None);
        assert_eq!(tree.replace(root, 0, b), Ok(b), "replacing with itself is a no-op");
    }

    #[test]
    fn structural_errors() {
        let mut tree = Tree::new();
        let root = tree.root();
        let g = tree.create_group();
        let inner = tree.create_group();
        let a = leaf(&mut tree);
        tree.append(root, g).unwrap();
        tree.append(g, inner).unwrap();

        assert_eq!(tree.append(a, g), Err(TreeError::NotAGroup(a)));
        assert_eq!(
            tree.insert(g, 5, a),
            Err(TreeError::IndexOutOfBounds { index: 5, len: 1 })
        );
        assert!(matches!(tree.append(inner, g), Err(TreeError::InvalidArgument(_))));
        assert!(matches!(tree.append(g, g), Err(TreeError::InvalidArgument(_))));
        assert!(matches!(tree.append(g, root), Err(TreeError::InvalidArgument(_))));
        assert_eq!(
            tree.remove_at(g, 3),
            Err(TreeError::IndexOutOfBounds { index: 3, len: 1 })
        );
        tree.dispose(a).unwrap();
        assert_eq!(tree.append(g, a), Err(TreeError::StaleNode(a)));
    }

    struct Log(Arc<Mutex<Vec<(bool, ChangeEvent)>>>);

    impl ChangeListener for Log {
        fn change_started(&mut self, _tree: &Tree, event: &ChangeEvent) {
            self.0.lock().unwrap().push((true, *event));
        }

        fn change_completed(&mut self, _tree: &Tree, event: &ChangeEvent) {
            self.0.lock().unwrap().push((false, *event));
        }
    }

    #[test]
    fn move_reports_new_parent_around_old_parent() {
        let mut tree = Tree::new();
        let root = tree.root();
        let g1 = tree.create_group();
        let g2 = tree.create_group();
        let a = leaf(&mut tree);
        tree.append(root, g1).unwrap();
        tree.append(root, g2).unwrap();
        tree.append(g1, a).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        tree.add_listener(Box::new(Log(events.clone())));
        tree.append(g2, a).unwrap();

        let ev = |node, started| {
            (
                started,
                ChangeEvent {
                    node,
                    source: Some(a),
                },
            )
        };
        assert_eq!(
            *events.lock().unwrap(),
            alloc::vec![ev(g2, true), ev(g1, true), ev(g1, false), ev(g2, false)]
        );
    }

    #[test]
    fn structure_invalidates_bounds() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.create_shape(ShapeNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let b = tree.create_shape(ShapeNode::new(Rect::new(20.0, 20.0, 30.0, 30.0)));
        tree.append(root, a).unwrap();
        assert_eq!(tree.bounds(root), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        tree.append(root, b).unwrap();
        assert_eq!(tree.bounds(root), Some(Rect::new(0.0, 0.0, 30.0, 30.0)));
        tree.remove_child(root, a).unwrap();
        assert_eq!(tree.bounds(root), Some(Rect::new(20.0, 20.0, 30.0, 30.0)));
        tree.remove_child(root, b).unwrap();
        assert_eq!(tree.bounds(root), None, "empty group has no bounds");
    }

    #[test]
    fn detached_edits_are_silent() {
        static COUNT: AtomicUsize = AtomicUsize::new(0);
        struct Counter;
        impl ChangeListener for Counter {
            fn change_started(&mut self, _tree: &Tree, _event: &ChangeEvent) {
                COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }
        let mut tree = Tree::new();
        tree.add_listener(Box::new(Counter));
        let g = tree.create_group();
        let a = leaf(&mut tree);
        tree.append(g, a).unwrap();
        tree.remove_child(g, a).unwrap();
        assert_eq!(COUNT.load(Ordering::Relaxed), 0);
        tree.append(tree.root(), g).unwrap();
        assert_eq!(COUNT.load(Ordering::Relaxed), 1);
    }
}
