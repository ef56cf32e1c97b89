// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-region tracking.
//!
//! [`UpdateTracker`] listens to change notifications and remembers, for each
//! node changed since the last consumption, its transform and extent before
//! the first change. When the batch is consumed it produces root-space
//! rectangles covering both where content was and where it is now.
//!
//! A child that moves between containers has its old extent frozen into root
//! space at the moment of the move, so later changes to its new ancestors do
//! not drag the old region along with them.
//!
//! Filters are treated conservatively: a change anywhere below a filtered
//! node dirties the whole filter region.

use hashbrown::HashMap;
use kurbo::{Affine, Rect};

use crate::damage::Damage;
use crate::events::{ChangeEvent, ChangeListener};
use crate::geom::{transform_rect_bbox, union_opt};
use crate::tree::Tree;
use crate::types::NodeId;

/// Accumulated pre-change extent of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Region {
    /// In the node's local space, mapped through the old pose on consumption.
    local: Option<Rect>,
    /// Already in root space.
    frozen: Option<Rect>,
}

/// Records pre-change extents and turns them into repaint regions.
#[derive(Debug, Default)]
pub struct UpdateTracker {
    /// Effective transform of each changed node before its first change.
    observed: HashMap<NodeId, Affine>,
    regions: HashMap<NodeId, Region>,
}

impl UpdateTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything changed since the last [`UpdateTracker::dirty_areas`].
    pub fn has_changes(&self) -> bool {
        !self.observed.is_empty()
    }

    /// Forget the current batch.
    pub fn clear(&mut self) {
        self.observed.clear();
        self.regions.clear();
    }

    /// Consume the batch: old and new root-space extents of every changed node.
    ///
    /// Nodes that were disposed, or that are no longer below the tree root,
    /// contribute only regions frozen while they were attached.
    pub fn dirty_areas(&mut self, tree: &Tree) -> Damage {
        let observed = core::mem::take(&mut self.observed);
        let mut regions = core::mem::take(&mut self.regions);
        let mut damage = Damage::default();
        let root = tree.root();

        for (&id, &old_own) in &observed {
            let region = regions.remove(&id).unwrap_or_default();
            if let Some(frozen) = region.frozen {
                damage.push(frozen);
            }
            let Some(node) = tree.get(id) else {
                tracing::trace!(?id, "skipping disposed node");
                continue;
            };
            let mut old = old_own;
            let mut new = node.effective_transform();
            let mut new_rect = tree.bounds(id);
            let mut reached_root = id == root;
            let mut cur = node.parent;
            while let Some(pid) = cur {
                let Some(parent) = tree.get(pid) else {
                    break;
                };
                if let Some(filter) = &parent.filter {
                    new_rect = Some(filter.bounds());
                    new = Affine::IDENTITY;
                }
                let current = parent.effective_transform();
                old = observed.get(&pid).copied().unwrap_or(current) * old;
                new = current * new;
                reached_root = pid == root;
                cur = parent.parent;
            }
            if !reached_root {
                continue;
            }
            if let Some(r) = region.local {
                damage.push(transform_rect_bbox(old, r));
            }
            if let Some(r) = new_rect {
                damage.push(transform_rect_bbox(new, r));
            }
        }
        tracing::debug!(rects = damage.dirty_rects.len(), "consumed dirty areas");
        damage
    }

    /// Old-pose extent of `id` and everything below it, in the frame that
    /// `to_frame` maps its parent space into.
    ///
    /// Recorded regions found on the way are taken out of the batch.
    fn subtree_region(&mut self, tree: &Tree, id: NodeId, to_frame: Affine) -> Option<Rect> {
        let node = tree.get(id)?;
        let own = self
            .observed
            .get(&id)
            .copied()
            .unwrap_or_else(|| node.effective_transform());
        let t = to_frame * own;
        if let Some(filter) = &node.filter {
            self.forget_below(tree, id);
            return Some(transform_rect_bbox(t, filter.bounds()));
        }
        let recorded = self.regions.remove(&id).and_then(|r| r.local);
        let mut acc = recorded.map(|r| transform_rect_bbox(t, r));
        match node.kind.group() {
            Some(group) => {
                for child in group.children.iter() {
                    acc = union_opt(acc, self.subtree_region(tree, child, t));
                }
            }
            None if acc.is_none() => {
                acc = tree.bounds(id).map(|r| transform_rect_bbox(t, r));
            }
            None => {}
        }
        acc
    }

    fn forget_below(&mut self, tree: &Tree, id: NodeId) {
        for &child in tree.children_of(id) {
            if let Some(r) = self.regions.get_mut(&child) {
                r.local = None;
            }
            self.forget_below(tree, child);
        }
    }

    /// Old-pose transform from the local space of `id` to root space, or
    /// `None` when `id` is not below the tree root.
    fn old_pose_to_root(&self, tree: &Tree, id: NodeId) -> Option<Affine> {
        let root = tree.root();
        let mut t = Affine::IDENTITY;
        let mut cur = Some(id);
        while let Some(nid) = cur {
            let node = tree.get(nid)?;
            let own = self
                .observed
                .get(&nid)
                .copied()
                .unwrap_or_else(|| node.effective_transform());
            t = own * t;
            if nid == root {
                return Some(t);
            }
            cur = node.parent;
        }
        None
    }
}

impl ChangeListener for UpdateTracker {
    fn change_started(&mut self, tree: &Tree, event: &ChangeEvent) {
        let Some(node) = tree.get(event.node) else {
            return;
        };
        self.observed
            .entry(event.node)
            .or_insert_with(|| node.effective_transform());

        match event.source {
            Some(source) => {
                // The source is still in its old place; freeze where it was.
                let frame = tree.parent_of(source);
                let region = self.subtree_region(tree, source, Affine::IDENTITY);
                let to_root = frame.and_then(|p| self.old_pose_to_root(tree, p));
                if let (Some(r), Some(t)) = (region, to_root) {
                    let entry = self.regions.entry(event.node).or_default();
                    entry.frozen = union_opt(entry.frozen, Some(transform_rect_bbox(t, r)));
                }
            }
            None => {
                let bounds = tree.bounds(event.node);
                let entry = self.regions.entry(event.node).or_default();
                entry.local = union_opt(entry.local, bounds);
            }
        }
    }
}
