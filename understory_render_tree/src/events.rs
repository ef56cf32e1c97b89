// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::tree::Tree;
use crate::types::NodeId;

/// A change to a node that is attached under the tree root.
///
/// Every mutation is bracketed by a started and a completed notification
/// carrying the same event. During "started" the tree still shows the old
/// state; during "completed" it shows the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The node whose state changes.
    pub node: NodeId,
    /// For structural changes, the child that is being inserted, moved, or removed.
    pub source: Option<NodeId>,
}

/// Observer of tree mutations.
pub trait ChangeListener: Send {
    /// Called before the mutation is applied.
    fn change_started(&mut self, tree: &Tree, event: &ChangeEvent);

    /// Called after the mutation is applied.
    fn change_completed(&mut self, tree: &Tree, event: &ChangeEvent) {
        let _ = (tree, event);
    }
}

/// Handle returned by [`Tree::add_listener`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub(crate) u32);
