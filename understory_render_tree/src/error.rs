// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::types::NodeId;

/// Misuse of the tree's structural API.
///
/// Degenerate geometry and cancellation are never reported through this type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The id does not refer to a live node.
    #[error("stale node id {0:?}")]
    StaleNode(NodeId),
    /// A child operation targeted a node that cannot hold children.
    #[error("node {0:?} is not a group")]
    NotAGroup(NodeId),
    /// A child index was past the end of the child list.
    #[error("child index {index} out of range for {len} children")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The child count at the time of the call.
        len: usize,
    },
    /// The operation would break the tree shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The child list changed behind an active cursor.
    #[error("child list modified during iteration")]
    ConcurrentModification,
}
