// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::geom::DEFAULT_EPSILON;

/// Tunables for a [`Tree`](crate::Tree).
///
/// The defaults suit on-screen rendering in pixel units.
///
/// ```rust
/// use understory_render_tree::{Tree, TreeConfig};
///
/// let tree = Tree::with_config(TreeConfig::new().with_epsilon(1e-4));
/// assert_eq!(tree.config().epsilon, 1e-4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeConfig {
    /// Minimum extent, in root units, of a normalized degenerate bounds rectangle.
    pub epsilon: f64,
    /// Simple alpha composites below this opacity are not painted at all.
    pub alpha_threshold: f32,
    /// Number of children visited between cancellation checks.
    pub cancel_check_interval: usize,
    /// Pattern tiles wider or taller than this (device pixels) are chunked.
    pub pattern_tile_cache_threshold: u32,
    /// Maximum number of chunks a pattern keeps cached.
    pub pattern_tile_cache_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            alpha_threshold: 0.001,
            cancel_check_interval: 16,
            pattern_tile_cache_threshold: 128,
            pattern_tile_cache_capacity: 64,
        }
    }
}

impl TreeConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the normalization epsilon.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Override the invisible-alpha threshold.
    pub fn with_alpha_threshold(mut self, threshold: f32) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    /// Override how often traversals poll for cancellation. Zero is treated as one.
    pub fn with_cancel_check_interval(mut self, interval: usize) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }

    /// Override the pattern chunking threshold and chunk budget.
    pub fn with_pattern_tile_cache(mut self, threshold: u32, capacity: usize) -> Self {
        self.pattern_tile_cache_threshold = threshold.max(1);
        self.pattern_tile_cache_capacity = capacity;
        self
    }
}
