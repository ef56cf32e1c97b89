// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a traversal and its controller.
///
/// Clones share the same flag. Traversals poll it at well-defined points and,
/// when it is set, discard partially computed caches and return early.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation request so the token can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Returns true once [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Whether this token and `other` share a flag.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled(), "clone observes cancellation");
        assert!(a.same_as(&b));
        b.reset();
        assert!(!a.is_cancelled(), "reset is shared too");
        assert!(!a.same_as(&CancelToken::new()));
    }
}
