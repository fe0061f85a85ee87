//! Garbage collector contract
//!
//! The collector itself lives outside this crate. The runtime only needs to
//! keep it from running while attribute layouts are being swapped, and to
//! report values reachable from objects when they are marked.

use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hooks into the host collector
pub trait CollectorHooks: Send + Sync {
    /// Prevent collection until the matching [`unblock`](Self::unblock)
    fn block(&self);

    /// Allow collection again
    fn unblock(&self);

    /// Report a value reachable from a marked object
    fn keep_alive(&self, _value: &Value) {}
}

/// Collector that never runs, counting block depth
#[derive(Debug, Default)]
pub struct NoopCollector {
    depth: AtomicUsize,
    blocks: AtomicUsize,
}

impl NoopCollector {
    /// Create a collector hook with no blocks outstanding
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding blocks
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Total number of blocks taken so far
    pub fn blocks(&self) -> usize {
        self.blocks.load(Ordering::Acquire)
    }
}

impl CollectorHooks for NoopCollector {
    fn block(&self) {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.blocks.fetch_add(1, Ordering::AcqRel);
    }

    fn unblock(&self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// RAII guard blocking collection while alive
pub struct CollectionBlock<'a> {
    hooks: &'a dyn CollectorHooks,
}

impl<'a> CollectionBlock<'a> {
    /// Block collection until the guard is dropped
    pub fn new(hooks: &'a dyn CollectorHooks) -> Self {
        hooks.block();
        Self { hooks }
    }
}

impl Drop for CollectionBlock<'_> {
    fn drop(&mut self) {
        self.hooks.unblock();
    }
}
