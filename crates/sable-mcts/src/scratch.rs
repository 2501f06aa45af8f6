//! Per-thread gather buffers for the selection kernel.
//!
//! Each worker thread owns one `ChildScratch` for its lifetime; buffers are
//! created lazily on first use and every slot is overwritten at the start of
//! each kernel invocation, so no clearing is needed between calls.

use std::cell::RefCell;

use thread_local::ThreadLocal;

/// Capacity of the per-child arrays. Chess allows at most 218 legal moves;
/// rounded up so array ends land on cache-line boundaries.
pub const MAX_CHILDREN: usize = 224;

/// Structure-of-arrays snapshot of one node's children.
///
/// Only the prefix `0..num_to_process` returned by the gather is valid; the
/// kernel neither reads nor writes beyond it.
#[repr(align(64))]
pub struct ChildScratch {
    /// Completed visits.
    pub n: [u32; MAX_CHILDREN],
    /// In-flight visits for the requesting selector.
    pub in_flight: [u32; MAX_CHILDREN],
    /// Prior probability, possibly transformed in place by the adjusters.
    pub p: [f32; MAX_CHILDREN],
    /// Value sum from the child's own perspective.
    pub w: [f32; MAX_CHILDREN],
    /// Child uncertainty (mean absolute deviation).
    pub u: [f32; MAX_CHILDREN],
}

impl ChildScratch {
    pub(crate) fn new() -> Box<Self> {
        Box::new(Self {
            n: [0; MAX_CHILDREN],
            in_flight: [0; MAX_CHILDREN],
            p: [0.0; MAX_CHILDREN],
            w: [0.0; MAX_CHILDREN],
            u: [0.0; MAX_CHILDREN],
        })
    }
}

/// Hands each thread its own scratch buffer.
///
/// Owned by the tree and shared across worker threads; the per-thread slots
/// make access lock-free by construction. `RefCell` guards against
/// re-entrant use on the same thread, which would alias the buffer.
pub(crate) struct ScratchPool {
    slots: ThreadLocal<RefCell<Box<ChildScratch>>>,
}

impl ScratchPool {
    pub(crate) fn new() -> Self {
        Self {
            slots: ThreadLocal::new(),
        }
    }

    /// Run `f` with this thread's scratch buffer, creating it on first use.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut ChildScratch) -> R) -> R {
        let slot = self.slots.get_or(|| RefCell::new(ChildScratch::new()));
        let mut scratch = slot.borrow_mut();
        f(&mut scratch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
