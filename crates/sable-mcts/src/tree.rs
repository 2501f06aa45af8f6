use tracing::trace;

use crate::error::{MctsError, Result};
use crate::evaluator::Evaluation;
use crate::node::{AtomicF32, MoveId, Node, NodeArena, NodeIndex, Selector};
use crate::scratch::{ChildScratch, ScratchPool, MAX_CHILDREN};
use std::sync::atomic::{AtomicBool, Ordering};

// ---------------------------------------------------------------------------
// RootMoveTracker - recent-value and pruning state per root move
// ---------------------------------------------------------------------------

/// Smoothing factor of the exponentially weighted recent value. Roughly a
/// 20-visit horizon.
const RUNNING_V_ALPHA: f32 = 0.05;

/// Per-root-child state maintained by the driver between selection calls.
///
/// Indexed by root child offset (descending-prior order, same as the arena
/// block). `running_v` is an exponentially weighted average of recently
/// backed-up child values (child perspective); `pruned` marks moves the time
/// manager has excluded from further consideration at the root.
pub struct RootMoveTracker {
    running_v: Vec<AtomicF32>,
    seeded: Vec<AtomicBool>,
    pruned: Vec<AtomicBool>,
}

impl RootMoveTracker {
    pub(crate) fn new(num_moves: usize) -> Self {
        Self {
            running_v: (0..num_moves).map(|_| AtomicF32::default()).collect(),
            seeded: (0..num_moves).map(|_| AtomicBool::new(false)).collect(),
            pruned: (0..num_moves).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.running_v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running_v.is_empty()
    }

    /// Fold one backed-up value (child perspective) into the recent average.
    /// The first observation seeds the average directly.
    pub fn record_value(&self, child_offset: usize, value: f32) {
        if self.seeded[child_offset].swap(true, Ordering::Relaxed) {
            self.running_v[child_offset]
                .update(|cur| cur + RUNNING_V_ALPHA * (value - cur));
        } else {
            self.running_v[child_offset].store(value);
        }
    }

    pub fn running_value(&self, child_offset: usize) -> f32 {
        self.running_v[child_offset].load()
    }

    pub fn set_pruned(&self, child_offset: usize, pruned: bool) {
        self.pruned[child_offset].store(pruned, Ordering::Relaxed);
        trace!(child_offset, pruned, "root move pruning updated");
    }

    pub fn is_pruned(&self, child_offset: usize) -> bool {
        self.pruned[child_offset].load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// SearchTree
// ---------------------------------------------------------------------------

/// Arena, root, root-move tracker, and the per-thread gather buffers.
///
/// Growth (expansion) takes `&mut self` and is serialised by the driver
/// between gather batches; selection and visit accounting work through
/// `&self`, reading and updating node statistics atomically.
pub struct SearchTree {
    arena: NodeArena,
    root: NodeIndex,
    root_moves: RootMoveTracker,
    pub(crate) scratch: ScratchPool,
}

impl SearchTree {
    /// Build a tree whose root is already expanded with the given policy.
    pub fn from_root_eval(eval: &Evaluation) -> Result<Self> {
        let mut arena = NodeArena::with_capacity(1 + eval.moves.len());
        let root = arena.alloc(Node::new(MoveId::NONE, 1.0));
        expand_block(&mut arena, root, eval)?;
        let num_root_moves = arena[root].num_policy_moves();
        Ok(Self {
            arena,
            root,
            root_moves: RootMoveTracker::new(num_root_moves),
            scratch: ScratchPool::new(),
        })
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn is_root(&self, idx: NodeIndex) -> bool {
        idx == self.root
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn root_moves(&self) -> &RootMoveTracker {
        &self.root_moves
    }

    /// Expand `parent` with the children named by `eval`, allocated as one
    /// contiguous block in descending prior order.
    pub fn expand(&mut self, parent: NodeIndex, eval: &Evaluation) -> Result<()> {
        expand_block(&mut self.arena, parent, eval)
    }

    /// Snapshot the child statistics of `parent` into `scratch`.
    ///
    /// Fills `n`, `in_flight` (for `selector`), `p`, `w`, and `u` for the
    /// first `num_to_process = min(last_child + 1, policy moves,
    /// MAX_CHILDREN)` children and returns that count. Values are relaxed
    /// point-in-time reads; a visit landing mid-gather is acceptable and
    /// self-corrects on the next descent.
    pub fn gather_children(
        &self,
        parent: NodeIndex,
        selector: Selector,
        last_child: usize,
        scratch: &mut ChildScratch,
    ) -> usize {
        let node = &self.arena[parent];
        let num_to_process = (last_child + 1)
            .min(node.num_policy_moves())
            .min(MAX_CHILDREN);

        let children = self.arena.children(parent);
        for (i, child) in children.iter().enumerate().take(num_to_process) {
            scratch.n[i] = child.n();
            scratch.in_flight[i] = child.n_in_flight(selector);
            scratch.p[i] = child.prior();
            scratch.w[i] = child.w_sum() as f32;
            scratch.u[i] = child.uncertainty();
        }
        num_to_process
    }
}

/// Shared expansion path: sanitise priors, sort descending, allocate the
/// child block, wire the parent.
fn expand_block(arena: &mut NodeArena, parent: NodeIndex, eval: &Evaluation) -> Result<()> {
    if arena[parent].is_expanded() {
        return Err(MctsError::AlreadyExpanded(parent.as_usize() as u32));
    }
    if eval.moves.is_empty() {
        return Err(MctsError::EmptyPolicy);
    }
    if eval.moves.len() > MAX_CHILDREN {
        return Err(MctsError::TooManyChildren {
            got: eval.moves.len(),
            cap: MAX_CHILDREN,
        });
    }

    // Drop NaN and negative mass, renormalise; a degenerate policy becomes
    // uniform rather than poisoning downstream arithmetic.
    let mut moves: Vec<(MoveId, f32)> = eval
        .moves
        .iter()
        .map(|&(m, p)| (m, if p.is_finite() && p > 0.0 { p } else { 0.0 }))
        .collect();
    let mass: f32 = moves.iter().map(|&(_, p)| p).sum();
    if mass > f32::EPSILON {
        for (_, p) in &mut moves {
            *p /= mass;
        }
    } else {
        let uniform = 1.0 / moves.len() as f32;
        for (_, p) in &mut moves {
            *p = uniform;
        }
    }

    moves.sort_by(|a, b| b.1.total_cmp(&a.1));

    let start = NodeIndex::new(arena.len() as u32);
    let count = moves.len() as u16;
    for (mov, prior) in moves {
        arena.alloc(Node::new(mov, prior));
    }
    arena[parent].set_children(start, count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
