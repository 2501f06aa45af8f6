//! Score computation and batched visit allocation over one node's children.
//!
//! The entry point scores every processed child under the PUCT formula and,
//! when given a visit budget, distributes it exactly as repeated one-visit
//! selection would: the score of the leading child falls as it accumulates
//! allocation (virtual loss plus a growing exploration denominator), so the
//! batch walks from one leader to the next instead of looping per visit.

use crate::node::{Node, NodeIndex, Selector};
use crate::params::SearchParams;
use crate::priors;
use crate::scratch::{ChildScratch, MAX_CHILDREN};
use crate::tree::SearchTree;

/// Exploration retained once a forced mate is known among children. Nonzero
/// so shorter mates can still be discovered.
const CHECKMATE_CPUCT_MULT: f32 = 0.1;

// ---------------------------------------------------------------------------
// ScoreRequest
// ---------------------------------------------------------------------------

/// Per-invocation arguments of the selection kernel.
#[derive(Clone, Debug)]
pub struct ScoreRequest<'a> {
    pub selector: Selector,
    /// Distance from the root; 0 selects root FPU and enables root policy
    /// decay.
    pub depth: u32,
    /// Extra virtual-loss weight for the secondary selector.
    pub dynamic_vloss_boost: f32,
    /// Must be 0; kept in the signature for symmetry with `max_child_index`.
    pub min_child_index: usize,
    /// Highest child index the caller wants processed (inclusive).
    pub max_child_index: usize,
    /// 0 requests pure score mode; otherwise the number of new visits to
    /// distribute.
    pub num_visits_to_compute: u32,
    pub cpuct_multiplier: f32,
    /// Observed move distribution blended into the priors when
    /// `empirical_weight > 0`. Must cover every processed child.
    pub empirical_distrib: Option<&'a [f32]>,
    pub empirical_weight: f32,
}

impl<'a> ScoreRequest<'a> {
    pub fn visits(
        selector: Selector,
        depth: u32,
        max_child_index: usize,
        num_visits_to_compute: u32,
    ) -> Self {
        Self {
            selector,
            depth,
            dynamic_vloss_boost: 0.0,
            min_child_index: 0,
            max_child_index,
            num_visits_to_compute,
            cpuct_multiplier: 1.0,
            empirical_distrib: None,
            empirical_weight: 0.0,
        }
    }

    pub fn scores_only(selector: Selector, depth: u32, max_child_index: usize) -> Self {
        Self::visits(selector, depth, max_child_index, 0)
    }
}

// ---------------------------------------------------------------------------
// ScoreContext - fixed per-invocation score inputs
// ---------------------------------------------------------------------------

/// Everything about the parent that the per-child score needs, frozen at
/// gather time.
pub(crate) struct ScoreContext {
    /// `cpuct_effective * sqrt(parent effective visits)`.
    pub(crate) exploration: f32,
    /// Virtual-loss magnitude per in-flight visit.
    pub(crate) vloss: f32,
    /// Value assumed for children with no completed visits.
    pub(crate) fpu: f32,
}

impl ScoreContext {
    fn build(
        params: &SearchParams,
        node: &Node,
        req: &ScoreRequest<'_>,
        cpuct_multiplier: f32,
    ) -> Self {
        let n_parent = node.n();
        let n_eff = (n_parent + node.n_in_flight(req.selector)).max(1);

        let mut cpuct = params.cpuct;
        if params.cpuct_factor != 0.0 && params.cpuct_base > 0.0 {
            cpuct += params.cpuct_factor
                * ((n_parent as f32 + params.cpuct_base) / params.cpuct_base).ln();
        }

        let vloss = params.virtual_loss
            * match req.selector {
                Selector::Primary => 1.0,
                Selector::Secondary => 1.0 + req.dynamic_vloss_boost,
            };

        let reduction = if req.depth == 0 {
            params.fpu_reduction_at_root
        } else {
            params.fpu_reduction
        };
        let fpu = (node.q() - reduction * node.sum_p_visited().max(0.0).sqrt())
            .clamp(-1.0, 1.0);

        Self {
            exploration: cpuct * cpuct_multiplier * (n_eff as f32).sqrt(),
            vloss,
            fpu,
        }
    }

    /// PUCT score of one child from the parent's perspective.
    ///
    /// `w` is the child's value sum in its own perspective (negated here),
    /// `in_flight` counts both real in-flight visits and any allocation
    /// already made in this invocation.
    #[inline]
    pub(crate) fn score(&self, p: f32, w: f32, n: u32, in_flight: u32) -> f32 {
        let denom = (n + in_flight) as f32;
        let q = if n == 0 {
            self.fpu
        } else {
            (-w - self.vloss * in_flight as f32) / denom
        };
        q + self.exploration * p / (1.0 + denom)
    }
}

// ---------------------------------------------------------------------------
// Batched allocation
// ---------------------------------------------------------------------------

/// Distribute `budget` visits over the first `num_to_process` children so
/// the result equals picking the argmax one visit at a time, counting each
/// allocated visit as in-flight for the next pick. Ties go to the lower
/// index.
///
/// Every rival's score stays fixed while the leader accumulates allocation,
/// so each round resolves a whole run of visits at once: how many the leader
/// takes before a rival overtakes it. When the leader's score is provably
/// non-increasing in its allocation (`w <= vloss * n`, which also covers the
/// FPU case) the run length is binary-searched; otherwise the value term can
/// rise as allocation dilutes a bad child's Q, and the run is walked visit
/// by visit.
pub(crate) fn allocate_visits(
    scratch: &ChildScratch,
    ctx: &ScoreContext,
    num_to_process: usize,
    budget: u32,
    counts: &mut [i16],
) {
    counts[..num_to_process].fill(0);
    if num_to_process == 0 || budget == 0 {
        return;
    }

    let mut cur = [0.0f32; MAX_CHILDREN];
    for i in 0..num_to_process {
        cur[i] = ctx.score(scratch.p[i], scratch.w[i], scratch.n[i], scratch.in_flight[i]);
    }

    let mut remaining = budget;
    while remaining > 0 {
        let mut best = 0usize;
        for i in 1..num_to_process {
            if cur[i] > cur[best] {
                best = i;
            }
        }

        // Strongest rival and its lowest index; the lead survives an exact
        // tie only from the lower index.
        let mut rival = usize::MAX;
        let mut rival_score = f32::NEG_INFINITY;
        for (i, &s) in cur.iter().enumerate().take(num_to_process) {
            if i != best && s > rival_score {
                rival_score = s;
                rival = i;
            }
        }

        let base = scratch.in_flight[best] + counts[best] as u32;
        let keeps_lead = |extra: u32| -> bool {
            let s = ctx.score(scratch.p[best], scratch.w[best], scratch.n[best], base + extra);
            s > rival_score || (s == rival_score && best < rival)
        };

        let monotone = scratch.w[best] <= ctx.vloss * scratch.n[best] as f32;
        let run = if monotone && keeps_lead(remaining) {
            remaining
        } else if monotone {
            // Smallest allocation at which the lead is lost; the first visit
            // is always granted because `best` is the current argmax.
            let mut lo = 1u32;
            let mut hi = remaining;
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if keeps_lead(mid) {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            lo
        } else {
            let mut extra = 1u32;
            while extra < remaining && keeps_lead(extra) {
                extra += 1;
            }
            extra
        };

        counts[best] += run as i16;
        remaining -= run;
        cur[best] = ctx.score(
            scratch.p[best],
            scratch.w[best],
            scratch.n[best],
            base + run,
        );
    }
}

// ---------------------------------------------------------------------------
// Hole filling
// ---------------------------------------------------------------------------

/// Shift allocated visits left so no unexpanded child is skipped while a
/// sibling to its right receives visits. Children must expand in index
/// order: downstream code addresses "the first k children" as the live set,
/// and a gap would make a child unreachable.
///
/// Each gap at or beyond the expanded prefix takes one visit from the first
/// nonzero slot to its right. A gap that finds no donor has no visits to
/// its right and needs no fix.
pub(crate) fn fill_expansion_holes(counts: &mut [i16], num_children_expanded: usize) {
    let len = counts.len();
    let mut i = num_children_expanded;
    while i < len {
        if counts[i] == 0 {
            match (i + 1..len).find(|&j| counts[j] > 0) {
                Some(j) => {
                    counts[i] = 1;
                    counts[j] -= 1;
                }
                None => break,
            }
        }
        i += 1;
    }
}

// ---------------------------------------------------------------------------
// Kernel entry point
// ---------------------------------------------------------------------------

impl SearchTree {
    /// Score the children of `parent` and, when `req.num_visits_to_compute`
    /// is nonzero, distribute that many new visits across them.
    ///
    /// Writes `scores[0..num_to_process]` with the snapshot PUCT score of
    /// each child. In visit mode also writes
    /// `child_visit_counts[0..num_to_process]`: non-negative, summing to the
    /// budget, left-dense past the expanded prefix. Pure score mode leaves
    /// `child_visit_counts` untouched. Returns `num_to_process`.
    ///
    /// Panics on contract violations: nonzero `min_child_index`,
    /// `max_child_index` beyond capacity, a budget outside `i16` range, a
    /// secondary selector without `flow_dual_selectors`, or an expanded
    /// prefix exceeding the policy move count.
    pub fn compute_top_child_scores(
        &self,
        params: &SearchParams,
        parent: NodeIndex,
        req: &ScoreRequest<'_>,
        scores: &mut [f32],
        child_visit_counts: &mut [i16],
    ) -> usize {
        assert_eq!(
            req.min_child_index, 0,
            "only a zero min child index is supported"
        );
        assert!(
            req.max_child_index < MAX_CHILDREN,
            "max child index {} exceeds capacity {}",
            req.max_child_index,
            MAX_CHILDREN
        );
        assert!(
            req.num_visits_to_compute <= i16::MAX as u32,
            "visit budget {} exceeds i16 range",
            req.num_visits_to_compute
        );
        assert!(
            req.selector == Selector::Primary || params.flow_dual_selectors,
            "secondary selector requires flow_dual_selectors"
        );

        let node = &self.arena()[parent];
        let num_expanded = node.num_children_expanded();
        assert!(
            num_expanded <= node.num_policy_moves(),
            "expanded prefix {} exceeds policy move count {}",
            num_expanded,
            node.num_policy_moves()
        );

        let mut num_to_process = (req.max_child_index + 1)
            .min(node.num_policy_moves())
            .min(MAX_CHILDREN);
        if num_to_process == 0 {
            return 0;
        }

        let mut cpuct_multiplier = req.cpuct_multiplier;
        if params.checkmate_certainty_propagation && node.checkmate_known_among_children() {
            if params.checkmate_allow_minimal_exploration {
                cpuct_multiplier *= CHECKMATE_CPUCT_MULT;
            } else {
                cpuct_multiplier = 0.0;
                num_to_process = num_to_process.min(num_expanded.max(1));
            }
        }

        assert!(
            scores.len() >= num_to_process && child_visit_counts.len() >= num_to_process,
            "output slices shorter than the processed child count {num_to_process}"
        );

        let is_root = self.is_root(parent);
        let n_parent = node.n();

        self.scratch.with(|scratch| {
            let gathered =
                self.gather_children(parent, req.selector, req.max_child_index, scratch);
            debug_assert!(gathered >= num_to_process);

            priors::sanitize_policy(&mut scratch.p[..num_to_process]);

            if is_root
                && n_parent > priors::RUNNING_Q_MIN_PARENT_N
                && params.frac_weight_use_running_q > 0.0
            {
                priors::blend_running_q(
                    &mut scratch.w[..num_to_process],
                    &scratch.n[..num_to_process],
                    self.root_moves(),
                    params.frac_weight_use_running_q,
                );
            }

            if req.empirical_weight > 0.0 {
                if let Some(distrib) = req.empirical_distrib {
                    priors::blend_empirical(
                        &mut scratch.p[..num_to_process],
                        distrib,
                        req.empirical_weight,
                    );
                }
            }

            if is_root
                && req.depth == 0
                && n_parent > priors::POLICY_DECAY_MIN_PARENT_N
                && params.policy_decay_factor > 0.0
            {
                priors::decay_policy(
                    &mut scratch.p[..num_to_process],
                    params.policy_decay_factor,
                    params.policy_decay_exponent,
                    n_parent,
                );
            }

            if params.enable_uncertainty_boosting && n_parent >= params.min_n_estimate {
                priors::boost_uncertain(
                    &mut scratch.p[..num_to_process],
                    &scratch.n[..num_to_process],
                    &scratch.u[..num_to_process],
                    node.uncertainty(),
                    params.min_n_estimate,
                );
            }

            if is_root && req.num_visits_to_compute > 0 {
                priors::suppress_pruned_root_moves(
                    &mut scratch.w[..num_to_process],
                    &scratch.n[..num_to_process],
                    self.root_moves(),
                );
            }

            let ctx = ScoreContext::build(params, node, req, cpuct_multiplier);

            for i in 0..num_to_process {
                scores[i] =
                    ctx.score(scratch.p[i], scratch.w[i], scratch.n[i], scratch.in_flight[i]);
            }

            if req.num_visits_to_compute > 0 {
                allocate_visits(
                    scratch,
                    &ctx,
                    num_to_process,
                    req.num_visits_to_compute,
                    child_visit_counts,
                );
                fill_expansion_holes(
                    &mut child_visit_counts[..num_to_process],
                    num_expanded.min(num_to_process),
                );
            }
        });

        num_to_process
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
