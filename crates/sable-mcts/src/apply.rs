//! Visit accounting around the selection kernel.
//!
//! The kernel itself never mutates the tree: the driver marks allocated
//! visits in flight before descending into them, and commits each completed
//! visit after backup. Both directions work through shared references and
//! atomic counters, so many worker threads can apply concurrently.

use tracing::trace;

use crate::node::{NodeArena, NodeIndex, Selector};

/// Mark an allocation batch in flight: each child gains its share and the
/// parent gains the total under the chosen selector.
pub fn apply_visit_counts(
    arena: &NodeArena,
    parent: NodeIndex,
    selector: Selector,
    counts: &[i16],
) {
    let node = &arena[parent];
    assert!(
        counts.len() <= node.num_policy_moves(),
        "visit counts cover {} children but the node has {}",
        counts.len(),
        node.num_policy_moves()
    );

    let children = arena.children(parent);
    let mut total = 0u32;
    for (i, &count) in counts.iter().enumerate() {
        debug_assert!(count >= 0, "negative visit count at {i}");
        if count > 0 {
            children[i].add_in_flight(selector, count as u32);
            total += count as u32;
        }
    }
    if total > 0 {
        node.add_in_flight(selector, total);
        trace!(parent = parent.as_usize(), total, ?selector, "visit batch in flight");
    }
}

/// Undo `apply_visit_counts` for an abandoned batch (evaluation failure or
/// search shutdown before backup).
pub fn revert_visit_counts(
    arena: &NodeArena,
    parent: NodeIndex,
    selector: Selector,
    counts: &[i16],
) {
    let node = &arena[parent];
    let children = arena.children(parent);
    let mut total = 0u32;
    for (i, &count) in counts.iter().enumerate() {
        if count > 0 {
            children[i].release_in_flight(selector, count as u32);
            total += count as u32;
        }
    }
    if total > 0 {
        node.release_in_flight(selector, total);
    }
}

/// Commit one completed visit on the `child_offset`-th child of `parent`:
/// release its in-flight slot, fold `value` (the child's perspective) into
/// its statistics, and on the first completed visit promote the parent's
/// expansion prefix.
pub fn commit_child_visit(
    arena: &NodeArena,
    parent: NodeIndex,
    child_offset: usize,
    selector: Selector,
    value: f64,
) {
    let children = arena.children(parent);
    let child = &children[child_offset];
    child.release_in_flight(selector, 1);
    let prev_n = child.record_visit(value);
    if prev_n == 0 {
        arena[parent].note_child_first_visit(child_offset, child.prior());
    }
}

/// Commit one completed visit on a node itself (used for every interior
/// node on the backup path, including the root).
pub fn commit_visit(arena: &NodeArena, idx: NodeIndex, selector: Selector, value: f64) {
    let node = &arena[idx];
    node.release_in_flight(selector, 1);
    node.record_visit(value);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::tree_with_priors;

    #[test]
    fn apply_then_revert_round_trips() {
        let tree = tree_with_priors(&[0.5, 0.3, 0.2]);
        let root = tree.root();
        let counts = [2i16, 0, 1];

        apply_visit_counts(tree.arena(), root, Selector::Primary, &counts);
        let children = tree.arena().children(root);
        assert_eq!(children[0].n_in_flight(Selector::Primary), 2);
        assert_eq!(children[1].n_in_flight(Selector::Primary), 0);
        assert_eq!(children[2].n_in_flight(Selector::Primary), 1);
        assert_eq!(tree.arena()[root].n_in_flight(Selector::Primary), 3);

        revert_visit_counts(tree.arena(), root, Selector::Primary, &counts);
        assert_eq!(children[0].n_in_flight(Selector::Primary), 0);
        assert_eq!(tree.arena()[root].n_in_flight(Selector::Primary), 0);
    }

    #[test]
    fn apply_respects_selector_identity() {
        let tree = tree_with_priors(&[0.5, 0.5]);
        let root = tree.root();

        apply_visit_counts(tree.arena(), root, Selector::Secondary, &[1, 1]);
        let children = tree.arena().children(root);
        assert_eq!(children[0].n_in_flight(Selector::Primary), 0);
        assert_eq!(children[0].n_in_flight(Selector::Secondary), 1);
        assert_eq!(tree.arena()[root].n_in_flight(Selector::Secondary), 2);
    }

    #[test]
    fn commit_promotes_expansion_prefix_once() {
        let tree = tree_with_priors(&[0.6, 0.4]);
        let root = tree.root();

        apply_visit_counts(tree.arena(), root, Selector::Primary, &[2, 0]);
        commit_child_visit(tree.arena(), root, 0, Selector::Primary, -0.25);

        let node = &tree.arena()[root];
        assert_eq!(node.num_children_expanded(), 1);
        assert!((node.sum_p_visited() - 0.6).abs() < 1e-6);

        // Second visit to the same child changes neither prefix nor mass.
        commit_child_visit(tree.arena(), root, 0, Selector::Primary, -0.25);
        assert_eq!(node.num_children_expanded(), 1);
        assert!((node.sum_p_visited() - 0.6).abs() < 1e-6);

        let child = &tree.arena().children(root)[0];
        assert_eq!(child.n(), 2);
        assert!((child.w_sum() - (-0.5)).abs() < 1e-9);
        assert_eq!(child.n_in_flight(Selector::Primary), 0);
    }

    #[test]
    fn commit_visit_updates_interior_node() {
        let tree = tree_with_priors(&[1.0]);
        let root = tree.root();

        tree.arena()[root].add_in_flight(Selector::Primary, 1);
        commit_visit(tree.arena(), root, Selector::Primary, 0.5);

        let node = &tree.arena()[root];
        assert_eq!(node.n(), 1);
        assert_eq!(node.n_in_flight(Selector::Primary), 0);
        assert!((node.q() - 0.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "visit counts cover")]
    fn apply_rejects_oversized_count_slice() {
        let tree = tree_with_priors(&[0.5, 0.5]);
        apply_visit_counts(tree.arena(), tree.root(), Selector::Primary, &[1, 1, 1]);
    }
}
