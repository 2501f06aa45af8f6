use crate::apply::{apply_visit_counts, commit_child_visit, commit_visit};
use crate::evaluator::Evaluation;
use crate::node::{MoveId, NodeIndex, Selector};
use crate::tree::SearchTree;

/// Evaluation with the given priors over moves 0, 1, 2, ...
pub(crate) fn eval_with_priors(priors: &[f32]) -> Evaluation {
    Evaluation {
        moves: priors
            .iter()
            .enumerate()
            .map(|(i, &p)| (MoveId(i as u16), p))
            .collect(),
        value: 0.0,
        mad: 0.0,
    }
}

/// Tree whose root is expanded with the given priors.
///
/// Note the root children end up sorted by descending prior, so pass priors
/// already in descending order when child offsets matter to the test.
pub(crate) fn tree_with_priors(priors: &[f32]) -> SearchTree {
    SearchTree::from_root_eval(&eval_with_priors(priors)).unwrap()
}

/// Run `visits` full visit cycles through one child: mark in flight, commit
/// on the child with `child_value`, commit the negated value on the parent.
pub(crate) fn give_child_visits(
    tree: &SearchTree,
    parent: NodeIndex,
    child_offset: usize,
    visits: u32,
    child_value: f64,
) {
    let arena = tree.arena();
    let mut counts = vec![0i16; child_offset + 1];
    counts[child_offset] = 1;
    for _ in 0..visits {
        apply_visit_counts(arena, parent, Selector::Primary, &counts);
        commit_child_visit(arena, parent, child_offset, Selector::Primary, child_value);
        commit_visit(arena, parent, Selector::Primary, -child_value);
    }
}

/// Add completed visits to a node without touching its children.
pub(crate) fn give_node_visits(tree: &SearchTree, idx: NodeIndex, visits: u32, value: f64) {
    let arena = tree.arena();
    for _ in 0..visits {
        arena[idx].add_in_flight(Selector::Primary, 1);
        commit_visit(arena, idx, Selector::Primary, value);
    }
}
