//! Batched PUCT child selection for a neural-network-guided chess MCTS.
//!
//! The centrepiece is [`SearchTree::compute_top_child_scores`]: given the
//! gathered statistics of one node's children it scores every child under
//! the PUCT formula and distributes a budget of new visits exactly as
//! one-at-a-time re-selection would, which is what lets the search amortise
//! tree descents against GPU-sized evaluation batches.

pub mod apply;
pub mod error;
pub mod evaluator;
pub mod node;
pub mod params;
pub mod scratch;
pub mod select;
pub mod tree;

mod priors;

#[cfg(test)]
pub(crate) mod test_util;

pub use apply::{apply_visit_counts, commit_child_visit, commit_visit, revert_visit_counts};
pub use error::{MctsError, Result};
pub use evaluator::{Evaluation, Evaluator, UniformEvaluator};
pub use node::{MoveId, Node, NodeArena, NodeIndex, Selector};
pub use params::SearchParams;
pub use scratch::{ChildScratch, MAX_CHILDREN};
pub use select::ScoreRequest;
pub use tree::{RootMoveTracker, SearchTree};
