use crate::error::{MctsError, Result};
use crate::node::MoveId;

// ---------------------------------------------------------------------------
// Evaluation - output of any policy/value source
// ---------------------------------------------------------------------------

/// Policy and value for one position.
///
/// `moves` pairs each legal move with its prior; priors are expected to sum
/// to 1 (expansion renormalises defensively). `value` is from the side to
/// move's perspective, `mad` is the evaluator's own uncertainty estimate and
/// may be 0 when the source provides none.
#[derive(Clone, Debug)]
#[must_use]
pub struct Evaluation {
    pub moves: Vec<(MoveId, f32)>,
    pub value: f32,
    pub mad: f32,
}

// ---------------------------------------------------------------------------
// Evaluator trait
// ---------------------------------------------------------------------------

/// Boundary between the tree and whatever produces priors and values.
///
/// The tree hands over the legal moves and gets back priors plus a value; it
/// doesn't know whether the source is a neural network, a linear combination
/// of networks, or a uniform stub.
///
/// `Send + Sync` because one evaluator is shared across worker threads.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, moves: &[MoveId]) -> Result<Evaluation>;

    /// Batch evaluation. Sequential fallback; GPU-backed implementations
    /// override this with a real batched forward pass.
    fn evaluate_batch(&self, batches: &[&[MoveId]]) -> Result<Vec<Evaluation>> {
        batches.iter().map(|moves| self.evaluate(moves)).collect()
    }
}

// ---------------------------------------------------------------------------
// UniformEvaluator - no-NN mode
// ---------------------------------------------------------------------------

/// Uniform priors, zero value, zero uncertainty.
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, moves: &[MoveId]) -> Result<Evaluation> {
        if moves.is_empty() {
            return Err(MctsError::EmptyPolicy);
        }
        let p = 1.0 / moves.len() as f32;
        Ok(Evaluation {
            moves: moves.iter().map(|&m| (m, p)).collect(),
            value: 0.0,
            mad: 0.0,
        })
    }
}

// ---------------------------------------------------------------------------
// ConstantEvaluator - test-only, configurable value
// ---------------------------------------------------------------------------

/// Uniform priors with a fixed value output. Test-only: lets backup tests
/// exercise nonzero values, which `UniformEvaluator` cannot.
#[cfg(test)]
pub(crate) struct ConstantEvaluator {
    pub value: f32,
}

#[cfg(test)]
impl Evaluator for ConstantEvaluator {
    fn evaluate(&self, moves: &[MoveId]) -> Result<Evaluation> {
        let mut eval = UniformEvaluator.evaluate(moves)?;
        eval.value = self.value;
        Ok(eval)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(n: u16) -> Vec<MoveId> {
        (0..n).map(MoveId).collect()
    }

    #[test]
    fn uniform_prior_sums_to_one() {
        for n in [1u16, 3, 20, 218] {
            let eval = UniformEvaluator.evaluate(&moves(n)).unwrap();
            assert_eq!(eval.moves.len(), n as usize);
            let sum: f32 = eval.moves.iter().map(|&(_, p)| p).sum();
            assert!((sum - 1.0).abs() < 1e-4, "n={n}: sum={sum}");
        }
    }

    #[test]
    fn uniform_value_zero() {
        let eval = UniformEvaluator.evaluate(&moves(5)).unwrap();
        assert_eq!(eval.value, 0.0);
        assert_eq!(eval.mad, 0.0);
    }

    #[test]
    fn empty_policy_is_an_error() {
        assert!(matches!(
            UniformEvaluator.evaluate(&[]),
            Err(MctsError::EmptyPolicy)
        ));
    }

    #[test]
    fn batch_matches_single() {
        let a = moves(4);
        let b = moves(7);
        let batch = UniformEvaluator
            .evaluate_batch(&[a.as_slice(), b.as_slice()])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].moves.len(), 4);
        assert_eq!(batch[1].moves.len(), 7);
    }

    #[test]
    fn constant_evaluator_reports_value() {
        let eval = ConstantEvaluator { value: 0.7 }.evaluate(&moves(3)).unwrap();
        assert!((eval.value - 0.7).abs() < 1e-6);
    }
}
