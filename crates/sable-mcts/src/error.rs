use thiserror::Error;

#[derive(Error, Debug)]
pub enum MctsError {
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("policy head returned no moves")]
    EmptyPolicy,

    #[error("node {0} is already expanded")]
    AlreadyExpanded(u32),

    #[error("{got} children exceeds per-node capacity {cap}")]
    TooManyChildren { got: usize, cap: usize },
}

pub type Result<T> = std::result::Result<T, MctsError>;
