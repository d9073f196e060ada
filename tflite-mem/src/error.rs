use thiserror::Error;

/// Everything that can go wrong between reading a `.tflite` file and writing
/// the reordered one back.
#[derive(Debug, Error)]
pub enum Error {
    /// FlatBuffers verification, schema version or layout check failed.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// Operator arity, dangling index, duplicate producer or cycle.
    #[error("invalid graph structure: {0}")]
    GraphStructure(String),

    /// An execution order handed to the rewriter is not a topologically valid
    /// permutation of the operators.
    #[error("schedule invariant violated: {0}")]
    InvariantViolation(String),

    #[error("search budget exhausted after {limit} frontier states")]
    SearchBudgetExceeded { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedModel(msg.into())
    }

    pub(crate) fn structure(msg: impl Into<String>) -> Self {
        Error::GraphStructure(msg.into())
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }
}
