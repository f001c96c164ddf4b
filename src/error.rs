use thiserror::Error;

/// Errors raised by the model before or during training and queries
///
/// Numerical non-convergence is deliberately absent: the solver and the
/// dictionary updater are bounded by their iteration caps and silently accept
/// the last state they reached.
#[derive(Debug, Error, PartialEq)]
pub enum NmfError {
    /// The corpus yielded no documents on first use, so the dictionary cannot
    /// be initialized
    #[error("corpus must contain at least one document")]
    EmptyCorpus,
    /// A document referenced a term id outside the feature dimension fixed at
    /// model creation
    #[error("term id {term_id} exceeds the feature dimension {expected}")]
    DimensionMismatch { expected: usize, term_id: usize },
    /// A configuration value is out of range, detected before any computation
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A term lookup failed in the query layer
    #[error("unknown term id {term_id}, the vocabulary has {n_features} terms")]
    UnknownTerm { term_id: usize, n_features: usize },
}
