use thiserror::Error;

use crate::relset::RelSet;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Precondition violations. These point at a caller or build bug and are
/// never retried; "no complete plan" is reported separately by the planner.
#[derive(Debug, Error)]
pub enum Error {
    #[error("join tree has {count} relations, but at most {max} fit in a relation set")]
    TooManyRelations { count: usize, max: usize },

    #[error("malformed join tree: {0}")]
    MalformedTree(String),

    #[error("{matches} hyperedges connect {left} and {right}; expected exactly one")]
    EdgeMatch {
        left: RelSet,
        right: RelSet,
        matches: usize,
    },

    #[error("Internal invariant failed: {0}")]
    Invariant(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
