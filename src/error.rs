//! Simulation error type.

use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// All of these are fatal to the call that produced them: no operation
/// leaves partial effects behind after returning an error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("actor index {index} out of range for {n_actors} actors")]
    IndexOutOfRange { index: usize, n_actors: usize },

    #[error("no edge between actors {i} and {j}")]
    UnknownEdge { i: usize, j: usize },

    #[error("statistics requested over an empty sample set")]
    EmptyInput,
}

/// Shorthand result type for the simulation core.
pub type SimResult<T> = Result<T, SimError>;

impl From<rand_distr::uniform::Error> for SimError {
    fn from(error: rand_distr::uniform::Error) -> Self {
        Self::InvalidParameter(error.to_string())
    }
}

impl From<rand_distr::BernoulliError> for SimError {
    fn from(error: rand_distr::BernoulliError) -> Self {
        Self::InvalidParameter(error.to_string())
    }
}
