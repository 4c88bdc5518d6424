//! Error types shared by the distance builder and the clustering engine.

use crate::utils::parallel::ParallelError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Input distances are unusable (too few samples, malformed matrix, conflicting pairs).
    #[error("Data error: {0}")]
    Data(String),

    /// Requested parameters cannot be satisfied for this matrix.
    #[error("Config error: {0}")]
    Config(String),

    /// The k-range was valid but no k produced a usable labeling.
    #[error("No solution: {0}")]
    NoSolution(String),

    #[error("Parallel execution error: {0}")]
    Parallel(#[from] ParallelError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
