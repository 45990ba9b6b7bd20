use std::path::PathBuf;

use thiserror::Error;

/// Fatal and assertion-class errors for the driver.
///
/// `OracleTimeout`/`OracleFailure` deliberately have no variant here: they are
/// classification inputs, folded into [`crate::model::ExecutionStatus`] at the
/// call site rather than propagated as errors.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("malformed mutation-info document: {0}")]
    InvalidMutationInfo(String),

    #[error(
        "the mutation-info file and the mutant-coverage-tracking mutation-info file disagree \
         (num_nodes={num_nodes_a} vs {num_nodes_b}, num_mutations={num_mutations_a} vs {num_mutations_b})"
    )]
    CoverageInfoMismatch {
        num_nodes_a: usize,
        num_nodes_b: usize,
        num_mutations_a: usize,
        num_mutations_b: usize,
    },

    #[error("mutation id {0} is out of range [0, {1})")]
    InvalidMutationId(u32, usize),

    #[error("discarded attempt at generating a reference program: {0}")]
    ReferenceGenerationFailure(String),

    #[error("reducer failed on {path}: {reason}")]
    ReducerFailure { path: PathBuf, reason: String },

    #[error("failed to launch {executable}: {reason}")]
    SubprocessSpawnFailure { executable: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
