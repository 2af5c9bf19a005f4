use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown experiment '{0}'")]
    UnknownExperiment(String),

    #[error("unknown RL algorithm '{0}'")]
    UnknownRlAlgorithm(String),

    #[error("unknown IRL algorithm '{0}'")]
    UnknownIrlAlgorithm(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot write to '{path}': {source}")]
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Environment(#[from] pirl_gym::Error),

    #[error("did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("diverged at iteration {iteration}: {reason}")]
    Divergence { iteration: usize, reason: String },

    #[error("dimension mismatch: {0}")]
    Dimension(String),

    #[error("singular linear system")]
    Singular,

    #[error("no demonstrations to learn from")]
    EmptyDemonstrations,

    #[error("worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
