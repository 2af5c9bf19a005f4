use crate::Discrete;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{0}' is not a registered environment")]
    UnknownEnvironment(String),

    #[error("invalid MDP: {0}")]
    InvalidSpec(String),

    #[error("invalid grid map: {0}")]
    InvalidMap(String),

    #[error("action {action} is out of range for {n_a} actions")]
    InvalidAction { action: Discrete, n_a: usize },

    #[error("step called on a finished episode, call reset first")]
    EpisodeFinished,
}
