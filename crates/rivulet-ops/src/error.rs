#![forbid(unsafe_code)]

use rivulet_core::StreamError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("cannot combine an empty set of streams")]
    NoInputs,
}
