#![forbid(unsafe_code)]

//! Runtime faults surfaced by the fallible stream entry points.
//!
//! Most misuse is defined as a no-op rather than an error: writing to a closed
//! stream, feeding `false` to an end stream, skipping. Only conditions that
//! would otherwise corrupt the graph or the call stack are reported here.

use thiserror::Error;

use crate::graph::StreamId;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("nested propagation exceeded the configured depth limit of {limit}")]
    PassDepthExceeded { limit: usize },

    #[error("linking {dependent} under {parent} would create a cycle")]
    Cycle { parent: StreamId, dependent: StreamId },

    #[error("streams belong to different runtimes")]
    ForeignRuntime,
}

impl StreamError {
    /// Whether the error was raised before any value was written.
    #[must_use]
    pub fn is_link_error(&self) -> bool {
        matches!(self, Self::Cycle { .. } | Self::ForeignRuntime)
    }
}
