#![forbid(unsafe_code)]

//! End streams: the termination switch every stream carries.
//!
//! Setting an end stream to `true` closes its owner: the owner is unlinked
//! from its parents, forgets its dependents, and becomes `Closed`. Only then
//! is `true` propagated to the end stream's own dependents, so cleanup hooks
//! derived from it observe an owner that is already closed.
//!
//! `false` is stored like any other value and closes nothing. Signals sent to
//! an end stream are ignored, and so is every write once its owner is closed.

use crate::error::Result;
use crate::graph::StreamId;
use crate::signal::Update;
use crate::stream::Stream;

/// Handle to the end stream of a [`Stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndStream {
    stream: Stream<bool>,
}

impl EndStream {
    pub(crate) fn new(stream: Stream<bool>) -> Self {
        Self { stream }
    }

    /// `true` once the owner has been told to end.
    #[must_use]
    pub fn get(&self) -> bool {
        self.stream.get().unwrap_or(false)
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.get()
    }

    /// `set(true)` closes the owner. Returns the end stream for chaining.
    pub fn set(&self, value: bool) -> &Self {
        self.stream.set(value);
        self
    }

    pub fn try_set(&self, value: bool) -> Result<&Self> {
        self.stream.try_set(value)?;
        Ok(self)
    }

    /// Only [`Update::Value`] has an effect.
    pub fn send(&self, update: Update<bool>) -> &Self {
        if let Update::Value(value) = update {
            self.set(value);
        }
        self
    }

    /// The stream terminated by this end stream.
    #[must_use]
    pub fn owner(&self) -> Option<StreamId> {
        self.stream.runtime().graph().node(self.stream.id()).owner
    }

    /// The underlying boolean stream, for deriving cleanup hooks.
    #[must_use]
    pub fn stream(&self) -> &Stream<bool> {
        &self.stream
    }
}
