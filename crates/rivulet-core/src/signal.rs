#![forbid(unsafe_code)]

//! Control-flow sentinels and the settable-value union.
//!
//! A transform never talks to the dispatcher through a side channel. Instead it
//! returns an [`Update`], which is either a new value or one of the two
//! [`Signal`]s:
//!
//! - [`Signal::Skip`]: leave the target untouched and stop propagating along
//!   this path for the current pass.
//! - [`Signal::End`]: close the target now.
//!
//! Signals are compared by tag. They can never collide with a payload value
//! because they live in a different variant.

/// Sentinel controlling propagation without carrying a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Suppress this update.
    Skip,
    /// Terminate the receiving stream.
    End,
}

/// Suppress the update ("no-op").
pub const SKIP: Signal = Signal::Skip;

/// Terminate the receiving stream.
pub const END: Signal = Signal::End;

/// Anything a stream can be fed with: a value or a [`Signal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<T> {
    /// A new value to store and broadcast.
    Value(T),
    /// See [`Signal::Skip`].
    Skip,
    /// See [`Signal::End`].
    End,
}

impl<T> Update<T> {
    /// Whether this update is a sentinel rather than a value.
    #[must_use]
    pub fn is_signal(&self) -> bool {
        !matches!(self, Self::Value(_))
    }

    /// The sentinel carried by this update, if any.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        match self {
            Self::Value(_) => None,
            Self::Skip => Some(Signal::Skip),
            Self::End => Some(Signal::End),
        }
    }

    /// Map the payload, keeping sentinels as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Update<U> {
        match self {
            Self::Value(value) => Update::Value(f(value)),
            Self::Skip => Update::Skip,
            Self::End => Update::End,
        }
    }

    /// The payload, if this update carries one.
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Signal> for Update<T> {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Skip => Self::Skip,
            Signal::End => Self::End,
        }
    }
}

impl<T> From<Option<T>> for Update<T> {
    /// `None` maps to [`Update::Skip`].
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Value(value),
            None => Self::Skip,
        }
    }
}
