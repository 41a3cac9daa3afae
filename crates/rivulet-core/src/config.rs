#![forbid(unsafe_code)]

//! Runtime configuration.

/// Default bound on re-entrant propagation passes.
pub const DEFAULT_MAX_PASS_DEPTH: usize = 256;

/// Tunables for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How many propagation passes may be nested inside one another.
    ///
    /// A pass nests when a transform writes to a stream. Exceeding the
    /// limit aborts the innermost update with [`StreamError::PassDepthExceeded`](crate::StreamError).
    pub max_pass_depth: usize,
    /// Evaluate a freshly linked edge against its parent's current value
    /// when the parent is already active.
    pub eager_link: bool,
}

impl RuntimeConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_pass_depth: DEFAULT_MAX_PASS_DEPTH,
            eager_link: true,
        }
    }

    /// Set the nested pass limit. Clamped to at least 1.
    #[must_use]
    pub fn with_max_pass_depth(mut self, depth: usize) -> Self {
        self.max_pass_depth = depth.max(1);
        self
    }

    /// Enable or disable evaluation at link time.
    #[must_use]
    pub fn with_eager_link(mut self, eager: bool) -> Self {
        self.eager_link = eager;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
