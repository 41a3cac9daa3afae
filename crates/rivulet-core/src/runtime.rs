#![forbid(unsafe_code)]

//! The shared arena behind every [`Stream`] handle.
//!
//! A [`Runtime`] owns one dependency graph. Streams created from the same
//! runtime can be linked together; handles are cheap clones of
//! `(Runtime, StreamId)`.
//!
//! # Architecture
//!
//! The graph sits in a `RefCell` behind an `Rc`, the same single-threaded
//! sharing model as the rest of the crate. Borrows are only held while the
//! arena itself is read or written, never while user code (a transform) runs,
//! so transforms may freely read other streams, set them, or link new ones.
//!
//! # Failure Modes
//!
//! - **Transform panics**: the unwind passes straight through. Streams
//!   already updated keep their new values; the rest of the pass is lost.
//! - **Runaway re-entrancy**: a transform that keeps setting streams which
//!   lead back to itself nests passes until
//!   [`RuntimeConfig::max_pass_depth`] is hit, then the innermost update
//!   fails with [`StreamError::PassDepthExceeded`].

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::RuntimeConfig;
use crate::error::{Result, StreamError};
use crate::graph::{Graph, StreamId, StreamState, Transform, Value};
use crate::signal::Update;
use crate::stream::Stream;

struct RuntimeInner {
    graph: RefCell<Graph>,
    config: RuntimeConfig,
    /// Number of passes currently on the call stack.
    depth: Cell<usize>,
    /// Completed or started passes since creation.
    passes: Cell<u64>,
}

/// Handle to a dependency graph. Cloning shares the same graph.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("records", &self.len())
            .field("passes", &self.pass_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Non-owning runtime handle, upgraded on use.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Keeps the nesting depth balanced even when a transform unwinds.
pub(crate) struct PassGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with an explicit configuration.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                graph: RefCell::new(Graph::default()),
                config,
                depth: Cell::new(0),
                passes: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Number of arena records, end records included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of propagation passes run so far.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.inner.passes.get()
    }

    /// Create a stream with no value (`Pending`).
    #[must_use]
    pub fn stream<T: 'static>(&self) -> Stream<T> {
        let id = self.graph_mut().insert(None);
        Stream::from_parts(self.clone(), id)
    }

    /// Create a stream holding `value` (`Active`).
    #[must_use]
    pub fn stream_with<T: 'static>(&self, value: T) -> Stream<T> {
        let id = self.graph_mut().insert(Some(Rc::new(value)));
        Stream::from_parts(self.clone(), id)
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub(crate) fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn graph(&self) -> Ref<'_, Graph> {
        self.inner.graph.borrow()
    }

    pub(crate) fn graph_mut(&self) -> RefMut<'_, Graph> {
        self.inner.graph.borrow_mut()
    }

    pub(crate) fn depth(&self) -> usize {
        self.inner.depth.get()
    }

    pub(crate) fn count_pass(&self) {
        self.inner.passes.set(self.inner.passes.get() + 1);
    }

    /// Enter one more level of propagation.
    pub(crate) fn enter(&self) -> Result<PassGuard<'_>> {
        let depth = self.inner.depth.get();
        let limit = self.inner.config.max_pass_depth;
        if depth >= limit {
            return Err(StreamError::PassDepthExceeded { limit });
        }
        self.inner.depth.set(depth + 1);
        Ok(PassGuard {
            depth: &self.inner.depth,
        })
    }

    /// External write: the single entry point behind every setter.
    pub(crate) fn write(&self, id: StreamId, update: Update<Value>) -> Result<()> {
        if self.graph().is_sealed(id) {
            return Ok(());
        }
        match update {
            Update::Skip => Ok(()),
            Update::End => self.close(id),
            Update::Value(value) => {
                let _guard = self.enter()?;
                if !self.store(id, value) {
                    return Ok(());
                }
                let result = self.propagate(id);
                self.finish(id);
                result
            }
        }
    }

    /// Store a value and mark the stream `Changing`.
    ///
    /// Storing `true` into an end record terminates its owner. Returns
    /// `false` if the stream is closed.
    pub(crate) fn store(&self, id: StreamId, value: Value) -> bool {
        let owner = {
            let mut graph = self.graph_mut();
            let node = graph.node_mut(id);
            if node.state == StreamState::Closed {
                return false;
            }
            let terminates = node.owner.is_some() && value.downcast_ref::<bool>() == Some(&true);
            node.value = Some(value);
            node.state = StreamState::Changing;
            if terminates { node.owner } else { None }
        };
        if let Some(owner) = owner {
            self.detach(owner);
        }
        true
    }

    /// `Changing` settles back to `Active`.
    pub(crate) fn finish(&self, id: StreamId) {
        let mut graph = self.graph_mut();
        let node = graph.node_mut(id);
        if node.state == StreamState::Changing {
            node.state = StreamState::Active;
        }
    }

    /// Settle every stream a pass recomputed.
    ///
    /// Skipped if the arena is still borrowed, which only happens while
    /// unwinding out of the runtime itself.
    pub(crate) fn finish_all(&self, ids: &[StreamId]) {
        let Ok(mut graph) = self.inner.graph.try_borrow_mut() else {
            return;
        };
        for &id in ids {
            let node = graph.node_mut(id);
            if node.state == StreamState::Changing {
                node.state = StreamState::Active;
            }
        }
    }

    /// Undo a `Changing` mark for a recompute that produced no value.
    pub(crate) fn restore(&self, id: StreamId, previous: StreamState) {
        let mut graph = self.graph_mut();
        let node = graph.node_mut(id);
        if node.state == StreamState::Changing {
            node.state = previous;
        }
    }

    /// Terminate a stream by raising its end record.
    ///
    /// End records have no end record of their own, so closing one is a no-op.
    pub(crate) fn close(&self, id: StreamId) -> Result<()> {
        let end = {
            let graph = self.graph();
            let node = graph.node(id);
            if node.state == StreamState::Closed {
                return Ok(());
            }
            node.end
        };
        match end {
            Some(end) => self.write(end, Update::Value(Rc::new(true))),
            None => Ok(()),
        }
    }

    fn detach(&self, id: StreamId) {
        if self.graph_mut().detach(id) {
            tracing::debug!(stream = %id, "stream.close");
        }
    }

    /// Add an edge `parent -> dependent`.
    ///
    /// Linking to or from a closed stream is a no-op. With
    /// [`RuntimeConfig::eager_link`], an edge whose parent already holds a
    /// value is evaluated right away.
    pub(crate) fn link(
        &self,
        parent: StreamId,
        dependent: StreamId,
        transform: Transform,
    ) -> Result<()> {
        let current = {
            let mut graph = self.graph_mut();
            if graph.is_closed(parent) || graph.is_closed(dependent) {
                return Ok(());
            }
            if graph.reaches(dependent, parent) {
                return Err(StreamError::Cycle { parent, dependent });
            }
            graph.link(parent, dependent, Rc::clone(&transform));
            let node = graph.node(parent);
            if self.inner.config.eager_link && node.state.has_value() {
                node.value.clone()
            } else {
                None
            }
        };
        match current {
            Some(value) => self.write(dependent, transform(&*value)),
            None => Ok(()),
        }
    }

    pub(crate) fn set_immediate(&self, id: StreamId, immediate: bool) {
        self.graph_mut().node_mut(id).immediate = immediate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_constructors_set_state() {
        let rt = Runtime::new();
        let pending = rt.stream::<i32>();
        let active = rt.stream_with(1);

        assert_eq!(pending.state(), StreamState::Pending);
        assert_eq!(active.state(), StreamState::Active);
        // Each stream brings its end record along.
        assert_eq!(rt.len(), 4);
        assert!(!rt.is_empty());
    }

    #[test]
    fn clones_share_the_graph() {
        let rt = Runtime::new();
        let other = rt.clone();
        let _ = other.stream::<i32>();
        assert_eq!(rt.len(), 2);
        assert!(rt.ptr_eq(&other));
        assert!(!rt.ptr_eq(&Runtime::new()));
    }

    #[test]
    fn depth_guard_unwinds() {
        let rt = Runtime::with_config(RuntimeConfig::new().with_max_pass_depth(2));
        {
            let _a = rt.enter().expect("first level");
            let _b = rt.enter().expect("second level");
            assert_eq!(rt.depth(), 2);
            assert_eq!(
                rt.enter().err(),
                Some(StreamError::PassDepthExceeded { limit: 2 })
            );
        }
        assert_eq!(rt.depth(), 0);
    }

    #[test]
    fn pass_count_tracks_writes() {
        let rt = Runtime::new();
        let a = rt.stream::<i32>();
        assert_eq!(rt.pass_count(), 0);
        a.set(1).set(2);
        assert_eq!(rt.pass_count(), 2);
    }

    #[test]
    fn debug_lists_records() {
        let rt = Runtime::new();
        let _ = rt.stream::<u8>();
        let dbg = format!("{rt:?}");
        assert!(dbg.contains("Runtime"));
        assert!(dbg.contains("records: 2"));
    }
}
