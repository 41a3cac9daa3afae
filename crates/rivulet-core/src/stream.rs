#![forbid(unsafe_code)]

//! Typed handles to reactive cells.
//!
//! A [`Stream<T>`] is a `(Runtime, StreamId)` pair. It reads with
//! [`get`](Stream::get) and writes with [`set`](Stream::set) /
//! [`send`](Stream::send); every write runs one propagation pass to
//! completion before returning.
//!
//! # Invariants
//!
//! 1. `get()` has no side effects and is valid in every state, `Closed`
//!    included (it returns the last value held).
//! 2. Writes to a closed stream are ignored.
//! 3. Clones are the same cell: equality is identity.
//! 4. Setters return the stream itself so writes can be chained.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::end::EndStream;
use crate::error::{Result, StreamError};
use crate::graph::{StreamId, StreamState, Transform, Value};
use crate::runtime::{Runtime, WeakRuntime};
use crate::signal::{Signal, Update};

/// A reactive cell holding a `T`.
pub struct Stream<T> {
    runtime: Runtime,
    id: StreamId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Stream<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.runtime.ptr_eq(&other.runtime)
    }
}

impl<T> Eq for Stream<T> {}

impl<T> Hash for Stream<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Erase a typed edge transform for storage in the arena.
fn erase<P: 'static, C: 'static>(transform: impl Fn(&P) -> Update<C> + 'static) -> Transform {
    Rc::new(move |input: &dyn Any| match input.downcast_ref::<P>() {
        Some(value) => transform(value).map(|out| Rc::new(out) as Value),
        None => Update::Skip,
    })
}

impl<T> Stream<T> {
    pub(crate) fn from_parts(runtime: Runtime, id: StreamId) -> Self {
        Self {
            runtime,
            id,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// A handle that does not keep the runtime alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakStream<T> {
        WeakStream {
            runtime: self.runtime.downgrade(),
            id: self.id,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.runtime.graph().node(self.id).state
    }

    /// No value received yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == StreamState::Pending
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == StreamState::Active
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    /// Whether this stream recomputes on each firing parent.
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        self.runtime.graph().node(self.id).immediate
    }

    /// Upstream dependencies, in link order.
    #[must_use]
    pub fn parents(&self) -> Vec<StreamId> {
        self.runtime.graph().node(self.id).parents.clone()
    }

    /// Downstream streams notified on change, in registration order.
    #[must_use]
    pub fn dependents(&self) -> Vec<StreamId> {
        self.runtime
            .graph()
            .node(self.id)
            .dependents
            .iter()
            .map(|edge| edge.target)
            .collect()
    }

    /// The stream that terminates this one when set to `true`.
    ///
    /// End streams have no end stream of their own; for them this returns
    /// the stream itself.
    #[must_use]
    pub fn end(&self) -> EndStream {
        let end = self.runtime.graph().node(self.id).end.unwrap_or(self.id);
        EndStream::new(Stream::from_parts(self.runtime.clone(), end))
    }
}

impl<T: 'static> Stream<T> {
    /// Current value, `None` until the first set.
    #[must_use]
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.with(|value| value.cloned())
    }

    /// Access the current value by reference without cloning.
    ///
    /// The arena is not borrowed while `f` runs, so `f` may read or write
    /// other streams.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let value = self.runtime.graph().node(self.id).value.clone();
        f(value.as_deref().and_then(|value| value.downcast_ref::<T>()))
    }

    /// Store `value` and propagate it to every dependent.
    pub fn set(&self, value: T) -> &Self {
        self.send(Update::Value(value))
    }

    /// Feed a value or a sentinel.
    ///
    /// Runtime faults are logged and dropped; use [`try_send`](Self::try_send)
    /// to observe them.
    pub fn send(&self, update: Update<T>) -> &Self {
        if let Err(err) = self.try_send(update) {
            tracing::warn!(stream = %self.id, error = %err, "stream.update_dropped");
        }
        self
    }

    /// Feed a sentinel. `signal(END)` closes the stream.
    pub fn signal(&self, signal: Signal) -> &Self {
        self.send(signal.into())
    }

    pub fn try_set(&self, value: T) -> Result<&Self> {
        self.try_send(Update::Value(value))
    }

    pub fn try_send(&self, update: Update<T>) -> Result<&Self> {
        self.runtime
            .write(self.id, update.map(|value| Rc::new(value) as Value))?;
        Ok(self)
    }

    /// Create a stream that depends on this one through `transform`.
    ///
    /// The new stream starts `Pending`. If this stream already holds a value
    /// (and the runtime links eagerly) the transform runs once immediately.
    #[must_use]
    pub fn derive<U: 'static>(&self, transform: impl Fn(&T) -> Update<U> + 'static) -> Stream<U> {
        let derived = self.runtime.stream::<U>();
        if let Err(err) = derived.link_from(self, transform) {
            tracing::warn!(stream = %derived.id, error = %err, "stream.link_failed");
        }
        derived
    }

    /// Make this stream a dependent of `parent`.
    ///
    /// A stream with several parents recomputes once per pass, through the
    /// edge of whichever participating parent settled last. The runtime owns
    /// `transform`; streams it reads should be captured as [`WeakStream`]s.
    ///
    /// Linking a closed stream on either side is a no-op.
    pub fn link_from<P: 'static>(
        &self,
        parent: &Stream<P>,
        transform: impl Fn(&P) -> Update<T> + 'static,
    ) -> Result<()> {
        if !self.runtime.ptr_eq(&parent.runtime) {
            return Err(StreamError::ForeignRuntime);
        }
        self.runtime.link(parent.id, self.id, erase(transform))
    }

    /// Recompute on every firing parent instead of waiting for all of them.
    #[must_use]
    pub fn immediate(self) -> Self {
        self.runtime.set_immediate(self.id, true);
        self
    }

    /// Apply one operator.
    pub fn pipe<U>(&self, operator: impl FnOnce(&Stream<T>) -> Stream<U>) -> Stream<U> {
        operator(self)
    }

    /// Apply a sequence of same-typed operators left to right.
    ///
    /// An empty sequence returns this stream.
    pub fn pipe_all<I, F>(&self, operators: I) -> Stream<T>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(&Stream<T>) -> Stream<T>,
    {
        operators
            .into_iter()
            .fold(self.clone(), |stream, operator| operator(&stream))
    }
}

/// A [`Stream`] handle that does not keep its runtime alive.
///
/// The arena owns every edge transform, so a transform capturing a strong
/// [`Stream`] of the same runtime keeps that runtime alive forever. Capture
/// one of these instead. Reads through a handle whose runtime is gone see no
/// value.
pub struct WeakStream<T> {
    runtime: WeakRuntime,
    id: StreamId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for WeakStream<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for WeakStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStream").field("id", &self.id).finish()
    }
}

impl<T> WeakStream<T> {
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The strong handle, if the runtime still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.runtime
            .upgrade()
            .map(|runtime| Stream::from_parts(runtime, self.id))
    }

    #[must_use]
    pub fn state(&self) -> Option<StreamState> {
        self.upgrade().map(|stream| stream.state())
    }
}

impl<T: 'static> WeakStream<T> {
    #[must_use]
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.upgrade()?.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        match self.upgrade() {
            Some(stream) => stream.with(f),
            None => f(None),
        }
    }
}

impl<T: fmt::Display + 'static> fmt::Display for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| match value {
            Some(value) => write!(f, "streamFn{{{value}}}"),
            None => f.write_str("streamFn{undefined}"),
        })
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize + 'static> serde::Serialize for Stream<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.with(|value| serde::Serialize::serialize(&value, serializer))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{END, SKIP};

    #[test]
    fn get_and_set() {
        let rt = Runtime::new();
        let a = rt.stream_with(5);
        assert_eq!(a.get(), Some(5));
        assert_eq!(a.set(6), &a);
        assert_eq!(a.get(), Some(6));
    }

    #[test]
    fn undefined_until_first_set() {
        let rt = Runtime::new();
        let a = rt.stream::<i32>();
        assert_eq!(a.get(), None);
        assert_eq!(a.state(), StreamState::Pending);
        a.set(5);
        assert_eq!(a.state(), StreamState::Active);
    }

    #[test]
    fn explicit_none_is_a_value() {
        let rt = Runtime::new();
        let a = rt.stream_with(Some(5));
        a.set(None);
        assert_eq!(a.get(), Some(None));
        assert!(a.is_active());
    }

    #[test]
    fn get_is_idempotent() {
        let rt = Runtime::new();
        let a = rt.stream_with("x".to_string());
        for _ in 0..3 {
            assert_eq!(a.get().as_deref(), Some("x"));
        }
    }

    #[test]
    fn skip_is_a_no_op() {
        let rt = Runtime::new();
        let a = rt.stream_with(1);
        let hits = Rc::new(Cell::new(0_u32));
        let hits_in = Rc::clone(&hits);
        let _b = a.derive(move |v| {
            hits_in.set(hits_in.get() + 1);
            Update::Value(*v)
        });
        assert_eq!(hits.get(), 1);

        assert_eq!(a.signal(SKIP), &a);
        assert_eq!(a.get(), Some(1));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn end_signal_closes() {
        let rt = Runtime::new();
        let a = rt.stream_with(5);
        a.signal(END);
        assert!(a.is_closed());
        assert!(a.end().get());
        a.set(6);
        assert_eq!(a.get(), Some(5));
    }

    #[test]
    fn with_borrows_without_clone() {
        let rt = Runtime::new();
        let a = rt.stream_with(vec![1, 2, 3]);
        assert_eq!(a.with(|v| v.map(|v| v.iter().sum::<i32>())), Some(6));
    }

    #[test]
    fn derive_evaluates_active_parent() {
        let rt = Runtime::new();
        let a = rt.stream_with(2);
        let b = a.derive(|v| Update::Value(v * 3));
        assert_eq!(b.get(), Some(6));
        assert_eq!(b.parents(), vec![a.id()]);
        assert_eq!(a.dependents(), vec![b.id()]);
    }

    #[test]
    fn lazy_link_waits_for_next_value() {
        let rt = Runtime::with_config(crate::RuntimeConfig::new().with_eager_link(false));
        let a = rt.stream_with(2);
        let b = a.derive(|v| Update::Value(v * 3));
        assert!(b.is_pending());
        a.set(3);
        assert_eq!(b.get(), Some(9));
    }

    #[test]
    fn link_rejects_cycles() {
        let rt = Runtime::new();
        let a = rt.stream::<i32>();
        let b = a.derive(|v| Update::Value(*v));
        let err = a.link_from(&b, |v| Update::Value(*v)).err();
        assert_eq!(
            err,
            Some(StreamError::Cycle {
                parent: b.id(),
                dependent: a.id(),
            })
        );
        assert!(a.link_from(&a, |v| Update::Value(*v)).is_err());
    }

    #[test]
    fn link_rejects_foreign_runtime() {
        let a = Runtime::new().stream::<i32>();
        let b = Runtime::new().stream::<i32>();
        assert_eq!(
            b.link_from(&a, |v| Update::Value(*v)).err(),
            Some(StreamError::ForeignRuntime)
        );
    }

    #[test]
    fn link_to_closed_is_ignored() {
        let rt = Runtime::new();
        let a = rt.stream_with(1);
        a.end().set(true);
        let b = a.derive(|v| Update::Value(*v));
        assert!(b.is_pending());
        assert!(a.dependents().is_empty());
    }

    #[test]
    fn weak_handle_reads_while_runtime_lives() {
        let rt = Runtime::new();
        let a = rt.stream_with(7);
        let weak = a.downgrade();
        assert_eq!(weak.id(), a.id());
        assert_eq!(weak.get(), Some(7));
        assert_eq!(weak.state(), Some(StreamState::Active));
        assert_eq!(weak.upgrade(), Some(a.clone()));

        drop(a);
        drop(rt);
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.get(), None);
        assert!(weak.with(|value| value.is_none()));
    }

    #[test]
    fn runtime_is_freed_when_transforms_hold_weak_handles() {
        let marker = Rc::new(());
        {
            let rt = Runtime::new();
            let a = rt.stream_with(1);
            let b = rt.stream_with(2);
            let (b_weak, held) = (b.downgrade(), Rc::clone(&marker));
            let sum = a.derive(move |v| {
                let _alive = &held;
                Update::Value(v + b_weak.get().unwrap_or_default())
            });
            assert_eq!(sum.get(), Some(3));
            assert_eq!(Rc::strong_count(&marker), 2);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn clones_are_identical() {
        let rt = Runtime::new();
        let a = rt.stream::<i32>();
        let b = rt.stream::<i32>();
        assert_eq!(a.clone(), a);
        assert_ne!(a, b);
    }

    #[test]
    fn pipe_applies_operators() {
        let rt = Runtime::new();
        let a = rt.stream_with(1);
        let b = a.pipe(|s| s.derive(|v| Update::Value(v + 1)));
        assert_eq!(b.get(), Some(2));

        let inc = |s: &Stream<i32>| s.derive(|v| Update::Value(v + 1));
        let c = a.pipe_all([inc, inc, inc]);
        assert_eq!(c.get(), Some(4));
    }

    #[test]
    fn empty_pipe_is_identity() {
        let rt = Runtime::new();
        let a = rt.stream::<i32>();
        let ops: Vec<fn(&Stream<i32>) -> Stream<i32>> = Vec::new();
        assert_eq!(a.pipe_all(ops), a);
    }

    #[test]
    fn display_renders_value() {
        let rt = Runtime::new();
        let a = rt.stream_with(2);
        let b = rt.stream_with(a.clone());
        let c = rt.stream::<i32>();
        assert_eq!(a.to_string(), "streamFn{2}");
        assert_eq!(b.to_string(), "streamFn{streamFn{2}}");
        assert_eq!(c.to_string(), "streamFn{undefined}");
    }

    #[test]
    fn debug_shows_id_and_state() {
        let rt = Runtime::new();
        let a = rt.stream_with(1);
        let dbg = format!("{a:?}");
        assert!(dbg.contains("Stream"));
        assert!(dbg.contains("Active"));
    }
}
