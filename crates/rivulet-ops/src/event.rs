#![forbid(unsafe_code)]

//! Bridge from callback-style event sources into streams.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use rivulet_core::{Runtime, Stream, Update};

/// Handle returned by [`EventSource::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Anything that can register and unregister listeners by event name.
pub trait EventSource<E> {
    fn on(&self, event: &str, listener: Box<dyn Fn(&E)>) -> ListenerId;

    /// Returns `false` if no such listener was registered.
    fn off(&self, event: &str, id: ListenerId) -> bool;
}

type Listener<E> = Rc<dyn Fn(&E)>;

struct EmitterInner<E> {
    next_id: u64,
    listeners: AHashMap<String, Vec<(ListenerId, Listener<E>)>>,
}

/// A minimal in-process [`EventSource`].
pub struct EventEmitter<E> {
    inner: Rc<RefCell<EmitterInner<E>>>,
}

impl<E> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(EmitterInner {
                next_id: 0,
                listeners: AHashMap::new(),
            })),
        }
    }

    /// Call every listener registered for `event`, in registration order.
    ///
    /// Listeners added or removed during the call take effect from the next
    /// emit. Returns the number of listeners called.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .borrow()
            .listeners
            .get(event)
            .map(|entries| entries.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default();
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl<E> EventSource<E> for EventEmitter<E> {
    fn on(&self, event: &str, listener: Box<dyn Fn(&E)>) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push((id, Rc::from(listener)));
        id
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(entries) = inner.listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            inner.listeners.remove(event);
        }
        removed
    }
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventEmitter")
            .field("events", &inner.listeners.len())
            .field("next_id", &inner.next_id)
            .finish()
    }
}

/// A stream fed by every `event` emitted on `source`.
///
/// The listener is removed once the stream ends, whether by its end stream,
/// by `signal(END)`, or by an operator downstream closing it.
pub fn from_event<E, S>(runtime: &Runtime, source: &S, event: &str) -> Stream<E>
where
    E: Clone + 'static,
    S: EventSource<E> + Clone + 'static,
{
    let stream = runtime.stream::<E>();
    let sink = stream.downgrade();
    let id = source.on(
        event,
        Box::new(move |payload: &E| {
            if let Some(sink) = sink.upgrade() {
                sink.set(payload.clone());
            }
        }),
    );

    let source = source.clone();
    let event = event.to_owned();
    let removed = Cell::new(false);
    let _hook = stream.end().stream().derive(move |ended: &bool| {
        if *ended && !removed.replace(true) {
            source.off(&event, id);
            tracing::debug!(event = %event, listener = id.0, "event.listener_removed");
        }
        Update::<()>::Skip
    });
    stream
}

#[cfg(test)]
mod tests {
    use rivulet_core::END;

    use super::*;
    use crate::transform::take;

    #[test]
    fn emitter_calls_listeners_in_order() {
        let emitter = EventEmitter::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let log = Rc::clone(&log);
            emitter.on("tick", Box::new(move |v: &i32| log.borrow_mut().push((tag, *v))));
        }
        assert_eq!(emitter.emit("tick", &7), 2);
        assert_eq!(emitter.emit("other", &8), 0);
        assert_eq!(log.borrow().as_slice(), &[("first", 7), ("second", 7)]);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let emitter = EventEmitter::<()>::new();
        let a = emitter.on("x", Box::new(|_: &()| {}));
        let _b = emitter.on("x", Box::new(|_: &()| {}));
        assert!(emitter.off("x", a));
        assert!(!emitter.off("x", a));
        assert!(!emitter.off("missing", a));
        assert_eq!(emitter.listener_count("x"), 1);
    }

    #[test]
    fn stream_receives_emitted_values() {
        let rt = Runtime::new();
        let emitter = EventEmitter::<String>::new();
        let messages = from_event(&rt, &emitter, "message");
        assert!(messages.is_pending());

        emitter.emit("message", &"hello".to_string());
        assert_eq!(messages.get().as_deref(), Some("hello"));
        assert_eq!(emitter.listener_count("message"), 1);
    }

    #[test]
    fn ending_the_stream_unregisters_the_listener() {
        let rt = Runtime::new();
        let emitter = EventEmitter::<i32>::new();
        let values = from_event(&rt, &emitter, "n");
        emitter.emit("n", &1);

        values.signal(END);
        assert_eq!(emitter.listener_count("n"), 0);
        assert_eq!(emitter.emit("n", &2), 0);
        assert_eq!(values.get(), Some(1));
    }

    #[test]
    fn take_over_an_event_stream() {
        let rt = Runtime::new();
        let emitter = EventEmitter::<i32>::new();
        let firsts = from_event(&rt, &emitter, "n").pipe(take(2));
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_in = Rc::clone(&log);
        let _sink = firsts.derive(move |v: &i32| {
            log_in.borrow_mut().push(*v);
            Update::<()>::Skip
        });

        for v in 1..=5 {
            emitter.emit("n", &v);
        }
        assert_eq!(log.borrow().as_slice(), &[1, 2]);
        assert!(firsts.is_closed());
    }

    #[test]
    fn listener_does_not_keep_the_runtime_alive() {
        let emitter = EventEmitter::<i32>::new();
        let weak = {
            let rt = Runtime::new();
            let values = from_event(&rt, &emitter, "n");
            values.downgrade()
        };
        assert!(weak.upgrade().is_none());
        assert_eq!(emitter.emit("n", &1), 1);
    }

    #[test]
    fn debug_reports_counts() {
        let emitter = EventEmitter::<u8>::new();
        emitter.on("a", Box::new(|_: &u8| {}));
        let text = format!("{emitter:?}");
        assert!(text.contains("events: 1"));
        assert!(text.contains("next_id: 1"));
    }
}
