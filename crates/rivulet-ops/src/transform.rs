#![forbid(unsafe_code)]

//! Single-parent operators.
//!
//! Each operator returns a closure of shape `&Stream<In> -> Stream<Out>` so it
//! can be handed to [`Stream::pipe`] or the `pipe!` macro.

use std::cell::{Cell, RefCell};

use rivulet_core::{Stream, Update};

/// Derive through a transform that may also return a sentinel.
pub fn map_update<T, U>(
    f: impl Fn(&T) -> Update<U> + 'static,
) -> impl FnOnce(&Stream<T>) -> Stream<U>
where
    T: 'static,
    U: 'static,
{
    move |source| source.derive(f)
}

/// Derive a new value from every source value.
pub fn map<T, U>(f: impl Fn(&T) -> U + 'static) -> impl FnOnce(&Stream<T>) -> Stream<U>
where
    T: 'static,
    U: 'static,
{
    map_update(move |value| Update::Value(f(value)))
}

/// Forward only the values matching `predicate`.
pub fn filter<T>(predicate: impl Fn(&T) -> bool + 'static) -> impl FnOnce(&Stream<T>) -> Stream<T>
where
    T: Clone + 'static,
{
    map_update(move |value: &T| {
        if predicate(value) {
            Update::Value(value.clone())
        } else {
            Update::Skip
        }
    })
}

/// Forward the first `amount` values, then end on the next one.
pub fn take<T>(amount: usize) -> impl FnOnce(&Stream<T>) -> Stream<T>
where
    T: Clone + 'static,
{
    let remaining = Cell::new(amount);
    map_update(move |value: &T| match remaining.get() {
        0 => Update::End,
        left => {
            remaining.set(left - 1);
            Update::Value(value.clone())
        }
    })
}

/// Running fold: emits the accumulator after every source value.
pub fn scan<T, A>(seed: A, f: impl Fn(&A, &T) -> A + 'static) -> impl FnOnce(&Stream<T>) -> Stream<A>
where
    T: 'static,
    A: Clone + 'static,
{
    let acc = RefCell::new(seed);
    map_update(move |value: &T| {
        let next = f(&acc.borrow(), value);
        acc.replace(next.clone());
        Update::Value(next)
    })
}
