#![forbid(unsafe_code)]

//! Multi-parent operators.
//!
//! [`combine2`] and [`combine_all`] are regular (non-immediate) dependents, so
//! a diamond upstream still recomputes them once per pass. [`merge`] is
//! immediate: every firing parent is forwarded, even twice in one pass, to
//! immediate dependents. Regular dependents of a merge see its last value.

use std::rc::Rc;

use rivulet_core::{Stream, Update, WeakStream};

use crate::error::{OpsError, Result};

/// Combine the latest values of two streams.
///
/// The result stays pending until both inputs hold a value.
pub fn combine2<A, B, C>(
    a: &Stream<A>,
    b: &Stream<B>,
    f: impl Fn(&A, &B) -> C + 'static,
) -> Result<Stream<C>>
where
    A: 'static,
    B: 'static,
    C: 'static,
{
    let combined = a.runtime().stream::<C>();
    let compute = {
        let (a, b) = (a.downgrade(), b.downgrade());
        Rc::new(move || {
            a.with(|left| {
                b.with(|right| match (left, right) {
                    (Some(left), Some(right)) => Update::Value(f(left, right)),
                    _ => Update::Skip,
                })
            })
        })
    };
    let via_a = Rc::clone(&compute);
    combined.link_from(a, move |_| via_a())?;
    combined.link_from(b, move |_| compute())?;
    Ok(combined)
}

/// Collect the latest value of every input, in input order.
///
/// The result stays pending until every input holds a value. An empty input
/// set is rejected.
pub fn combine_all<T>(inputs: &[Stream<T>]) -> Result<Stream<Vec<T>>>
where
    T: Clone + 'static,
{
    let first = inputs.first().ok_or(OpsError::NoInputs)?;
    let combined = first.runtime().stream::<Vec<T>>();
    let snapshot: Rc<[WeakStream<T>]> = inputs.iter().map(Stream::downgrade).collect();
    for input in inputs {
        let snapshot = Rc::clone(&snapshot);
        combined.link_from(input, move |_| {
            snapshot
                .iter()
                .map(WeakStream::get)
                .collect::<Option<Vec<T>>>()
                .into()
        })?;
    }
    Ok(combined)
}

/// Forward every value of either input as it arrives.
pub fn merge<T>(a: &Stream<T>, b: &Stream<T>) -> Result<Stream<T>>
where
    T: Clone + 'static,
{
    let merged = a.runtime().stream::<T>().immediate();
    merged.link_from(a, |value| Update::Value(value.clone()))?;
    merged.link_from(b, |value| Update::Value(value.clone()))?;
    Ok(merged)
}
