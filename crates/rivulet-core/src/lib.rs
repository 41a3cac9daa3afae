#![forbid(unsafe_code)]

//! Core of rivulet: synchronous, glitch-free reactive streams.
//!
//! - [`Stream`]: a reactive cell holding a value, linked to parents and
//!   dependents.
//! - [`Runtime`]: the arena every stream of one graph lives in.
//! - [`EndStream`]: the boolean switch that terminates its owner.
//! - [`Signal`] / [`Update`]: the `SKIP` and `END` sentinels and the
//!   value-or-sentinel union transforms return.
//!
//! # Propagation
//!
//! Writing to a stream runs one *pass* that brings every reachable dependent
//! up to date before the write returns. A dependent reachable along several
//! paths (a diamond) recomputes once, after all of its parents in the pass
//! have settled. See [`dispatch`] for the algorithm.
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{Runtime, Update};
//!
//! let rt = Runtime::new();
//! let celsius = rt.stream_with(20.0_f64);
//! let fahrenheit = celsius.derive(|c| Update::Value(c * 9.0 / 5.0 + 32.0));
//! assert_eq!(fahrenheit.get(), Some(68.0));
//!
//! celsius.set(100.0);
//! assert_eq!(fahrenheit.get(), Some(212.0));
//!
//! celsius.end().set(true);
//! celsius.set(0.0);
//! assert_eq!(fahrenheit.get(), Some(212.0));
//! ```

pub mod config;
pub mod dispatch;
pub mod end;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod signal;
pub mod stream;

pub use config::RuntimeConfig;
pub use end::EndStream;
pub use error::{Result, StreamError};
pub use graph::{StreamId, StreamState};
pub use runtime::Runtime;
pub use signal::{END, SKIP, Signal, Update};
pub use stream::{Stream, WeakStream};

/// Thread a stream through operators, left to right.
///
/// `pipe!(s)` is `s` itself; `pipe!(s, a, b)` is `b(&a(&s))`. Each operator
/// may change the value type.
///
/// ```rust
/// use rivulet_core::{Runtime, Stream, Update, pipe};
///
/// let rt = Runtime::new();
/// let source = rt.stream_with(3);
/// assert_eq!(pipe!(source), source);
///
/// let label = pipe!(
///     source,
///     |s: &Stream<i32>| s.derive(|v| Update::Value(v * 2)),
///     |s: &Stream<i32>| s.derive(|v| Update::Value(format!("#{v}"))),
/// );
/// assert_eq!(label.get().as_deref(), Some("#6"));
/// ```
#[macro_export]
macro_rules! pipe {
    ($source:expr $(,)?) => {
        ::core::clone::Clone::clone(&$source)
    };
    ($source:expr, $($operator:expr),+ $(,)?) => {{
        let stream = ::core::clone::Clone::clone(&$source);
        $( let stream = $crate::Stream::pipe(&stream, $operator); )+
        stream
    }};
}
