#![forbid(unsafe_code)]

//! Rivulet public facade crate.
//!
//! Re-exports the stream core and, with the `ops` feature, the operator
//! library under [`ops`].

pub use rivulet_core::*;

#[cfg(feature = "ops")]
pub use rivulet_ops as ops;

pub mod prelude {
    pub use rivulet_core::{
        END, EndStream, Runtime, SKIP, Signal, Stream, Update, WeakStream, pipe,
    };

    #[cfg(feature = "ops")]
    pub use rivulet_ops::{
        EventEmitter, EventSource, combine_all, combine2, filter, from_event, map, merge, scan,
        take,
    };
}
