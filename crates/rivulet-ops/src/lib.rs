#![forbid(unsafe_code)]

//! Operators for rivulet streams.
//!
//! Single-parent operators ([`map`], [`filter`], [`take`], [`scan`]) return
//! closures that plug into [`Stream::pipe`](rivulet_core::Stream::pipe) and
//! the `pipe!` macro. Multi-parent operators ([`combine2`], [`combine_all`],
//! [`merge`]) take their inputs directly. [`from_event`] turns any
//! [`EventSource`] into a stream.
//!
//! ```rust
//! use rivulet_core::{Runtime, pipe};
//! use rivulet_ops::{filter, map, take};
//!
//! let rt = Runtime::new();
//! let clicks = rt.stream::<u32>();
//! let doubled_odds = pipe!(
//!     clicks,
//!     filter(|n: &u32| n % 2 == 1),
//!     map(|n: &u32| n * 2),
//!     take(1),
//! );
//!
//! clicks.set(2).set(3);
//! assert_eq!(doubled_odds.get(), Some(6));
//! clicks.set(5).set(7);
//! assert!(doubled_odds.is_closed());
//! ```

pub mod combine;
pub mod error;
pub mod event;
pub mod transform;

pub use combine::{combine_all, combine2, merge};
pub use error::{OpsError, Result};
pub use event::{EventEmitter, EventSource, ListenerId, from_event};
pub use transform::{filter, map, map_update, scan, take};
