//! Merge a dynamically discovered set of async sources into a single stream.
//!
//! Given a root [`Source`] whose items are themselves sources, [`merge`]
//! produces one merged sequence that yields every item from every child as
//! soon as it becomes available, in the order results actually arrive. The
//! set of open sources grows while the root keeps producing new children,
//! and every source that was ever opened is closed exactly once — whether
//! the merge runs to completion, fails, or is cancelled early.
//!
//! Reads are demand driven: each open source has at most one read
//! outstanding at any time, and new reads are only issued while the
//! consumer keeps pulling.
//!
//! # Examples
//!
//! ```
//! use futures_lite::future::block_on;
//! use std::convert::Infallible;
//! use stream_merge::source::from_iter;
//! use stream_merge::{merge, Step};
//!
//! block_on(async {
//!     let mut merged = merge(from_iter::<_, Infallible>([
//!         from_iter([1, 2, 3]),
//!         from_iter([4, 5, 6]),
//!     ]));
//!
//!     let mut out = vec![];
//!     while let Step::Item(n) = merged.pull().await.unwrap() {
//!         out.push(n);
//!     }
//!     out.sort_unstable();
//!     assert_eq!(out, [1, 2, 3, 4, 5, 6]);
//! })
//! ```
//!
//! Early termination is an explicit, awaitable operation. `stop` resolves
//! only once every opened source has been shut down:
//!
//! ```
//! use futures_lite::future::block_on;
//! use std::convert::Infallible;
//! use stream_merge::source::from_iter;
//! use stream_merge::{merge, Step};
//!
//! block_on(async {
//!     let mut merged = merge(from_iter::<_, Infallible>([
//!         from_iter(1..),
//!         from_iter(100..),
//!     ]));
//!
//!     assert!(matches!(merged.pull().await, Ok(Step::Item(_))));
//!     merged.stop().await.unwrap();
//! })
//! ```

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod utils;

mod error;
pub mod merge;
pub mod source;

pub use error::MergeError;
pub use merge::{merge, Merged};
pub use source::{IntoSource, Source, Step};

/// The `stream-merge` prelude.
pub mod prelude {
    pub use super::source::IntoSource as _;
    pub use super::source::Source as _;
}
