//! Merge a root source and every child source it yields into one
//! sequence.
//!
//! Items are yielded as soon as they're received, in the order the
//! underlying reads actually resolve; no ordering between sources is
//! imposed on top of that. The set of open sources is discovered
//! dynamically: every item the root produces is opened as a new child and
//! read concurrently with all the others, with at most one outstanding
//! read per source.
//!
//! # Examples
//!
//! A merged session is also a [`Stream`][futures_core::Stream] over
//! `Result`s, so it composes with the usual stream adapters. The stream
//! view discards the root's terminal value; use
//! [`pull`][Merged::pull] when you need it.
//!
//! ```
//! use futures_lite::future::block_on;
//! use futures_lite::prelude::*;
//! use std::convert::Infallible;
//! use stream_merge::merge;
//! use stream_merge::source::{from_iter, from_stream};
//!
//! block_on(async {
//!     let mut merged = merge(from_iter::<_, Infallible>([
//!         from_stream(futures_lite::stream::once(1)),
//!         from_stream(futures_lite::stream::once(2)),
//!     ]));
//!
//!     let mut sum = 0;
//!     while let Some(item) = merged.next().await {
//!         sum += item.unwrap();
//!     }
//!     assert_eq!(sum, 3);
//! })
//! ```

use crate::source::{IntoSource, Source, Step};
use crate::MergeError;

pub use engine::Merged;
pub use pull::Pull;
pub use stop::Stop;

mod engine;
mod pull;
mod stop;

/// The result of one pull from a merge session: an item, terminal
/// completion carrying the root's terminal value (handed out once), or the
/// session's error (surfaced once).
pub type PullResult<R> = Result<
    Step<
        <<<R as Source>::Item as IntoSource>::Source as Source>::Item,
        Option<<R as Source>::Done>,
    >,
    MergeError<<R as Source>::Error>,
>;

/// The result of stopping a merge session early.
pub type StopResult<R> =
    Result<Option<<R as Source>::Done>, MergeError<<R as Source>::Error>>;

/// Merge a sequence of sequences into a single sequence.
///
/// `outer` is opened as the session's root; every item it yields is opened
/// as a new child source, and all open sources are read concurrently. Any
/// read or stop failure on any single source cancels the whole session:
/// every other open source is stopped before the error is surfaced.
/// Stopping the returned session — explicitly via [`Merged::stop`] — shuts
/// down every source that was ever opened, exactly once each.
///
/// # Examples
///
/// ```
/// use futures_lite::future::block_on;
/// use std::convert::Infallible;
/// use stream_merge::source::from_iter;
/// use stream_merge::{merge, Step};
///
/// block_on(async {
///     let mut merged = merge(from_iter::<_, Infallible>([
///         from_iter([1, 2]),
///         from_iter([3, 4]),
///     ]));
///
///     let mut out = vec![];
///     while let Step::Item(n) = merged.pull().await.unwrap() {
///         out.push(n);
///     }
///     out.sort_unstable();
///     assert_eq!(out, [1, 2, 3, 4]);
/// })
/// ```
pub fn merge<S>(outer: S) -> Merged<S::Source>
where
    S: IntoSource,
    S::Item: IntoSource<Error = S::Error>,
{
    Merged::new(outer.into_source())
}
