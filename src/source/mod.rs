//! The source protocol, and adapters that plug ordinary iterators and
//! streams into it.
//!
//! A [`Source`] is anything that can be pulled for a next step and stopped
//! early. The merge engine only ever speaks this protocol; which underlying
//! shape a sequence has — a synchronous iterator, a [`Stream`], a stream of
//! `Result`s — is decided once, at adaptation time.
//!
//! [`Stream`]: futures_core::Stream

use core::ops::DerefMut;
use core::pin::Pin;
use core::task::{Context, Poll};

pub use from_iter::{from_iter, FromIter};
pub use from_stream::{from_stream, FromStream};
pub use from_try_stream::{from_try_stream, FromTryStream};

mod from_iter;
mod from_stream;
mod from_try_stream;

/// A single step of a source: the next item, or the source's terminal
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T, R> {
    /// The source produced its next item.
    Item(T),
    /// The source ran to completion.
    Done(R),
}

/// An asynchronous sequence which is pulled one step at a time and can be
/// stopped early.
///
/// Unlike [`Stream`][futures_core::Stream], a source distinguishes its
/// terminal value from its items, can fail, and shuts down through an
/// explicit, awaitable [`poll_stop`][Source::poll_stop] rather than through
/// `Drop` alone. Those are exactly the capabilities a merge session needs
/// to track: the root's terminal value is the merged sequence's terminal
/// value, a read failure cancels the whole session, and cancellation must
/// be able to wait for cleanup to finish.
pub trait Source {
    /// The type of items the source produces.
    type Item;

    /// The terminal value produced when the source completes normally.
    type Done;

    /// The error produced when a read or a stop fails.
    type Error;

    /// Attempt to pull the next step out of the source.
    ///
    /// Once `Done` or an error has been returned the source is exhausted
    /// and must not be polled for items again.
    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>>;

    /// Begin, or continue, shutting the source down early.
    ///
    /// After the first call to `poll_stop` the source must not be polled
    /// for items again; the caller keeps polling `poll_stop` until it
    /// resolves. Sources without asynchronous cleanup resolve immediately.
    fn poll_stop(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>>;
}

impl<S: Source + Unpin + ?Sized> Source for &mut S {
    type Item = S::Item;
    type Done = S::Done;
    type Error = S::Error;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        S::poll_next(Pin::new(&mut **self), cx)
    }

    fn poll_stop(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        S::poll_stop(Pin::new(&mut **self), cx)
    }
}

impl<P> Source for Pin<P>
where
    P: DerefMut + Unpin,
    P::Target: Source,
{
    type Item = <P::Target as Source>::Item;
    type Done = <P::Target as Source>::Done;
    type Error = <P::Target as Source>::Error;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        self.get_mut().as_mut().poll_next(cx)
    }

    fn poll_stop(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().as_mut().poll_stop(cx)
    }
}

/// An owned, type-erased source, pinned to the heap.
///
/// Useful when one merge session mixes sources of different concrete
/// types.
pub type BoxSource<'a, T, R, E> = Pin<Box<dyn Source<Item = T, Done = R, Error = E> + 'a>>;

/// Conversion into a [`Source`].
///
/// The merge engine accepts anything implementing this trait both as its
/// root sequence and as the children the root yields. A value which is
/// neither a source nor adaptable into one is rejected at compile time by
/// this bound.
pub trait IntoSource {
    /// The type of items the source produces.
    type Item;

    /// The terminal value produced when the source completes normally.
    type Done;

    /// The error produced when a read or a stop fails.
    type Error;

    /// Which kind of source are we turning this into?
    type Source: Source<Item = Self::Item, Done = Self::Done, Error = Self::Error>;

    /// Creates a source from a value.
    fn into_source(self) -> Self::Source;
}

impl<S: Source> IntoSource for S {
    type Item = S::Item;
    type Done = S::Done;
    type Error = S::Error;
    type Source = S;

    #[inline]
    fn into_source(self) -> S {
        self
    }
}
