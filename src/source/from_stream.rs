use core::fmt;
use core::marker::PhantomData;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::pin_project;

use super::{Source, Step};

/// A source that reads from a [`Stream`].
///
/// This `struct` is created by [`from_stream`]. See its documentation for
/// more.
#[pin_project]
pub struct FromStream<S, E> {
    #[pin]
    stream: S,
    done: bool,
    _marker: PhantomData<E>,
}

/// Converts a [`Stream`] into a [`Source`].
///
/// The stream's items become the source's items; the end of the stream is
/// the source's completion. The source itself never fails; `E` is the
/// error type of the merge session the source participates in, and is
/// usually inferred. A plain stream has no asynchronous cleanup of its
/// own, so stopping the source resolves immediately and fuses the stream —
/// its synchronous cleanup still runs on `Drop`.
pub fn from_stream<S: Stream, E>(stream: S) -> FromStream<S, E> {
    FromStream {
        stream,
        done: false,
        _marker: PhantomData,
    }
}

impl<S: fmt::Debug, E> fmt::Debug for FromStream<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromStream")
            .field("stream", &self.stream)
            .field("done", &self.done)
            .finish()
    }
}

impl<S: Stream, E> Source for FromStream<S, E> {
    type Item = S::Item;
    type Done = ();
    type Error = E;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(Ok(Step::Done(())));
        }
        match this.stream.poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Ok(Step::Item(item))),
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(Ok(Step::Done(())))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_stop(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        *self.project().done = true;
        Poll::Ready(Ok(()))
    }
}
