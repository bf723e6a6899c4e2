use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use pin_project::pin_project;

use super::{Source, Step};

/// A source that reads from a [`Stream`] of `Result`s.
///
/// This `struct` is created by [`from_try_stream`]. See its documentation
/// for more.
#[pin_project]
pub struct FromTryStream<S> {
    #[pin]
    stream: S,
    done: bool,
}

/// Converts a [`Stream`] of `Result`s into a [`Source`].
///
/// `Ok` items become the source's items; the first `Err` item is a read
/// failure, which is fatal to the merge session the source participates
/// in. The stream is fused after its end, an error, or an early stop.
pub fn from_try_stream<S, T, E>(stream: S) -> FromTryStream<S>
where
    S: Stream<Item = Result<T, E>>,
{
    FromTryStream {
        stream,
        done: false,
    }
}

impl<S: fmt::Debug> fmt::Debug for FromTryStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromTryStream")
            .field("stream", &self.stream)
            .field("done", &self.done)
            .finish()
    }
}

impl<S, T, E> Source for FromTryStream<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = T;
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
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Ok(Step::Item(item))),
            Poll::Ready(Some(Err(error))) => {
                *this.done = true;
                Poll::Ready(Err(error))
            }
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
