use core::fmt;
use core::marker::PhantomData;
use core::pin::Pin;
use core::task::{Context, Poll};

use pin_project::pin_project;

use super::{Source, Step};

/// A source that reads from an ordinary iterator.
///
/// This `struct` is created by [`from_iter`]. See its documentation for
/// more.
#[pin_project]
pub struct FromIter<I, E> {
    iter: Option<I>,
    _marker: PhantomData<E>,
}

/// Converts an iterator into a [`Source`].
///
/// Every read completes immediately. The source itself never fails; `E` is
/// the error type of the merge session the source participates in, and is
/// usually inferred. Stopping the source early drops the iterator right
/// away.
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
///     let mut merged = merge(from_iter::<_, Infallible>([from_iter([1, 2]), from_iter([3, 4])]));
///     let mut out = vec![];
///     while let Step::Item(n) = merged.pull().await.unwrap() {
///         out.push(n);
///     }
///     out.sort_unstable();
///     assert_eq!(out, [1, 2, 3, 4]);
/// })
/// ```
pub fn from_iter<I: IntoIterator, E>(iter: I) -> FromIter<I::IntoIter, E> {
    FromIter {
        iter: Some(iter.into_iter()),
        _marker: PhantomData,
    }
}

impl<I: fmt::Debug, E> fmt::Debug for FromIter<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromIter").field("iter", &self.iter).finish()
    }
}

impl<I: Iterator, E> Source for FromIter<I, E> {
    type Item = I::Item;
    type Done = ();
    type Error = E;

    fn poll_next(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        let this = self.project();
        match this.iter.as_mut().and_then(Iterator::next) {
            Some(item) => Poll::Ready(Ok(Step::Item(item))),
            None => {
                *this.iter = None;
                Poll::Ready(Ok(Step::Done(())))
            }
        }
    }

    fn poll_stop(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let _ = self.project().iter.take();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::Infallible;
    use futures::task::noop_waker;

    #[test]
    fn yields_then_completes() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut source = from_iter::<_, Infallible>([1, 2]);
        let mut source = Pin::new(&mut source);

        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Item(1))));
        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Item(2))));
        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Done(()))));
        // Exhausted sources stay exhausted.
        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Done(()))));
    }

    #[test]
    fn stop_fuses() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut source = from_iter::<_, Infallible>(1..);
        let mut source = Pin::new(&mut source);

        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Item(1))));
        assert_eq!(source.as_mut().poll_stop(&mut cx), Poll::Ready(Ok(())));
        assert_eq!(source.as_mut().poll_next(&mut cx), Poll::Ready(Ok(Step::Done(()))));
    }
}
