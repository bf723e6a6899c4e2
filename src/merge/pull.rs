use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use crate::source::{IntoSource, Source};

use super::{Merged, PullResult};

/// Future returned by [`Merged::pull`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Pull<'a, R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    merged: &'a mut Merged<R>,
}

impl<'a, R> Pull<'a, R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    pub(crate) fn new(merged: &'a mut Merged<R>) -> Self {
        Self { merged }
    }
}

impl<R> fmt::Debug for Pull<'_, R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pull").finish_non_exhaustive()
    }
}

impl<R> Future for Pull<'_, R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
    Merged<R>: Unpin,
{
    type Output = PullResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.get_mut().merged).poll_pull(cx)
    }
}
