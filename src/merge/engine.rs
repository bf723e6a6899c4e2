use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::Stream;
use slab::Slab;

use crate::source::{IntoSource, Source, Step};
use crate::utils::{get_pin_mut_slab, WakerPool};
use crate::MergeError;

use super::{Pull, PullResult, Stop};

/// The waker-pool key reserved for the root source. Child sources at slab
/// index `n` use key `n + 1`.
const ROOT: usize = 0;

pub(crate) type Child<R> = <<R as Source>::Item as IntoSource>::Source;

/// Scheduling state of one open reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// The reader is issuing reads against its source.
    Running,
    /// Cancellation reached the reader; its stop is being driven.
    Stopping,
    /// The reader has finished. Only the root lingers in this state;
    /// closed children are removed from the slab instead.
    Closed,
}

/// A merged view over a root source and every child source it yields.
///
/// This `struct` is created by [`merge`][super::merge]. See its
/// documentation for more.
///
/// The session moves through three phases: running (the root and all
/// children are being read), cancelling (an error or an explicit
/// [`stop`][Merged::stop] was observed, and outstanding sources are being
/// shut down) and closed. Once closed, every further pull reports terminal
/// completion.
#[must_use = "`Merged` does nothing if not pulled from"]
#[pin_project::pin_project]
pub struct Merged<R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    #[pin]
    root: R,
    #[pin]
    children: Slab<Child<R>>,
    /// Scheduling state per child, indexed by slab key.
    child_states: Vec<ReaderState>,
    root_state: ReaderState,
    wakers: WakerPool,
    /// Number of open sources, the root included. The session closes when
    /// this reaches zero with nothing left to deliver.
    open: usize,
    /// Monotonic: set at most once per session. Once set, no source is
    /// read again; outstanding sources are stopped instead.
    cancelling: bool,
    closed: bool,
    root_done: Option<R::Done>,
    /// The first error observed, which is the one surfaced.
    error: Option<MergeError<R::Error>>,
}

impl<R> fmt::Debug for Merged<R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Merged")
            .field("children", &"[..]")
            .field("open", &self.open)
            .field("cancelling", &self.cancelling)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<R> Merged<R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    pub(crate) fn new(root: R) -> Self {
        let wakers = WakerPool::new(1);
        wakers.readiness().lock().unwrap().set_ready(ROOT);
        Self {
            root,
            children: Slab::new(),
            child_states: Vec::new(),
            root_state: ReaderState::Running,
            wakers,
            open: 1,
            cancelling: false,
            closed: false,
            root_done: None,
            error: None,
        }
    }

    /// Returns the number of currently open sources, the root included.
    pub fn open_sources(&self) -> usize {
        self.open
    }

    /// Returns `true` once the session has reached terminal completion.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pull the next result out of the session.
    ///
    /// See [`poll_pull`][Merged::poll_pull] for the low-level equivalent.
    pub fn pull(&mut self) -> Pull<'_, R>
    where
        Self: Unpin,
    {
        Pull::new(self)
    }

    /// Stop the session early.
    ///
    /// See [`poll_stop_session`][Merged::poll_stop_session] for the
    /// low-level equivalent.
    pub fn stop(&mut self) -> Stop<'_, R>
    where
        Self: Unpin,
    {
        Stop::new(self)
    }

    /// Attempt to pull the next result out of the session.
    ///
    /// Sources are drained strictly in the order their reads resolve.
    /// Yields `Step::Item` for every item, an error once if any source
    /// failed, and `Step::Done` forever after the session closed — the
    /// root's terminal value is handed out exactly once.
    pub fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<PullResult<R>> {
        let mut this = self.project();

        if *this.closed {
            return Poll::Ready(Ok(Step::Done(this.root_done.take())));
        }

        // The root is read at most once per poll; see below.
        let mut polled_root = false;
        let mut root_deferred = false;

        // Set the parent waker before draining so no in-flight wake is lost.
        this.wakers.readiness().lock().unwrap().set_waker(cx.waker());

        loop {
            let key = this.wakers.readiness().lock().unwrap().pop_ready();
            let Some(key) = key else {
                if *this.open == 0 {
                    *this.closed = true;
                    if let Some(error) = this.error.take() {
                        *this.root_done = None;
                        return Poll::Ready(Err(error));
                    }
                    return Poll::Ready(Ok(Step::Done(this.root_done.take())));
                }
                if root_deferred {
                    this.wakers.readiness().lock().unwrap().set_ready(ROOT);
                    // The root is known to be ready; yield to the executor
                    // instead of spinning on it within a single poll.
                    cx.waker().wake_by_ref();
                }
                return Poll::Pending;
            };

            if key == ROOT {
                if *this.root_state == ReaderState::Closed {
                    // Stale wake.
                    continue;
                }
                if *this.cancelling && *this.root_state == ReaderState::Running {
                    *this.root_state = ReaderState::Stopping;
                }
                if *this.root_state == ReaderState::Running {
                    if polled_root {
                        // A synchronously-ready root could otherwise spawn
                        // children forever without the consumer seeing a
                        // single item.
                        root_deferred = true;
                        continue;
                    }
                    polled_root = true;
                    let poll = {
                        let mut root_cx = Context::from_waker(this.wakers.get(ROOT).unwrap());
                        this.root.as_mut().poll_next(&mut root_cx)
                    };
                    match poll {
                        Poll::Pending => {}
                        Poll::Ready(Ok(Step::Item(child))) => {
                            let index = {
                                // SAFETY: inserting into the slab never
                                // moves existing entries.
                                let children =
                                    unsafe { this.children.as_mut().get_unchecked_mut() };
                                children.insert(child.into_source())
                            };
                            if this.child_states.len() <= index {
                                this.child_states.resize(index + 1, ReaderState::Running);
                            } else {
                                this.child_states[index] = ReaderState::Running;
                            }
                            if this.wakers.len() < index + 2 {
                                this.wakers.resize(index + 2);
                            }
                            *this.open += 1;
                            let mut readiness = this.wakers.readiness().lock().unwrap();
                            // The root keeps reading ahead of the child it
                            // just produced.
                            readiness.set_ready(ROOT);
                            readiness.set_ready(index + 1);
                        }
                        Poll::Ready(Ok(Step::Done(value))) => {
                            *this.root_done = Some(value);
                            *this.root_state = ReaderState::Closed;
                            *this.open -= 1;
                        }
                        Poll::Ready(Err(error)) => {
                            if this.error.is_none() {
                                *this.error = Some(MergeError::Read(error));
                            }
                            // A reader that failed its read is finished;
                            // its source is not stopped on top of that.
                            *this.root_state = ReaderState::Closed;
                            *this.open -= 1;
                            *this.cancelling = true;
                            Self::schedule_stop_all(
                                this.wakers,
                                *this.root_state,
                                this.children.as_ref().get_ref(),
                            );
                        }
                    }
                } else {
                    let poll = {
                        let mut root_cx = Context::from_waker(this.wakers.get(ROOT).unwrap());
                        this.root.as_mut().poll_stop(&mut root_cx)
                    };
                    match poll {
                        Poll::Pending => {}
                        Poll::Ready(result) => {
                            if let Err(error) = result {
                                if this.error.is_none() {
                                    *this.error = Some(MergeError::Stop(error));
                                }
                            }
                            *this.root_state = ReaderState::Closed;
                            *this.open -= 1;
                        }
                    }
                }
                continue;
            }

            let index = key - 1;
            if !this.children.as_ref().get_ref().contains(index) {
                // Stale wake for an already-closed child.
                continue;
            }
            if *this.cancelling && this.child_states[index] == ReaderState::Running {
                this.child_states[index] = ReaderState::Stopping;
            }
            if this.child_states[index] == ReaderState::Running {
                let poll = {
                    let mut child_cx = Context::from_waker(this.wakers.get(key).unwrap());
                    get_pin_mut_slab(this.children.as_mut(), index)
                        .unwrap()
                        .poll_next(&mut child_cx)
                };
                match poll {
                    Poll::Pending => {}
                    Poll::Ready(Ok(Step::Item(item))) => {
                        let mut readiness = this.wakers.readiness().lock().unwrap();
                        // The child's next read is issued on the consumer's
                        // next pull: at most one pending value per source.
                        readiness.set_ready(key);
                        if root_deferred {
                            readiness.set_ready(ROOT);
                        }
                        drop(readiness);
                        return Poll::Ready(Ok(Step::Item(item)));
                    }
                    Poll::Ready(Ok(Step::Done(_))) => {
                        // Child terminal values are not observable; only
                        // the root's is.
                        Self::remove_child(this.children.as_mut(), index);
                        *this.open -= 1;
                    }
                    Poll::Ready(Err(error)) => {
                        if this.error.is_none() {
                            *this.error = Some(MergeError::Read(error));
                        }
                        Self::remove_child(this.children.as_mut(), index);
                        *this.open -= 1;
                        *this.cancelling = true;
                        Self::schedule_stop_all(
                            this.wakers,
                            *this.root_state,
                            this.children.as_ref().get_ref(),
                        );
                    }
                }
            } else {
                let poll = {
                    let mut child_cx = Context::from_waker(this.wakers.get(key).unwrap());
                    get_pin_mut_slab(this.children.as_mut(), index)
                        .unwrap()
                        .poll_stop(&mut child_cx)
                };
                match poll {
                    Poll::Pending => {}
                    Poll::Ready(result) => {
                        if let Err(error) = result {
                            if this.error.is_none() {
                                *this.error = Some(MergeError::Stop(error));
                            }
                        }
                        Self::remove_child(this.children.as_mut(), index);
                        *this.open -= 1;
                    }
                }
            }
        }
    }

    /// Attempt to stop the session early.
    ///
    /// Resolves only once every opened source has been shut down. Reports
    /// the root's terminal value when the root had already completed
    /// naturally, and an error only when the shutdown itself is the sole
    /// failure — an error already claimed by a pull is not reported twice.
    /// Resolves immediately once the session is closed.
    pub fn poll_stop_session(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<R::Done>, MergeError<R::Error>>> {
        self.as_mut().begin_stop();
        match self.poll_pull(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Step::Done(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Ready(Ok(Step::Item(_))) => {
                unreachable!("a cancelling session never produces items")
            }
        }
    }

    /// Set the cancellation flag and schedule every open source to be
    /// stopped. Idempotent.
    fn begin_stop(self: Pin<&mut Self>) {
        let this = self.project();
        if *this.closed || *this.cancelling {
            return;
        }
        *this.cancelling = true;
        Self::schedule_stop_all(this.wakers, *this.root_state, this.children.as_ref().get_ref());
        // Wake a possibly parked consumer so the cascade gets driven.
        let readiness = this.wakers.readiness().lock().unwrap();
        if let Some(waker) = readiness.parent_waker() {
            waker.wake_by_ref();
        }
    }

    fn schedule_stop_all(wakers: &WakerPool, root_state: ReaderState, children: &Slab<Child<R>>) {
        let mut readiness = wakers.readiness().lock().unwrap();
        if root_state != ReaderState::Closed {
            readiness.set_ready(ROOT);
        }
        for (key, _) in children.iter() {
            readiness.set_ready(key + 1);
        }
    }

    fn remove_child(children: Pin<&mut Slab<Child<R>>>, index: usize) {
        // SAFETY: we only access the slab to drop the closed child in
        // place.
        let children = unsafe { children.get_unchecked_mut() };
        children.remove(index);
    }
}

impl<R> Stream for Merged<R>
where
    R: Source,
    R::Item: IntoSource<Error = R::Error>,
{
    type Item = Result<<Child<R> as Source>::Item, MergeError<R::Error>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.poll_pull(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Step::Item(item))) => Poll::Ready(Some(Ok(item))),
            // The root's terminal value is only observable through `pull`.
            Poll::Ready(Ok(Step::Done(_))) => Poll::Ready(None),
            Poll::Ready(Err(error)) => Poll::Ready(Some(Err(error))),
        }
    }
}
