use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures_core::Stream;
use futures_lite::future::block_on;
use futures_lite::prelude::*;

use stream_merge::source::{from_iter, from_stream, from_try_stream, BoxSource, Source};
use stream_merge::{merge, MergeError, Step};

/// A single-threaded channel whose receiver is a stream, so tests can
/// control exactly when each source has data.
struct LocalChannel<T> {
    queue: VecDeque<T>,
    waker: Option<Waker>,
    closed: bool,
}

struct LocalReceiver<T> {
    channel: Rc<RefCell<LocalChannel<T>>>,
}

impl<T> Stream for LocalReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut channel = self.channel.borrow_mut();

        match channel.queue.pop_front() {
            Some(item) => Poll::Ready(Some(item)),
            None => {
                if channel.closed {
                    Poll::Ready(None)
                } else {
                    channel.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        }
    }
}

struct LocalSender<T> {
    channel: Rc<RefCell<LocalChannel<T>>>,
}

impl<T> LocalSender<T> {
    fn send(&self, item: T) {
        let mut channel = self.channel.borrow_mut();
        channel.queue.push_back(item);
        let _ = channel.waker.take().map(Waker::wake);
    }
}

impl<T> Drop for LocalSender<T> {
    fn drop(&mut self) {
        let mut channel = self.channel.borrow_mut();
        channel.closed = true;
        let _ = channel.waker.take().map(Waker::wake);
    }
}

fn local_channel<T>() -> (LocalSender<T>, LocalReceiver<T>) {
    let channel = Rc::new(RefCell::new(LocalChannel {
        queue: VecDeque::new(),
        waker: None,
        closed: false,
    }));

    (
        LocalSender {
            channel: channel.clone(),
        },
        LocalReceiver { channel },
    )
}

/// Per-source lifecycle counters.
#[derive(Default)]
struct Counts {
    items: usize,
    dones: usize,
    stops: usize,
}

/// Wraps a source and counts its reads, natural completions and stops.
struct Counting<S> {
    inner: S,
    counts: Rc<RefCell<Counts>>,
}

impl<S: Source + Unpin> Source for Counting<S> {
    type Item = S::Item;
    type Done = S::Done;
    type Error = S::Error;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_next(cx);
        match &poll {
            Poll::Ready(Ok(Step::Item(_))) => this.counts.borrow_mut().items += 1,
            Poll::Ready(Ok(Step::Done(_))) => this.counts.borrow_mut().dones += 1,
            _ => {}
        }
        poll
    }

    fn poll_stop(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        this.counts.borrow_mut().stops += 1;
        Pin::new(&mut this.inner).poll_stop(cx)
    }
}

fn counted<E: 'static>(
    inner: BoxSource<'static, i32, (), E>,
    counts: Rc<RefCell<Counts>>,
) -> BoxSource<'static, i32, (), E> {
    Box::pin(Counting { inner, counts })
}

#[test]
fn arrival_order_matches_send_order() {
    let mut pool = LocalPool::new();

    let (s1, r1) = local_channel();
    let (s2, r2) = local_channel();
    let (s3, r3) = local_channel();

    let out = Rc::new(RefCell::new(Vec::new()));
    let out2 = out.clone();
    let done = Rc::new(RefCell::new(false));
    let done2 = done.clone();

    pool.spawner()
        .spawn_local(async move {
            let mut merged = merge(from_iter::<_, Infallible>([
                from_stream(r1),
                from_stream(r2),
                from_stream(r3),
            ]));
            while let Some(item) = merged.next().await {
                out2.borrow_mut().push(item.unwrap());
            }
            *done2.borrow_mut() = true;
        })
        .unwrap();

    pool.run_until_stalled();

    // Deliver across sources in an order unrelated to the order the
    // sources were opened in.
    let sends = [(0, 10), (2, 30), (1, 20), (2, 31), (0, 11), (1, 21)];
    let senders = [s1, s2, s3];
    let mut expected = vec![];
    for (who, value) in sends {
        senders[who].send(value);
        expected.push(value);
        pool.run_until_stalled();
    }
    drop(senders);
    pool.run_until_stalled();

    assert!(*done.borrow());
    assert_eq!(*out.borrow(), expected);
}

#[test]
fn stop_shuts_down_every_open_source() {
    block_on(async {
        let counts: Vec<Rc<RefCell<Counts>>> = (0..3).map(|_| Rc::default()).collect();
        // A source that stays pending forever, alongside two which always
        // have data.
        let (_sender, pending) = local_channel::<i32>();

        let children: Vec<BoxSource<'static, i32, (), Infallible>> = vec![
            counted(Box::pin(from_iter(1..)), counts[0].clone()),
            counted(Box::pin(from_iter(100..)), counts[1].clone()),
            counted(Box::pin(from_stream(pending)), counts[2].clone()),
        ];
        let mut merged = merge(from_iter::<_, Infallible>(children));

        for _ in 0..8 {
            assert!(matches!(merged.pull().await, Ok(Step::Item(_))));
        }

        // The root (a finite sequence of three children) has completed
        // naturally by now, so stopping reports its terminal value.
        assert_eq!(merged.stop().await, Ok(Some(())));

        for counts in &counts {
            let counts = counts.borrow();
            assert_eq!(counts.stops, 1);
            assert_eq!(counts.dones, 0);
        }
        assert_eq!(merged.open_sources(), 0);
        assert!(merged.is_closed());
    })
}

#[test]
fn read_error_cancels_every_sibling() {
    block_on(async {
        let counts: Vec<Rc<RefCell<Counts>>> = (0..3).map(|_| Rc::default()).collect();
        let (_sender, pending) = local_channel::<i32>();

        let children: Vec<BoxSource<'static, i32, (), &'static str>> = vec![
            counted(Box::pin(from_iter(1..)), counts[0].clone()),
            counted(
                Box::pin(from_try_stream(futures_lite::stream::iter([
                    Ok(7),
                    Err("boom"),
                ]))),
                counts[1].clone(),
            ),
            counted(Box::pin(from_stream(pending)), counts[2].clone()),
        ];
        let mut merged = merge(from_iter::<_, &'static str>(children));

        let error = loop {
            match merged.pull().await {
                Ok(Step::Item(_)) => continue,
                Ok(Step::Done(_)) => panic!("the session must fail"),
                Err(error) => break error,
            }
        };
        assert_eq!(error, MergeError::Read("boom"));

        // Every sibling was stopped before the error surfaced; the source
        // that failed its read is finished, not stopped on top of that.
        assert_eq!(counts[0].borrow().stops, 1);
        assert_eq!(counts[1].borrow().stops, 0);
        assert_eq!(counts[2].borrow().stops, 1);

        // No further reads are issued once the session failed.
        let reads_after_error = counts[0].borrow().items;
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
        assert_eq!(counts[0].borrow().items, reads_after_error);
    })
}

/// Yields a single item, then stays pending; fails its own shutdown.
struct FailingStop {
    yielded: bool,
}

impl Source for FailingStop {
    type Item = i32;
    type Done = ();
    type Error = &'static str;

    fn poll_next(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Step<Self::Item, Self::Done>, Self::Error>> {
        let this = self.get_mut();
        if this.yielded {
            Poll::Pending
        } else {
            this.yielded = true;
            Poll::Ready(Ok(Step::Item(1)))
        }
    }

    fn poll_stop(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Err("cleanup failed"))
    }
}

#[test]
fn stop_error_is_surfaced_when_it_is_the_only_failure() {
    block_on(async {
        let children: Vec<BoxSource<'static, i32, (), &'static str>> =
            vec![Box::pin(FailingStop { yielded: false })];
        let mut merged = merge(from_iter::<_, &'static str>(children));

        assert_eq!(merged.pull().await, Ok(Step::Item(1)));
        assert_eq!(merged.stop().await, Err(MergeError::Stop("cleanup failed")));
        // The error has been claimed; only terminal completion remains.
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
        assert_eq!(merged.stop().await, Ok(None));
    })
}

#[test]
fn first_error_wins_over_later_stop_failures() {
    block_on(async {
        let children: Vec<BoxSource<'static, i32, (), &'static str>> = vec![
            Box::pin(FailingStop { yielded: false }),
            Box::pin(from_try_stream(futures_lite::stream::iter([
                Ok(2),
                Err("first"),
            ]))),
        ];
        let mut merged = merge(from_iter::<_, &'static str>(children));

        let error = loop {
            match merged.pull().await {
                Ok(Step::Item(_)) => continue,
                Ok(Step::Done(_)) => panic!("the session must fail"),
                Err(error) => break error,
            }
        };
        // The read failure was observed before the cleanup failure, so it
        // is the one surfaced.
        assert_eq!(error, MergeError::Read("first"));
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
    })
}

#[test]
fn infinite_outer_closes_everything_on_stop() {
    block_on(async {
        let registry: Rc<RefCell<Vec<Rc<RefCell<Counts>>>>> = Rc::default();

        let registry2 = registry.clone();
        let children = (0..).map(move |_| {
            let counts = Rc::new(RefCell::new(Counts::default()));
            registry2.borrow_mut().push(counts.clone());
            counted(Box::pin(from_iter(0..)), counts)
        });
        let mut merged = merge(from_iter::<_, Infallible>(children));

        for _ in 0..25 {
            assert!(matches!(merged.pull().await, Ok(Step::Item(_))));
        }

        assert_eq!(merged.stop().await, Ok(None));

        let registry = registry.borrow();
        assert!(registry.len() > 1);
        for counts in registry.iter() {
            assert_eq!(counts.borrow().stops, 1);
        }
        assert_eq!(merged.open_sources(), 0);

        // A closed session keeps reporting terminal completion.
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
    })
}

#[async_std::test]
async fn stop_midway_under_a_real_executor() {
    let counts: Vec<Rc<RefCell<Counts>>> = (0..2).map(|_| Rc::default()).collect();

    let children: Vec<BoxSource<'static, i32, (), Infallible>> = vec![
        counted(
            Box::pin(from_stream(async_std::stream::repeat(1))),
            counts[0].clone(),
        ),
        counted(Box::pin(from_iter(10..)), counts[1].clone()),
    ];
    let mut merged = merge(from_iter::<_, Infallible>(children));

    for _ in 0..4 {
        assert!(matches!(merged.pull().await, Ok(Step::Item(_))));
    }

    // The root handed out both children by now, so stopping reports its
    // terminal value while the children themselves are cut short.
    assert_eq!(merged.stop().await, Ok(Some(())));
    for counts in &counts {
        assert_eq!(counts.borrow().stops, 1);
    }
    assert!(merged.is_closed());
}

#[test]
fn timed_sources_merge_and_fail_exactly_once() {
    use futures_time::time::Duration;

    const T: u64 = 40; // milliseconds

    block_on(async {
        let counts: Vec<Rc<RefCell<Counts>>> = (0..4).map(|_| Rc::default()).collect();

        let threes = futures_time::stream::interval(Duration::from_millis(T)).map(|_| 3);
        let fives = futures_time::stream::interval(Duration::from_millis(2 * T)).map(|_| 5);
        let delayed_then_failing = futures_lite::stream::unfold(0u8, |state| async move {
            match state {
                0 => {
                    futures_time::task::sleep(Duration::from_millis(3 * T)).await;
                    Some((Ok(7), 1))
                }
                1 => {
                    futures_time::task::sleep(Duration::from_millis(4 * T)).await;
                    Some((Err("rejected"), 2))
                }
                _ => None,
            }
        });

        let children: Vec<BoxSource<'static, i32, (), &'static str>> = vec![
            counted(Box::pin(from_iter([1, 2, 2])), counts[0].clone()),
            counted(Box::pin(from_stream(threes)), counts[1].clone()),
            counted(Box::pin(from_stream(fives)), counts[2].clone()),
            counted(Box::pin(from_try_stream(delayed_then_failing)), counts[3].clone()),
        ];
        let mut merged = merge(from_iter::<_, &'static str>(children));

        let mut out = vec![];
        let error = loop {
            match merged.pull().await {
                Ok(Step::Item(n)) => out.push(n),
                Ok(Step::Done(_)) => panic!("the session must fail"),
                Err(error) => break error,
            }
        };
        assert_eq!(error, MergeError::Read("rejected"));

        // All items produced before the failure made it through.
        assert_eq!(out.iter().filter(|&&n| n == 1).count(), 1);
        assert_eq!(out.iter().filter(|&&n| n == 2).count(), 2);
        assert_eq!(out.iter().filter(|&&n| n == 7).count(), 1);
        assert!(out.iter().filter(|&&n| n == 3).count() >= 3);
        assert!(out.iter().filter(|&&n| n == 5).count() >= 2);

        // The finite source completed naturally; the interval sources were
        // stopped by the cascade; the failing source was not stopped on
        // top of its read failure.
        assert_eq!(counts[0].borrow().dones, 1);
        assert_eq!(counts[1].borrow().stops, 1);
        assert_eq!(counts[2].borrow().stops, 1);
        assert_eq!(counts[3].borrow().stops, 0);

        // The failure is reported exactly once.
        assert_eq!(merged.pull().await, Ok(Step::Done(None)));
    })
}
