use core::task::Waker;
use std::collections::VecDeque;

use fixedbitset::FixedBitSet;

/// Tracks which source keys have been woken, in wake order.
///
/// Keys are handed back strictly first-woken-first-served; this is what
/// makes the merged output follow real arrival order rather than key
/// order. A key is never queued twice.
#[derive(Debug)]
pub(crate) struct ReadinessQueue {
    queue: VecDeque<usize>,
    enqueued: FixedBitSet,
    parent_waker: Option<Waker>,
}

impl ReadinessQueue {
    /// Create a new instance of `ReadinessQueue`.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(len),
            enqueued: FixedBitSet::with_capacity(len),
            parent_waker: None,
        }
    }

    /// Mark `key` as ready.
    ///
    /// Returns whether the key was already queued.
    pub(crate) fn set_ready(&mut self, key: usize) -> bool {
        if self.enqueued[key] {
            true
        } else {
            self.enqueued.set(key, true);
            self.queue.push_back(key);
            false
        }
    }

    /// Pop the next ready key, in wake order.
    pub(crate) fn pop_ready(&mut self) -> Option<usize> {
        let key = self.queue.pop_front()?;
        self.enqueued.set(key, false);
        Some(key)
    }

    /// Access the parent waker.
    #[inline]
    pub(crate) fn parent_waker(&self) -> Option<&Waker> {
        self.parent_waker.as_ref()
    }

    /// Set the parent `Waker`. This needs to be called at the start of
    /// every `poll` function.
    pub(crate) fn set_waker(&mut self, parent_waker: &Waker) {
        match &mut self.parent_waker {
            Some(prev) => prev.clone_from(parent_waker),
            None => self.parent_waker = Some(parent_waker.clone()),
        }
    }

    /// Grow the key space to `len` keys.
    pub(crate) fn resize(&mut self, len: usize) {
        if len > self.enqueued.len() {
            self.enqueued.grow(len);
        }
    }
}
