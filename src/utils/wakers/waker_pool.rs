use std::sync::{Arc, Mutex};
use std::task::Waker;

use super::{InlineWaker, ReadinessQueue};

/// A growable collection of per-key wakers which delegate to one shared
/// readiness queue.
pub(crate) struct WakerPool {
    wakers: Vec<Waker>,
    readiness: Arc<Mutex<ReadinessQueue>>,
}

impl WakerPool {
    /// Create a new instance of `WakerPool`.
    pub(crate) fn new(len: usize) -> Self {
        let readiness = Arc::new(Mutex::new(ReadinessQueue::new(len)));
        let wakers = (0..len)
            .map(|key| Arc::new(InlineWaker::new(key, readiness.clone())).into())
            .collect();
        Self { wakers, readiness }
    }

    /// Number of keys the pool currently covers.
    pub(crate) fn len(&self) -> usize {
        self.wakers.len()
    }

    pub(crate) fn get(&self, key: usize) -> Option<&Waker> {
        self.wakers.get(key)
    }

    /// Access the shared `ReadinessQueue`.
    pub(crate) fn readiness(&self) -> &Mutex<ReadinessQueue> {
        self.readiness.as_ref()
    }

    /// Grow the pool to cover `len` keys.
    pub(crate) fn resize(&mut self, len: usize) {
        let mut key = self.wakers.len();
        self.wakers.resize_with(len, || {
            let waker = Arc::new(InlineWaker::new(key, self.readiness.clone())).into();
            key += 1;
            waker
        });

        let mut readiness = self.readiness.lock().unwrap();
        readiness.resize(len);
    }
}
