use std::sync::{Arc, Mutex};
use std::task::Wake;

use super::ReadinessQueue;

/// A waker for one source key, delegating to the shared readiness queue.
#[derive(Debug)]
pub(crate) struct InlineWaker {
    pub(crate) key: usize,
    pub(crate) readiness: Arc<Mutex<ReadinessQueue>>,
}

impl InlineWaker {
    /// Create a new instance of `InlineWaker`.
    pub(crate) fn new(key: usize, readiness: Arc<Mutex<ReadinessQueue>>) -> Self {
        Self { key, readiness }
    }
}

impl Wake for InlineWaker {
    fn wake(self: Arc<Self>) {
        let mut readiness = self.readiness.lock().unwrap();
        if !readiness.set_ready(self.key) {
            readiness
                .parent_waker()
                .expect("`parent_waker` not available from `ReadinessQueue`. Did you forget to call `ReadinessQueue::set_waker`?")
                .wake_by_ref()
        }
    }
}
