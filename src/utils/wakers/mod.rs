mod readiness_queue;
mod waker;
mod waker_pool;

pub(crate) use readiness_queue::ReadinessQueue;
pub(crate) use waker::InlineWaker;
pub(crate) use waker_pool::WakerPool;
