//! Utilities to implement the merge engine.

mod pin;
mod wakers;

pub(crate) use pin::get_pin_mut_slab;
pub(crate) use wakers::WakerPool;
