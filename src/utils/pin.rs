use core::pin::Pin;

use slab::Slab;

/// Returns a pinned mutable reference to the slab entry at `key`, or
/// `None` if the key is vacant.
#[inline]
pub(crate) fn get_pin_mut_slab<T>(slab: Pin<&mut Slab<T>>, key: usize) -> Option<Pin<&mut T>> {
    // SAFETY: `get_mut` never moves entries inside the slab, and the entry
    // is pinned because the slab itself is.
    unsafe {
        slab.get_unchecked_mut()
            .get_mut(key)
            .map(|t| Pin::new_unchecked(t))
    }
}
