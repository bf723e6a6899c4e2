use core::fmt;
use std::error::Error;

/// An error raised by a merge session.
///
/// A failure on any single source is fatal to the whole session: every
/// other open source is stopped before the error is handed to the
/// consumer, and the first error observed wins. A failure during a
/// source's own shutdown is only surfaced when it is the sole failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError<E> {
    /// A source failed while producing its next item.
    Read(E),
    /// A source failed while it was being stopped.
    Stop(E),
}

impl<E> MergeError<E> {
    /// Returns the underlying source error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Read(e) | Self::Stop(e) => e,
        }
    }
}

impl<E: fmt::Display> fmt::Display for MergeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "a source failed to produce its next item: {e}"),
            Self::Stop(e) => write!(f, "a source failed while being stopped: {e}"),
        }
    }
}

impl<E: Error + 'static> Error for MergeError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(e) | Self::Stop(e) => Some(e),
        }
    }
}
