//! Error types shared by every container.

use std::alloc::Layout;

use thiserror::Error;

/// Failures raised by container operations.
///
/// Length checks happen before any mutation, so a container that returned
/// an error is unchanged unless the operation documents otherwise.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Requested size or capacity exceeds the container's `max_size()`.
    #[error("length {requested} exceeds maximum {max}")]
    LengthError {
        /// The size that was asked for.
        requested: usize,
        /// The container's theoretical maximum.
        max: usize,
    },

    /// Computing the allocation size overflowed.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// The system allocator returned null.
    #[error("memory allocation of {} bytes failed", layout.size())]
    AllocError {
        /// The layout that could not be satisfied.
        layout: Layout,
    },

    /// A checked accessor was given a position outside `[0, len)`.
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// Requested position.
        index: usize,
        /// Container length at the time of the call.
        len: usize,
    },

    /// A checked map lookup found no entry for the key.
    #[error("key not found")]
    KeyNotFound,

    /// Max load factor must be a positive, non-NaN number.
    #[error("invalid max load factor {0}")]
    InvalidLoadFactor(f32),
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Error returned when a fixed-capacity node pool is full.
///
/// Carries the value that could not be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> core::fmt::Display for Full<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "storage is full")
    }
}

impl<T: core::fmt::Debug> std::error::Error for Full<T> {}

/// Turns an error from a panicking convenience API into a panic.
///
/// Allocation failures are routed to [`std::alloc::handle_alloc_error`] so
/// they behave like any other out-of-memory condition in the process.
#[cold]
#[track_caller]
pub(crate) fn handle_error(err: Error) -> ! {
    match err {
        Error::AllocError { layout } => std::alloc::handle_alloc_error(layout),
        other => panic!("{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = Error::LengthError {
            requested: 10,
            max: 4,
        };
        assert_eq!(err.to_string(), "length 10 exceeds maximum 4");

        let err = Error::OutOfRange { index: 3, len: 2 };
        assert_eq!(err.to_string(), "index 3 out of range for length 2");

        let err = Error::InvalidLoadFactor(-1.0);
        assert_eq!(err.to_string(), "invalid max load factor -1");
    }

    #[test]
    fn full_returns_value() {
        let full = Full(String::from("rejected"));
        assert_eq!(full.to_string(), "storage is full");
        assert_eq!(full.into_inner(), "rejected");
    }

    #[test]
    #[should_panic(expected = "index 5 out of range")]
    fn handle_error_panics_with_message() {
        handle_error(Error::OutOfRange { index: 5, len: 1 });
    }
}
