//! Slot indices with a reserved "null" value.
//!
//! Node containers link their nodes by pool index instead of by pointer.
//! One value per index type (`MAX`) is reserved as [`Index::NONE`], which
//! stands in for a null link and, for lists and trees, for the sentinel
//! position one past the last element.

/// A copyable pool index with a sentinel "none" value.
///
/// # Example
///
/// ```
/// use nexus_containers::Index;
///
/// let idx: u32 = 5;
/// assert!(idx.is_some());
/// assert!(u32::NONE.is_none());
/// assert_eq!(u32::NONE.into_option(), None);
/// assert_eq!(7u32.into_option(), Some(7));
/// ```
pub trait Index: Copy + Eq + core::fmt::Debug {
    /// Sentinel value meaning "no node".
    const NONE: Self;

    /// Returns `true` if this is the sentinel value.
    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` if this is not the sentinel value.
    #[inline]
    fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Converts to `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    fn into_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }

    /// Widens the index for array addressing.
    fn as_usize(self) -> usize;

    /// Narrows a slot number into this index type.
    fn from_usize(val: usize) -> Self;
}

macro_rules! impl_index_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Index for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }

                #[inline]
                fn from_usize(val: usize) -> Self {
                    debug_assert!(val < <$ty>::MAX as usize, "slot number does not fit index type");
                    val as Self
                }
            }
        )*
    };
}

impl_index_for_unsigned!(u16, u32, u64, usize);
