//! Raw typed allocation and in-place construction.
//!
//! Contiguous containers get their storage from here rather than calling
//! `std::alloc` directly, so the overflow and null checks live in one place.
//! Requests for zero bytes (`n == 0` or a zero-sized `T`) never reach the
//! system allocator and hand back a dangling, aligned pointer instead.

use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::{Layout, alloc, dealloc};

use crate::error::{Error, Result};

/// Returns the layout for `n` values of `T`.
///
/// # Errors
///
/// [`Error::CapacityOverflow`] if the byte size overflows `isize`.
#[inline]
pub fn array_layout<T>(n: usize) -> Result<Layout> {
    Layout::array::<T>(n).map_err(|_| Error::CapacityOverflow)
}

/// Allocates uninitialized storage for `n` values of `T`.
///
/// # Errors
///
/// - [`Error::CapacityOverflow`] if the layout cannot be computed.
/// - [`Error::AllocError`] if the system allocator returns null.
///
/// # Example
///
/// ```
/// use nexus_containers::alloc;
///
/// let ptr = alloc::allocate::<u64>(4).unwrap();
/// unsafe {
///     alloc::construct(ptr.as_ptr(), 7);
///     assert_eq!(*ptr.as_ptr(), 7);
///     alloc::destroy(ptr.as_ptr());
///     alloc::deallocate(ptr, 4);
/// }
/// ```
pub fn allocate<T>(n: usize) -> Result<NonNull<T>> {
    let layout = array_layout::<T>(n)?;
    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }

    // Safety: layout has non-zero size
    let raw = unsafe { alloc(layout) };
    NonNull::new(raw as *mut T).ok_or(Error::AllocError { layout })
}

/// Releases storage obtained from [`allocate`].
///
/// # Safety
///
/// `ptr` must come from `allocate::<T>(n)` with the same `n`, and must not
/// be used afterwards. Live values in the block are not dropped.
pub unsafe fn deallocate<T>(ptr: NonNull<T>, n: usize) {
    let size = mem::size_of::<T>().wrapping_mul(n);
    if size == 0 {
        return;
    }

    // Safety: the same layout was accepted by `allocate`
    unsafe {
        let layout = Layout::from_size_align_unchecked(size, mem::align_of::<T>());
        dealloc(ptr.as_ptr() as *mut u8, layout);
    }
}

/// Moves `value` into uninitialized storage.
///
/// # Safety
///
/// `ptr` must be valid for writes and properly aligned. Any previous value
/// at `ptr` is overwritten without being dropped.
#[inline]
pub unsafe fn construct<T>(ptr: *mut T, value: T) {
    unsafe { ptr.write(value) }
}

/// Drops the value at `ptr` in place.
///
/// Compiles to nothing for types without drop glue.
///
/// # Safety
///
/// `ptr` must point to an initialized value that is not used again.
#[inline]
pub unsafe fn destroy<T>(ptr: *mut T) {
    if mem::needs_drop::<T>() {
        unsafe { ptr::drop_in_place(ptr) }
    }
}

/// Drops `n` consecutive values starting at `ptr`.
///
/// Compiles to nothing for types without drop glue.
///
/// # Safety
///
/// `[ptr, ptr + n)` must hold initialized values that are not used again.
#[inline]
pub unsafe fn destroy_range<T>(ptr: *mut T, n: usize) {
    if mem::needs_drop::<T>() && n > 0 {
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr, n)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn zero_sized_requests_are_dangling() {
        let p = allocate::<u64>(0).unwrap();
        assert_eq!(p, NonNull::dangling());
        unsafe { deallocate(p, 0) };

        let p = allocate::<()>(1000).unwrap();
        assert_eq!(p, NonNull::dangling());
        unsafe { deallocate(p, 1000) };
    }

    #[test]
    fn overflowing_layout_is_reported() {
        assert_eq!(allocate::<u64>(usize::MAX), Err(Error::CapacityOverflow));
    }

    #[test]
    fn allocation_is_aligned() {
        #[repr(align(64))]
        struct Wide(#[allow(dead_code)] u8);

        let p = allocate::<Wide>(3).unwrap();
        assert_eq!(p.as_ptr() as usize % 64, 0);
        unsafe { deallocate(p, 3) };
    }

    #[test]
    fn construct_and_destroy_range() {
        let marker = Rc::new(());
        let p = allocate::<Rc<()>>(4).unwrap();
        unsafe {
            for i in 0..4 {
                construct(p.as_ptr().add(i), Rc::clone(&marker));
            }
            assert_eq!(Rc::strong_count(&marker), 5);

            destroy(p.as_ptr());
            assert_eq!(Rc::strong_count(&marker), 4);

            destroy_range(p.as_ptr().add(1), 3);
            assert_eq!(Rc::strong_count(&marker), 1);

            deallocate(p, 4);
        }
    }
}
