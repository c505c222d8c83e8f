//! Writes into uninitialized memory with rollback on panic.
//!
//! Each writer tracks how many slots it has initialized in an [`InitGuard`].
//! If producing a value panics, the guard drops exactly those slots before
//! the panic continues, so nothing leaks and nothing is dropped twice. The
//! raw storage itself belongs to the caller and is never freed here.

use core::mem;
use core::ptr;

use crate::alloc;

/// Counts initialized slots from `start` and drops them unless disarmed.
///
/// # Example
///
/// ```
/// use nexus_containers::alloc;
/// use nexus_containers::uninit::InitGuard;
///
/// let buf = alloc::allocate::<String>(2).unwrap();
/// unsafe {
///     let mut guard = InitGuard::new(buf.as_ptr());
///     guard.push("a".to_string());
///     guard.push("b".to_string());
///     assert_eq!(guard.disarm(), 2);
///
///     alloc::destroy_range(buf.as_ptr(), 2);
///     alloc::deallocate(buf, 2);
/// }
/// ```
pub struct InitGuard<T> {
    start: *mut T,
    initialized: usize,
}

impl<T> InitGuard<T> {
    /// Starts a guard with no initialized slots.
    ///
    /// # Safety
    ///
    /// Every slot later written through [`push`](Self::push) must be valid
    /// for writes and uninitialized.
    #[inline]
    pub unsafe fn new(start: *mut T) -> Self {
        Self {
            start,
            initialized: 0,
        }
    }

    /// Writes `value` into the next slot.
    ///
    /// # Safety
    ///
    /// The next slot must be in bounds of the caller's allocation.
    #[inline]
    pub unsafe fn push(&mut self, value: T) {
        unsafe { alloc::construct(self.start.add(self.initialized), value) };
        self.initialized += 1;
    }

    /// Number of slots written so far.
    #[inline]
    pub fn initialized(&self) -> usize {
        self.initialized
    }

    /// Keeps the written values and returns their count.
    #[inline]
    pub fn disarm(self) -> usize {
        let n = self.initialized;
        mem::forget(self);
        n
    }
}

impl<T> Drop for InitGuard<T> {
    fn drop(&mut self) {
        // Safety: exactly `initialized` slots were written by `push`
        unsafe { alloc::destroy_range(self.start, self.initialized) }
    }
}

/// Clones every element of `src` into `dst`.
///
/// # Safety
///
/// `dst` must be valid for `src.len()` writes and must not overlap `src`.
pub unsafe fn clone_from_slice<T: Clone>(src: &[T], dst: *mut T) {
    let mut guard = unsafe { InitGuard::new(dst) };
    for item in src {
        unsafe { guard.push(item.clone()) };
    }
    guard.disarm();
}

/// Writes `n` clones of `value` into `dst`.
///
/// # Safety
///
/// `dst` must be valid for `n` writes.
pub unsafe fn fill<T: Clone>(dst: *mut T, n: usize, value: &T) {
    let mut guard = unsafe { InitGuard::new(dst) };
    for _ in 0..n {
        unsafe { guard.push(value.clone()) };
    }
    guard.disarm();
}

/// Writes `n` values produced by `f` into `dst`.
///
/// # Safety
///
/// `dst` must be valid for `n` writes.
pub unsafe fn fill_with<T, F>(dst: *mut T, n: usize, mut f: F)
where
    F: FnMut() -> T,
{
    let mut guard = unsafe { InitGuard::new(dst) };
    for _ in 0..n {
        unsafe { guard.push(f()) };
    }
    guard.disarm();
}

/// Moves `n` values from `src` to `dst` bitwise.
///
/// The ranges may overlap. After the call the `src` slots are logically
/// uninitialized.
///
/// # Safety
///
/// `src` must hold `n` initialized values and `dst` must be valid for `n`
/// writes.
#[inline]
pub unsafe fn relocate<T>(src: *const T, dst: *mut T, n: usize) {
    unsafe { ptr::copy(src, dst, n) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    struct PanicOnClone<'a> {
        clones_left: &'a Cell<usize>,
        marker: Rc<()>,
    }

    impl Clone for PanicOnClone<'_> {
        fn clone(&self) -> Self {
            let left = self.clones_left.get();
            if left == 0 {
                panic!("clone budget exhausted");
            }
            self.clones_left.set(left - 1);
            Self {
                clones_left: self.clones_left,
                marker: Rc::clone(&self.marker),
            }
        }
    }

    #[test]
    fn fill_writes_clones() {
        let buf = alloc::allocate::<String>(3).unwrap();
        unsafe {
            fill(buf.as_ptr(), 3, &"x".to_string());
            let written = core::slice::from_raw_parts(buf.as_ptr(), 3);
            assert_eq!(written, ["x", "x", "x"]);
            alloc::destroy_range(buf.as_ptr(), 3);
            alloc::deallocate(buf, 3);
        }
    }

    #[test]
    fn fill_rolls_back_on_panic() {
        let budget = Cell::new(2);
        let marker = Rc::new(());
        let proto = PanicOnClone {
            clones_left: &budget,
            marker: Rc::clone(&marker),
        };

        let buf = alloc::allocate::<PanicOnClone<'_>>(5).unwrap();
        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            fill(buf.as_ptr(), 5, &proto);
        }));
        assert!(result.is_err());

        // Two clones were written then dropped by the guard
        assert_eq!(Rc::strong_count(&marker), 2);
        unsafe { alloc::deallocate(buf, 5) };
    }

    #[test]
    fn clone_from_slice_rolls_back_on_panic() {
        let budget = Cell::new(usize::MAX);
        let marker = Rc::new(());
        let src: Vec<_> = (0..4)
            .map(|_| PanicOnClone {
                clones_left: &budget,
                marker: Rc::clone(&marker),
            })
            .collect();
        assert_eq!(Rc::strong_count(&marker), 5);

        budget.set(3);
        let buf = alloc::allocate::<PanicOnClone<'_>>(4).unwrap();
        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            clone_from_slice(&src, buf.as_ptr());
        }));
        assert!(result.is_err());
        assert_eq!(Rc::strong_count(&marker), 5);
        unsafe { alloc::deallocate(buf, 4) };
    }

    #[test]
    fn fill_with_counts_up() {
        let buf = alloc::allocate::<u32>(4).unwrap();
        let mut next = 0;
        unsafe {
            fill_with(buf.as_ptr(), 4, || {
                next += 1;
                next
            });
            assert_eq!(core::slice::from_raw_parts(buf.as_ptr(), 4), [1, 2, 3, 4]);
            alloc::deallocate(buf, 4);
        }
    }

    #[test]
    fn relocate_overlapping() {
        let buf = alloc::allocate::<u8>(5).unwrap();
        unsafe {
            fill_with(buf.as_ptr(), 4, {
                let mut b = b'a';
                move || {
                    let v = b;
                    b += 1;
                    v
                }
            });
            relocate(buf.as_ptr(), buf.as_ptr().add(1), 4);
            assert_eq!(core::slice::from_raw_parts(buf.as_ptr().add(1), 4), b"abcd");
            alloc::deallocate(buf, 5);
        }
    }
}
