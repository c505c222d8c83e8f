//! Contiguous growable array.
//!
//! [`Vector`] owns one allocation `[0, capacity)` of which `[0, len)` holds
//! live values. Running out of room grows the buffer to
//! `max(cap + cap / 2, cap + additional)` slots (at least 16 on the first
//! allocation) and relocates every value bitwise, so all references into the
//! old buffer are invalidated.
//!
//! Bulk insertion gives the strong guarantee: the inserted values are
//! produced first (clones, iterator items) and only then moved into place.
//! If producing them panics or the allocation fails, the vector is unchanged.
//!
//! # Example
//!
//! ```
//! use nexus_containers::Vector;
//!
//! let mut v: Vector<u32> = Vector::new();
//! v.push_back(1);
//! v.push_back(4);
//! v.insert_n(1, 2, 7);
//! assert_eq!(v, [1, 7, 7, 4]);
//!
//! assert_eq!(v.erase(0), 1);
//! v.erase_range(1..3);
//! assert_eq!(v, [7]);
//! ```

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Deref, DerefMut, RangeBounds};
use core::ptr::{self, NonNull};
use core::{fmt, slice};

use tracing::trace;

use crate::alloc;
use crate::error::{Error, Result, handle_error};
use crate::uninit;

/// Capacity of the first allocation of a growing vector.
const MIN_CAPACITY: usize = 16;

/// A contiguous growable array.
pub struct Vector<T> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    _marker: PhantomData<T>,
}

// Safety: Vector owns its values like Vec does
unsafe impl<T: Send> Send for Vector<T> {}
unsafe impl<T: Sync> Sync for Vector<T> {}

/// Frees a fresh buffer unless it is handed over.
struct BufGuard<T> {
    ptr: NonNull<T>,
    cap: usize,
}

impl<T> BufGuard<T> {
    fn allocate(cap: usize) -> Result<Self> {
        Ok(Self {
            ptr: alloc::allocate(cap)?,
            cap,
        })
    }

    fn into_raw(self) -> NonNull<T> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }
}

impl<T> Drop for BufGuard<T> {
    fn drop(&mut self) {
        // Safety: allocated with the same capacity
        unsafe { alloc::deallocate(self.ptr, self.cap) }
    }
}

impl<T> Vector<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Creates an empty vector without allocating.
    #[inline]
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: if Self::IS_ZST { Self::MAX_SIZE } else { 0 },
            len: 0,
            _marker: PhantomData,
        }
    }

    const MAX_SIZE: usize = isize::MAX as usize
        / if mem::size_of::<T>() == 0 {
            1
        } else {
            mem::size_of::<T>()
        };

    /// Creates an empty vector with room for exactly `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`max_size`](Self::max_size).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity(capacity).unwrap_or_else(|e| handle_error(e))
    }

    /// Fallible [`with_capacity`](Self::with_capacity).
    ///
    /// # Errors
    ///
    /// [`Error::LengthError`] above `max_size()`, [`Error::AllocError`] if
    /// the allocator fails.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut v = Self::new();
        v.try_reserve(capacity)?;
        Ok(v)
    }

    /// Returns the number of values.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no values.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of values the buffer can hold without growing.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.cap
    }

    /// Largest length the vector can ever reach.
    #[inline]
    pub const fn max_size(&self) -> usize {
        Self::MAX_SIZE
    }

    /// Returns a raw pointer to the buffer.
    #[inline]
    pub const fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a raw mutable pointer to the buffer.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Views the values as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // Safety: [0, len) is initialized
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Views the values as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // Safety: [0, len) is initialized
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    // ========================================================================
    // Capacity
    // ========================================================================

    /// Grows the buffer so it holds at least `capacity` values. Never
    /// shrinks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`max_size`](Self::max_size).
    pub fn reserve(&mut self, capacity: usize) {
        self.try_reserve(capacity).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`reserve`](Self::reserve).
    ///
    /// # Errors
    ///
    /// [`Error::LengthError`] above `max_size()`, [`Error::AllocError`] if
    /// the allocator fails. The vector is unchanged on error.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity > Self::MAX_SIZE {
            return Err(Error::LengthError {
                requested: capacity,
                max: Self::MAX_SIZE,
            });
        }
        if capacity <= self.cap {
            return Ok(());
        }
        self.reallocate(capacity)
    }

    /// Reallocates to exactly `len` slots, or frees the buffer when empty.
    pub fn shrink_to_fit(&mut self) {
        if Self::IS_ZST || self.cap == self.len {
            return;
        }
        if self.len == 0 {
            // Safety: buffer came from allocate(cap)
            unsafe { alloc::deallocate(self.ptr, self.cap) };
            self.ptr = NonNull::dangling();
            self.cap = 0;
            return;
        }
        self.reallocate(self.len).unwrap_or_else(|e| handle_error(e));
    }

    /// Moves the values into a new buffer of `new_cap` slots.
    fn reallocate(&mut self, new_cap: usize) -> Result<()> {
        debug_assert!(new_cap >= self.len);
        let buf = BufGuard::<T>::allocate(new_cap)?;

        // Safety: new buffer holds new_cap >= len slots and does not overlap
        unsafe { uninit::relocate(self.ptr.as_ptr(), buf.ptr.as_ptr(), self.len) };
        self.replace_buffer(buf.into_raw(), new_cap);
        Ok(())
    }

    /// Frees the current buffer and adopts `ptr`. Values must already live
    /// in the new buffer.
    fn replace_buffer(&mut self, ptr: NonNull<T>, new_cap: usize) {
        trace!(
            old_cap = self.cap,
            new_cap,
            len = self.len,
            "vector reallocated"
        );
        // Safety: old buffer came from allocate(cap)
        unsafe { alloc::deallocate(self.ptr, self.cap) };
        self.ptr = ptr;
        self.cap = new_cap;
    }

    /// Capacity to grow to when `additional` more values do not fit.
    fn grown_capacity(&self, additional: usize) -> Result<usize> {
        let required = self
            .len
            .checked_add(additional)
            .filter(|&r| r <= Self::MAX_SIZE)
            .ok_or(Error::LengthError {
                requested: self.len.saturating_add(additional),
                max: Self::MAX_SIZE,
            })?;

        let mut new_cap = (self.cap + self.cap / 2).max(self.cap.saturating_add(additional));
        if self.cap == 0 {
            new_cap = new_cap.max(MIN_CAPACITY);
        }
        Ok(new_cap.min(Self::MAX_SIZE).max(required))
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Appends a value.
    ///
    /// # Panics
    ///
    /// Panics if the vector is already at [`max_size`](Self::max_size).
    #[inline]
    pub fn push_back(&mut self, value: T) {
        self.try_push_back(value).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`push_back`](Self::push_back).
    ///
    /// # Errors
    ///
    /// [`Error::LengthError`] at `max_size()`, [`Error::AllocError`] if
    /// growing fails.
    #[inline]
    pub fn try_push_back(&mut self, value: T) -> Result<()> {
        if self.len == self.cap {
            let new_cap = self.grown_capacity(1)?;
            self.reallocate(new_cap)?;
        }
        // Safety: len < cap
        unsafe { alloc::construct(self.ptr.as_ptr().add(self.len), value) };
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the last value.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // Safety: slot `len` was initialized and is now outside the live range
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Inserts `value` before position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        self.try_insert(index, value).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index > len`, plus the growth errors of
    /// [`try_push_back`](Self::try_push_back).
    pub fn try_insert(&mut self, index: usize, value: T) -> Result<()> {
        self.insert_with(index, 1, |dst| unsafe { alloc::construct(dst, value) })
    }

    /// Inserts `n` clones of `value` before position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len` or the new length exceeds `max_size()`.
    pub fn insert_n(&mut self, index: usize, n: usize, value: T)
    where
        T: Clone,
    {
        self.try_insert_n(index, n, value)
            .unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`insert_n`](Self::insert_n).
    ///
    /// # Errors
    ///
    /// See [`try_insert`](Self::try_insert).
    pub fn try_insert_n(&mut self, index: usize, n: usize, value: T) -> Result<()>
    where
        T: Clone,
    {
        self.insert_with(index, n, |dst| unsafe { uninit::fill(dst, n, &value) })
    }

    /// Inserts clones of `values` before position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len` or the new length exceeds `max_size()`.
    pub fn insert_slice(&mut self, index: usize, values: &[T])
    where
        T: Clone,
    {
        self.insert_with(index, values.len(), |dst| unsafe {
            uninit::clone_from_slice(values, dst)
        })
        .unwrap_or_else(|e| handle_error(e));
    }

    /// Inserts the items of `iter` before position `index`, in order.
    ///
    /// The items are collected first, so a panicking iterator leaves the
    /// vector unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index > len` or the new length exceeds `max_size()`.
    pub fn insert_iter<I>(&mut self, index: usize, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        if index > self.len {
            handle_error(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        let mut staged: Vector<T> = iter.into_iter().collect();
        let n = staged.len;
        self.insert_with(index, n, |dst| unsafe {
            uninit::relocate(staged.ptr.as_ptr(), dst, n);
            staged.len = 0;
        })
        .unwrap_or_else(|e| handle_error(e));
    }

    /// Opens a gap of `n` slots at `index` and lets `write` fill it.
    ///
    /// `write` receives a pointer to `n` uninitialized slots. It must either
    /// initialize all of them or panic after dropping what it wrote (the
    /// `uninit` writers behave this way). Length and position are checked
    /// before `write` runs, and the gap only opens once `write` returns, so
    /// an error or panic leaves the vector unchanged.
    fn insert_with<F>(&mut self, index: usize, n: usize, write: F) -> Result<()>
    where
        F: FnOnce(*mut T),
    {
        if index > self.len {
            return Err(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        if n == 0 {
            return Ok(());
        }

        if self.cap - self.len >= n {
            // Write into the spare tail, then rotate the new values into place
            let base = self.ptr.as_ptr();
            unsafe {
                write(base.add(self.len));
                slice::from_raw_parts_mut(base.add(index), self.len - index + n).rotate_right(n);
            }
            self.len += n;
            return Ok(());
        }

        let new_cap = self.grown_capacity(n)?;
        let buf = BufGuard::<T>::allocate(new_cap)?;
        let dst = buf.ptr.as_ptr();

        // Inserted values first; the guard frees the buffer if this panics
        write(unsafe { dst.add(index) });

        // Safety: both buffers hold their ranges; prefix and suffix are disjoint
        unsafe {
            let src = self.ptr.as_ptr();
            uninit::relocate(src, dst, index);
            uninit::relocate(src.add(index), dst.add(index + n), self.len - index);
        }
        self.replace_buffer(buf.into_raw(), new_cap);
        self.len += n;
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Removes and returns the value at `index`, shifting the tail left.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn erase(&mut self, index: usize) -> T {
        if index >= self.len {
            handle_error(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        unsafe {
            let hole = self.ptr.as_ptr().add(index);
            let value = hole.read();
            ptr::copy(hole.add(1), hole, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Drops the values in `range` and shifts the tail left.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or extends past `len`.
    pub fn erase_range<R>(&mut self, range: R)
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = resolve_range(range, self.len);
        if start == end {
            return;
        }

        /// Closes the gap even if a destructor panics.
        struct CloseGap<'a, T> {
            vec: &'a mut Vector<T>,
            start: usize,
            end: usize,
            tail: usize,
        }

        impl<T> Drop for CloseGap<'_, T> {
            fn drop(&mut self) {
                unsafe {
                    let base = self.vec.ptr.as_ptr();
                    ptr::copy(base.add(self.end), base.add(self.start), self.tail);
                }
                self.vec.len = self.start + self.tail;
            }
        }

        let tail = self.len - end;
        self.len = start;
        let guard = CloseGap {
            vec: self,
            start,
            end,
            tail,
        };
        unsafe { alloc::destroy_range(guard.vec.ptr.as_ptr().add(start), end - start) };
        drop(guard);
    }

    /// Keeps only the values for which `f` returns `true`, in order.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        /// Shifts unprocessed values over the deleted ones on exit.
        struct Backshift<'a, T> {
            vec: &'a mut Vector<T>,
            processed: usize,
            deleted: usize,
            original_len: usize,
        }

        impl<T> Drop for Backshift<'_, T> {
            fn drop(&mut self) {
                if self.deleted > 0 {
                    unsafe {
                        let base = self.vec.ptr.as_ptr();
                        ptr::copy(
                            base.add(self.processed),
                            base.add(self.processed - self.deleted),
                            self.original_len - self.processed,
                        );
                    }
                }
                self.vec.len = self.original_len - self.deleted;
            }
        }

        let original_len = self.len;
        self.len = 0;
        let mut g = Backshift {
            vec: self,
            processed: 0,
            deleted: 0,
            original_len,
        };

        while g.processed < original_len {
            let cur = unsafe { g.vec.ptr.as_ptr().add(g.processed) };
            if !f(unsafe { &*cur }) {
                g.processed += 1;
                g.deleted += 1;
                unsafe { alloc::destroy(cur) };
                continue;
            }
            if g.deleted > 0 {
                unsafe { ptr::copy_nonoverlapping(cur, cur.sub(g.deleted), 1) };
            }
            g.processed += 1;
        }
    }

    /// Shortens the vector to `len`, dropping the rest.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let tail = self.len - len;
        self.len = len;
        // Safety: [len, len + tail) was initialized and is now outside the live range
        unsafe { alloc::destroy_range(self.ptr.as_ptr().add(len), tail) };
    }

    /// Drops every value. Capacity is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resizes to `new_len`, cloning `value` into new slots.
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        if new_len <= self.len {
            self.truncate(new_len);
        } else {
            self.insert_n(self.len, new_len - self.len, value);
        }
    }

    /// Resizes to `new_len`, filling new slots with values from `f`.
    pub fn resize_with<F>(&mut self, new_len: usize, f: F)
    where
        F: FnMut() -> T,
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        let n = new_len - self.len;
        self.insert_with(self.len, n, |dst| unsafe { uninit::fill_with(dst, n, f) })
            .unwrap_or_else(|e| handle_error(e));
    }

    /// Replaces the contents with `n` clones of `value`.
    pub fn assign(&mut self, n: usize, value: T)
    where
        T: Clone,
    {
        self.clear();
        self.insert_n(0, n, value);
    }

    /// Exchanges the contents of two vectors.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Checked access.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index >= len`.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or(Error::OutOfRange { index, len })
    }

    /// Checked mutable access.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index >= len`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(Error::OutOfRange { index, len })
    }

    /// Returns the first value.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Returns the first value mutably.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    /// Returns the last value.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Returns the last value mutably.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }
}

impl<T: Clone> Vector<T> {
    /// Creates a vector of `n` clones of `value`.
    pub fn from_elem(n: usize, value: T) -> Self {
        let mut v = Self::with_capacity(n);
        v.insert_n(0, n, value);
        v
    }
}

/// Resolves a range against `len`, panicking the way slice indexing does.
pub(crate) fn resolve_range<R: RangeBounds<usize>>(range: R, len: usize) -> (usize, usize) {
    use core::ops::Bound;

    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.checked_add(1).unwrap_or_else(|| {
            handle_error(Error::OutOfRange { index: s, len })
        }),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.checked_add(1).unwrap_or_else(|| {
            handle_error(Error::OutOfRange { index: e, len })
        }),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    if end > len {
        handle_error(Error::OutOfRange { index: end, len });
    }
    if start > end {
        handle_error(Error::OutOfRange { index: start, len: end });
    }
    (start, end)
}

impl<T> Drop for Vector<T> {
    fn drop(&mut self) {
        unsafe {
            alloc::destroy_range(self.ptr.as_ptr(), self.len);
            alloc::deallocate(self.ptr, self.cap);
        }
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Vector<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Vector<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Clone> Clone for Vector<T> {
    fn clone(&self) -> Self {
        let mut v = Self::with_capacity(self.len);
        // Safety: v has room for len values; len is set only after all clones succeed
        unsafe { uninit::clone_from_slice(self.as_slice(), v.ptr.as_ptr()) };
        v.len = self.len;
        v
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.insert_slice(0, source.as_slice());
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialEq> PartialEq<[T]> for Vector<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T; N]> for Vector<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for Vector<T> {}

impl<T: PartialOrd> PartialOrd for Vector<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord> Ord for Vector<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Hash> Hash for Vector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T> Extend<T> for Vector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        if lower > self.cap - self.len {
            let want = self.len.saturating_add(lower);
            self.reserve(want.min(Self::MAX_SIZE));
        }
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<'a, T: Copy + 'a> Extend<&'a T> for Vector<T> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<T> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Self::new();
        v.extend(iter);
        v
    }
}

impl<T: Clone> From<&[T]> for Vector<T> {
    fn from(values: &[T]) -> Self {
        let mut v = Self::with_capacity(values.len());
        v.insert_slice(0, values);
        v
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Vector<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> IntoIterator for Vector<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        let this = mem::ManuallyDrop::new(self);
        IntoIter {
            buf: this.ptr,
            cap: this.cap,
            front: 0,
            back: this.len,
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// Owning iterator
// =============================================================================

/// Owning iterator over a [`Vector`].
pub struct IntoIter<T> {
    buf: NonNull<T>,
    cap: usize,
    front: usize,
    back: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for IntoIter<T> {}
unsafe impl<T: Sync> Sync for IntoIter<T> {}

impl<T> IntoIter<T> {
    /// Remaining values as a slice.
    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.buf.as_ptr().add(self.front), self.back - self.front) }
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        let value = unsafe { self.buf.as_ptr().add(self.front).read() };
        self.front += 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    #[inline]
    fn count(self) -> usize {
        self.back - self.front
    }

    fn nth(&mut self, n: usize) -> Option<T> {
        let skip = n.min(self.back - self.front);
        let start = self.front;
        self.front += skip;
        // Safety: skipped values are outside [front, back) now
        unsafe { alloc::destroy_range(self.buf.as_ptr().add(start), skip) };
        self.next()
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { self.buf.as_ptr().add(self.back).read() })
    }

    fn nth_back(&mut self, n: usize) -> Option<T> {
        let skip = n.min(self.back - self.front);
        self.back -= skip;
        unsafe { alloc::destroy_range(self.buf.as_ptr().add(self.back), skip) };
        self.next_back()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        unsafe {
            alloc::destroy_range(self.buf.as_ptr().add(self.front), self.back - self.front);
            alloc::deallocate(self.buf, self.cap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    #[test]
    fn new_is_empty() {
        let v: Vector<u64> = Vector::new();
        assert!(v.is_empty());
        assert_eq!(v.len(), 0);
        assert_eq!(v.capacity(), 0);
        assert_eq!(v.front(), None);
    }

    #[test]
    fn first_growth_is_sixteen() {
        let mut v = Vector::new();
        v.push_back(1u8);
        assert_eq!(v.capacity(), 16);
    }

    #[test]
    fn growth_is_one_and_a_half() {
        let mut v: Vector<u32> = Vector::with_capacity(16);
        for i in 0..17 {
            v.push_back(i);
        }
        assert_eq!(v.capacity(), 24);
        for i in 17..25 {
            v.push_back(i);
        }
        assert_eq!(v.capacity(), 36);
        assert!(v.iter().copied().eq(0..25));
    }

    #[test]
    fn growth_covers_large_insert() {
        let mut v: Vector<u32> = Vector::with_capacity(16);
        v.insert_n(0, 100, 3);
        assert_eq!(v.capacity(), 116);
        assert_eq!(v.len(), 100);
    }

    #[test]
    fn max_size_is_checked_before_mutation() {
        let mut v: Vector<u64> = Vector::from_elem(3, 1);
        let max = v.max_size();
        assert_eq!(max, isize::MAX as usize / 8);

        let err = v.try_reserve(max + 1).unwrap_err();
        assert_eq!(err, Error::LengthError { requested: max + 1, max });

        let err = v.try_insert_n(1, max, 0).unwrap_err();
        assert!(matches!(err, Error::LengthError { .. }));
        assert_eq!(v, [1, 1, 1]);
    }

    #[test]
    fn reserve_never_shrinks() {
        let mut v: Vector<u8> = Vector::with_capacity(64);
        v.reserve(8);
        assert_eq!(v.capacity(), 64);
        v.reserve(100);
        assert_eq!(v.capacity(), 100);
    }

    #[test]
    fn shrink_to_fit() {
        let mut v: Vector<u32> = Vector::new();
        for i in 0..10 {
            v.push_back(i);
        }
        assert_eq!(v.capacity(), 16);
        v.shrink_to_fit();
        assert_eq!(v.capacity(), 10);
        assert!(v.iter().copied().eq(0..10));

        v.clear();
        v.shrink_to_fit();
        assert_eq!(v.capacity(), 0);
    }

    #[test]
    fn insert_front_middle_back() {
        let mut v: Vector<i32> = Vector::new();
        v.insert(0, 2);
        v.insert(0, 0);
        v.insert(1, 1);
        v.insert(3, 3);
        assert_eq!(v, [0, 1, 2, 3]);
    }

    #[test]
    fn insert_out_of_range() {
        let mut v: Vector<i32> = Vector::from_elem(2, 0);
        assert_eq!(
            v.try_insert(3, 1),
            Err(Error::OutOfRange { index: 3, len: 2 })
        );
    }

    #[test]
    #[should_panic(expected = "index 5 out of range for length 2")]
    fn erase_out_of_range_panics() {
        let mut v: Vector<i32> = Vector::from_elem(2, 0);
        v.erase(5);
    }

    #[test]
    fn insert_slice_and_iter() {
        let mut v: Vector<String> = Vector::new();
        v.push_back("a".into());
        v.push_back("e".into());
        v.insert_slice(1, &["b".to_string(), "c".to_string()]);
        v.insert_iter(3, ["d".to_string()]);
        let joined: String = v.iter().map(String::as_str).collect();
        assert_eq!(joined, "abcde");
    }

    #[test]
    fn erase_and_erase_range() {
        let mut v: Vector<u32> = (0..10).collect();
        assert_eq!(v.erase(0), 0);
        v.erase_range(2..5);
        assert_eq!(v, [1, 2, 6, 7, 8, 9]);
        v.erase_range(4..);
        assert_eq!(v, [1, 2, 6, 7]);
        v.erase_range(..);
        assert!(v.is_empty());
    }

    #[test]
    fn erase_range_drops_exactly_once() {
        let marker = Rc::new(());
        let mut v: Vector<Rc<()>> = Vector::from_elem(6, Rc::clone(&marker));
        assert_eq!(Rc::strong_count(&marker), 7);
        v.erase_range(1..4);
        assert_eq!(v.len(), 3);
        assert_eq!(Rc::strong_count(&marker), 4);
        drop(v);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn retain_keeps_order() {
        let mut v: Vector<u32> = (0..20).collect();
        v.retain(|x| x % 3 == 0);
        assert_eq!(v, [0, 3, 6, 9, 12, 15, 18]);
    }

    #[test]
    fn resize_and_assign() {
        let mut v: Vector<u8> = Vector::new();
        v.resize(3, 9);
        assert_eq!(v, [9, 9, 9]);
        v.resize(1, 0);
        assert_eq!(v, [9]);

        let mut n = 0;
        v.resize_with(4, || {
            n += 1;
            n
        });
        assert_eq!(v, [9, 1, 2, 3]);

        v.assign(2, 5);
        assert_eq!(v, [5, 5]);
    }

    #[test]
    fn checked_access() {
        let mut v: Vector<u32> = (0..3).collect();
        assert_eq!(v.at(2), Ok(&2));
        assert_eq!(v.at(3), Err(Error::OutOfRange { index: 3, len: 3 }));
        *v.at_mut(0).unwrap() = 10;
        *v.back_mut().unwrap() += 1;
        assert_eq!(v, [10, 1, 3]);
        assert_eq!(v.front(), Some(&10));
        assert_eq!(v.back(), Some(&3));
    }

    #[test]
    fn comparisons_are_lexicographic() {
        let a: Vector<u32> = [1, 2, 3].into_iter().collect();
        let b: Vector<u32> = [1, 2, 4].into_iter().collect();
        let c: Vector<u32> = [1, 2].into_iter().collect();
        assert!(a < b);
        assert!(c < a);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn clone_is_independent() {
        let original: Vector<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let mut copy = original.clone();
        copy.push_back("z".into());
        copy[0].push('!');
        assert_eq!(original.len(), 2);
        assert_eq!(original[0], "x");
        assert_eq!(copy[0], "x!");
    }

    #[test]
    fn into_iter_both_ends_and_nth() {
        let v: Vector<String> = (0..6).map(|i| i.to_string()).collect();
        let mut it = v.into_iter();
        assert_eq!(it.len(), 6);
        assert_eq!(it.next().as_deref(), Some("0"));
        assert_eq!(it.next_back().as_deref(), Some("5"));
        assert_eq!(it.nth(1).as_deref(), Some("2"));
        assert_eq!(it.as_slice(), ["3", "4"]);
        // Remaining values are dropped with the iterator
    }

    #[test]
    fn swap_contents() {
        let mut a: Vector<u8> = Vector::from_elem(1, 1);
        let mut b: Vector<u8> = Vector::from_elem(2, 2);
        a.swap(&mut b);
        assert_eq!(a, [2, 2]);
        assert_eq!(b, [1]);
        let taken = mem::take(&mut a);
        assert!(a.is_empty());
        assert_eq!(taken.len(), 2);
    }

    #[test]
    fn zero_sized_values() {
        let mut v: Vector<()> = Vector::new();
        for _ in 0..1000 {
            v.push_back(());
        }
        v.insert_n(10, 5, ());
        assert_eq!(v.len(), 1005);
        assert_eq!(v.erase(0), ());
        assert_eq!(v.into_iter().count(), 1004);
    }

    // ========================================================================
    // Panic safety
    // ========================================================================

    #[derive(Debug)]
    struct Bomb<'a> {
        value: u32,
        clones_left: &'a Cell<usize>,
    }

    impl Clone for Bomb<'_> {
        fn clone(&self) -> Self {
            let left = self.clones_left.get();
            if left == 0 {
                panic!("bomb");
            }
            self.clones_left.set(left - 1);
            Self {
                value: self.value,
                clones_left: self.clones_left,
            }
        }
    }

    fn values(v: &Vector<Bomb<'_>>) -> Vec<u32> {
        v.iter().map(|b| b.value).collect()
    }

    #[test]
    fn insert_n_with_spare_capacity_is_all_or_nothing() {
        let budget = Cell::new(usize::MAX);
        let mut v: Vector<Bomb<'_>> = Vector::with_capacity(32);
        for value in 0..4 {
            v.push_back(Bomb {
                value,
                clones_left: &budget,
            });
        }

        budget.set(2);
        let proto = Bomb {
            value: 99,
            clones_left: &budget,
        };
        let result = catch_unwind(AssertUnwindSafe(|| v.insert_n(1, 5, proto)));
        assert!(result.is_err());
        assert_eq!(values(&v), [0, 1, 2, 3]);
        assert_eq!(v.capacity(), 32);
    }

    #[test]
    fn insert_n_with_reallocation_is_all_or_nothing() {
        let budget = Cell::new(usize::MAX);
        let mut v: Vector<Bomb<'_>> = Vector::with_capacity(4);
        for value in 0..4 {
            v.push_back(Bomb {
                value,
                clones_left: &budget,
            });
        }
        let ptr = v.as_ptr();

        budget.set(3);
        let proto = Bomb {
            value: 99,
            clones_left: &budget,
        };
        let result = catch_unwind(AssertUnwindSafe(|| v.insert_n(2, 10, proto)));
        assert!(result.is_err());
        assert_eq!(values(&v), [0, 1, 2, 3]);
        assert_eq!(v.as_ptr(), ptr);
        assert_eq!(v.capacity(), 4);
    }

    #[test]
    fn insert_iter_panicking_iterator_leaves_vector_unchanged() {
        let mut v: Vector<u32> = (0..3).collect();
        let result = catch_unwind(AssertUnwindSafe(|| {
            v.insert_iter(
                1,
                (0..10).map(|i| if i == 5 { panic!("iterator") } else { i }),
            )
        }));
        assert!(result.is_err());
        assert_eq!(v, [0, 1, 2]);
    }

    // ========================================================================
    // Stress test
    // ========================================================================

    #[test]
    fn stress_random_operations() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut v: Vector<u64> = Vector::new();
        let mut reference: Vec<u64> = Vec::new();

        for step in 0..5_000u64 {
            let op = rng.random_range(0..100);
            if op < 35 {
                v.push_back(step);
                reference.push(step);
            } else if op < 50 {
                assert_eq!(v.pop_back(), reference.pop());
            } else if op < 65 {
                let i = rng.random_range(0..=reference.len());
                v.insert(i, step);
                reference.insert(i, step);
            } else if op < 75 && !reference.is_empty() {
                let i = rng.random_range(0..reference.len());
                assert_eq!(v.erase(i), reference.remove(i));
            } else if op < 82 {
                let i = rng.random_range(0..=reference.len());
                let n = rng.random_range(0..8);
                v.insert_n(i, n, step);
                reference.splice(i..i, core::iter::repeat_n(step, n));
            } else if op < 90 {
                let a = rng.random_range(0..=reference.len());
                let b = rng.random_range(a..=reference.len());
                v.erase_range(a..b);
                reference.drain(a..b);
            } else if op < 95 {
                let modulus = rng.random_range(2..5);
                v.retain(|x| x % modulus != 0);
                reference.retain(|x| x % modulus != 0);
            } else {
                v.shrink_to_fit();
            }

            assert_eq!(v.len(), reference.len());
            assert!(v.capacity() >= v.len());
        }
        assert_eq!(v.as_slice(), reference.as_slice());
    }

    #[test]
    fn amortized_growth_is_linear() {
        // Total relocated values across n pushes stays below 3n
        let mut v: Vector<u32> = Vector::new();
        let mut moved = 0usize;
        for i in 0..100_000 {
            if v.len() == v.capacity() {
                moved += v.len();
            }
            v.push_back(i);
        }
        assert!(moved < 3 * 100_000);
    }
}

#[cfg(test)]
mod bench {
    use super::*;
    use hdrhistogram::Histogram;

    #[inline]
    fn rdtscp() -> u64 {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::x86_64::__rdtscp(&mut 0)
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            std::time::Instant::now().elapsed().as_nanos() as u64
        }
    }

    fn print_histogram(name: &str, hist: &Histogram<u64>) {
        println!(
            "{:24} p50: {:4} cycles | p99: {:4} cycles | p999: {:5} cycles | min: {:4} | max: {:5}",
            name,
            hist.value_at_quantile(0.50),
            hist.value_at_quantile(0.99),
            hist.value_at_quantile(0.999),
            hist.min(),
            hist.max(),
        );
    }

    const ITERATIONS: usize = 100_000;

    #[test]
    #[ignore]
    fn bench_vector_push_back() {
        let mut v: Vector<u64> = Vector::with_capacity(ITERATIONS);
        let mut hist = Histogram::<u64>::new(3).unwrap();

        for i in 0..ITERATIONS {
            let start = rdtscp();
            v.push_back(i as u64);
            let elapsed = rdtscp() - start;
            hist.record(elapsed).unwrap();
        }

        print_histogram("push_back (reserved)", &hist);
    }

    #[test]
    #[ignore]
    fn bench_vector_insert_middle() {
        let mut v: Vector<u64> = (0..1024).collect();
        let mut hist = Histogram::<u64>::new(3).unwrap();

        for i in 0..ITERATIONS {
            let start = rdtscp();
            v.insert(512, i as u64);
            let elapsed = rdtscp() - start;
            hist.record(elapsed).unwrap();
            v.erase(512);
        }

        print_histogram("insert (middle of 1024)", &hist);
    }
}
