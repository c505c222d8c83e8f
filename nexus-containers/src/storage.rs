//! Node pools with stable indices.
//!
//! Node-based containers (list, red-black tree, hash table) keep their nodes
//! in a pool and link them by [`Index`] rather than by pointer. A pool hands
//! out an index on insert and that index stays valid until the slot is
//! removed, so relinking never moves a node.
//!
//! ```text
//! Storage<T>              get, get_mut, remove, len, clear
//!     │
//!     ├── BoundedStorage<T>    fixed capacity, try_insert -> Result<Idx, Full<T>>
//!     │
//!     └── UnboundedStorage<T>  growable, insert -> Idx
//! ```
//!
//! | Pool | Capacity | Index |
//! |------|----------|-------|
//! | [`BoxedStorage`] | Fixed (runtime), power of two | `u32` by default |
//! | `slab::Slab` | Growable | `usize` |

use core::mem::MaybeUninit;
use core::ptr::NonNull;
use std::alloc::{Layout, alloc, dealloc};
use std::marker::PhantomData;

use crate::Index;
use crate::error::{Error, Full, Result, handle_error};

/// Slab-like pool with stable indices.
///
/// # Requirements
///
/// Implementations must provide:
/// - **Stable indices**: an index remains valid until explicitly removed
/// - **O(1)** insert, remove, get operations
/// - **Slot reuse**: removed slots can be reused by future inserts
pub trait Storage<T> {
    /// Index type handed out by this pool.
    type Index: Index;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    /// Returns `true` if no slots are occupied.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the value at `index`, if present.
    fn remove(&mut self, index: Self::Index) -> Option<T>;

    /// Returns a reference to the value at `index`, if present.
    fn get(&self, index: Self::Index) -> Option<&T>;

    /// Returns a mutable reference to the value at `index`, if present.
    fn get_mut(&mut self, index: Self::Index) -> Option<&mut T>;

    /// Drops every value and frees every slot.
    fn clear(&mut self);

    /// Returns a reference without checking occupancy.
    ///
    /// # Safety
    ///
    /// `index` must be valid and occupied.
    unsafe fn get_unchecked(&self, index: Self::Index) -> &T;

    /// Returns a mutable reference without checking occupancy.
    ///
    /// # Safety
    ///
    /// `index` must be valid and occupied.
    unsafe fn get_unchecked_mut(&mut self, index: Self::Index) -> &mut T;

    /// Removes a value without checking occupancy.
    ///
    /// # Safety
    ///
    /// `index` must be valid and occupied.
    unsafe fn remove_unchecked(&mut self, index: Self::Index) -> T;
}

/// A pool with a fixed number of slots.
pub trait BoundedStorage<T>: Storage<T> {
    /// Inserts a value, returning its stable index.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if every slot is occupied.
    fn try_insert(&mut self, value: T) -> core::result::Result<Self::Index, Full<T>>;

    /// Total number of slots.
    fn capacity(&self) -> usize;
}

/// A pool that grows on demand.
pub trait UnboundedStorage<T>: Storage<T> {
    /// Inserts a value, returning its stable index.
    fn insert(&mut self, value: T) -> Self::Index;
}

// =============================================================================
// BoxedStorage - runtime capacity, single allocation, bitmap occupancy
// =============================================================================

/// Fixed-capacity pool with runtime-determined size.
///
/// Uses a single heap allocation containing:
/// - Entry array (`MaybeUninit<T>`)
/// - Occupancy bitmap (`u64` words)
/// - Free stack (indices)
///
/// Capacity is rounded up to the next power of 2. Freed slots are reused
/// last-in first-out.
///
/// # Example
///
/// ```
/// use nexus_containers::{BoundedStorage, BoxedStorage, Storage};
///
/// let mut pool: BoxedStorage<u64> = BoxedStorage::with_capacity(1000);
/// assert_eq!(pool.capacity(), 1024);
///
/// let idx = pool.try_insert(42).unwrap();
/// assert_eq!(pool.get(idx), Some(&42));
/// ```
pub struct BoxedStorage<T, Idx: Index = u32> {
    ptr: NonNull<u8>,
    /// Always a power of 2.
    capacity: usize,
    free_len: usize,
    layout: Layout,
    bitmap_offset: usize,
    free_stack_offset: usize,
    _marker: PhantomData<(T, Idx)>,
}

impl<T, Idx: Index> BoxedStorage<T, Idx> {
    /// Creates a pool with at least `min_capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `min_capacity` is 0 or exceeds the index type's maximum.
    /// Aborts through [`std::alloc::handle_alloc_error`] on allocation failure.
    pub fn with_capacity(min_capacity: usize) -> Self {
        assert!(min_capacity > 0, "capacity must be > 0");
        Self::try_with_capacity(min_capacity).unwrap_or_else(|e| handle_error(e))
    }

    /// Creates a pool with at least `min_capacity` slots.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthError`] if the rounded capacity is 0 or does not fit
    ///   the index type (the `NONE` sentinel is never a valid slot).
    /// - [`Error::CapacityOverflow`] / [`Error::AllocError`] if the
    ///   allocation cannot be made.
    pub fn try_with_capacity(min_capacity: usize) -> Result<Self> {
        let max = Idx::NONE.as_usize();
        let capacity = min_capacity
            .checked_next_power_of_two()
            .ok_or(Error::CapacityOverflow)?;
        if min_capacity == 0 || capacity > max {
            return Err(Error::LengthError {
                requested: min_capacity,
                max,
            });
        }

        // Layout: [entries][padding][bitmap][padding][free_stack]
        let entries = Layout::array::<MaybeUninit<T>>(capacity).map_err(|_| Error::CapacityOverflow)?;
        let words = bitmap_words(capacity);
        let bitmap = Layout::array::<u64>(words).map_err(|_| Error::CapacityOverflow)?;
        let free_stack = Layout::array::<Idx>(capacity).map_err(|_| Error::CapacityOverflow)?;

        let (layout, bitmap_offset) = entries
            .extend(bitmap)
            .map_err(|_| Error::CapacityOverflow)?;
        let (layout, free_stack_offset) = layout
            .extend(free_stack)
            .map_err(|_| Error::CapacityOverflow)?;
        let layout = layout.pad_to_align();

        // Safety: the bitmap alone makes the layout non-zero sized
        let raw = unsafe { alloc(layout) };
        let ptr = NonNull::new(raw).ok_or(Error::AllocError { layout })?;

        let storage = Self {
            ptr,
            capacity,
            free_len: capacity,
            layout,
            bitmap_offset,
            free_stack_offset,
            _marker: PhantomData,
        };

        // Safety: offsets come from the layout just allocated
        unsafe {
            core::ptr::write_bytes(storage.bitmap_ptr(), 0, words);
            storage.reset_free_stack();
        }

        Ok(storage)
    }

    /// Returns the number of slots.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub const fn len(&self) -> usize {
        self.capacity - self.free_len
    }

    /// Returns `true` if no slots are occupied.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.free_len == self.capacity
    }

    /// Returns `true` if all slots are occupied.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.free_len == 0
    }

    /// Drops all values and makes every slot available.
    ///
    /// Slots are handed out in ascending order again afterwards.
    pub fn clear(&mut self) {
        for i in 0..self.capacity {
            if self.is_occupied(i) {
                self.set_vacant(i);
                // Safety: slot was occupied
                unsafe { (*self.entries_ptr().add(i)).assume_init_drop() };
            }
        }

        // Safety: free stack region holds `capacity` slots
        unsafe { self.reset_free_stack() };
        self.free_len = self.capacity;
    }

    /// Writes `capacity - 1, ..., 1, 0` so that pops yield ascending slots.
    unsafe fn reset_free_stack(&self) {
        let stack = self.free_stack_ptr();
        for i in 0..self.capacity {
            unsafe { stack.add(i).write(Idx::from_usize(self.capacity - 1 - i)) };
        }
    }

    #[inline]
    fn entries_ptr(&self) -> *mut MaybeUninit<T> {
        self.ptr.as_ptr() as *mut MaybeUninit<T>
    }

    #[inline]
    fn bitmap_ptr(&self) -> *mut u64 {
        unsafe { self.ptr.as_ptr().add(self.bitmap_offset) as *mut u64 }
    }

    #[inline]
    fn free_stack_ptr(&self) -> *mut Idx {
        unsafe { self.ptr.as_ptr().add(self.free_stack_offset) as *mut Idx }
    }

    #[inline]
    fn is_occupied(&self, idx: usize) -> bool {
        let word = idx / 64;
        let bit = idx % 64;
        unsafe { (*self.bitmap_ptr().add(word) & (1 << bit)) != 0 }
    }

    #[inline]
    fn set_occupied(&mut self, idx: usize) {
        let word = idx / 64;
        let bit = idx % 64;
        unsafe { *self.bitmap_ptr().add(word) |= 1 << bit };
    }

    #[inline]
    fn set_vacant(&mut self, idx: usize) {
        let word = idx / 64;
        let bit = idx % 64;
        unsafe { *self.bitmap_ptr().add(word) &= !(1 << bit) };
    }

    #[inline]
    fn in_bounds_occupied(&self, index: Idx) -> bool {
        let i = index.as_usize();
        i < self.capacity && self.is_occupied(i)
    }
}

impl<T, Idx: Index> Storage<T> for BoxedStorage<T, Idx> {
    type Index = Idx;

    #[inline]
    fn len(&self) -> usize {
        BoxedStorage::len(self)
    }

    #[inline]
    fn remove(&mut self, index: Idx) -> Option<T> {
        if !self.in_bounds_occupied(index) {
            return None;
        }
        // Safety: checked above
        Some(unsafe { self.remove_unchecked(index) })
    }

    #[inline]
    fn get(&self, index: Idx) -> Option<&T> {
        if !self.in_bounds_occupied(index) {
            return None;
        }
        Some(unsafe { (*self.entries_ptr().add(index.as_usize())).assume_init_ref() })
    }

    #[inline]
    fn get_mut(&mut self, index: Idx) -> Option<&mut T> {
        if !self.in_bounds_occupied(index) {
            return None;
        }
        Some(unsafe { (*self.entries_ptr().add(index.as_usize())).assume_init_mut() })
    }

    fn clear(&mut self) {
        BoxedStorage::clear(self);
    }

    #[inline]
    unsafe fn get_unchecked(&self, index: Idx) -> &T {
        unsafe { (*self.entries_ptr().add(index.as_usize())).assume_init_ref() }
    }

    #[inline]
    unsafe fn get_unchecked_mut(&mut self, index: Idx) -> &mut T {
        unsafe { (*self.entries_ptr().add(index.as_usize())).assume_init_mut() }
    }

    #[inline]
    unsafe fn remove_unchecked(&mut self, index: Idx) -> T {
        let i = index.as_usize();

        self.set_vacant(i);
        let value = unsafe { self.entries_ptr().add(i).read().assume_init() };

        unsafe { self.free_stack_ptr().add(self.free_len).write(index) };
        self.free_len += 1;

        value
    }
}

impl<T, Idx: Index> BoundedStorage<T> for BoxedStorage<T, Idx> {
    #[inline]
    fn try_insert(&mut self, value: T) -> core::result::Result<Idx, Full<T>> {
        if self.free_len == 0 {
            return Err(Full(value));
        }

        self.free_len -= 1;
        let idx = unsafe { *self.free_stack_ptr().add(self.free_len) };
        let i = idx.as_usize();

        unsafe { self.entries_ptr().add(i).write(MaybeUninit::new(value)) };
        self.set_occupied(i);

        Ok(idx)
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clones every occupied slot into the same index of a new pool.
///
/// The free stack is copied too, so both pools hand out the same indices
/// afterwards.
impl<T: Clone, Idx: Index> Clone for BoxedStorage<T, Idx> {
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity(self.capacity);

        // Safety: both pools share capacity, so the free stacks have equal size
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.free_stack_ptr(),
                out.free_stack_ptr(),
                self.capacity,
            );
        }

        // Bits are set one by one so a panicking clone drops only what exists
        for i in 0..self.capacity {
            if self.is_occupied(i) {
                let value = unsafe { (*self.entries_ptr().add(i)).assume_init_ref() }.clone();
                unsafe { out.entries_ptr().add(i).write(MaybeUninit::new(value)) };
                out.set_occupied(i);
                out.free_len -= 1;
            }
        }
        debug_assert_eq!(out.free_len, self.free_len);

        out
    }
}

impl<T, Idx: Index> Drop for BoxedStorage<T, Idx> {
    fn drop(&mut self) {
        for i in 0..self.capacity {
            if self.is_occupied(i) {
                unsafe { (*self.entries_ptr().add(i)).assume_init_drop() };
            }
        }

        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl<T: core::fmt::Debug, Idx: Index> core::fmt::Debug for BoxedStorage<T, Idx> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoxedStorage")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

// Safety: BoxedStorage owns its data, safe to send if T is Send
unsafe impl<T: Send, Idx: Index + Send> Send for BoxedStorage<T, Idx> {}
// Safety: shared access only hands out &T
unsafe impl<T: Sync, Idx: Index + Sync> Sync for BoxedStorage<T, Idx> {}

// =============================================================================
// slab::Slab implementation
// =============================================================================

impl<T> Storage<T> for slab::Slab<T> {
    type Index = usize;

    #[inline]
    fn len(&self) -> usize {
        slab::Slab::len(self)
    }

    #[inline]
    fn remove(&mut self, index: usize) -> Option<T> {
        self.try_remove(index)
    }

    #[inline]
    fn get(&self, index: usize) -> Option<&T> {
        slab::Slab::get(self, index)
    }

    #[inline]
    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        slab::Slab::get_mut(self, index)
    }

    fn clear(&mut self) {
        slab::Slab::clear(self);
    }

    #[inline]
    unsafe fn get_unchecked(&self, index: usize) -> &T {
        unsafe { slab::Slab::get_unchecked(self, index) }
    }

    #[inline]
    unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        unsafe { slab::Slab::get_unchecked_mut(self, index) }
    }

    #[inline]
    unsafe fn remove_unchecked(&mut self, index: usize) -> T {
        slab::Slab::remove(self, index)
    }
}

impl<T> UnboundedStorage<T> for slab::Slab<T> {
    #[inline]
    fn insert(&mut self, value: T) -> usize {
        slab::Slab::insert(self, value)
    }
}

#[inline]
const fn bitmap_words(capacity: usize) -> usize {
    capacity.div_ceil(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let storage: BoxedStorage<u64> = BoxedStorage::with_capacity(16);
        assert!(storage.is_empty());
        assert!(!storage.is_full());
        assert_eq!(storage.len(), 0);
        assert_eq!(storage.capacity(), 16);
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let storage: BoxedStorage<u64> = BoxedStorage::with_capacity(100);
        assert_eq!(storage.capacity(), 128);

        let storage: BoxedStorage<u64> = BoxedStorage::with_capacity(1000);
        assert_eq!(storage.capacity(), 1024);
    }

    #[test]
    fn capacity_beyond_index_is_rejected() {
        let err = BoxedStorage::<u8, u16>::try_with_capacity(70_000).unwrap_err();
        assert_eq!(
            err,
            Error::LengthError {
                requested: 70_000,
                max: u16::MAX as usize
            }
        );
        assert!(BoxedStorage::<u8, u16>::try_with_capacity(0).is_err());
    }

    #[test]
    fn insert_get_remove() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(16);

        let idx = storage.try_insert(42).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(idx), Some(&42));

        assert_eq!(storage.remove(idx), Some(42));
        assert_eq!(storage.get(idx), None);
        assert_eq!(storage.remove(idx), None);
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn slots_are_handed_out_ascending() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);
        let keys: Vec<u32> = (0..4).map(|i| storage.try_insert(i).unwrap()).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
    }

    #[test]
    fn fill_to_capacity() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);
        for i in 0..4 {
            storage.try_insert(i).unwrap();
        }
        assert!(storage.is_full());

        let err = storage.try_insert(4).unwrap_err();
        assert_eq!(err.into_inner(), 4);
    }

    #[test]
    fn slot_reuse_is_lifo() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);

        let k0 = storage.try_insert(0).unwrap();
        let k1 = storage.try_insert(1).unwrap();
        storage.remove(k0);
        storage.remove(k1);

        assert_eq!(storage.try_insert(2).unwrap(), k1);
        assert_eq!(storage.try_insert(3).unwrap(), k0);
    }

    #[test]
    fn clear_resets_slots() {
        let mut storage: BoxedStorage<String> = BoxedStorage::with_capacity(8);
        for i in 0..5 {
            storage.try_insert(i.to_string()).unwrap();
        }
        storage.clear();
        assert!(storage.is_empty());
        assert_eq!(storage.try_insert("a".into()).unwrap(), 0);
    }

    #[test]
    fn clone_preserves_indices() {
        let mut storage: BoxedStorage<String> = BoxedStorage::with_capacity(8);
        let a = storage.try_insert("a".into()).unwrap();
        let b = storage.try_insert("b".into()).unwrap();
        let c = storage.try_insert("c".into()).unwrap();
        storage.remove(b);

        let mut copy = storage.clone();
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.get(a).map(String::as_str), Some("a"));
        assert_eq!(copy.get(b), None);
        assert_eq!(copy.get(c).map(String::as_str), Some("c"));

        // Both pools reuse the same slot next
        assert_eq!(copy.try_insert("x".into()).unwrap(), b);
        assert_eq!(storage.try_insert("y".into()).unwrap(), b);
    }

    #[test]
    fn drop_cleans_up() {
        use std::rc::Rc;

        let marker = Rc::new(());
        {
            let mut storage: BoxedStorage<Rc<()>> = BoxedStorage::with_capacity(8);
            for _ in 0..3 {
                storage.try_insert(Rc::clone(&marker)).unwrap();
            }
            assert_eq!(Rc::strong_count(&marker), 4);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn u16_index() {
        let mut storage: BoxedStorage<u64, u16> = BoxedStorage::with_capacity(100);
        let idx = storage.try_insert(42).unwrap();
        assert_eq!(storage.get(idx), Some(&42));
    }

    mod slab_tests {
        use super::*;

        #[test]
        fn insert_get_remove() {
            let mut storage = slab::Slab::new();

            let idx = UnboundedStorage::insert(&mut storage, 42);
            assert_eq!(Storage::get(&storage, idx), Some(&42));
            assert_eq!(Storage::remove(&mut storage, idx), Some(42));
            assert_eq!(Storage::get(&storage, idx), None);
            assert_eq!(Storage::remove(&mut storage, idx), None);
        }

        #[test]
        fn slot_reuse() {
            let mut storage = slab::Slab::new();

            let idx1 = UnboundedStorage::insert(&mut storage, 1);
            Storage::remove(&mut storage, idx1);
            let idx2 = UnboundedStorage::insert(&mut storage, 2);
            assert_eq!(idx1, idx2);
        }
    }

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

        #[test]
        #[ignore]
        fn bench_boxed_storage() {
            const CAPACITY: usize = 4096;
            const ITERATIONS: usize = 100_000;

            let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(CAPACITY);
            let mut insert = Histogram::<u64>::new(3).unwrap();
            let mut remove = Histogram::<u64>::new(3).unwrap();

            for i in 0..ITERATIONS {
                let start = rdtscp();
                let idx = storage.try_insert(i as u64).unwrap();
                insert.record(rdtscp() - start).unwrap();

                let start = rdtscp();
                let _ = std::hint::black_box(storage.remove(idx));
                remove.record(rdtscp() - start).unwrap();
            }

            for (name, hist) in [("insert", &insert), ("remove", &remove)] {
                println!(
                    "{:8} p50: {:4} cycles | p99: {:4} cycles | p999: {:5} cycles",
                    name,
                    hist.value_at_quantile(0.50),
                    hist.value_at_quantile(0.99),
                    hist.value_at_quantile(0.999),
                );
            }
        }
    }
}
