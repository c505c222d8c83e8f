//! Double-ended queue over a map of fixed-size buffers.
//!
//! ```text
//!  map:  [ null | null | buf | buf | buf | null | null | null ]
//!                        ^begin.node     ^end.node
//!  buf:  [ . . . x x x ] [ x x x x x x ] [ x x . . . . ]
//!                ^begin.off                    ^end.off
//! ```
//!
//! Every buffer holds [`Deque::BUFFER_SIZE`] values. A position is a
//! `(node, offset)` pair; the live range is `[begin, end)`. `end` always
//! addresses a slot inside an allocated buffer, so `push_back` into a
//! non-full buffer never allocates. Growing at either end fills the map's
//! spare slots; once they run out the map itself is reallocated with the
//! live buffers re-centered, so neither end is starved.
//!
//! Values never move when buffers are added, so `push_front`/`push_back`
//! are O(1) amortized and random access is two index computations.
//!
//! # Example
//!
//! ```
//! use nexus_containers::Deque;
//!
//! let mut d: Deque<i32> = Deque::new();
//! d.push_back(1);
//! d.push_back(2);
//! d.push_front(0);
//! assert_eq!(d[0], 0);
//! assert_eq!(d.len(), 3);
//!
//! d.insert(1, 10);
//! assert!(d.iter().copied().eq([0, 10, 1, 2]));
//! assert_eq!(d.pop_front(), Some(0));
//! ```

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Index as IndexOp, IndexMut, RangeBounds};
use core::ptr::{self, NonNull};
use core::fmt;

use tracing::debug;

use crate::alloc;
use crate::error::{Error, Result, handle_error};
use crate::vector::{Vector, resolve_range};

/// Smallest map a deque builds.
const MAP_INIT_SIZE: usize = 8;

/// Values per buffer for `T`.
const fn buffer_size<T>() -> usize {
    let size = mem::size_of::<T>();
    if size == 0 {
        4096
    } else if size < 256 {
        4096 / size
    } else {
        16
    }
}

// =============================================================================
// Positions
// =============================================================================

/// A slot address: map node plus offset inside that node's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    node: usize,
    off: usize,
}

impl Pos {
    #[inline]
    const fn new(node: usize, off: usize) -> Self {
        Self { node, off }
    }

    #[inline]
    fn step(self, bs: usize) -> Self {
        if self.off + 1 == bs {
            Self::new(self.node + 1, 0)
        } else {
            Self::new(self.node, self.off + 1)
        }
    }

    #[inline]
    fn step_back(self, bs: usize) -> Self {
        if self.off == 0 {
            Self::new(self.node - 1, bs - 1)
        } else {
            Self::new(self.node, self.off - 1)
        }
    }

    /// Moves by `n` slots; floor division keeps the offset in `[0, bs)`.
    #[inline]
    fn advance(self, n: isize, bs: usize) -> Self {
        let bs = bs as isize;
        let offset = n + self.off as isize;
        if (0..bs).contains(&offset) {
            return Self::new(self.node, offset as usize);
        }
        let node_offset = if offset > 0 {
            offset / bs
        } else {
            -((-offset - 1) / bs) - 1
        };
        Self::new(
            (self.node as isize + node_offset) as usize,
            (offset - node_offset * bs) as usize,
        )
    }

    /// Number of slots from `self` to `later`.
    #[inline]
    fn distance_to(self, later: Self, bs: usize) -> usize {
        (later.node - self.node) * bs + later.off - self.off
    }
}

// =============================================================================
// Deque
// =============================================================================

/// A double-ended queue with O(1) random access.
pub struct Deque<T> {
    /// `map_size` slots, each null or a buffer of `BUFFER_SIZE` values.
    map: NonNull<*mut T>,
    map_size: usize,
    begin: Pos,
    end: Pos,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for Deque<T> {}
unsafe impl<T: Sync> Sync for Deque<T> {}

impl<T> Deque<T> {
    /// Values per buffer.
    pub const BUFFER_SIZE: usize = buffer_size::<T>();

    const MAX_SIZE: usize = isize::MAX as usize
        / if mem::size_of::<T>() == 0 {
            1
        } else {
            mem::size_of::<T>()
        };

    /// Creates an empty deque. Nothing is allocated until the first insert.
    #[inline]
    pub const fn new() -> Self {
        Self {
            map: NonNull::dangling(),
            map_size: 0,
            begin: Pos::new(0, 0),
            end: Pos::new(0, 0),
            _marker: PhantomData,
        }
    }

    /// Returns the number of values.
    #[inline]
    pub fn len(&self) -> usize {
        self.begin.distance_to(self.end, Self::BUFFER_SIZE)
    }

    /// Returns `true` if the deque holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Largest length the deque can ever reach.
    #[inline]
    pub const fn max_size(&self) -> usize {
        Self::MAX_SIZE
    }

    // ========================================================================
    // Raw slot access
    // ========================================================================

    #[inline]
    unsafe fn node(&self, node: usize) -> *mut T {
        unsafe { *self.map.as_ptr().add(node) }
    }

    #[inline]
    unsafe fn slot(&self, pos: Pos) -> *mut T {
        unsafe { self.node(pos.node).add(pos.off) }
    }

    #[inline]
    fn pos_at(&self, index: usize) -> Pos {
        self.begin.advance(index as isize, Self::BUFFER_SIZE)
    }

    /// Bitwise-moves `count` values from `src` to `dst`, first to last.
    /// Correct for overlap when `dst` precedes `src`.
    unsafe fn move_forward(&self, mut src: Pos, mut dst: Pos, count: usize) {
        let bs = Self::BUFFER_SIZE;
        for _ in 0..count {
            unsafe { ptr::copy_nonoverlapping(self.slot(src), self.slot(dst), 1) };
            src = src.step(bs);
            dst = dst.step(bs);
        }
    }

    /// Bitwise-moves the `count` values ending before `src_end` so that they
    /// end before `dst_end`, last to first. Correct for overlap when the
    /// destination follows the source.
    unsafe fn move_backward(&self, mut src_end: Pos, mut dst_end: Pos, count: usize) {
        let bs = Self::BUFFER_SIZE;
        for _ in 0..count {
            src_end = src_end.step_back(bs);
            dst_end = dst_end.step_back(bs);
            unsafe { ptr::copy_nonoverlapping(self.slot(src_end), self.slot(dst_end), 1) };
        }
    }

    // ========================================================================
    // Map and buffer management
    // ========================================================================

    /// Builds the first map sized for `n` values about to be inserted at
    /// the front or back, with the buffers they need centered.
    fn init_map(&mut self, n: usize, front: bool) -> Result<()> {
        let bs = Self::BUFFER_SIZE;
        let nodes = n / bs + 1;
        let map_size = MAP_INIT_SIZE.max(nodes + 2);
        let map = new_map::<T>(map_size)?;

        self.map = map;
        self.map_size = map_size;
        let start = (map_size - nodes) / 2;
        if let Err(e) = self.allocate_nodes(start, start + nodes - 1) {
            // Safety: every slot is null after the rollback
            unsafe { alloc::deallocate(self.map, self.map_size) };
            self.map = NonNull::dangling();
            self.map_size = 0;
            return Err(e);
        }

        let origin = if front {
            Pos::new(start + nodes - 1, n % bs)
        } else {
            Pos::new(start, 0)
        };
        self.begin = origin;
        self.end = origin;
        Ok(())
    }

    /// Allocates buffers for every null slot in `first..=last`. On failure
    /// frees only the buffers this call allocated.
    fn allocate_nodes(&mut self, first: usize, last: usize) -> Result<()> {
        for node in first..=last {
            // Safety: node < map_size
            let slot = unsafe { self.map.as_ptr().add(node) };
            if unsafe { !(*slot).is_null() } {
                continue;
            }
            match alloc::allocate::<T>(Self::BUFFER_SIZE) {
                Ok(buf) => unsafe { *slot = buf.as_ptr() },
                Err(e) => {
                    // Nothing live sits in `first..node`; spare buffers that
                    // predate this call go too.
                    for undo in first..node {
                        if undo < self.begin.node || undo > self.end.node {
                            unsafe { self.free_node(undo) };
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Frees the buffer at `node` if one is allocated.
    ///
    /// # Safety
    ///
    /// The buffer must hold no live values.
    unsafe fn free_node(&mut self, node: usize) {
        unsafe {
            let slot = self.map.as_ptr().add(node);
            if let Some(buf) = NonNull::new(*slot) {
                alloc::deallocate(buf, Self::BUFFER_SIZE);
                *slot = ptr::null_mut();
            }
        }
    }

    /// Replaces the map with one that has `need` free slots at the front
    /// or back. Live buffers are re-centered; spare buffers are freed.
    fn reallocate_map(&mut self, need: usize, front: bool) -> Result<()> {
        let used = self.end.node - self.begin.node + 1;
        let new_size = (self.map_size * 2).max(self.map_size + need + MAP_INIT_SIZE);
        let new = new_map::<T>(new_size)?;

        let new_begin = (new_size - used - need) / 2 + if front { need } else { 0 };
        unsafe {
            ptr::copy_nonoverlapping(
                self.map.as_ptr().add(self.begin.node),
                new.as_ptr().add(new_begin),
                used,
            );
            for node in (0..self.begin.node).chain(self.end.node + 1..self.map_size) {
                self.free_node(node);
            }
            alloc::deallocate(self.map, self.map_size);
        }

        debug!(
            old_map_size = self.map_size,
            new_map_size = new_size,
            len = self.len(),
            "deque map reallocated"
        );

        self.map = new;
        self.map_size = new_size;
        self.end.node = new_begin + (self.end.node - self.begin.node);
        self.begin.node = new_begin;
        Ok(())
    }

    fn check_growth(&self, n: usize) -> Result<()> {
        let len = self.len();
        if n > Self::MAX_SIZE - len {
            return Err(Error::LengthError {
                requested: len.saturating_add(n),
                max: Self::MAX_SIZE,
            });
        }
        Ok(())
    }

    /// Makes room for `n` values before `begin`.
    fn reserve_front(&mut self, n: usize) -> Result<()> {
        self.check_growth(n)?;
        if self.map_size == 0 {
            return self.init_map(n, true);
        }
        if n <= self.begin.off {
            return Ok(());
        }
        let need = (n - self.begin.off - 1) / Self::BUFFER_SIZE + 1;
        if need > self.begin.node {
            self.reallocate_map(need, true)?;
        }
        self.allocate_nodes(self.begin.node - need, self.begin.node - 1)
    }

    /// Makes room for `n` values at and after `end`, keeping the slot after
    /// the last new value inside an allocated buffer.
    fn reserve_back(&mut self, n: usize) -> Result<()> {
        self.check_growth(n)?;
        if self.map_size == 0 {
            return self.init_map(n, false);
        }
        let need = (self.end.off + n) / Self::BUFFER_SIZE;
        if need == 0 {
            return Ok(());
        }
        if self.end.node + need >= self.map_size {
            self.reallocate_map(need, false)?;
        }
        self.allocate_nodes(self.end.node + 1, self.end.node + need)
    }

    /// Moves `begin` forward `n` slots, freeing buffers it leaves behind.
    fn advance_begin(&mut self, n: usize) {
        let new = self.begin.advance(n as isize, Self::BUFFER_SIZE);
        for node in self.begin.node..new.node {
            unsafe { self.free_node(node) };
        }
        self.begin = new;
    }

    /// Moves `end` back `n` slots, freeing buffers it leaves behind.
    fn retreat_end(&mut self, n: usize) {
        let new = self.end.advance(-(n as isize), Self::BUFFER_SIZE);
        for node in new.node + 1..=self.end.node {
            unsafe { self.free_node(node) };
        }
        self.end = new;
    }

    // ========================================================================
    // Push / pop
    // ========================================================================

    /// Appends a value.
    ///
    /// # Panics
    ///
    /// Panics at [`max_size`](Self::max_size); allocation failure goes to
    /// [`std::alloc::handle_alloc_error`].
    #[inline]
    pub fn push_back(&mut self, value: T) {
        self.try_push_back(value).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`push_back`](Self::push_back). The deque is unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// [`Error::LengthError`] or [`Error::AllocError`].
    pub fn try_push_back(&mut self, value: T) -> Result<()> {
        if self.map_size == 0 || self.end.off + 1 == Self::BUFFER_SIZE {
            self.reserve_back(1)?;
        }
        unsafe { alloc::construct(self.slot(self.end), value) };
        self.end = self.end.step(Self::BUFFER_SIZE);
        Ok(())
    }

    /// Prepends a value.
    ///
    /// # Panics
    ///
    /// See [`push_back`](Self::push_back).
    #[inline]
    pub fn push_front(&mut self, value: T) {
        self.try_push_front(value).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`push_front`](Self::push_front). The deque is unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// [`Error::LengthError`] or [`Error::AllocError`].
    pub fn try_push_front(&mut self, value: T) -> Result<()> {
        if self.map_size == 0 || self.begin.off == 0 {
            self.reserve_front(1)?;
        }
        self.begin = self.begin.step_back(Self::BUFFER_SIZE);
        unsafe { alloc::construct(self.slot(self.begin), value) };
        Ok(())
    }

    /// Removes and returns the last value.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let last = self.end.step_back(Self::BUFFER_SIZE);
        let value = unsafe { self.slot(last).read() };
        self.retreat_end(1);
        Some(value)
    }

    /// Removes and returns the first value.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = unsafe { self.slot(self.begin).read() };
        self.advance_begin(1);
        Some(value)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        Some(unsafe { &*self.slot(self.pos_at(index)) })
    }

    /// Returns the value at `index` mutably.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }
        Some(unsafe { &mut *self.slot(self.pos_at(index)) })
    }

    /// Checked access.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index >= len`.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len();
        self.get(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Checked mutable access.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index >= len`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len();
        self.get_mut(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Returns the first value.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns the first value mutably.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.get_mut(0)
    }

    /// Returns the last value.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        Some(unsafe { &*self.slot(self.end.step_back(Self::BUFFER_SIZE)) })
    }

    /// Returns the last value mutably.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            return None;
        }
        Some(unsafe { &mut *self.slot(self.end.step_back(Self::BUFFER_SIZE)) })
    }

    // ========================================================================
    // Interior insert / erase
    // ========================================================================

    /// Opens `n` uninitialized slots before `index`, shifting whichever
    /// side is shorter. Returns the position of the first slot.
    ///
    /// Every fallible step happens before any value moves.
    fn open_gap(&mut self, index: usize, n: usize) -> Result<Pos> {
        let len = self.len();
        if index > len {
            return Err(Error::OutOfRange { index, len });
        }
        let bs = Self::BUFFER_SIZE;

        if index < len / 2 {
            self.reserve_front(n)?;
            let new_begin = self.begin.advance(-(n as isize), bs);
            unsafe { self.move_forward(self.begin, new_begin, index) };
            self.begin = new_begin;
            Ok(new_begin.advance(index as isize, bs))
        } else {
            self.reserve_back(n)?;
            let new_end = self.end.advance(n as isize, bs);
            unsafe { self.move_backward(self.end, new_end, len - index) };
            self.end = new_end;
            Ok(self.pos_at(index))
        }
    }

    /// Moves the values of `staged` into the deque before `index`.
    fn insert_staged(&mut self, index: usize, staged: Vector<T>) -> Result<()> {
        if staged.is_empty() {
            let len = self.len();
            if index > len {
                return Err(Error::OutOfRange { index, len });
            }
            return Ok(());
        }
        let mut pos = self.open_gap(index, staged.len())?;
        for value in staged {
            unsafe { alloc::construct(self.slot(pos), value) };
            pos = pos.step(Self::BUFFER_SIZE);
        }
        Ok(())
    }

    /// Inserts `value` before position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        self.try_insert(index, value).unwrap_or_else(|e| handle_error(e));
    }

    /// Fallible [`insert`](Self::insert). The deque is unchanged on error.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `index > len`, plus the growth errors of
    /// [`try_push_back`](Self::try_push_back).
    pub fn try_insert(&mut self, index: usize, value: T) -> Result<()> {
        let pos = self.open_gap(index, 1)?;
        unsafe { alloc::construct(self.slot(pos), value) };
        Ok(())
    }

    /// Inserts `n` clones of `value` before `index`.
    ///
    /// Clones are made before anything moves, so a panicking `clone`
    /// leaves the deque unchanged.
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
        self.check_growth(n)?;
        let mut staged = Vector::try_with_capacity(n)?;
        staged.try_insert_n(0, n, value)?;
        self.insert_staged(index, staged)
    }

    /// Inserts the items of `iter` before `index`, in order.
    ///
    /// # Panics
    ///
    /// Panics if `index > len` or the new length exceeds `max_size()`.
    pub fn insert_iter<I>(&mut self, index: usize, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        let len = self.len();
        if index > len {
            handle_error(Error::OutOfRange { index, len });
        }
        let staged: Vector<T> = iter.into_iter().collect();
        self.insert_staged(index, staged)
            .unwrap_or_else(|e| handle_error(e));
    }

    /// Removes and returns the value at `index`, shifting the shorter side.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn erase(&mut self, index: usize) -> T {
        let len = self.len();
        if index >= len {
            handle_error(Error::OutOfRange { index, len });
        }
        let bs = Self::BUFFER_SIZE;
        let pos = self.pos_at(index);
        let value = unsafe { self.slot(pos).read() };

        if index < len / 2 {
            unsafe { self.move_backward(pos, pos.step(bs), index) };
            self.advance_begin(1);
        } else {
            unsafe { self.move_forward(pos.step(bs), pos, len - index - 1) };
            self.retreat_end(1);
        }
        value
    }

    /// Drops the values in `range`, closing the gap from the shorter side.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or extends past `len`.
    pub fn erase_range<R>(&mut self, range: R)
    where
        R: RangeBounds<usize>,
    {
        let (first, last) = resolve_range(range, self.len());
        if first == last {
            return;
        }

        /// Closes the gap even if a destructor panics.
        struct CloseGap<'a, T> {
            deque: &'a mut Deque<T>,
            first: usize,
            last: usize,
        }

        impl<T> Drop for CloseGap<'_, T> {
            fn drop(&mut self) {
                self.deque.close_gap(self.first, self.last);
            }
        }

        let guard = CloseGap {
            deque: self,
            first,
            last,
        };
        let mut pos = guard.deque.pos_at(first);
        for _ in first..last {
            let slot = unsafe { guard.deque.slot(pos) };
            pos = pos.step(Self::BUFFER_SIZE);
            unsafe { alloc::destroy(slot) };
        }
        drop(guard);
    }

    /// Shifts values over the dead slots `[first, last)`.
    fn close_gap(&mut self, first: usize, last: usize) {
        let len = self.len();
        let n = last - first;
        if first < len - last {
            let src_end = self.pos_at(first);
            let dst_end = self.pos_at(last);
            unsafe { self.move_backward(src_end, dst_end, first) };
            self.advance_begin(n);
        } else {
            let src = self.pos_at(last);
            let dst = self.pos_at(first);
            unsafe { self.move_forward(src, dst, len - last) };
            self.retreat_end(n);
        }
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Shortens the deque to `len`, dropping values from the back.
    pub fn truncate(&mut self, len: usize) {
        while self.len() > len {
            drop(self.pop_back());
        }
    }

    /// Drops every value. One buffer is kept for the next insert.
    pub fn clear(&mut self) {
        self.truncate(0);
        if self.map_size == 0 {
            return;
        }
        let keep = self.begin.node;
        for node in (0..keep).chain(keep + 1..self.map_size) {
            unsafe { self.free_node(node) };
        }
    }

    /// Resizes to `new_len`, cloning `value` into new slots at the back.
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        let len = self.len();
        if new_len <= len {
            self.truncate(new_len);
        } else {
            self.insert_n(len, new_len - len, value);
        }
    }

    /// Resizes to `new_len`, filling new slots at the back from `f`.
    pub fn resize_with<F>(&mut self, new_len: usize, mut f: F)
    where
        F: FnMut() -> T,
    {
        let len = self.len();
        if new_len <= len {
            self.truncate(new_len);
        } else {
            self.insert_iter(len, (len..new_len).map(|_| f()));
        }
    }

    /// Replaces the contents with `n` clones of `value`.
    pub fn assign(&mut self, n: usize, value: T)
    where
        T: Clone,
    {
        self.clear();
        self.insert_n(0, n, value);
    }

    /// Frees every buffer outside the live range.
    pub fn shrink_to_fit(&mut self) {
        for node in (0..self.begin.node).chain(self.end.node + 1..self.map_size) {
            unsafe { self.free_node(node) };
        }
    }

    /// Exchanges the contents of two deques.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Returns a front-to-back iterator.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            map: self.map.as_ptr(),
            front: self.begin,
            back: self.end,
            len: self.len(),
            _marker: PhantomData,
        }
    }

    /// Returns a front-to-back iterator over mutable references.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            map: self.map.as_ptr(),
            front: self.begin,
            back: self.end,
            len: self.len(),
            _marker: PhantomData,
        }
    }

    /// Returns a cursor at the first value.
    pub fn cursor(&self) -> Cursor<'_, T> {
        Cursor {
            deque: self,
            pos: self.begin,
        }
    }

    /// Returns a cursor at `index` (`index == len` is the end position).
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn cursor_at(&self, index: usize) -> Cursor<'_, T> {
        let len = self.len();
        if index > len {
            handle_error(Error::OutOfRange { index, len });
        }
        Cursor {
            deque: self,
            pos: self.pos_at(index),
        }
    }
}

impl<T: Clone> Deque<T> {
    /// Creates a deque of `n` clones of `value`.
    pub fn from_elem(n: usize, value: T) -> Self {
        let mut d = Self::new();
        d.insert_n(0, n, value);
        d
    }
}

/// Allocates a map of `size` null slots.
fn new_map<T>(size: usize) -> Result<NonNull<*mut T>> {
    let map = alloc::allocate::<*mut T>(size)?;
    for i in 0..size {
        unsafe { map.as_ptr().add(i).write(ptr::null_mut()) };
    }
    Ok(map)
}

impl<T> Drop for Deque<T> {
    fn drop(&mut self) {
        if self.map_size == 0 {
            return;
        }
        let bs = Self::BUFFER_SIZE;
        let mut pos = self.begin;
        while pos != self.end {
            unsafe { alloc::destroy(self.slot(pos)) };
            pos = pos.step(bs);
        }
        for node in 0..self.map_size {
            unsafe { self.free_node(node) };
        }
        unsafe { alloc::deallocate(self.map, self.map_size) };
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IndexOp<usize> for Deque<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        let len = self.len();
        self.get(index)
            .unwrap_or_else(|| handle_error(Error::OutOfRange { index, len }))
    }
}

impl<T> IndexMut<usize> for Deque<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len();
        self.get_mut(index)
            .unwrap_or_else(|| handle_error(Error::OutOfRange { index, len }))
    }
}

impl<T: Clone> Clone for Deque<T> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for Deque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Deque<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for Deque<T> {}

impl<T: PartialOrd> PartialOrd for Deque<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord> Ord for Deque<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash> Hash for Deque<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for value in self {
            value.hash(state);
        }
    }
}

impl<T> Extend<T> for Deque<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T> FromIterator<T> for Deque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut d = Self::new();
        d.extend(iter);
        d
    }
}

impl<'a, T> IntoIterator for &'a Deque<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Deque<T> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}

impl<T> IntoIterator for Deque<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { inner: self }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A read-only position in a [`Deque`] supporting O(1) jumps.
///
/// The cursor ranges over `[0, len]`; position `len` is the end and has no
/// current value.
///
/// # Example
///
/// ```
/// use nexus_containers::Deque;
///
/// let d: Deque<u32> = (0..100).collect();
/// let mut cursor = d.cursor();
/// cursor.seek(40).unwrap();
/// assert_eq!(cursor.current(), Some(&40));
/// cursor.move_prev();
/// assert_eq!(cursor.offset(), 39);
/// assert!(cursor.seek(-50).is_err());
/// ```
pub struct Cursor<'a, T> {
    deque: &'a Deque<T>,
    pos: Pos,
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        Self {
            deque: self.deque,
            pos: self.pos,
        }
    }
}

impl<'a, T> Cursor<'a, T> {
    /// Returns the value under the cursor, or `None` at the end.
    #[inline]
    pub fn current(&self) -> Option<&'a T> {
        if self.pos == self.deque.end {
            return None;
        }
        Some(unsafe { &*self.deque.slot(self.pos) })
    }

    /// Distance from the first value.
    #[inline]
    pub fn offset(&self) -> usize {
        self.deque
            .begin
            .distance_to(self.pos, Deque::<T>::BUFFER_SIZE)
    }

    /// Steps forward. Stays put at the end.
    #[inline]
    pub fn move_next(&mut self) {
        if self.pos != self.deque.end {
            self.pos = self.pos.step(Deque::<T>::BUFFER_SIZE);
        }
    }

    /// Steps back. Stays put at the first value.
    #[inline]
    pub fn move_prev(&mut self) {
        if self.pos != self.deque.begin {
            self.pos = self.pos.step_back(Deque::<T>::BUFFER_SIZE);
        }
    }

    /// Jumps by `n` (negative moves toward the front).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if the target lies outside `[0, len]`; the
    /// cursor does not move.
    pub fn seek(&mut self, n: isize) -> Result<()> {
        let len = self.deque.len();
        let target = self.offset() as isize + n;
        if target < 0 || target as usize > len {
            return Err(Error::OutOfRange {
                index: target.unsigned_abs(),
                len,
            });
        }
        self.pos = self.pos.advance(n, Deque::<T>::BUFFER_SIZE);
        Ok(())
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over references to deque values.
pub struct Iter<'a, T> {
    map: *const *mut T,
    front: Pos,
    back: Pos,
    len: usize,
    _marker: PhantomData<&'a T>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'a, T> Iter<'a, T> {
    #[inline]
    unsafe fn slot(&self, pos: Pos) -> &'a T {
        unsafe { &*(*self.map.add(pos.node)).add(pos.off) }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        let item = unsafe { self.slot(self.front) };
        self.front = self.front.step(Deque::<T>::BUFFER_SIZE);
        self.len -= 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }

    #[inline]
    fn count(self) -> usize {
        self.len
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<&'a T> {
        if n >= self.len {
            self.front = self.back;
            self.len = 0;
            return None;
        }
        self.front = self.front.advance(n as isize, Deque::<T>::BUFFER_SIZE);
        self.len -= n;
        self.next()
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        self.back = self.back.step_back(Deque::<T>::BUFFER_SIZE);
        self.len -= 1;
        Some(unsafe { self.slot(self.back) })
    }

    #[inline]
    fn nth_back(&mut self, n: usize) -> Option<&'a T> {
        if n >= self.len {
            self.back = self.front;
            self.len = 0;
            return None;
        }
        self.back = self.back.advance(-(n as isize), Deque::<T>::BUFFER_SIZE);
        self.len -= n;
        self.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Iterator over mutable references to deque values.
pub struct IterMut<'a, T> {
    map: *const *mut T,
    front: Pos,
    back: Pos,
    len: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> IterMut<'a, T> {
    #[inline]
    unsafe fn slot(&self, pos: Pos) -> &'a mut T {
        // Each position is yielded once, so the references never alias
        unsafe { &mut *(*self.map.add(pos.node)).add(pos.off) }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        if self.len == 0 {
            return None;
        }
        let item = unsafe { self.slot(self.front) };
        self.front = self.front.step(Deque::<T>::BUFFER_SIZE);
        self.len -= 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }

    #[inline]
    fn count(self) -> usize {
        self.len
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<&'a mut T> {
        if n >= self.len {
            self.front = self.back;
            self.len = 0;
            return None;
        }
        self.front = self.front.advance(n as isize, Deque::<T>::BUFFER_SIZE);
        self.len -= n;
        self.next()
    }
}

impl<'a, T> DoubleEndedIterator for IterMut<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a mut T> {
        if self.len == 0 {
            return None;
        }
        self.back = self.back.step_back(Deque::<T>::BUFFER_SIZE);
        self.len -= 1;
        Some(unsafe { self.slot(self.back) })
    }

    #[inline]
    fn nth_back(&mut self, n: usize) -> Option<&'a mut T> {
        if n >= self.len {
            self.back = self.front;
            self.len = 0;
            return None;
        }
        self.back = self.back.advance(-(n as isize), Deque::<T>::BUFFER_SIZE);
        self.len -= n;
        self.next_back()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

/// Owning iterator over a [`Deque`].
pub struct IntoIter<T> {
    inner: Deque<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.inner.len();
        (len, Some(len))
    }

    fn nth(&mut self, n: usize) -> Option<T> {
        let skip = n.min(self.inner.len());
        self.inner.erase_range(..skip);
        self.inner.pop_front()
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.inner.pop_back()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}


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
    fn bench_deque_push_pop() {
        let mut d: Deque<u64> = Deque::new();
        let mut push = Histogram::<u64>::new(3).unwrap();
        let mut pop = Histogram::<u64>::new(3).unwrap();

        for i in 0..ITERATIONS {
            let start = rdtscp();
            d.push_back(i as u64);
            push.record(rdtscp() - start).unwrap();
        }
        for _ in 0..ITERATIONS {
            let start = rdtscp();
            let _ = std::hint::black_box(d.pop_front());
            pop.record(rdtscp() - start).unwrap();
        }

        print_histogram("push_back", &push);
        print_histogram("pop_front", &pop);
    }

    #[test]
    #[ignore]
    fn bench_deque_random_access() {
        let d: Deque<u64> = (0..ITERATIONS as u64).collect();
        let mut hist = Histogram::<u64>::new(3).unwrap();

        for i in 0..ITERATIONS {
            let idx = (i * 7919) % ITERATIONS;
            let start = rdtscp();
            let _ = std::hint::black_box(d[idx]);
            hist.record(rdtscp() - start).unwrap();
        }

        print_histogram("index", &hist);
    }
}
