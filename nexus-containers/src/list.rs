//! Doubly-linked list over an owned node pool.
//!
//! Nodes live in a [`Storage`] pool owned by the list and are linked by
//! index. An index handed out by an insert stays valid until that node is
//! removed, so callers can hold on to it for O(1) access, removal and
//! repositioning later.
//!
//! There is no sentinel node: `Idx::NONE` is both the predecessor of the
//! head and the successor of the tail.
//!
//! # Bounded vs Unbounded Storage
//!
//! Insert operations have different APIs depending on the pool:
//!
//! ```
//! use nexus_containers::{BoxedListStorage, List};
//!
//! // Bounded storage - fallible insertion
//! let mut list: List<u64, BoxedListStorage<u64>, u32> =
//!     List::with_storage(BoxedListStorage::with_capacity(16));
//! let idx = list.try_push_back(42).unwrap();
//!
//! // Unbounded storage (slab::Slab, the default) - infallible insertion
//! let mut list: List<u64> = List::new();
//! let idx = list.push_back(42); // No Result!
//! ```
//!
//! # Example
//!
//! ```
//! use nexus_containers::List;
//!
//! let mut list: List<u64> = List::new();
//!
//! // Insert values - returns the index for O(1) access/removal later
//! let a = list.push_back(1);
//! let b = list.push_back(2);
//! let c = list.push_back(3);
//!
//! assert_eq!(list.len(), 3);
//! assert_eq!(list.get(b), Some(&2));
//!
//! // Remove from middle - O(1)
//! assert_eq!(list.remove(b), Some(2));
//!
//! // Reposition - O(1), indices stay valid
//! list.move_to_front(c);
//! assert!(list.iter().copied().eq([3, 1]));
//! assert_eq!(list.get(a), Some(&1));
//! ```

use core::cmp::Ordering;
use core::fmt;
use core::iter::FusedIterator;
use std::marker::PhantomData;

use crate::error::Full;
use crate::{BoundedStorage, BoxedStorage, Index, Storage, UnboundedStorage};

/// Bounded list storage backed by a boxed allocation.
pub type BoxedListStorage<T, Idx = u32> = BoxedStorage<ListNode<T, Idx>, Idx>;

/// Unbounded list storage backed by `slab::Slab`.
pub type SlabListStorage<T> = slab::Slab<ListNode<T, usize>>;

/// A node in the linked list.
///
/// Wraps the value with prev/next links. The node structure is an
/// implementation detail; values are reached through the list.
#[derive(Debug, Clone)]
pub struct ListNode<T, Idx: Index = usize> {
    pub(crate) data: T,
    pub(crate) prev: Idx,
    pub(crate) next: Idx,
}

impl<T, Idx: Index> ListNode<T, Idx> {
    #[inline]
    fn new(data: T) -> Self {
        Self {
            data,
            prev: Idx::NONE,
            next: Idx::NONE,
        }
    }
}

/// A doubly-linked list owning its node pool.
///
/// # Type Parameters
///
/// - `T`: Element type
/// - `S`: Node pool (default [`SlabListStorage<T>`])
/// - `Idx`: Index type (default `usize`, matching `slab`)
///
/// # Example
///
/// ```
/// use nexus_containers::List;
///
/// let mut list: List<String> = List::new();
/// let idx = list.push_back("hello".into());
/// assert_eq!(list.get(idx).map(String::as_str), Some("hello"));
/// ```
pub struct List<T, S = SlabListStorage<T>, Idx: Index = usize>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    storage: S,
    head: Idx,
    tail: Idx,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T, S, Idx: Index> Default for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, Idx: Index> List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx> + Default,
{
    /// Creates an empty list with a default pool.
    #[inline]
    pub fn new() -> Self {
        Self::with_storage(S::default())
    }
}

impl<T> List<T> {
    /// Creates an empty slab-backed list with room for `capacity` nodes.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_storage(slab::Slab::with_capacity(capacity))
    }
}

// =============================================================================
// Base impl - works with any Storage (read/link/remove operations)
// =============================================================================

impl<T, S, Idx: Index> List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    /// Creates an empty list over `storage`. Anything already in the pool
    /// is dropped.
    #[inline]
    pub fn with_storage(mut storage: S) -> Self {
        storage.clear();
        Self {
            storage,
            head: Idx::NONE,
            tail: Idx::NONE,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements in the list.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the node pool.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the head node's index, or `None` if empty.
    #[inline]
    pub fn front_index(&self) -> Option<Idx> {
        self.head.into_option()
    }

    /// Returns the tail node's index, or `None` if empty.
    #[inline]
    pub fn back_index(&self) -> Option<Idx> {
        self.tail.into_option()
    }

    #[inline]
    fn node(&self, idx: Idx) -> &ListNode<T, Idx> {
        // Safety: only called with indices reached through the links
        unsafe { self.storage.get_unchecked(idx) }
    }

    #[inline]
    fn node_mut(&mut self, idx: Idx) -> &mut ListNode<T, Idx> {
        // Safety: only called with indices reached through the links
        unsafe { self.storage.get_unchecked_mut(idx) }
    }

    #[track_caller]
    fn checked(&self, idx: Idx) -> &ListNode<T, Idx> {
        self.storage
            .get(idx)
            .unwrap_or_else(|| panic!("invalid list index {idx:?}"))
    }

    // ========================================================================
    // Remove operations (unlink + deallocate)
    // ========================================================================

    /// Removes and returns the front element.
    ///
    /// Returns `None` if the list is empty.
    #[inline]
    pub fn pop_front(&mut self) -> Option<T> {
        if self.head.is_none() {
            return None;
        }

        let idx = self.head;
        self.unlink(idx);
        // Safety: head was occupied
        Some(unsafe { self.storage.remove_unchecked(idx) }.data)
    }

    /// Removes and returns the back element.
    ///
    /// Returns `None` if the list is empty.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        if self.tail.is_none() {
            return None;
        }

        let idx = self.tail;
        self.unlink(idx);
        // Safety: tail was occupied
        Some(unsafe { self.storage.remove_unchecked(idx) }.data)
    }

    /// Removes an element by index.
    ///
    /// Returns `None` if the index is not occupied.
    #[inline]
    pub fn remove(&mut self, idx: Idx) -> Option<T> {
        self.storage.get(idx)?;
        self.unlink(idx);
        // Safety: checked above
        Some(unsafe { self.storage.remove_unchecked(idx) }.data)
    }

    // ========================================================================
    // Link operations (just relink, no alloc/dealloc)
    // ========================================================================

    fn link_back(&mut self, idx: Idx) {
        let tail = self.tail;
        let node = self.node_mut(idx);
        node.prev = tail;
        node.next = Idx::NONE;

        if tail.is_some() {
            self.node_mut(tail).next = idx;
        } else {
            self.head = idx;
        }

        self.tail = idx;
        self.len += 1;
    }

    fn link_front(&mut self, idx: Idx) {
        let head = self.head;
        let node = self.node_mut(idx);
        node.next = head;
        node.prev = Idx::NONE;

        if head.is_some() {
            self.node_mut(head).prev = idx;
        } else {
            self.tail = idx;
        }

        self.head = idx;
        self.len += 1;
    }

    fn link_after(&mut self, after: Idx, idx: Idx) {
        let next = self.node(after).next;
        let node = self.node_mut(idx);
        node.prev = after;
        node.next = next;

        self.node_mut(after).next = idx;

        if next.is_some() {
            self.node_mut(next).prev = idx;
        } else {
            self.tail = idx;
        }

        self.len += 1;
    }

    fn link_before(&mut self, before: Idx, idx: Idx) {
        let prev = self.node(before).prev;
        let node = self.node_mut(idx);
        node.next = before;
        node.prev = prev;

        self.node_mut(before).prev = idx;

        if prev.is_some() {
            self.node_mut(prev).next = idx;
        } else {
            self.head = idx;
        }

        self.len += 1;
    }

    /// Detaches a linked node, leaving it in the pool.
    fn unlink(&mut self, idx: Idx) {
        let node = self.node(idx);
        let prev = node.prev;
        let next = node.next;

        if prev.is_some() {
            self.node_mut(prev).next = next;
        } else {
            self.head = next;
        }

        if next.is_some() {
            self.node_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }

        let node = self.node_mut(idx);
        node.prev = Idx::NONE;
        node.next = Idx::NONE;

        self.len -= 1;
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns a reference to the element at the given index.
    #[inline]
    pub fn get(&self, idx: Idx) -> Option<&T> {
        self.storage.get(idx).map(|node| &node.data)
    }

    /// Returns a mutable reference to the element at the given index.
    #[inline]
    pub fn get_mut(&mut self, idx: Idx) -> Option<&mut T> {
        self.storage.get_mut(idx).map(|node| &mut node.data)
    }

    /// Returns a reference to the front element.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        if self.head.is_none() {
            None
        } else {
            Some(&self.node(self.head).data)
        }
    }

    /// Returns a mutable reference to the front element.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        if self.head.is_none() {
            None
        } else {
            let head = self.head;
            Some(&mut self.node_mut(head).data)
        }
    }

    /// Returns a reference to the back element.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        if self.tail.is_none() {
            None
        } else {
            Some(&self.node(self.tail).data)
        }
    }

    /// Returns a mutable reference to the back element.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        if self.tail.is_none() {
            None
        } else {
            let tail = self.tail;
            Some(&mut self.node_mut(tail).data)
        }
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Removes all elements.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = Idx::NONE;
        self.tail = Idx::NONE;
        self.len = 0;
    }

    /// Moves a node to the back of the list. Useful for LRU caches.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied.
    #[inline]
    pub fn move_to_back(&mut self, idx: Idx) {
        self.checked(idx);
        if self.tail == idx {
            return;
        }
        self.unlink(idx);
        self.link_back(idx);
    }

    /// Moves a node to the front of the list.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied.
    #[inline]
    pub fn move_to_front(&mut self, idx: Idx) {
        self.checked(idx);
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    /// Reverses the order of the elements. Indices stay valid.
    pub fn reverse(&mut self) {
        let mut idx = self.head;
        while idx.is_some() {
            let node = self.node_mut(idx);
            core::mem::swap(&mut node.prev, &mut node.next);
            idx = node.prev;
        }
        core::mem::swap(&mut self.head, &mut self.tail);
    }

    /// Removes every element for which `f` returns `false`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        let mut idx = self.head;
        while idx.is_some() {
            let node = self.node(idx);
            let next = node.next;
            if !f(&node.data) {
                self.remove(idx);
            }
            idx = next;
        }
    }

    /// Removes consecutive elements for which `same(earlier, later)` holds,
    /// keeping the first of each run.
    pub fn dedup_by<F>(&mut self, mut same: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.head.is_none() {
            return;
        }
        let mut keep = self.head;
        let mut idx = self.node(keep).next;
        while idx.is_some() {
            let next = self.node(idx).next;
            if same(&self.node(keep).data, &self.node(idx).data) {
                self.remove(idx);
            } else {
                keep = idx;
            }
            idx = next;
        }
    }

    /// Removes consecutive equal elements.
    pub fn dedup(&mut self)
    where
        T: PartialEq,
    {
        self.dedup_by(|a, b| a == b);
    }

    /// Sorts the list by relinking nodes. Stable, O(n log n), no values
    /// move and every index stays valid.
    pub fn sort_by<F>(&mut self, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.len < 2 {
            return;
        }

        // Bottom-up merge of runs of doubling width
        let mut head = self.head;
        let mut width = 1;
        loop {
            let mut p = head;
            let mut tail = Idx::NONE;
            let mut merges = 0;
            head = Idx::NONE;

            while p.is_some() {
                merges += 1;
                let mut q = p;
                let mut p_size = 0;
                while p_size < width && q.is_some() {
                    p_size += 1;
                    q = self.node(q).next;
                }
                let mut q_size = width;

                while p_size > 0 || (q_size > 0 && q.is_some()) {
                    let take_p = if p_size == 0 {
                        false
                    } else if q_size == 0 || q.is_none() {
                        true
                    } else {
                        // Ties go to the left run
                        !less(&self.node(q).data, &self.node(p).data)
                    };

                    let e = if take_p {
                        let e = p;
                        p = self.node(p).next;
                        p_size -= 1;
                        e
                    } else {
                        let e = q;
                        q = self.node(q).next;
                        q_size -= 1;
                        e
                    };

                    if tail.is_some() {
                        self.node_mut(tail).next = e;
                    } else {
                        head = e;
                    }
                    self.node_mut(e).prev = tail;
                    tail = e;
                }
                p = q;
            }

            self.node_mut(tail).next = Idx::NONE;
            if merges <= 1 {
                self.head = head;
                self.tail = tail;
                return;
            }
            width *= 2;
        }
    }

    /// Sorts ascending. Stable.
    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.sort_by(|a, b| a < b);
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Returns the index of the node after `idx`.
    ///
    /// Returns `None` if `idx` is the tail or not occupied.
    #[inline]
    pub fn next_index(&self, idx: Idx) -> Option<Idx> {
        self.storage.get(idx)?.next.into_option()
    }

    /// Returns the index of the node before `idx`.
    ///
    /// Returns `None` if `idx` is the head or not occupied.
    #[inline]
    pub fn prev_index(&self, idx: Idx) -> Option<Idx> {
        self.storage.get(idx)?.prev.into_option()
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Returns an iterator over references to elements, front to back.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, S, Idx> {
        Iter {
            storage: &self.storage,
            front: self.head,
            back: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over mutable references to elements, front to back.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, S, Idx> {
        IterMut {
            front: self.head,
            back: self.tail,
            len: self.len,
            storage: &mut self.storage,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over node indices, front to back.
    ///
    /// Collect the indices first to modify the list while walking it.
    #[inline]
    pub fn indices(&self) -> Indices<'_, T, S, Idx> {
        Indices {
            storage: &self.storage,
            front: self.head,
            back: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Empties the list, returning an iterator over the removed elements.
    ///
    /// Nodes are freed as the iterator is consumed; dropping it early
    /// frees the rest.
    #[inline]
    pub fn drain(&mut self) -> Drain<'_, T, S, Idx> {
        let head = self.head;
        self.head = Idx::NONE;
        self.tail = Idx::NONE;
        self.len = 0;

        Drain {
            storage: &mut self.storage,
            current: head,
            _marker: PhantomData,
        }
    }

    /// Returns a cursor positioned at the front of the list.
    ///
    /// The cursor allows mutable access and removal during iteration.
    /// See [`Cursor`] for usage examples.
    #[inline]
    pub fn cursor_front(&mut self) -> Cursor<'_, T, S, Idx> {
        let head = self.head;
        Cursor {
            list: self,
            current: head,
        }
    }

    /// Returns a cursor positioned at the back of the list.
    #[inline]
    pub fn cursor_back(&mut self) -> Cursor<'_, T, S, Idx> {
        let tail = self.tail;
        Cursor {
            list: self,
            current: tail,
        }
    }
}

// =============================================================================
// Bounded storage impl - fallible insertion
// =============================================================================

impl<T, S, Idx: Index> List<T, S, Idx>
where
    S: BoundedStorage<ListNode<T, Idx>, Index = Idx>,
{
    /// Pushes a value to the back of the list.
    ///
    /// Returns the index of the inserted element.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full.
    #[inline]
    pub fn try_push_back(&mut self, value: T) -> Result<Idx, Full<T>> {
        let idx = self
            .storage
            .try_insert(ListNode::new(value))
            .map_err(|e| Full(e.0.data))?;
        self.link_back(idx);
        Ok(idx)
    }

    /// Pushes a value to the front of the list.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full.
    #[inline]
    pub fn try_push_front(&mut self, value: T) -> Result<Idx, Full<T>> {
        let idx = self
            .storage
            .try_insert(ListNode::new(value))
            .map_err(|e| Full(e.0.data))?;
        self.link_front(idx);
        Ok(idx)
    }

    /// Inserts a value after an existing node.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full.
    ///
    /// # Panics
    ///
    /// Panics if `after` is not occupied.
    #[inline]
    pub fn try_insert_after(&mut self, after: Idx, value: T) -> Result<Idx, Full<T>> {
        self.checked(after);
        let idx = self
            .storage
            .try_insert(ListNode::new(value))
            .map_err(|e| Full(e.0.data))?;
        self.link_after(after, idx);
        Ok(idx)
    }

    /// Inserts a value before an existing node.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full.
    ///
    /// # Panics
    ///
    /// Panics if `before` is not occupied.
    #[inline]
    pub fn try_insert_before(&mut self, before: Idx, value: T) -> Result<Idx, Full<T>> {
        self.checked(before);
        let idx = self
            .storage
            .try_insert(ListNode::new(value))
            .map_err(|e| Full(e.0.data))?;
        self.link_before(before, idx);
        Ok(idx)
    }
}

// =============================================================================
// Unbounded storage impl - infallible insertion
// =============================================================================

impl<T, S, Idx: Index> List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx>,
{
    /// Pushes a value to the back of the list.
    ///
    /// Returns the index of the inserted element.
    #[inline]
    pub fn push_back(&mut self, value: T) -> Idx {
        let idx = self.storage.insert(ListNode::new(value));
        self.link_back(idx);
        idx
    }

    /// Pushes a value to the front of the list.
    #[inline]
    pub fn push_front(&mut self, value: T) -> Idx {
        let idx = self.storage.insert(ListNode::new(value));
        self.link_front(idx);
        idx
    }

    /// Inserts a value after an existing node.
    ///
    /// # Panics
    ///
    /// Panics if `after` is not occupied.
    #[inline]
    pub fn insert_after(&mut self, after: Idx, value: T) -> Idx {
        self.checked(after);
        let idx = self.storage.insert(ListNode::new(value));
        self.link_after(after, idx);
        idx
    }

    /// Inserts a value before an existing node.
    ///
    /// # Panics
    ///
    /// Panics if `before` is not occupied.
    #[inline]
    pub fn insert_before(&mut self, before: Idx, value: T) -> Idx {
        self.checked(before);
        let idx = self.storage.insert(ListNode::new(value));
        self.link_before(before, idx);
        idx
    }

    /// Moves every element of `other` to the back of this list.
    ///
    /// Each list owns its pool, so this is O(len of `other`) and the moved
    /// elements get new indices.
    pub fn append(&mut self, other: &mut Self) {
        while let Some(value) = other.pop_front() {
            self.push_back(value);
        }
    }

    /// Merges the sorted list `other` into this sorted list. Stable: among
    /// equivalent elements, those of `self` come first. `other` is left
    /// empty.
    pub fn merge_by<F>(&mut self, other: &mut Self, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        let mut at = self.head;
        while let Some(value) = other.pop_front() {
            while at.is_some() && !less(&value, &self.node(at).data) {
                at = self.node(at).next;
            }
            if at.is_some() {
                self.insert_before(at, value);
            } else {
                self.push_back(value);
            }
        }
    }

    /// Merges the sorted list `other` into this sorted list.
    pub fn merge(&mut self, other: &mut Self)
    where
        T: Ord,
    {
        self.merge_by(other, |a, b| a < b);
    }
}

impl<T, S, Idx: Index> List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx> + Default,
{
    /// Splits the list at `idx`.
    ///
    /// Returns a new list holding `idx` and everything after it; `self`
    /// keeps the nodes before. Moved elements get new indices.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied.
    pub fn split_off(&mut self, idx: Idx) -> Self {
        self.checked(idx);
        let mut other = Self::new();
        loop {
            let tail = self.tail;
            if let Some(value) = self.pop_back() {
                other.push_front(value);
            }
            if tail == idx {
                return other;
            }
        }
    }
}

// =============================================================================
// Trait impls
// =============================================================================

impl<T, S, Idx: Index> Clone for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx> + Clone,
{
    /// Clones the pool; indices in the clone match the original.
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug, S, Idx: Index> fmt::Debug for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, S, Idx: Index> PartialEq for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, S, Idx: Index> Eq for List<T, S, Idx> where S: Storage<ListNode<T, Idx>, Index = Idx> {}

impl<T: PartialOrd, S, Idx: Index> PartialOrd for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, S, Idx: Index> Ord for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T, S, Idx: Index> Extend<T> for List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T, S, Idx: Index> FromIterator<T> for List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx> + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<'a, T, S, Idx: Index> IntoIterator for &'a List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, S, Idx: Index> IntoIterator for &'a mut List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, S, Idx: Index> IntoIterator for List<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = T;
    type IntoIter = IntoIter<T, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { list: self }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A cursor providing mutable access to list elements with removal capability.
///
/// # Example
///
/// ```
/// use nexus_containers::List;
///
/// #[derive(Debug)]
/// struct Order { qty: u64 }
///
/// let mut queue: List<Order> = List::new();
/// queue.push_back(Order { qty: 100 });
/// queue.push_back(Order { qty: 50 });
///
/// let mut incoming_qty = 120u64;
/// let mut cursor = queue.cursor_front();
///
/// while let Some(resting) = cursor.current_mut() {
///     let fill = incoming_qty.min(resting.qty);
///     resting.qty -= fill;
///     incoming_qty -= fill;
///
///     if resting.qty == 0 {
///         cursor.remove_current(); // Removes and advances
///     } else {
///         cursor.move_next();
///     }
///
///     if incoming_qty == 0 {
///         break;
///     }
/// }
/// assert_eq!(queue.front().map(|o| o.qty), Some(30));
/// ```
pub struct Cursor<'a, T, S, Idx: Index>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    list: &'a mut List<T, S, Idx>,
    current: Idx,
}

impl<T, S, Idx: Index> Cursor<'_, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    /// Returns a reference to the current element.
    ///
    /// Returns `None` if the cursor is exhausted (past either end).
    #[inline]
    pub fn current(&self) -> Option<&T> {
        if self.current.is_none() {
            None
        } else {
            Some(&self.list.node(self.current).data)
        }
    }

    /// Returns a mutable reference to the current element.
    #[inline]
    pub fn current_mut(&mut self) -> Option<&mut T> {
        if self.current.is_none() {
            None
        } else {
            let current = self.current;
            Some(&mut self.list.node_mut(current).data)
        }
    }

    /// Returns the index of the current element.
    #[inline]
    pub fn index(&self) -> Option<Idx> {
        self.current.into_option()
    }

    /// Advances the cursor to the next element.
    ///
    /// If already exhausted, the cursor stays exhausted.
    #[inline]
    pub fn move_next(&mut self) {
        if self.current.is_some() {
            self.current = self.list.node(self.current).next;
        }
    }

    /// Moves the cursor to the previous element.
    #[inline]
    pub fn move_prev(&mut self) {
        if self.current.is_some() {
            self.current = self.list.node(self.current).prev;
        }
    }

    /// Removes the current element and advances to the next.
    ///
    /// Returns the removed value, or `None` if the cursor is exhausted.
    #[inline]
    pub fn remove_current(&mut self) -> Option<T> {
        if self.current.is_none() {
            return None;
        }

        let idx = self.current;
        self.current = self.list.node(idx).next;
        self.list.unlink(idx);
        // Safety: idx was occupied, we just unlinked it
        Some(unsafe { self.list.storage.remove_unchecked(idx) }.data)
    }

    /// Returns `true` if the cursor has no current element.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Peeks at the next element without advancing.
    #[inline]
    pub fn peek_next(&self) -> Option<&T> {
        if self.current.is_none() {
            return None;
        }
        let next = self.list.node(self.current).next;
        if next.is_none() {
            None
        } else {
            Some(&self.list.node(next).data)
        }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over references to list elements.
pub struct Iter<'a, T, S, Idx: Index> {
    storage: &'a S,
    front: Idx,
    back: Idx,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T, S, Idx: Index> Clone for Iter<'_, T, S, Idx> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage,
            front: self.front,
            back: self.back,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: 'a, S, Idx: Index + 'a> Iterator for Iter<'a, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        // Safety: list invariants guarantee front is valid
        let node = unsafe { self.storage.get_unchecked(self.front) };
        self.front = node.next;
        self.len -= 1;
        Some(&node.data)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T: 'a, S, Idx: Index + 'a> DoubleEndedIterator for Iter<'a, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        // Safety: list invariants guarantee back is valid
        let node = unsafe { self.storage.get_unchecked(self.back) };
        self.back = node.prev;
        self.len -= 1;
        Some(&node.data)
    }
}

impl<'a, T: 'a, S, Idx: Index + 'a> ExactSizeIterator for Iter<'a, T, S, Idx> where
    S: Storage<ListNode<T, Idx>, Index = Idx>
{
}

impl<'a, T: 'a, S, Idx: Index + 'a> FusedIterator for Iter<'a, T, S, Idx> where
    S: Storage<ListNode<T, Idx>, Index = Idx>
{
}

/// Iterator over mutable references to list elements.
pub struct IterMut<'a, T, S, Idx: Index> {
    storage: &'a mut S,
    front: Idx,
    back: Idx,
    len: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: 'a, S, Idx: Index + 'a> Iterator for IterMut<'a, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        // Safety: list invariants guarantee front is valid
        let node = unsafe { self.storage.get_unchecked_mut(self.front) };
        self.front = node.next;
        self.len -= 1;

        // Extend lifetime - safe because we visit each node exactly once
        Some(unsafe { &mut *((&mut node.data) as *mut T) })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T: 'a, S, Idx: Index + 'a> DoubleEndedIterator for IterMut<'a, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        // Safety: list invariants guarantee back is valid
        let node = unsafe { self.storage.get_unchecked_mut(self.back) };
        self.back = node.prev;
        self.len -= 1;

        // Extend lifetime - safe because we visit each node exactly once
        Some(unsafe { &mut *((&mut node.data) as *mut T) })
    }
}

impl<'a, T: 'a, S, Idx: Index + 'a> ExactSizeIterator for IterMut<'a, T, S, Idx> where
    S: Storage<ListNode<T, Idx>, Index = Idx>
{
}

/// Iterator over node indices in the list.
pub struct Indices<'a, T, S, Idx: Index> {
    storage: &'a S,
    front: Idx,
    back: Idx,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T, S, Idx: Index> Iterator for Indices<'_, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = Idx;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let idx = self.front;
        // Safety: list invariants guarantee front is valid
        self.front = unsafe { self.storage.get_unchecked(idx) }.next;
        self.len -= 1;
        Some(idx)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T, S, Idx: Index> DoubleEndedIterator for Indices<'_, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let idx = self.back;
        // Safety: list invariants guarantee back is valid
        self.back = unsafe { self.storage.get_unchecked(idx) }.prev;
        self.len -= 1;
        Some(idx)
    }
}

impl<T, S, Idx: Index> ExactSizeIterator for Indices<'_, T, S, Idx> where
    S: Storage<ListNode<T, Idx>, Index = Idx>
{
}

/// Iterator that removes and returns elements from a list.
pub struct Drain<'a, T, S, Idx: Index>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    storage: &'a mut S,
    current: Idx,
    _marker: PhantomData<T>,
}

impl<T, S, Idx: Index> Iterator for Drain<'_, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }

        let idx = self.current;
        // Safety: current came from list traversal, must be valid
        let node = unsafe { self.storage.remove_unchecked(idx) };
        self.current = node.next;
        Some(node.data)
    }
}

impl<T, S, Idx: Index> Drop for Drain<'_, T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    fn drop(&mut self) {
        // Exhaust remaining elements to ensure cleanup
        for _ in self.by_ref() {}
    }
}

/// Owning iterator over a [`List`].
pub struct IntoIter<T, S, Idx: Index>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    list: List<T, S, Idx>,
}

impl<T, S, Idx: Index> Iterator for IntoIter<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len, Some(self.list.len))
    }
}

impl<T, S, Idx: Index> DoubleEndedIterator for IntoIter<T, S, Idx>
where
    S: Storage<ListNode<T, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.list.pop_back()
    }
}

impl<T, S, Idx: Index> ExactSizeIterator for IntoIter<T, S, Idx> where
    S: Storage<ListNode<T, Idx>, Index = Idx>
{
}

#[cfg(test)]
mod tests {
    use super::*;

    type Boxed = List<u64, BoxedListStorage<u64>, u32>;

    fn boxed(capacity: usize) -> Boxed {
        List::with_storage(BoxedListStorage::with_capacity(capacity))
    }

    #[test]
    fn new_list_is_empty() {
        let list: List<u64> = List::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.front_index().is_none());
        assert!(list.back_index().is_none());
    }

    #[test]
    fn try_push_back_multiple() {
        let mut list = boxed(16);

        let a = list.try_push_back(1).unwrap();
        let b = list.try_push_back(2).unwrap();
        let c = list.try_push_back(3).unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list.front_index(), Some(a));
        assert_eq!(list.back_index(), Some(c));
        assert_eq!(list.next_index(a), Some(b));
        assert_eq!(list.prev_index(c), Some(b));
        assert_eq!(list.next_index(c), None);
        assert_eq!(list.prev_index(a), None);
    }

    #[test]
    fn try_push_front_multiple() {
        let mut list = boxed(16);
        list.try_push_front(1).unwrap();
        list.try_push_front(2).unwrap();
        list.try_push_front(3).unwrap();
        assert!(list.iter().copied().eq([3, 2, 1]));
    }

    #[test]
    fn try_push_back_full_error() {
        let mut list = boxed(2);
        list.try_push_back(1).unwrap();
        list.try_push_back(2).unwrap();

        let err = list.try_push_back(3).unwrap_err();
        assert_eq!(err.into_inner(), 3);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn pop_front_and_back() {
        let mut list: List<u64> = (1..=3).collect();
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert_eq!(list.pop_front(), None);
        assert!(list.storage().is_empty());
    }

    #[test]
    fn remove_middle() {
        let mut list: List<u64> = List::new();
        let a = list.push_back(1);
        let b = list.push_back(2);
        let c = list.push_back(3);

        assert_eq!(list.remove(b), Some(2));
        assert_eq!(list.remove(b), None);
        assert_eq!(list.next_index(a), Some(c));
        assert_eq!(list.prev_index(c), Some(a));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn get_and_get_mut() {
        let mut list: List<u64> = List::new();
        let idx = list.push_back(10);
        *list.get_mut(idx).unwrap() += 5;
        assert_eq!(list.get(idx), Some(&15));
        *list.front_mut().unwrap() += 1;
        *list.back_mut().unwrap() += 1;
        assert_eq!(list.front(), Some(&17));
        assert_eq!(list.back(), Some(&17));
    }

    #[test]
    fn insert_before_and_after() {
        let mut list = boxed(8);
        let a = list.try_push_back(1).unwrap();
        let c = list.try_push_back(3).unwrap();
        list.try_insert_after(a, 2).unwrap();
        list.try_insert_before(a, 0).unwrap();
        let d = list.try_insert_after(c, 4).unwrap();
        assert!(list.iter().copied().eq(0..5));
        assert_eq!(list.back_index(), Some(d));
    }

    #[test]
    #[should_panic(expected = "invalid list index")]
    fn insert_after_vacant_panics() {
        let mut list: List<u64> = List::new();
        let a = list.push_back(1);
        list.remove(a);
        list.insert_after(a, 2);
    }

    #[test]
    fn clear() {
        let mut list: List<u64> = (0..5).collect();
        list.clear();
        assert!(list.is_empty());
        assert!(list.storage().is_empty());
        list.push_back(9);
        assert_eq!(list.front(), Some(&9));
    }

    #[test]
    fn append() {
        let mut a: List<u64> = (0..3).collect();
        let mut b: List<u64> = (3..6).collect();
        a.append(&mut b);
        assert!(b.is_empty());
        assert!(a.iter().copied().eq(0..6));
    }

    #[test]
    fn move_to_back_and_front() {
        let mut list: List<u64> = List::new();
        let a = list.push_back(1);
        let b = list.push_back(2);
        let c = list.push_back(3);

        list.move_to_back(a);
        assert!(list.iter().copied().eq([2, 3, 1]));
        list.move_to_front(c);
        assert!(list.iter().copied().eq([3, 2, 1]));
        list.move_to_front(c);
        list.move_to_back(a);
        assert!(list.iter().copied().eq([3, 2, 1]));
        assert_eq!(list.get(b), Some(&2));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn split_off() {
        let mut list: List<u64> = List::new();
        let idx: Vec<_> = (0..5).map(|i| list.push_back(i)).collect();

        let tail = list.split_off(idx[2]);
        assert!(list.iter().copied().eq([0, 1]));
        assert!(tail.iter().copied().eq([2, 3, 4]));

        let all = list.split_off(idx[0]);
        assert!(list.is_empty());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn reverse_keeps_indices() {
        let mut list: List<u64> = List::new();
        let first = list.push_back(1);
        list.push_back(2);
        let last = list.push_back(3);
        list.reverse();
        assert!(list.iter().copied().eq([3, 2, 1]));
        assert_eq!(list.front_index(), Some(last));
        assert_eq!(list.back_index(), Some(first));
        assert!(list.iter().rev().copied().eq([1, 2, 3]));
    }

    #[test]
    fn retain_and_dedup() {
        let mut list: List<u64> = [1, 1, 2, 3, 3, 3, 4, 1, 1].into_iter().collect();
        list.dedup();
        assert!(list.iter().copied().eq([1, 2, 3, 4, 1]));
        list.retain(|&x| x % 2 == 1);
        assert!(list.iter().copied().eq([1, 3, 1]));
    }

    #[test]
    fn merge_is_stable() {
        let mut a: List<(u32, char)> = [(1, 'a'), (3, 'a'), (5, 'a')].into_iter().collect();
        let mut b: List<(u32, char)> = [(0, 'b'), (3, 'b'), (6, 'b')].into_iter().collect();
        a.merge_by(&mut b, |x, y| x.0 < y.0);
        assert!(b.is_empty());
        let got: Vec<_> = a.iter().copied().collect();
        assert_eq!(
            got,
            [(0, 'b'), (1, 'a'), (3, 'a'), (3, 'b'), (5, 'a'), (6, 'b')]
        );
    }

    #[test]
    fn sort_is_stable_and_keeps_indices() {
        let mut list: List<(u32, u32)> = List::new();
        let mut indices = Vec::new();
        for (i, k) in [5, 3, 5, 1, 3, 0, 5, 2].into_iter().enumerate() {
            indices.push(list.push_back((k, i as u32)));
        }
        list.sort_by(|a, b| a.0 < b.0);

        let got: Vec<_> = list.iter().copied().collect();
        assert_eq!(
            got,
            [(0, 5), (1, 3), (2, 7), (3, 1), (3, 4), (5, 0), (5, 2), (5, 6)]
        );
        assert_eq!(list.get(indices[3]), Some(&(1, 3)));
        assert!(list.iter().rev().copied().eq(got.into_iter().rev()));
    }

    #[test]
    fn iter_double_ended() {
        let list: List<u64> = (1..=5).collect();
        let mut iter = list.iter();
        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next_back(), Some(&5));
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next_back(), Some(&4));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn iter_mut() {
        let mut list: List<u64> = (1..=3).collect();
        for value in list.iter_mut() {
            *value *= 10;
        }
        assert!(list.iter().copied().eq([10, 20, 30]));
    }

    #[test]
    fn indices_iterator() {
        let mut list: List<u64> = List::new();
        let a = list.push_back(1);
        let b = list.push_back(2);
        assert_eq!(list.indices().collect::<Vec<_>>(), [a, b]);
        assert_eq!(list.indices().rev().collect::<Vec<_>>(), [b, a]);
    }

    #[test]
    fn drain_all() {
        let mut list: List<u64> = (1..=3).collect();
        let drained: Vec<_> = list.drain().collect();
        assert_eq!(drained, [1, 2, 3]);
        assert!(list.is_empty());
        assert!(list.storage().is_empty());
    }

    #[test]
    fn drain_partial_then_drop() {
        let mut list: List<u64> = (1..=5).collect();
        {
            let mut drain = list.drain();
            assert_eq!(drain.next(), Some(1));
        }
        assert!(list.is_empty());
        assert!(list.storage().is_empty());
    }

    #[test]
    fn cursor_navigation_and_removal() {
        let mut list: List<u64> = (1..=5).collect();
        let mut cursor = list.cursor_front();

        assert_eq!(cursor.current(), Some(&1));
        assert_eq!(cursor.peek_next(), Some(&2));
        cursor.move_next();
        assert_eq!(cursor.remove_current(), Some(2));
        assert_eq!(cursor.current(), Some(&3));
        cursor.move_prev();
        assert_eq!(cursor.current(), Some(&1));
        cursor.move_prev();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.remove_current(), None);

        let mut cursor = list.cursor_back();
        *cursor.current_mut().unwrap() = 50;
        assert_eq!(cursor.peek_next(), None);
        assert_eq!(cursor.remove_current(), Some(50));
        assert!(cursor.is_exhausted());

        assert!(list.iter().copied().eq([1, 3, 4]));
    }

    #[test]
    fn storage_reuse_after_remove() {
        let mut list = boxed(2);
        let a = list.try_push_back(1).unwrap();
        list.try_push_back(2).unwrap();
        list.remove(a);
        let c = list.try_push_back(3).unwrap();
        assert_eq!(c, a);
        assert!(list.iter().copied().eq([2, 3]));
    }

    #[test]
    fn clone_keeps_indices() {
        let mut list: List<String> = List::new();
        let a = list.push_back("a".into());
        list.push_back("b".into());

        let mut copy = list.clone();
        assert_eq!(copy, list);
        copy.get_mut(a).unwrap().push('!');
        assert_eq!(copy.get(a).map(String::as_str), Some("a!"));
        assert_eq!(list.get(a).map(String::as_str), Some("a"));
        assert!(copy > list);
    }

    #[test]
    fn into_iter_both_ends() {
        let list: List<u64> = (0..4).collect();
        let mut it = list.into_iter();
        assert_eq!(it.next_back(), Some(3));
        assert_eq!(it.len(), 3);
        assert_eq!(it.collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn stress_random_operations() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};
        use std::collections::VecDeque;

        let mut rng = SmallRng::seed_from_u64(0x115);
        let mut list: List<u64> = List::new();
        let mut reference: VecDeque<(usize, u64)> = VecDeque::new();

        for step in 0..5_000u64 {
            match rng.random_range(0..6) {
                0 => reference.push_back((list.push_back(step), step)),
                1 => reference.push_front((list.push_front(step), step)),
                2 => assert_eq!(list.pop_front(), reference.pop_front().map(|e| e.1)),
                3 => assert_eq!(list.pop_back(), reference.pop_back().map(|e| e.1)),
                4 if !reference.is_empty() => {
                    let i = rng.random_range(0..reference.len());
                    let (idx, value) = reference.remove(i).unwrap();
                    assert_eq!(list.remove(idx), Some(value));
                }
                _ if !reference.is_empty() => {
                    let i = rng.random_range(0..reference.len());
                    let entry = reference.remove(i).unwrap();
                    list.move_to_back(entry.0);
                    reference.push_back(entry);
                }
                _ => {}
            }
            assert_eq!(list.len(), reference.len());
        }

        assert!(list.indices().eq(reference.iter().map(|e| e.0)));
        assert!(list.iter().rev().copied().eq(reference.iter().rev().map(|e| e.1)));
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

    const CAPACITY: usize = 100_000;

    #[test]
    #[ignore]
    fn bench_list_push_pop() {
        let mut list: List<u64, BoxedListStorage<u64>, u32> =
            List::with_storage(BoxedListStorage::with_capacity(CAPACITY));
        let mut push = Histogram::<u64>::new(3).unwrap();
        let mut pop = Histogram::<u64>::new(3).unwrap();

        for i in 0..CAPACITY as u64 {
            let start = rdtscp();
            let _ = std::hint::black_box(list.try_push_back(i));
            push.record(rdtscp() - start).unwrap();
        }
        for _ in 0..CAPACITY {
            let start = rdtscp();
            let _ = std::hint::black_box(list.pop_front());
            pop.record(rdtscp() - start).unwrap();
        }

        print_histogram("try_push_back", &push);
        print_histogram("pop_front", &pop);
    }

    #[test]
    #[ignore]
    fn bench_list_move_to_back() {
        let mut list: List<u64> = List::with_capacity(CAPACITY);
        let indices: Vec<_> = (0..CAPACITY as u64).map(|i| list.push_back(i)).collect();
        let mut hist = Histogram::<u64>::new(3).unwrap();

        for i in 0..CAPACITY {
            let idx = indices[(i * 7919) % CAPACITY];
            let start = rdtscp();
            list.move_to_back(idx);
            hist.record(rdtscp() - start).unwrap();
        }

        print_histogram("move_to_back", &hist);
    }
}
