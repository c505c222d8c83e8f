//! Stack, queue and priority queue over the sequence containers.
//!
//! [`Stack`] and [`Queue`] restrict a backing container to one end (or one
//! end in, the other out). Any type implementing [`SequenceContainer`]
//! can back a stack; a queue also needs [`FrontSequence`].
//! [`PriorityQueue`] keeps a [`Vector`] arranged as a heap.

use core::fmt;
use core::marker::PhantomData;

use crate::compare::{Compare, Less};
use crate::heap;
use crate::list::ListNode;
use crate::{Deque, Index, List, UnboundedStorage, Vector};

// =============================================================================
// Container traits
// =============================================================================

/// A growable sequence with access at the back.
pub trait SequenceContainer<T>: Default {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns `true` if empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends to the back.
    fn push_back(&mut self, value: T);

    /// Removes from the back.
    fn pop_back(&mut self) -> Option<T>;

    /// First element.
    fn front(&self) -> Option<&T>;

    /// Last element.
    fn back(&self) -> Option<&T>;

    /// Last element, mutably.
    fn back_mut(&mut self) -> Option<&mut T>;
}

/// A sequence that can also remove from the front.
pub trait FrontSequence<T>: SequenceContainer<T> {
    /// Removes from the front.
    fn pop_front(&mut self) -> Option<T>;

    /// First element, mutably.
    fn front_mut(&mut self) -> Option<&mut T>;
}

impl<T> SequenceContainer<T> for Vector<T> {
    #[inline]
    fn len(&self) -> usize {
        Vector::len(self)
    }

    #[inline]
    fn push_back(&mut self, value: T) {
        Vector::push_back(self, value);
    }

    #[inline]
    fn pop_back(&mut self) -> Option<T> {
        Vector::pop_back(self)
    }

    #[inline]
    fn front(&self) -> Option<&T> {
        Vector::front(self)
    }

    #[inline]
    fn back(&self) -> Option<&T> {
        Vector::back(self)
    }

    #[inline]
    fn back_mut(&mut self) -> Option<&mut T> {
        Vector::back_mut(self)
    }
}

impl<T> SequenceContainer<T> for Deque<T> {
    #[inline]
    fn len(&self) -> usize {
        Deque::len(self)
    }

    #[inline]
    fn push_back(&mut self, value: T) {
        Deque::push_back(self, value);
    }

    #[inline]
    fn pop_back(&mut self) -> Option<T> {
        Deque::pop_back(self)
    }

    #[inline]
    fn front(&self) -> Option<&T> {
        Deque::front(self)
    }

    #[inline]
    fn back(&self) -> Option<&T> {
        Deque::back(self)
    }

    #[inline]
    fn back_mut(&mut self) -> Option<&mut T> {
        Deque::back_mut(self)
    }
}

impl<T> FrontSequence<T> for Deque<T> {
    #[inline]
    fn pop_front(&mut self) -> Option<T> {
        Deque::pop_front(self)
    }

    #[inline]
    fn front_mut(&mut self) -> Option<&mut T> {
        Deque::front_mut(self)
    }
}

impl<T, S, Idx: Index> SequenceContainer<T> for List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx> + Default,
{
    #[inline]
    fn len(&self) -> usize {
        List::len(self)
    }

    #[inline]
    fn push_back(&mut self, value: T) {
        List::push_back(self, value);
    }

    #[inline]
    fn pop_back(&mut self) -> Option<T> {
        List::pop_back(self)
    }

    #[inline]
    fn front(&self) -> Option<&T> {
        List::front(self)
    }

    #[inline]
    fn back(&self) -> Option<&T> {
        List::back(self)
    }

    #[inline]
    fn back_mut(&mut self) -> Option<&mut T> {
        List::back_mut(self)
    }
}

impl<T, S, Idx: Index> FrontSequence<T> for List<T, S, Idx>
where
    S: UnboundedStorage<ListNode<T, Idx>, Index = Idx> + Default,
{
    #[inline]
    fn pop_front(&mut self) -> Option<T> {
        List::pop_front(self)
    }

    #[inline]
    fn front_mut(&mut self) -> Option<&mut T> {
        List::front_mut(self)
    }
}

// =============================================================================
// Stack
// =============================================================================

/// Last-in first-out adapter.
///
/// ```
/// use nexus_containers::{Stack, Vector};
///
/// let mut stack: Stack<u32, Vector<u32>> = Stack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.top(), Some(&2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.len(), 1);
/// ```
pub struct Stack<T, C = Deque<T>> {
    c: C,
    _marker: PhantomData<T>,
}

impl<T, C: SequenceContainer<T>> Stack<T, C> {
    /// Creates an empty stack.
    #[inline]
    pub fn new() -> Self {
        Self::from_container(C::default())
    }

    /// Wraps `c`. Its back becomes the top.
    #[inline]
    pub fn from_container(c: C) -> Self {
        Self {
            c,
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.c.len()
    }

    /// Returns `true` if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.c.is_empty()
    }

    /// Pushes onto the top.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.c.push_back(value);
    }

    /// Pops the top.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.c.pop_back()
    }

    /// The top element.
    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.c.back()
    }

    /// The top element, mutably.
    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.c.back_mut()
    }

    /// Returns the backing container.
    #[inline]
    pub fn into_inner(self) -> C {
        self.c
    }
}

impl<T, C: SequenceContainer<T>> Default for Stack<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clone> Clone for Stack<T, C> {
    fn clone(&self) -> Self {
        Self {
            c: self.c.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C: fmt::Debug> fmt::Debug for Stack<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("c", &self.c).finish()
    }
}

impl<T, C: PartialEq> PartialEq for Stack<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.c == other.c
    }
}

impl<T, C: SequenceContainer<T>> Extend<T> for Stack<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T, C: SequenceContainer<T>> FromIterator<T> for Stack<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stack = Self::new();
        stack.extend(iter);
        stack
    }
}

// =============================================================================
// Queue
// =============================================================================

/// First-in first-out adapter.
pub struct Queue<T, C = Deque<T>> {
    c: C,
    _marker: PhantomData<T>,
}

impl<T, C: FrontSequence<T>> Queue<T, C> {
    /// Creates an empty queue.
    #[inline]
    pub fn new() -> Self {
        Self::from_container(C::default())
    }

    /// Wraps `c`. Its front is the next element out.
    #[inline]
    pub fn from_container(c: C) -> Self {
        Self {
            c,
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.c.len()
    }

    /// Returns `true` if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.c.is_empty()
    }

    /// Adds to the back.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.c.push_back(value);
    }

    /// Removes from the front.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.c.pop_front()
    }

    /// Next element out.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.c.front()
    }

    /// Next element out, mutably.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.c.front_mut()
    }

    /// Most recently pushed element.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.c.back()
    }

    /// Returns the backing container.
    #[inline]
    pub fn into_inner(self) -> C {
        self.c
    }
}

impl<T, C: FrontSequence<T>> Default for Queue<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clone> Clone for Queue<T, C> {
    fn clone(&self) -> Self {
        Self {
            c: self.c.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C: fmt::Debug> fmt::Debug for Queue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("c", &self.c).finish()
    }
}

impl<T, C: PartialEq> PartialEq for Queue<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.c == other.c
    }
}

impl<T, C: FrontSequence<T>> Extend<T> for Queue<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T, C: FrontSequence<T>> FromIterator<T> for Queue<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

// =============================================================================
// PriorityQueue
// =============================================================================

/// A binary heap over a [`Vector`].
///
/// [`pop`](Self::pop) returns the greatest element under `C`. Use
/// [`Greater`](crate::Greater) for smallest-first.
///
/// ```
/// use nexus_containers::{Greater, PriorityQueue};
///
/// let mut pq = PriorityQueue::with_comparator(Greater);
/// pq.extend([5, 1, 3]);
/// assert_eq!(pq.pop(), Some(1));
/// assert_eq!(pq.peek(), Some(&3));
/// ```
pub struct PriorityQueue<T, C = Less> {
    data: Vector<T>,
    comp: C,
}

impl<T: Ord> PriorityQueue<T> {
    /// Creates an empty max-first queue.
    #[inline]
    pub fn new() -> Self {
        Self::with_comparator(Less)
    }
}

impl<T, C: Compare<T>> PriorityQueue<T, C> {
    /// Creates an empty queue ordered by `comp`.
    #[inline]
    pub fn with_comparator(comp: C) -> Self {
        Self {
            data: Vector::new(),
            comp,
        }
    }

    /// Heapifies `data` in O(n).
    pub fn from_vector(mut data: Vector<T>, comp: C) -> Self {
        heap::make_heap(&mut data, &comp);
        Self { data, comp }
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the greatest element.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.data.front()
    }

    /// Adds `value`. O(log n).
    pub fn push(&mut self, value: T) {
        self.data.push_back(value);
        heap::push_heap(&mut self.data, &self.comp);
    }

    /// Removes the greatest element. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        heap::pop_heap(&mut self.data, &self.comp);
        self.data.pop_back()
    }

    /// Removes every element.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns the elements in ascending order under `C`.
    pub fn into_sorted_vector(mut self) -> Vector<T> {
        heap::sort_heap(&mut self.data, &self.comp);
        self.data
    }

    /// Returns the heap storage as is.
    #[inline]
    pub fn into_vector(self) -> Vector<T> {
        self.data
    }
}

impl<T, C: Compare<T> + Default> Default for PriorityQueue<T, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Clone, C: Clone> Clone for PriorityQueue<T, C> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            comp: self.comp.clone(),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PriorityQueue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.data.iter()).finish()
    }
}

impl<T, C: Compare<T>> Extend<T> for PriorityQueue<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for PriorityQueue<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vector(iter.into_iter().collect(), C::default())
    }
}
