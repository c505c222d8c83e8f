//! Red-black tree over an owned node pool.
//!
//! The engine behind [`OrderedMap`](crate::OrderedMap) and friends. Nodes
//! carry a key, a value, parent/left/right links and a color; links are
//! [`Index`] values with `Idx::NONE` as null. There is no header node: the
//! tree caches `root`, `leftmost` and `rightmost`, and the end position is
//! `NONE`.
//!
//! ```text
//!             root ──►  [10 B]
//!                      /      \
//!                 [5 B]        [20 B]
//!                 /            /     \
//!  leftmost ──► [3 R]      [15 R]   [25 R] ◄── rightmost
//! ```
//!
//! Positions behave like bidirectional iterators: [`next`](RbTree::next)
//! walks to the in-order successor and returns `NONE` past the last node,
//! and [`prev`](RbTree::prev) of `NONE` is the last node.
//!
//! Nodes never move. Erasing a node with two children relinks its in-order
//! successor into its place rather than swapping payloads, so every other
//! index stays valid.
//!
//! # Example
//!
//! ```
//! use nexus_containers::RbTree;
//!
//! let mut tree: RbTree<u32, &str> = RbTree::new();
//! let (ten, inserted) = tree.insert_unique(10, "ten");
//! assert!(inserted);
//! tree.insert_unique(5, "five");
//! tree.insert_unique(20, "twenty");
//!
//! // Duplicate keys are rejected by the unique path
//! assert_eq!(tree.insert_unique(10, "TEN"), (ten, false));
//!
//! assert!(tree.keys().copied().eq([5, 10, 20]));
//! assert_eq!(tree.erase(ten), (10, "ten"));
//! assert_eq!(tree.validate(), Ok(1));
//! ```

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::iter::FusedIterator;
use core::mem;
use std::marker::PhantomData;

use crate::compare::{Compare, Less};
use crate::error::Full;
use crate::{BoundedStorage, BoxedStorage, Index, Storage, UnboundedStorage};

/// Bounded tree storage backed by a boxed allocation.
pub type BoxedRbStorage<K, V, Idx = u32> = BoxedStorage<RbNode<K, V, Idx>, Idx>;

/// Unbounded tree storage backed by `slab::Slab`.
pub type SlabRbStorage<K, V> = slab::Slab<RbNode<K, V, usize>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// A tree node: payload plus links.
#[derive(Debug, Clone)]
pub struct RbNode<K, V, Idx: Index = usize> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) parent: Idx,
    pub(crate) left: Idx,
    pub(crate) right: Idx,
    pub(crate) color: Color,
}

impl<K, V, Idx: Index> RbNode<K, V, Idx> {
    #[inline]
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            parent: Idx::NONE,
            left: Idx::NONE,
            right: Idx::NONE,
            color: Color::Red,
        }
    }
}

/// A broken structural invariant reported by [`RbTree::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The root is red.
    #[error("root is red")]
    RedRoot,
    /// The root has a parent link.
    #[error("root has a parent")]
    RootHasParent,
    /// A child does not link back to its parent.
    #[error("node {node} does not point back to its parent")]
    BrokenParentLink {
        /// Slot of the child.
        node: usize,
    },
    /// A red node has a red child.
    #[error("red node {node} has a red child")]
    RedRed {
        /// Slot of the parent.
        node: usize,
    },
    /// Two paths below a node cross different numbers of black nodes.
    #[error("black height differs below node {node}")]
    BlackHeight {
        /// Slot of the node.
        node: usize,
    },
    /// In-order traversal found a key less than its predecessor.
    #[error("node {node} is ordered before its predecessor")]
    OutOfOrder {
        /// Slot of the misplaced node.
        node: usize,
    },
    /// The cached leftmost or rightmost node is wrong.
    #[error("cached extremum is stale")]
    StaleExtremum,
    /// The cached length disagrees with the node count.
    #[error("length is {cached} but {counted} nodes are linked")]
    WrongLength {
        /// Cached length.
        cached: usize,
        /// Nodes reachable from the root.
        counted: usize,
    },
}

/// Where a new node will hang: under `parent`, on the left or right.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InsertPos<Idx> {
    parent: Idx,
    left: bool,
}

// =============================================================================
// Navigation over raw storage
// =============================================================================

#[inline]
fn node<K, V, S, Idx: Index>(storage: &S, idx: Idx) -> &RbNode<K, V, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    debug_assert!(idx.is_some());
    // Safety: callers only pass indices reached through the links
    unsafe { storage.get_unchecked(idx) }
}

fn minimum<K, V, S, Idx: Index>(storage: &S, mut x: Idx) -> Idx
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    loop {
        let left = node(storage, x).left;
        if left.is_none() {
            return x;
        }
        x = left;
    }
}

fn maximum<K, V, S, Idx: Index>(storage: &S, mut x: Idx) -> Idx
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    loop {
        let right = node(storage, x).right;
        if right.is_none() {
            return x;
        }
        x = right;
    }
}

/// In-order successor; `NONE` past the last node and at `NONE`.
fn successor<K, V, S, Idx: Index>(storage: &S, x: Idx) -> Idx
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    if x.is_none() {
        return Idx::NONE;
    }
    let right = node(storage, x).right;
    if right.is_some() {
        return minimum(storage, right);
    }
    let mut x = x;
    let mut y = node(storage, x).parent;
    while y.is_some() && x == node(storage, y).right {
        x = y;
        y = node(storage, y).parent;
    }
    y
}

/// In-order predecessor; `prev(NONE)` wraps to `rightmost` and the
/// predecessor of the first node is `NONE`.
fn predecessor<K, V, S, Idx: Index>(storage: &S, x: Idx, rightmost: Idx) -> Idx
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    if x.is_none() {
        return rightmost;
    }
    let left = node(storage, x).left;
    if left.is_some() {
        return maximum(storage, left);
    }
    let mut x = x;
    let mut y = node(storage, x).parent;
    while y.is_some() && x == node(storage, y).left {
        x = y;
        y = node(storage, y).parent;
    }
    y
}

// =============================================================================
// RbTree
// =============================================================================

/// A red-black tree keyed by `K` under comparator `C`.
///
/// Holds unique or duplicate keys depending on which insert path the caller
/// uses; the wrappers in [`map`](crate::map) pick one.
///
/// # Type Parameters
///
/// - `K`, `V`: Key and value types
/// - `C`: Comparator (default [`Less`], ascending by [`Ord`])
/// - `S`: Node pool (default [`SlabRbStorage<K, V>`])
/// - `Idx`: Index type (default `usize`, matching `slab`)
pub struct RbTree<K, V, C = Less, S = SlabRbStorage<K, V>, Idx: Index = usize>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    storage: S,
    root: Idx,
    leftmost: Idx,
    rightmost: Idx,
    len: usize,
    cmp: C,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, S, Idx: Index> Default for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx> + Default,
    C: Default,
{
    fn default() -> Self {
        Self::with_storage_and_comparator(S::default(), C::default())
    }
}

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx> + Default,
    C: Default,
{
    /// Creates an empty tree with a default pool and comparator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx> + Default,
{
    /// Creates an empty tree ordered by `cmp`.
    #[inline]
    pub fn with_comparator(cmp: C) -> Self {
        Self::with_storage_and_comparator(S::default(), cmp)
    }
}

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
    C: Default,
{
    /// Creates an empty tree over `storage`. Anything already in the pool
    /// is dropped.
    #[inline]
    pub fn with_storage(storage: S) -> Self {
        Self::with_storage_and_comparator(storage, C::default())
    }
}

// =============================================================================
// Structure - no comparisons needed
// =============================================================================

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    /// Creates an empty tree over `storage` ordered by `cmp`.
    pub fn with_storage_and_comparator(mut storage: S, cmp: C) -> Self {
        storage.clear();
        Self {
            storage,
            root: Idx::NONE,
            leftmost: Idx::NONE,
            rightmost: Idx::NONE,
            len: 0,
            cmp,
            _marker: PhantomData,
        }
    }

    /// Returns the number of nodes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest node count the index type can address.
    #[inline]
    pub fn max_size(&self) -> usize {
        let node_size = mem::size_of::<RbNode<K, V, Idx>>().max(1);
        Idx::NONE.as_usize().min(isize::MAX as usize / node_size)
    }

    /// Returns the comparator.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    #[inline]
    fn node(&self, idx: Idx) -> &RbNode<K, V, Idx> {
        node(&self.storage, idx)
    }

    #[inline]
    fn node_mut(&mut self, idx: Idx) -> &mut RbNode<K, V, Idx> {
        debug_assert!(idx.is_some());
        // Safety: only called with indices reached through the links
        unsafe { self.storage.get_unchecked_mut(idx) }
    }

    /// Entry at a linked index.
    #[inline]
    pub(crate) fn entry_at(&self, idx: Idx) -> (&K, &V) {
        let n = self.node(idx);
        (&n.key, &n.value)
    }

    /// Value at a linked index.
    #[inline]
    pub(crate) fn value_mut(&mut self, idx: Idx) -> &mut V {
        &mut self.node_mut(idx).value
    }

    #[inline]
    fn is_red(&self, idx: Idx) -> bool {
        idx.is_some() && self.node(idx).color == Color::Red
    }

    #[inline]
    fn is_black(&self, idx: Idx) -> bool {
        !self.is_red(idx)
    }

    // ========================================================================
    // Positions
    // ========================================================================

    /// Index of the smallest node, `NONE` if empty.
    #[inline]
    pub fn first_index(&self) -> Idx {
        self.leftmost
    }

    /// Index of the largest node, `NONE` if empty.
    #[inline]
    pub fn last_index(&self) -> Idx {
        self.rightmost
    }

    /// In-order successor of `idx`. Returns `NONE` past the last node.
    #[inline]
    pub fn next(&self, idx: Idx) -> Idx {
        successor(&self.storage, idx)
    }

    /// In-order predecessor of `idx`. `prev(NONE)` is the last node.
    #[inline]
    pub fn prev(&self, idx: Idx) -> Idx {
        predecessor(&self.storage, idx, self.rightmost)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the entry at `idx`.
    #[inline]
    pub fn get(&self, idx: Idx) -> Option<(&K, &V)> {
        self.storage.get(idx).map(|n| (&n.key, &n.value))
    }

    /// Returns the entry at `idx` with a mutable value. Keys are never
    /// handed out mutably.
    #[inline]
    pub fn get_mut(&mut self, idx: Idx) -> Option<(&K, &mut V)> {
        self.storage.get_mut(idx).map(|n| (&n.key, &mut n.value))
    }

    /// Returns the smallest entry.
    #[inline]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.get(self.leftmost)
    }

    /// Returns the largest entry.
    #[inline]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.get(self.rightmost)
    }

    // ========================================================================
    // Rotations and rebalancing
    // ========================================================================

    fn rotate_left(&mut self, x: Idx) {
        let y = self.node(x).right;
        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if y_left.is_some() {
            self.node_mut(y_left).parent = x;
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        if x == self.root {
            self.root = y;
        } else if x == self.node(x_parent).left {
            self.node_mut(x_parent).left = y;
        } else {
            self.node_mut(x_parent).right = y;
        }

        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
    }

    fn rotate_right(&mut self, x: Idx) {
        let y = self.node(x).left;
        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if y_right.is_some() {
            self.node_mut(y_right).parent = x;
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        if x == self.root {
            self.root = y;
        } else if x == self.node(x_parent).right {
            self.node_mut(x_parent).right = y;
        } else {
            self.node_mut(x_parent).left = y;
        }

        self.node_mut(y).right = x;
        self.node_mut(x).parent = y;
    }

    /// Hangs the freshly allocated node `x` at `pos` and restores balance.
    fn link(&mut self, pos: InsertPos<Idx>, x: Idx) {
        let InsertPos { parent, left } = pos;
        {
            let n = self.node_mut(x);
            n.parent = parent;
            n.left = Idx::NONE;
            n.right = Idx::NONE;
            n.color = Color::Red;
        }

        if parent.is_none() {
            self.root = x;
            self.leftmost = x;
            self.rightmost = x;
        } else if left {
            self.node_mut(parent).left = x;
            if parent == self.leftmost {
                self.leftmost = x;
            }
        } else {
            self.node_mut(parent).right = x;
            if parent == self.rightmost {
                self.rightmost = x;
            }
        }

        self.insert_rebalance(x);
        self.len += 1;
    }

    fn insert_rebalance(&mut self, mut x: Idx) {
        while x != self.root && self.is_red(self.node(x).parent) {
            let p = self.node(x).parent;
            // A red parent is never the root, so the grandparent exists
            let g = self.node(p).parent;

            if p == self.node(g).left {
                let uncle = self.node(g).right;
                if self.is_red(uncle) {
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    x = g;
                } else {
                    if x == self.node(p).right {
                        x = p;
                        self.rotate_left(x);
                    }
                    let p = self.node(x).parent;
                    let g = self.node(p).parent;
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.node(g).left;
                if self.is_red(uncle) {
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    x = g;
                } else {
                    if x == self.node(p).left {
                        x = p;
                        self.rotate_right(x);
                    }
                    let p = self.node(x).parent;
                    let g = self.node(p).parent;
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    self.rotate_left(g);
                }
            }
        }
        let root = self.root;
        self.node_mut(root).color = Color::Black;
    }

    /// Detaches `z` from the tree and restores balance. `z` stays in the pool.
    fn unlink(&mut self, z: Idx) {
        let z_left = self.node(z).left;
        let z_right = self.node(z).right;

        // `y` is the node that actually leaves its position: `z` itself, or
        // its successor when `z` has two children. `x` takes y's place.
        let (y, x) = if z_left.is_none() {
            (z, z_right)
        } else if z_right.is_none() {
            (z, z_left)
        } else {
            let y = minimum(&self.storage, z_right);
            (y, self.node(y).right)
        };

        let x_parent;
        let removed_color;

        if y != z {
            // Relink the successor into z's place
            self.node_mut(z_left).parent = y;
            self.node_mut(y).left = z_left;
            if y != z_right {
                x_parent = self.node(y).parent;
                if x.is_some() {
                    self.node_mut(x).parent = x_parent;
                }
                self.node_mut(x_parent).left = x;
                self.node_mut(y).right = z_right;
                self.node_mut(z_right).parent = y;
            } else {
                x_parent = y;
            }

            let z_parent = self.node(z).parent;
            self.replace_child(z_parent, z, y);
            self.node_mut(y).parent = z_parent;

            // y inherits z's color; the fix-up concerns y's old color
            let z_color = self.node(z).color;
            removed_color = mem::replace(&mut self.node_mut(y).color, z_color);
        } else {
            x_parent = self.node(z).parent;
            if x.is_some() {
                self.node_mut(x).parent = x_parent;
            }
            self.replace_child(x_parent, z, x);

            if self.leftmost == z {
                self.leftmost = if z_right.is_none() {
                    x_parent
                } else {
                    minimum(&self.storage, x)
                };
            }
            if self.rightmost == z {
                self.rightmost = if z_left.is_none() {
                    x_parent
                } else {
                    maximum(&self.storage, x)
                };
            }
            removed_color = self.node(z).color;
        }

        if removed_color == Color::Black {
            self.erase_rebalance(x, x_parent);
        }

        let n = self.node_mut(z);
        n.parent = Idx::NONE;
        n.left = Idx::NONE;
        n.right = Idx::NONE;
        self.len -= 1;
    }

    /// Points `parent`'s link to `old` (or the root) at `new`.
    fn replace_child(&mut self, parent: Idx, old: Idx, new: Idx) {
        if parent.is_none() {
            self.root = new;
        } else if self.node(parent).left == old {
            self.node_mut(parent).left = new;
        } else {
            self.node_mut(parent).right = new;
        }
    }

    /// Repairs the black deficit at `x` (possibly `NONE`) under `x_parent`.
    fn erase_rebalance(&mut self, mut x: Idx, mut x_parent: Idx) {
        while x != self.root && self.is_black(x) {
            if x == self.node(x_parent).left {
                let mut w = self.node(x_parent).right;
                if self.is_red(w) {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(x_parent).color = Color::Red;
                    self.rotate_left(x_parent);
                    w = self.node(x_parent).right;
                }
                let (w_left, w_right) = (self.node(w).left, self.node(w).right);
                if self.is_black(w_left) && self.is_black(w_right) {
                    self.node_mut(w).color = Color::Red;
                    x = x_parent;
                    x_parent = self.node(x).parent;
                } else {
                    if self.is_black(w_right) {
                        self.node_mut(w_left).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.rotate_right(w);
                        w = self.node(x_parent).right;
                    }
                    self.node_mut(w).color = self.node(x_parent).color;
                    self.node_mut(x_parent).color = Color::Black;
                    let w_right = self.node(w).right;
                    if w_right.is_some() {
                        self.node_mut(w_right).color = Color::Black;
                    }
                    self.rotate_left(x_parent);
                    break;
                }
            } else {
                let mut w = self.node(x_parent).left;
                if self.is_red(w) {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(x_parent).color = Color::Red;
                    self.rotate_right(x_parent);
                    w = self.node(x_parent).left;
                }
                let (w_left, w_right) = (self.node(w).left, self.node(w).right);
                if self.is_black(w_left) && self.is_black(w_right) {
                    self.node_mut(w).color = Color::Red;
                    x = x_parent;
                    x_parent = self.node(x).parent;
                } else {
                    if self.is_black(w_left) {
                        self.node_mut(w_right).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.rotate_left(w);
                        w = self.node(x_parent).left;
                    }
                    self.node_mut(w).color = self.node(x_parent).color;
                    self.node_mut(x_parent).color = Color::Black;
                    let w_left = self.node(w).left;
                    if w_left.is_some() {
                        self.node_mut(w_left).color = Color::Black;
                    }
                    self.rotate_right(x_parent);
                    break;
                }
            }
        }
        if x.is_some() {
            self.node_mut(x).color = Color::Black;
        }
    }

    // ========================================================================
    // Erase
    // ========================================================================

    /// Removes the node at `idx` and returns its entry.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied.
    pub fn erase(&mut self, idx: Idx) -> (K, V) {
        if self.storage.get(idx).is_none() {
            panic!("invalid tree index {idx:?}");
        }
        self.unlink(idx);
        // Safety: checked above, now detached
        let node = unsafe { self.storage.remove_unchecked(idx) };
        (node.key, node.value)
    }

    /// Removes the nodes in `[first, last)`.
    pub fn erase_range(&mut self, first: Idx, last: Idx) {
        if first == self.leftmost && last.is_none() {
            self.clear();
            return;
        }
        let mut x = first;
        while x != last {
            let next = self.next(x);
            self.erase(x);
            x = next;
        }
    }

    /// Removes and returns the smallest entry.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        if self.leftmost.is_none() {
            return None;
        }
        Some(self.erase(self.leftmost))
    }

    /// Removes and returns the largest entry.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        if self.rightmost.is_none() {
            return None;
        }
        Some(self.erase(self.rightmost))
    }

    /// Removes every node.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.root = Idx::NONE;
        self.leftmost = Idx::NONE;
        self.rightmost = Idx::NONE;
        self.len = 0;
    }

    /// Exchanges the contents of two trees, comparators included.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Returns an in-order iterator over entries.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, S, Idx> {
        Iter {
            range: self.range(self.leftmost, Idx::NONE),
            len: self.len,
        }
    }

    /// Returns an in-order iterator with mutable values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, S, Idx> {
        IterMut {
            front: self.leftmost,
            back: self.rightmost,
            len: self.len,
            storage: &mut self.storage,
            _marker: PhantomData,
        }
    }

    /// Returns an in-order iterator over keys.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V, S, Idx> {
        Keys { inner: self.iter() }
    }

    /// Returns an in-order iterator over values.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V, S, Idx> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over the positions `[first, last)`.
    ///
    /// `last` must be reachable from `first` by [`next`](Self::next).
    #[inline]
    pub fn range(&self, first: Idx, last: Idx) -> Range<'_, K, V, S, Idx> {
        Range {
            storage: &self.storage,
            front: first,
            end: last,
            rightmost: self.rightmost,
            _marker: PhantomData,
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks every structural invariant except key order and returns the
    /// black height of the tree.
    fn validate_structure(&self) -> Result<usize, InvariantViolation> {
        if self.root.is_none() {
            if self.len != 0 {
                return Err(InvariantViolation::WrongLength {
                    cached: self.len,
                    counted: 0,
                });
            }
            if self.leftmost.is_some() || self.rightmost.is_some() {
                return Err(InvariantViolation::StaleExtremum);
            }
            return Ok(0);
        }

        let root = self.node(self.root);
        if root.color != Color::Black {
            return Err(InvariantViolation::RedRoot);
        }
        if root.parent.is_some() {
            return Err(InvariantViolation::RootHasParent);
        }

        let mut counted = 0;
        let height = self.check_subtree(self.root, &mut counted)?;
        if counted != self.len {
            return Err(InvariantViolation::WrongLength {
                cached: self.len,
                counted,
            });
        }
        if self.leftmost != minimum(&self.storage, self.root)
            || self.rightmost != maximum(&self.storage, self.root)
        {
            return Err(InvariantViolation::StaleExtremum);
        }
        Ok(height)
    }

    fn check_subtree(&self, x: Idx, counted: &mut usize) -> Result<usize, InvariantViolation> {
        if x.is_none() {
            return Ok(0);
        }
        *counted += 1;
        let n = self.node(x);

        for child in [n.left, n.right] {
            if child.is_some() && self.node(child).parent != x {
                return Err(InvariantViolation::BrokenParentLink {
                    node: child.as_usize(),
                });
            }
        }
        if n.color == Color::Red && (self.is_red(n.left) || self.is_red(n.right)) {
            return Err(InvariantViolation::RedRed { node: x.as_usize() });
        }

        let left = self.check_subtree(n.left, counted)?;
        let right = self.check_subtree(n.right, counted)?;
        if left != right {
            return Err(InvariantViolation::BlackHeight { node: x.as_usize() });
        }
        Ok(left + usize::from(n.color == Color::Black))
    }
}

// =============================================================================
// Ordered operations
// =============================================================================

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
    C: Compare<K>,
{
    /// Finds where `key` would go as a unique key. `Err` holds the node
    /// that already has an equivalent key.
    pub(crate) fn unique_pos(&self, key: &K) -> Result<InsertPos<Idx>, Idx> {
        let mut y = Idx::NONE;
        let mut x = self.root;
        let mut go_left = true;
        while x.is_some() {
            y = x;
            go_left = self.cmp.less(key, &self.node(x).key);
            x = if go_left {
                self.node(x).left
            } else {
                self.node(x).right
            };
        }

        let pos = InsertPos {
            parent: y,
            left: go_left,
        };
        let mut j = y;
        if go_left {
            if y.is_none() || y == self.leftmost {
                return Ok(pos);
            }
            j = self.prev(y);
        }
        if self.cmp.less(&self.node(j).key, key) {
            Ok(pos)
        } else {
            Err(j)
        }
    }

    /// Finds where `key` goes as a duplicate: after every equivalent key.
    fn multi_pos(&self, key: &K) -> InsertPos<Idx> {
        let mut y = Idx::NONE;
        let mut x = self.root;
        let mut go_left = true;
        while x.is_some() {
            y = x;
            go_left = self.cmp.less(key, &self.node(x).key);
            x = if go_left {
                self.node(x).left
            } else {
                self.node(x).right
            };
        }
        InsertPos {
            parent: y,
            left: go_left,
        }
    }

    /// Checks whether `hint` is a correct neighbor for a unique `key`;
    /// falls back to a full search otherwise.
    fn unique_hint_pos(&self, hint: Idx, key: &K) -> Result<InsertPos<Idx>, Idx> {
        if self.len == 0 {
            return self.unique_pos(key);
        }
        if hint == self.leftmost {
            if self.cmp.less(key, &self.node(hint).key) {
                return Ok(InsertPos {
                    parent: hint,
                    left: true,
                });
            }
        } else if hint.is_none() {
            if self.cmp.less(&self.node(self.rightmost).key, key) {
                return Ok(InsertPos {
                    parent: self.rightmost,
                    left: false,
                });
            }
        } else {
            let before = self.prev(hint);
            if self.cmp.less(&self.node(before).key, key) && self.cmp.less(key, &self.node(hint).key)
            {
                return Ok(self.between(before, hint));
            }
        }
        self.unique_pos(key)
    }

    fn multi_hint_pos(&self, hint: Idx, key: &K) -> InsertPos<Idx> {
        if self.len == 0 {
            return self.multi_pos(key);
        }
        if hint == self.leftmost {
            if !self.cmp.less(&self.node(hint).key, key) {
                return InsertPos {
                    parent: hint,
                    left: true,
                };
            }
        } else if hint.is_none() {
            if !self.cmp.less(key, &self.node(self.rightmost).key) {
                return InsertPos {
                    parent: self.rightmost,
                    left: false,
                };
            }
        } else {
            let before = self.prev(hint);
            if !self.cmp.less(key, &self.node(before).key)
                && !self.cmp.less(&self.node(hint).key, key)
            {
                return self.between(before, hint);
            }
        }
        self.multi_pos(key)
    }

    /// Position for a key between the adjacent nodes `before` and `after`.
    fn between(&self, before: Idx, after: Idx) -> InsertPos<Idx> {
        if self.node(before).right.is_none() {
            InsertPos {
                parent: before,
                left: false,
            }
        } else {
            InsertPos {
                parent: after,
                left: true,
            }
        }
    }

    /// First position whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Idx
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let mut y = Idx::NONE;
        let mut x = self.root;
        while x.is_some() {
            let n = self.node(x);
            if !self.cmp.less(n.key.borrow(), key) {
                y = x;
                x = n.left;
            } else {
                x = n.right;
            }
        }
        y
    }

    /// First position whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Idx
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let mut y = Idx::NONE;
        let mut x = self.root;
        while x.is_some() {
            let n = self.node(x);
            if self.cmp.less(key, n.key.borrow()) {
                y = x;
                x = n.left;
            } else {
                x = n.right;
            }
        }
        y
    }

    /// Returns the first node with a key equivalent to `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Idx>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let j = self.lower_bound(key);
        if j.is_some() && !self.cmp.less(key, self.node(j).key.borrow()) {
            Some(j)
        } else {
            None
        }
    }

    /// Returns `true` if some node has a key equivalent to `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.find(key).is_some()
    }

    /// 0 or 1, for trees holding unique keys.
    #[inline]
    pub fn count_unique<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        usize::from(self.contains(key))
    }

    /// Number of nodes with a key equivalent to `key`.
    pub fn count_multi<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let (first, last) = self.equal_range_multi(key);
        self.range(first, last).count()
    }

    /// `[first, last)` of the nodes equivalent to `key`, at most one wide.
    pub fn equal_range_unique<Q>(&self, key: &Q) -> (Idx, Idx)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        match self.find(key) {
            Some(idx) => (idx, self.next(idx)),
            None => {
                let lb = self.lower_bound(key);
                (lb, lb)
            }
        }
    }

    /// `[first, last)` of every node equivalent to `key`.
    #[inline]
    pub fn equal_range_multi<Q>(&self, key: &Q) -> (Idx, Idx)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        (self.lower_bound(key), self.upper_bound(key))
    }

    /// Removes the node with a key equivalent to `key`.
    pub fn erase_unique<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let idx = self.find(key)?;
        Some(self.erase(idx))
    }

    /// Removes every node with a key equivalent to `key` and returns how
    /// many went.
    pub fn erase_multi<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let (first, last) = self.equal_range_multi(key);
        let before = self.len;
        self.erase_range(first, last);
        before - self.len
    }

    /// Validates the tree: parent links, colors, black height, key order,
    /// cached extrema and length. Returns the black height.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] found.
    pub fn validate(&self) -> Result<usize, InvariantViolation> {
        let height = self.validate_structure()?;
        let mut prev = self.leftmost;
        let mut x = self.next(prev);
        while x.is_some() {
            if self.cmp.less(&self.node(x).key, &self.node(prev).key) {
                return Err(InvariantViolation::OutOfOrder { node: x.as_usize() });
            }
            prev = x;
            x = self.next(x);
        }
        Ok(height)
    }
}

// =============================================================================
// Bounded storage impl - fallible insertion
// =============================================================================

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: BoundedStorage<RbNode<K, V, Idx>, Index = Idx>,
    C: Compare<K>,
{
    /// Inserts unless an equivalent key exists.
    ///
    /// Returns the index of the new node and `true`, or the index of the
    /// existing node and `false` (the arguments are dropped).
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if storage is full.
    pub fn try_insert_unique(&mut self, key: K, value: V) -> Result<(Idx, bool), Full<(K, V)>> {
        match self.unique_pos(&key) {
            Ok(pos) => {
                let idx = self
                    .storage
                    .try_insert(RbNode::new(key, value))
                    .map_err(|e| Full((e.0.key, e.0.value)))?;
                self.link(pos, idx);
                Ok((idx, true))
            }
            Err(existing) => Ok((existing, false)),
        }
    }

    /// Inserts after every equivalent key.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if storage is full.
    pub fn try_insert_multi(&mut self, key: K, value: V) -> Result<Idx, Full<(K, V)>> {
        let pos = self.multi_pos(&key);
        let idx = self
            .storage
            .try_insert(RbNode::new(key, value))
            .map_err(|e| Full((e.0.key, e.0.value)))?;
        self.link(pos, idx);
        Ok(idx)
    }
}

// =============================================================================
// Unbounded storage impl - infallible insertion
// =============================================================================

impl<K, V, C, S, Idx: Index> RbTree<K, V, C, S, Idx>
where
    S: UnboundedStorage<RbNode<K, V, Idx>, Index = Idx>,
    C: Compare<K>,
{
    /// Allocates a node for `key` at a position from [`unique_pos`](Self::unique_pos).
    pub(crate) fn insert_at(&mut self, pos: InsertPos<Idx>, key: K, value: V) -> Idx {
        let idx = self.storage.insert(RbNode::new(key, value));
        self.link(pos, idx);
        idx
    }

    /// Inserts unless an equivalent key exists.
    ///
    /// Returns the index of the new node and `true`, or the index of the
    /// existing node and `false` (the arguments are dropped).
    pub fn insert_unique(&mut self, key: K, value: V) -> (Idx, bool) {
        match self.unique_pos(&key) {
            Ok(pos) => (self.insert_at(pos, key, value), true),
            Err(existing) => (existing, false),
        }
    }

    /// Inserts after every equivalent key.
    pub fn insert_multi(&mut self, key: K, value: V) -> Idx {
        let pos = self.multi_pos(&key);
        self.insert_at(pos, key, value)
    }

    /// [`insert_unique`](Self::insert_unique) starting from `hint`, the
    /// position the key should precede. A correct hint skips the search.
    pub fn insert_unique_hint(&mut self, hint: Idx, key: K, value: V) -> (Idx, bool) {
        match self.unique_hint_pos(hint, &key) {
            Ok(pos) => (self.insert_at(pos, key, value), true),
            Err(existing) => (existing, false),
        }
    }

    /// [`insert_multi`](Self::insert_multi) starting from `hint`.
    pub fn insert_multi_hint(&mut self, hint: Idx, key: K, value: V) -> Idx {
        let pos = self.multi_hint_pos(hint, &key);
        self.insert_at(pos, key, value)
    }
}

// =============================================================================
// Trait impls
// =============================================================================

impl<K, V, C, S, Idx: Index> Clone for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx> + Clone,
    C: Clone,
{
    /// Clones the pool; indices in the clone match the original.
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            root: self.root,
            leftmost: self.leftmost,
            rightmost: self.rightmost,
            len: self.len,
            cmp: self.cmp.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C, S, Idx: Index> fmt::Debug for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C, S, Idx: Index> PartialEq for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C, S, Idx: Index> Eq for RbTree<K, V, C, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

impl<K: PartialOrd, V: PartialOrd, C, S, Idx: Index> PartialOrd for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord, C, S, Idx: Index> Ord for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<'a, K, V, C, S, Idx: Index> IntoIterator for &'a RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C, S, Idx: Index> IntoIterator for &'a mut RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, C, S, Idx: Index> IntoIterator for RbTree<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { tree: self }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over the positions `[front, end)` of a tree.
pub struct Range<'a, K, V, S, Idx: Index> {
    storage: &'a S,
    front: Idx,
    end: Idx,
    rightmost: Idx,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, S, Idx: Index> Clone for Range<'_, K, V, S, Idx> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage,
            front: self.front,
            end: self.end,
            rightmost: self.rightmost,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Range<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_index(&mut self) -> Option<Idx> {
        if self.front == self.end {
            return None;
        }
        let idx = self.front;
        self.front = successor(self.storage, idx);
        Some(idx)
    }

    #[inline]
    fn next_back_index(&mut self) -> Option<Idx> {
        if self.front == self.end {
            return None;
        }
        self.end = predecessor(self.storage, self.end, self.rightmost);
        Some(self.end)
    }

    #[inline]
    fn entry(&self, idx: Idx) -> (&'a K, &'a V) {
        let n = node(self.storage, idx);
        (&n.key, &n.value)
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Range<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next_index().map(|idx| self.entry(idx))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> DoubleEndedIterator for Range<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.next_back_index().map(|idx| self.entry(idx))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> FusedIterator for Range<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

/// In-order iterator over a whole tree.
pub struct Iter<'a, K, V, S, Idx: Index> {
    range: Range<'a, K, V, S, Idx>,
    len: usize,
}

impl<K, V, S, Idx: Index> Clone for Iter<'_, K, V, S, Idx> {
    fn clone(&self) -> Self {
        Self {
            range: self.range.clone(),
            len: self.len,
        }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Iter<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        self.range.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> DoubleEndedIterator for Iter<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        self.range.next_back()
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> FusedIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

/// In-order iterator with mutable values.
pub struct IterMut<'a, K, V, S, Idx: Index> {
    storage: &'a mut S,
    front: Idx,
    back: Idx,
    len: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> IterMut<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn entry(&mut self, idx: Idx) -> (&'a K, &'a mut V) {
        // Safety: idx is linked; each node is visited exactly once, so the
        // extended references never alias
        let n = unsafe { self.storage.get_unchecked_mut(idx) };
        unsafe { (&*(&n.key as *const K), &mut *(&mut n.value as *mut V)) }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for IterMut<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let idx = self.front;
        self.front = successor(&*self.storage, idx);
        Some(self.entry(idx))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> DoubleEndedIterator for IterMut<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let idx = self.back;
        self.back = predecessor(&*self.storage, idx, Idx::NONE);
        Some(self.entry(idx))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for IterMut<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

/// In-order iterator over keys.
pub struct Keys<'a, K, V, S, Idx: Index> {
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Keys<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> DoubleEndedIterator for Keys<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<&'a K> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Keys<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

/// In-order iterator over values.
pub struct Values<'a, K, V, S, Idx: Index> {
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Values<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> DoubleEndedIterator for Values<'a, K, V, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<&'a V> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Values<'a, K, V, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
}

/// Owning in-order iterator.
pub struct IntoIter<K, V, C, S, Idx: Index>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    tree: RbTree<K, V, C, S, Idx>,
}

impl<K, V, C, S, Idx: Index> Iterator for IntoIter<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.tree.pop_first()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tree.len, Some(self.tree.len))
    }
}

impl<K, V, C, S, Idx: Index> DoubleEndedIterator for IntoIter<K, V, C, S, Idx>
where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<(K, V)> {
        self.tree.pop_last()
    }
}

impl<K, V, C, S, Idx: Index> ExactSizeIterator for IntoIter<K, V, C, S, Idx> where
    S: Storage<RbNode<K, V, Idx>, Index = Idx>
{
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

    const COUNT: u64 = 100_000;

    #[test]
    #[ignore]
    fn bench_rbtree_insert_find_erase() {
        let mut tree: RbTree<u64, u64> = RbTree::new();
        let mut insert = Histogram::<u64>::new(3).unwrap();
        let mut find = Histogram::<u64>::new(3).unwrap();
        let mut erase = Histogram::<u64>::new(3).unwrap();

        let key = |i: u64| i.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 16;

        for i in 0..COUNT {
            let start = rdtscp();
            tree.insert_unique(key(i), i);
            insert.record(rdtscp() - start).unwrap();
        }
        for i in 0..COUNT {
            let start = rdtscp();
            let _ = std::hint::black_box(tree.find(&key(i)));
            find.record(rdtscp() - start).unwrap();
        }
        for i in 0..COUNT {
            let start = rdtscp();
            let _ = std::hint::black_box(tree.erase_unique(&key(i)));
            erase.record(rdtscp() - start).unwrap();
        }

        print_histogram("insert_unique", &insert);
        print_histogram("find", &find);
        print_histogram("erase_unique", &erase);
    }
}
