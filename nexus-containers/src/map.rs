//! Ordered maps and sets over [`RbTree`].
//!
//! [`OrderedMap`] and [`OrderedSet`] keep unique keys;
//! [`OrderedMultiMap`] and [`OrderedMultiSet`] keep duplicates in insertion
//! order among equivalent keys. All four store their nodes in a `slab` and
//! order keys with a [`Compare`] (default [`Less`]).
//!
//! # Example
//!
//! ```
//! use nexus_containers::{OrderedMap, OrderedMultiSet};
//!
//! let mut scores: OrderedMap<&str, u32> = OrderedMap::new();
//! scores.insert("bob", 3);
//! *scores.entry("alice").or_insert(0) += 5;
//! assert_eq!(scores.insert("bob", 4), Some(3));
//! assert!(scores.keys().copied().eq(["alice", "bob"]));
//!
//! let bag: OrderedMultiSet<u8> = [3, 1, 3, 2, 3].into_iter().collect();
//! assert_eq!(bag.count(&3), 3);
//! assert!(bag.iter().copied().eq([1, 2, 3, 3, 3]));
//! ```

use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;
use core::mem;

use crate::compare::{Compare, Less};
use crate::error::{handle_error, Error, Result};
use crate::rbtree::{self, InsertPos, RbTree, SlabRbStorage};
use crate::Index;

/// In-order iterator over a map.
pub type Iter<'a, K, V> = rbtree::Iter<'a, K, V, SlabRbStorage<K, V>, usize>;
/// In-order iterator with mutable values.
pub type IterMut<'a, K, V> = rbtree::IterMut<'a, K, V, SlabRbStorage<K, V>, usize>;
/// In-order iterator over map keys.
pub type Keys<'a, K, V> = rbtree::Keys<'a, K, V, SlabRbStorage<K, V>, usize>;
/// In-order iterator over map values.
pub type Values<'a, K, V> = rbtree::Values<'a, K, V, SlabRbStorage<K, V>, usize>;
/// Iterator over a run of map entries.
pub type Range<'a, K, V> = rbtree::Range<'a, K, V, SlabRbStorage<K, V>, usize>;
/// Owning iterator over a map.
pub type IntoIter<K, V, C> = rbtree::IntoIter<K, V, C, SlabRbStorage<K, V>, usize>;

// =============================================================================
// OrderedMap
// =============================================================================

/// Sorted map with unique keys.
pub struct OrderedMap<K, V, C = Less> {
    tree: RbTree<K, V, C>,
}

impl<K, V> OrderedMap<K, V> {
    /// Creates an empty map.
    #[inline]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }
}

impl<K, V, C> OrderedMap<K, V, C> {
    /// Creates an empty map ordered by `cmp`.
    #[inline]
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: RbTree::with_comparator(cmp),
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the entry with the smallest key.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first()
    }

    /// Returns the entry with the largest key.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last()
    }

    /// Removes and returns the entry with the smallest key.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first()
    }

    /// Removes and returns the entry with the largest key.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last()
    }

    /// Returns an in-order iterator.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.tree.iter()
    }

    /// Returns an in-order iterator with mutable values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.tree.iter_mut()
    }

    /// Returns an in-order iterator over keys.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.tree.keys()
    }

    /// Returns an in-order iterator over values.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V> {
        self.tree.values()
    }

    /// Returns the underlying tree.
    #[inline]
    pub fn as_tree(&self) -> &RbTree<K, V, C> {
        &self.tree
    }
}

impl<K, V, C: Compare<K>> OrderedMap<K, V, C> {
    /// Inserts `value` under `key`. Returns the previous value, keeping the
    /// original key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.unique_pos(&key) {
            Ok(pos) => {
                self.tree.insert_at(pos, key, value);
                None
            }
            Err(idx) => Some(mem::replace(self.tree.value_mut(idx), value)),
        }
    }

    /// Gets the entry for `key`.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, C> {
        match self.tree.unique_pos(&key) {
            Ok(pos) => Entry::Vacant(VacantEntry {
                tree: &mut self.tree,
                key,
                pos,
            }),
            Err(idx) => Entry::Occupied(OccupiedEntry {
                tree: &mut self.tree,
                idx,
            }),
        }
    }

    /// Returns the value for `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.find(key).map(|idx| self.tree.entry_at(idx).1)
    }

    /// Returns the stored key and value for `key`.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.find(key).map(|idx| self.tree.entry_at(idx))
    }

    /// Returns the value for `key` mutably.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let idx = self.tree.find(key)?;
        Some(self.tree.value_mut(idx))
    }

    /// Checked lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    #[inline]
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Checked mutable lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    #[inline]
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map holds `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.contains(key)
    }

    /// Removes `key` and returns its value.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key).map(|(_, v)| v)
    }

    /// Removes `key` and returns the stored entry.
    #[inline]
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key)
    }

    /// Iterates from the first key not less than `key` to the end.
    #[inline]
    pub fn lower_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.range(self.tree.lower_bound(key), usize::NONE)
    }

    /// Iterates from the first key greater than `key` to the end.
    #[inline]
    pub fn upper_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.range(self.tree.upper_bound(key), usize::NONE)
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut idx = self.tree.first_index();
        while idx != usize::NONE {
            let next = self.tree.next(idx);
            let keep = match self.tree.get_mut(idx) {
                Some((k, v)) => f(k, v),
                None => true,
            };
            if !keep {
                self.tree.erase(idx);
            }
            idx = next;
        }
    }
}

impl<K, V, C: Default> Default for OrderedMap<K, V, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for OrderedMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for OrderedMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.tree, f)
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for OrderedMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, V: Eq, C> Eq for OrderedMap<K, V, C> {}

impl<K, V, C, Q> core::ops::Index<&Q> for OrderedMap<K, V, C>
where
    K: Borrow<Q>,
    Q: ?Sized,
    C: Compare<K> + Compare<Q>,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is absent.
    fn index(&self, key: &Q) -> &V {
        self.at(key).unwrap_or_else(|e| handle_error(e))
    }
}

impl<K, V, C: Compare<K> + Default> FromIterator<(K, V)> for OrderedMap<K, V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, C: Compare<K>> Extend<(K, V)> for OrderedMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C> IntoIterator for OrderedMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a OrderedMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut OrderedMap<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// =============================================================================
// Entry API
// =============================================================================

/// A view into a single map entry.
pub enum Entry<'a, K, V, C> {
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V, C>),
    /// The key is absent.
    Vacant(VacantEntry<'a, K, V, C>),
}

/// An entry whose key is present.
pub struct OccupiedEntry<'a, K, V, C> {
    tree: &'a mut RbTree<K, V, C>,
    idx: usize,
}

/// An entry whose key is absent; remembers where the key will go.
pub struct VacantEntry<'a, K, V, C> {
    tree: &'a mut RbTree<K, V, C>,
    key: K,
    pos: InsertPos<usize>,
}

impl<'a, K, V, C: Compare<K>> Entry<'a, K, V, C> {
    /// Returns the entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(e) => e.key(),
            Entry::Vacant(e) => &e.key,
        }
    }

    /// Runs `f` on the value if the key is present.
    pub fn and_modify<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        if let Entry::Occupied(ref mut e) = self {
            f(e.get_mut());
        }
        self
    }

    /// Inserts `default` if the key is absent.
    pub fn or_insert(self, default: V) -> &'a mut V {
        self.or_insert_with(|| default)
    }

    /// Inserts the result of `f` if the key is absent.
    pub fn or_insert_with<F: FnOnce() -> V>(self, f: F) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(f()),
        }
    }

    /// Inserts `V::default()` if the key is absent.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(V::default)
    }
}

impl<'a, K, V, C: Compare<K>> OccupiedEntry<'a, K, V, C> {
    /// Returns the stored key.
    #[inline]
    pub fn key(&self) -> &K {
        self.tree.entry_at(self.idx).0
    }

    /// Returns the value.
    #[inline]
    pub fn get(&self) -> &V {
        self.tree.entry_at(self.idx).1
    }

    /// Returns the value mutably.
    #[inline]
    pub fn get_mut(&mut self) -> &mut V {
        self.tree.value_mut(self.idx)
    }

    /// Converts into a mutable reference tied to the map.
    #[inline]
    pub fn into_mut(self) -> &'a mut V {
        self.tree.value_mut(self.idx)
    }

    /// Replaces the value and returns the old one.
    #[inline]
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry and returns the value.
    #[inline]
    pub fn remove(self) -> V {
        self.tree.erase(self.idx).1
    }

    /// Removes the entry and returns the stored key and value.
    #[inline]
    pub fn remove_entry(self) -> (K, V) {
        self.tree.erase(self.idx)
    }
}

impl<'a, K, V, C: Compare<K>> VacantEntry<'a, K, V, C> {
    /// Returns the key that would be inserted.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes the key back.
    #[inline]
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts `value` and returns a reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let tree = self.tree;
        let idx = tree.insert_at(self.pos, self.key, value);
        tree.value_mut(idx)
    }
}

// =============================================================================
// OrderedSet
// =============================================================================

/// Sorted set of unique keys.
pub struct OrderedSet<K, C = Less> {
    tree: RbTree<K, (), C>,
}

impl<K> OrderedSet<K> {
    /// Creates an empty set.
    #[inline]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }
}

impl<K, C> OrderedSet<K, C> {
    /// Creates an empty set ordered by `cmp`.
    #[inline]
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: RbTree::with_comparator(cmp),
        }
    }

    /// Returns the number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Removes every key.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the smallest key.
    #[inline]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|(k, _)| k)
    }

    /// Returns the largest key.
    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|(k, _)| k)
    }

    /// Removes and returns the smallest key.
    #[inline]
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first().map(|(k, _)| k)
    }

    /// Removes and returns the largest key.
    #[inline]
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last().map(|(k, _)| k)
    }

    /// Returns an in-order iterator.
    #[inline]
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter {
            inner: self.tree.keys(),
        }
    }
}

impl<K, C: Compare<K>> OrderedSet<K, C> {
    /// Adds `key`. Returns `false` if an equivalent key was present; the
    /// stored key is kept.
    #[inline]
    pub fn insert(&mut self, key: K) -> bool {
        self.tree.insert_unique(key, ()).1
    }

    /// Returns `true` if the set holds `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.contains(key)
    }

    /// Returns the stored key equivalent to `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.find(key).map(|idx| self.tree.entry_at(idx).0)
    }

    /// Removes `key`. Returns `true` if it was present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key).is_some()
    }

    /// Removes and returns the stored key equivalent to `key`.
    #[inline]
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key).map(|(k, _)| k)
    }

    /// Iterates from the first key not less than `key`.
    #[inline]
    pub fn lower_bound<Q>(&self, key: &Q) -> SetRange<'_, K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        SetRange {
            inner: self.tree.range(self.tree.lower_bound(key), usize::NONE),
        }
    }

    /// Iterates from the first key greater than `key`.
    #[inline]
    pub fn upper_bound<Q>(&self, key: &Q) -> SetRange<'_, K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        SetRange {
            inner: self.tree.range(self.tree.upper_bound(key), usize::NONE),
        }
    }
}

impl<K, C: Default> Default for OrderedSet<K, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, C: Clone> Clone for OrderedSet<K, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, C> fmt::Debug for OrderedSet<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, C> PartialEq for OrderedSet<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, C> Eq for OrderedSet<K, C> {}

impl<K, C: Compare<K> + Default> FromIterator<K> for OrderedSet<K, C> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<K, C: Compare<K>> Extend<K> for OrderedSet<K, C> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

impl<K, C> IntoIterator for OrderedSet<K, C> {
    type Item = K;
    type IntoIter = SetIntoIter<K, C>;

    fn into_iter(self) -> Self::IntoIter {
        SetIntoIter {
            inner: self.tree.into_iter(),
        }
    }
}

impl<'a, K, C> IntoIterator for &'a OrderedSet<K, C> {
    type Item = &'a K;
    type IntoIter = SetIter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// OrderedMultiMap
// =============================================================================

/// Sorted map allowing duplicate keys. Equivalent keys iterate in
/// insertion order.
pub struct OrderedMultiMap<K, V, C = Less> {
    tree: RbTree<K, V, C>,
}

impl<K, V> OrderedMultiMap<K, V> {
    /// Creates an empty multimap.
    #[inline]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }
}

impl<K, V, C> OrderedMultiMap<K, V, C> {
    /// Creates an empty multimap ordered by `cmp`.
    #[inline]
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: RbTree::with_comparator(cmp),
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the multimap is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the first entry.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first()
    }

    /// Returns the last entry.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last()
    }

    /// Removes and returns the first entry.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first()
    }

    /// Removes and returns the last entry.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last()
    }

    /// Returns an in-order iterator.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.tree.iter()
    }

    /// Returns an in-order iterator with mutable values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.tree.iter_mut()
    }

    /// Returns an in-order iterator over keys, duplicates included.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.tree.keys()
    }

    /// Returns an in-order iterator over values.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V> {
        self.tree.values()
    }
}

impl<K, V, C: Compare<K>> OrderedMultiMap<K, V, C> {
    /// Inserts after every entry with an equivalent key.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.tree.insert_multi(key, value);
    }

    /// Number of entries with a key equivalent to `key`.
    #[inline]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.count_multi(key)
    }

    /// Returns `true` if some entry has `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.contains(key)
    }

    /// Returns the first value stored under `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.find(key).map(|idx| self.tree.entry_at(idx).1)
    }

    /// Iterates over every entry with a key equivalent to `key`.
    #[inline]
    pub fn equal_range<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let (first, last) = self.tree.equal_range_multi(key);
        self.tree.range(first, last)
    }

    /// Removes every entry with `key`. Returns how many went.
    #[inline]
    pub fn remove_all<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_multi(key)
    }

    /// Removes the first entry with `key` and returns its value.
    #[inline]
    pub fn remove_one<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key).map(|(_, v)| v)
    }

    /// Iterates from the first key not less than `key`.
    #[inline]
    pub fn lower_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.range(self.tree.lower_bound(key), usize::NONE)
    }

    /// Iterates from the first key greater than `key`.
    #[inline]
    pub fn upper_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.range(self.tree.upper_bound(key), usize::NONE)
    }
}

impl<K, V, C: Default> Default for OrderedMultiMap<K, V, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for OrderedMultiMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for OrderedMultiMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.tree, f)
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for OrderedMultiMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, V: Eq, C> Eq for OrderedMultiMap<K, V, C> {}

impl<K, V, C: Compare<K> + Default> FromIterator<(K, V)> for OrderedMultiMap<K, V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, C: Compare<K>> Extend<(K, V)> for OrderedMultiMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C> IntoIterator for OrderedMultiMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a OrderedMultiMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// OrderedMultiSet
// =============================================================================

/// Sorted bag of keys.
pub struct OrderedMultiSet<K, C = Less> {
    tree: RbTree<K, (), C>,
}

impl<K> OrderedMultiSet<K> {
    /// Creates an empty multiset.
    #[inline]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }
}

impl<K, C> OrderedMultiSet<K, C> {
    /// Creates an empty multiset ordered by `cmp`.
    #[inline]
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: RbTree::with_comparator(cmp),
        }
    }

    /// Returns the number of keys, duplicates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the multiset is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Removes every key.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the smallest key.
    #[inline]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|(k, _)| k)
    }

    /// Returns the largest key.
    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|(k, _)| k)
    }

    /// Removes and returns the smallest key.
    #[inline]
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first().map(|(k, _)| k)
    }

    /// Removes and returns the largest key.
    #[inline]
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last().map(|(k, _)| k)
    }

    /// Returns an in-order iterator.
    #[inline]
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter {
            inner: self.tree.keys(),
        }
    }
}

impl<K, C: Compare<K>> OrderedMultiSet<K, C> {
    /// Adds `key` after every equivalent key.
    #[inline]
    pub fn insert(&mut self, key: K) {
        self.tree.insert_multi(key, ());
    }

    /// Number of keys equivalent to `key`.
    #[inline]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.count_multi(key)
    }

    /// Returns `true` if some key is equivalent to `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.contains(key)
    }

    /// Iterates over every key equivalent to `key`.
    #[inline]
    pub fn equal_range<Q>(&self, key: &Q) -> SetRange<'_, K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        let (first, last) = self.tree.equal_range_multi(key);
        SetRange {
            inner: self.tree.range(first, last),
        }
    }

    /// Removes every key equivalent to `key`. Returns how many went.
    #[inline]
    pub fn remove_all<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_multi(key)
    }

    /// Removes one key equivalent to `key`. Returns `true` if one was present.
    #[inline]
    pub fn remove_one<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        self.tree.erase_unique(key).is_some()
    }

    /// Iterates from the first key not less than `key`.
    #[inline]
    pub fn lower_bound<Q>(&self, key: &Q) -> SetRange<'_, K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        SetRange {
            inner: self.tree.range(self.tree.lower_bound(key), usize::NONE),
        }
    }

    /// Iterates from the first key greater than `key`.
    #[inline]
    pub fn upper_bound<Q>(&self, key: &Q) -> SetRange<'_, K>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Compare<Q>,
    {
        SetRange {
            inner: self.tree.range(self.tree.upper_bound(key), usize::NONE),
        }
    }
}

impl<K, C: Default> Default for OrderedMultiSet<K, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Clone, C: Clone> Clone for OrderedMultiSet<K, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, C> fmt::Debug for OrderedMultiSet<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, C> PartialEq for OrderedMultiSet<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, C> Eq for OrderedMultiSet<K, C> {}

impl<K, C: Compare<K> + Default> FromIterator<K> for OrderedMultiSet<K, C> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<K, C: Compare<K>> Extend<K> for OrderedMultiSet<K, C> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

impl<K, C> IntoIterator for OrderedMultiSet<K, C> {
    type Item = K;
    type IntoIter = SetIntoIter<K, C>;

    fn into_iter(self) -> Self::IntoIter {
        SetIntoIter {
            inner: self.tree.into_iter(),
        }
    }
}

impl<'a, K, C> IntoIterator for &'a OrderedMultiSet<K, C> {
    type Item = &'a K;
    type IntoIter = SetIter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Set iterators
// =============================================================================

/// In-order iterator over set keys.
pub struct SetIter<'a, K> {
    inner: Keys<'a, K, ()>,
}

impl<'a, K> Iterator for SetIter<'a, K> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> DoubleEndedIterator for SetIter<'_, K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K> ExactSizeIterator for SetIter<'_, K> {}

impl<K> FusedIterator for SetIter<'_, K> {}

/// Iterator over a run of set keys.
pub struct SetRange<'a, K> {
    inner: Range<'a, K, ()>,
}

impl<'a, K> Iterator for SetRange<'a, K> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }
}

impl<K> DoubleEndedIterator for SetRange<'_, K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K> FusedIterator for SetRange<'_, K> {}

/// Owning in-order iterator over set keys.
pub struct SetIntoIter<K, C> {
    inner: IntoIter<K, (), C>,
}

impl<K, C> Iterator for SetIntoIter<K, C> {
    type Item = K;

    #[inline]
    fn next(&mut self) -> Option<K> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, C> DoubleEndedIterator for SetIntoIter<K, C> {
    #[inline]
    fn next_back(&mut self) -> Option<K> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, C> ExactSizeIterator for SetIntoIter<K, C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Greater;

    #[test]
    fn map_insert_replaces_value_keeps_key() {
        let mut map: OrderedMap<String, u32> = OrderedMap::new();
        assert_eq!(map.insert("a".into(), 1), None);
        assert_eq!(map.insert("a".into(), 2), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&2));
        assert_eq!(map["a"], 2);
    }

    #[test]
    fn map_at_reports_missing_key() {
        let mut map: OrderedMap<u32, u32> = [(1, 10), (2, 20)].into_iter().collect();
        assert_eq!(map.at(&1), Ok(&10));
        assert_eq!(map.at(&3), Err(Error::KeyNotFound));
        *map.at_mut(&2).unwrap() += 1;
        assert_eq!(map.get(&2), Some(&21));
        assert!(map.at_mut(&9).is_err());
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn map_index_panics_on_missing_key() {
        let map: OrderedMap<u32, u32> = OrderedMap::new();
        let _ = map[&7];
    }

    #[test]
    fn map_entry() {
        let mut counts: OrderedMap<char, usize> = OrderedMap::new();
        for c in "hello world".chars().filter(|c| c.is_alphabetic()) {
            *counts.entry(c).or_default() += 1;
        }
        assert_eq!(counts.get(&'l'), Some(&3));
        assert_eq!(counts.get(&'o'), Some(&2));

        counts.entry('h').and_modify(|n| *n += 10).or_insert(0);
        assert_eq!(counts[&'h'], 11);

        match counts.entry('z') {
            Entry::Vacant(v) => {
                assert_eq!(v.key(), &'z');
                *v.insert(5) += 1;
            }
            Entry::Occupied(_) => unreachable!(),
        }
        assert_eq!(counts[&'z'], 6);

        match counts.entry('z') {
            Entry::Occupied(mut o) => {
                assert_eq!(o.insert(1), 6);
                assert_eq!(o.remove(), 1);
            }
            Entry::Vacant(_) => unreachable!(),
        }
        assert!(!counts.contains_key(&'z'));
        counts.as_tree().validate().unwrap();
    }

    #[test]
    fn map_bounds_and_remove() {
        let mut map: OrderedMap<u32, &str> =
            [(10, "a"), (20, "b"), (30, "c")].into_iter().collect();
        assert!(map.lower_bound(&20).map(|(k, _)| *k).eq([20, 30]));
        assert!(map.upper_bound(&20).map(|(k, _)| *k).eq([30]));
        assert!(map.lower_bound(&15).rev().map(|(k, _)| *k).eq([30, 20]));
        assert_eq!(map.upper_bound(&30).count(), 0);

        assert_eq!(map.remove(&20), Some("b"));
        assert_eq!(map.remove(&20), None);
        assert_eq!(map.remove_entry(&10), Some((10, "a")));
        assert_eq!(map.first_key_value(), Some((&30, &"c")));
    }

    #[test]
    fn map_retain_and_iter_mut() {
        let mut map: OrderedMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
        map.retain(|k, _| k % 3 == 0);
        for v in map.values() {
            assert_eq!(v % 3, 0);
        }
        for (_, v) in &mut map {
            *v += 1;
        }
        assert!(map.into_iter().eq([(0, 1), (3, 4), (6, 7), (9, 10)]));
    }

    #[test]
    fn map_equality_and_debug() {
        let a: OrderedMap<u32, u32> = [(2, 2), (1, 1)].into_iter().collect();
        let b: OrderedMap<u32, u32> = [(1, 1), (2, 2)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), "{1: 1, 2: 2}");
        let c = a.clone();
        assert_eq!(c, b);
        assert_eq!(OrderedMap::<u32, u32>::default().len(), 0);
    }

    #[test]
    fn set_basics() {
        let mut set: OrderedSet<u32> = OrderedSet::new();
        assert!(set.insert(3));
        assert!(set.insert(1));
        assert!(!set.insert(3));
        assert!(set.contains(&1));
        assert_eq!(set.get(&3), Some(&3));
        assert!(set.iter().copied().eq([1, 3]));
        assert!(set.lower_bound(&2).copied().eq([3]));
        assert!(set.remove(&1));
        assert!(!set.remove(&1));
        assert_eq!(set.take(&3), Some(3));
        assert!(set.is_empty());
        assert_eq!(format!("{:?}", [2, 1].into_iter().collect::<OrderedSet<u32>>()), "{1, 2}");
    }

    #[test]
    fn set_with_comparator() {
        let mut set: OrderedSet<u32, Greater> = OrderedSet::with_comparator(Greater);
        set.extend([1, 5, 3]);
        assert!(set.iter().copied().eq([5, 3, 1]));
        assert_eq!(set.first(), Some(&5));
        assert_eq!(set.pop_last(), Some(1));
        assert!(set.into_iter().eq([5, 3]));
    }

    #[test]
    fn multimap_keeps_insertion_order_within_key() {
        let mut map: OrderedMultiMap<&str, u32> = OrderedMultiMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        map.insert("b", 3);
        map.insert("b", 4);
        assert_eq!(map.count("b"), 3);
        assert!(map.equal_range("b").map(|(_, v)| *v).eq([1, 3, 4]));
        assert_eq!(map.get("b"), Some(&1));
        assert_eq!(map.remove_one("b"), Some(1));
        assert_eq!(map.remove_all("b"), 2);
        assert_eq!(map.remove_all("b"), 0);
        assert!(map.iter().eq([(&"a", &2)]));
    }

    #[test]
    fn multiset_counts() {
        let mut bag: OrderedMultiSet<u32> = [5, 1, 5, 3, 5].into_iter().collect();
        assert_eq!(bag.len(), 5);
        assert_eq!(bag.count(&5), 3);
        assert!(bag.equal_range(&5).copied().eq([5, 5, 5]));
        assert!(bag.upper_bound(&1).copied().eq([3, 5, 5, 5]));
        assert!(bag.remove_one(&5));
        assert_eq!(bag.count(&5), 2);
        assert_eq!(bag.remove_all(&5), 2);
        assert!(bag.iter().copied().eq([1, 3]));
        assert_eq!(bag.clone(), bag);
    }
}
