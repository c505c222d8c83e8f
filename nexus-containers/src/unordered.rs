//! Hashed maps and sets over [`HashTable`].
//!
//! Keys are hashed with `H` (default `ahash::RandomState`) and compared
//! with [`Eq`]. Iteration order follows the buckets and is unspecified.
//!
//! # Example
//!
//! ```
//! use nexus_containers::{HashTableBuilder, UnorderedMap};
//!
//! let mut ages: UnorderedMap<&str, u32> = UnorderedMap::new();
//! ages.insert("ann", 31);
//! *ages.entry("bo").or_insert(20) += 1;
//! assert_eq!(ages.get("bo"), Some(&21));
//!
//! let tuned: UnorderedMap<u64, u64> = HashTableBuilder::new()
//!     .buckets(1000)
//!     .max_load_factor(0.75)
//!     .build_map()
//!     .unwrap();
//! assert_eq!(tuned.bucket_count(), 1361);
//! ```

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;

use crate::compare::EqualTo;
use crate::error::{handle_error, Error, Result};
use crate::hashtable::{self, HashTable, SlabHashStorage, DEFAULT_BUCKETS, DEFAULT_MAX_LOAD_FACTOR};

type Table<K, V, H> = HashTable<K, V, H, EqualTo, SlabHashStorage<K, V>, usize>;

/// Iterator over map entries.
pub type Iter<'a, K, V> = hashtable::Iter<'a, K, V, SlabHashStorage<K, V>, usize>;
/// Iterator with mutable values.
pub type IterMut<'a, K, V> = hashtable::IterMut<'a, K, V, SlabHashStorage<K, V>, usize>;
/// Iterator over map keys.
pub type Keys<'a, K, V> = hashtable::Keys<'a, K, V, SlabHashStorage<K, V>, usize>;
/// Iterator over map values.
pub type Values<'a, K, V> = hashtable::Values<'a, K, V, SlabHashStorage<K, V>, usize>;
/// Iterator over the entries sharing one key.
pub type EqualRange<'a, K, V> = hashtable::Chain<'a, K, V, SlabHashStorage<K, V>, usize>;
/// Draining iterator over map entries.
pub type Drain<'a, K, V, H> =
    hashtable::Drain<'a, K, V, H, EqualTo, SlabHashStorage<K, V>, usize>;
/// Owning iterator over map entries.
pub type IntoIter<K, V, H> = hashtable::IntoIter<K, V, H, EqualTo, SlabHashStorage<K, V>, usize>;

// =============================================================================
// Builder
// =============================================================================

/// Configures a hashed container before it is created.
///
/// ```
/// use nexus_containers::{Error, HashTableBuilder, UnorderedSet};
///
/// let err = HashTableBuilder::new()
///     .max_load_factor(0.0)
///     .build_set::<u32>()
///     .unwrap_err();
/// assert_eq!(err, Error::InvalidLoadFactor(0.0));
/// ```
#[derive(Debug, Clone)]
pub struct HashTableBuilder<H = ahash::RandomState> {
    buckets: usize,
    max_load_factor: f32,
    hasher: H,
}

impl HashTableBuilder {
    /// Starts from the defaults: 101 buckets, load factor 1.0 and a
    /// randomly seeded `ahash` hasher.
    pub fn new() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            hasher: ahash::RandomState::new(),
        }
    }
}

impl Default for HashTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HashTableBuilder<H> {
    /// Initial bucket count, rounded up to a tabulated prime.
    pub fn buckets(mut self, count: usize) -> Self {
        self.buckets = count;
        self
    }

    /// Maximum load factor. Checked by `build`.
    pub fn max_load_factor(mut self, ml: f32) -> Self {
        self.max_load_factor = ml;
        self
    }

    /// Replaces the hasher builder.
    pub fn hasher<H2>(self, hasher: H2) -> HashTableBuilder<H2> {
        HashTableBuilder {
            buckets: self.buckets,
            max_load_factor: self.max_load_factor,
            hasher,
        }
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLoadFactor`] if the load factor is NaN or `<= 0`,
    /// or an allocation error for the bucket array.
    pub fn build<K, V>(self) -> Result<Table<K, V, H>> {
        let mut table = HashTable::try_with_config(
            self.buckets,
            self.hasher,
            EqualTo,
            SlabHashStorage::default(),
        )?;
        table.set_max_load_factor(self.max_load_factor)?;
        Ok(table)
    }

    /// Builds an [`UnorderedMap`].
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn build_map<K, V>(self) -> Result<UnorderedMap<K, V, H>> {
        self.build().map(|table| UnorderedMap { table })
    }

    /// Builds an [`UnorderedSet`].
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn build_set<K>(self) -> Result<UnorderedSet<K, H>> {
        self.build().map(|table| UnorderedSet { table })
    }

    /// Builds an [`UnorderedMultiMap`].
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn build_multimap<K, V>(self) -> Result<UnorderedMultiMap<K, V, H>> {
        self.build().map(|table| UnorderedMultiMap { table })
    }

    /// Builds an [`UnorderedMultiSet`].
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn build_multiset<K>(self) -> Result<UnorderedMultiSet<K, H>> {
        self.build().map(|table| UnorderedMultiSet { table })
    }
}

// Shared forwarding for the four wrappers.
macro_rules! table_accessors {
    () => {
        /// Returns the number of entries.
        #[inline]
        pub fn len(&self) -> usize {
            self.table.len()
        }

        /// Returns `true` if empty.
        #[inline]
        pub fn is_empty(&self) -> bool {
            self.table.is_empty()
        }

        /// Removes every entry. The bucket count is kept.
        #[inline]
        pub fn clear(&mut self) {
            self.table.clear();
        }

        /// Returns the number of buckets.
        #[inline]
        pub fn bucket_count(&self) -> usize {
            self.table.bucket_count()
        }

        /// Average entries per bucket.
        #[inline]
        pub fn load_factor(&self) -> f32 {
            self.table.load_factor()
        }

        /// Load factor above which inserts grow the table.
        #[inline]
        pub fn max_load_factor(&self) -> f32 {
            self.table.max_load_factor()
        }

        /// Sets the maximum load factor.
        ///
        /// # Errors
        ///
        /// [`Error::InvalidLoadFactor`] for NaN or values `<= 0`.
        #[inline]
        pub fn set_max_load_factor(&mut self, ml: f32) -> Result<()> {
            self.table.set_max_load_factor(ml)
        }
    };
}

macro_rules! hashed_accessors {
    () => {
        /// Resizes the bucket array for `count` buckets.
        #[inline]
        pub fn rehash(&mut self, count: usize) {
            self.table.rehash(count);
        }

        /// Sizes the table for `count` entries.
        #[inline]
        pub fn reserve(&mut self, count: usize) {
            self.table.reserve(count);
        }
    };
}

// =============================================================================
// UnorderedMap
// =============================================================================

/// Hash map with unique keys.
pub struct UnorderedMap<K, V, H = ahash::RandomState> {
    table: Table<K, V, H>,
}

impl<K, V> UnorderedMap<K, V> {
    /// Creates an empty map.
    #[inline]
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    /// Creates an empty map with at least `count` buckets.
    #[inline]
    pub fn with_buckets(count: usize) -> Self {
        Self {
            table: HashTable::with_buckets(count),
        }
    }
}

impl<K, V, H> UnorderedMap<K, V, H> {
    /// Creates an empty map using `hasher`.
    #[inline]
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }

    table_accessors!();

    /// Returns an iterator over entries.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }

    /// Returns an iterator with mutable values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.table.iter_mut()
    }

    /// Returns an iterator over keys.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.table.keys()
    }

    /// Returns an iterator over values.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V> {
        self.table.values()
    }

    /// Removes every entry, yielding them.
    #[inline]
    pub fn drain(&mut self) -> Drain<'_, K, V, H> {
        self.table.drain()
    }

    /// Returns the underlying table.
    #[inline]
    pub fn as_table(&self) -> &Table<K, V, H> {
        &self.table
    }
}

impl<K: Hash + Eq, V, H: BuildHasher> UnorderedMap<K, V, H> {
    hashed_accessors!();

    /// Inserts `value` under `key`. Returns the previous value, keeping the
    /// original key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.table.find(&key) {
            Some(idx) => Some(mem::replace(self.table.value_mut(idx), value)),
            None => {
                self.table.insert_unique(key, value);
                None
            }
        }
    }

    /// Gets the entry for `key`.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, H> {
        match self.table.find(&key) {
            Some(idx) => Entry::Occupied(OccupiedEntry {
                table: &mut self.table,
                idx,
            }),
            None => Entry::Vacant(VacantEntry {
                table: &mut self.table,
                key,
            }),
        }
    }

    /// Returns the value for `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(key).map(|idx| self.table.entry_at(idx).1)
    }

    /// Returns the value for `key` mutably.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.table.find(key)?;
        Some(self.table.value_mut(idx))
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
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map holds `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(key)
    }

    /// Removes `key` and returns its value.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key).map(|(_, v)| v)
    }

    /// Removes `key` and returns the stored entry.
    #[inline]
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key)
    }
}

impl<K, V, H: Default> Default for UnorderedMap<K, V, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K: Clone, V: Clone, H: Clone> Clone for UnorderedMap<K, V, H> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H> fmt::Debug for UnorderedMap<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.table, f)
    }
}

impl<K: Hash + Eq, V: PartialEq, H: BuildHasher> PartialEq for UnorderedMap<K, V, H> {
    fn eq(&self, other: &Self) -> bool {
        self.table.equal_unique(&other.table)
    }
}

impl<K: Hash + Eq, V: Eq, H: BuildHasher> Eq for UnorderedMap<K, V, H> {}

impl<K, V, H, Q> core::ops::Index<&Q> for UnorderedMap<K, V, H>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    H: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is absent.
    fn index(&self, key: &Q) -> &V {
        self.at(key).unwrap_or_else(|e| handle_error(e))
    }
}

impl<K: Hash + Eq, V, H: BuildHasher + Default> FromIterator<(K, V)> for UnorderedMap<K, V, H> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V, H: BuildHasher> Extend<(K, V)> for UnorderedMap<K, V, H> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.table.reserve(self.table.len() + iter.size_hint().0);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, H> IntoIterator for UnorderedMap<K, V, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, H> IntoIterator for &'a UnorderedMap<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H> IntoIterator for &'a mut UnorderedMap<K, V, H> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A view into a single map entry.
pub enum Entry<'a, K, V, H> {
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V, H>),
    /// The key is absent.
    Vacant(VacantEntry<'a, K, V, H>),
}

/// An entry whose key is present.
pub struct OccupiedEntry<'a, K, V, H> {
    table: &'a mut Table<K, V, H>,
    idx: usize,
}

/// An entry whose key is absent.
pub struct VacantEntry<'a, K, V, H> {
    table: &'a mut Table<K, V, H>,
    key: K,
}

impl<'a, K: Hash + Eq, V, H: BuildHasher> Entry<'a, K, V, H> {
    /// Returns the entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(e) => e.table.entry_at(e.idx).0,
            Entry::Vacant(e) => &e.key,
        }
    }

    /// Runs `f` on the value if the key is present.
    pub fn and_modify<F: FnOnce(&mut V)>(mut self, f: F) -> Self {
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

impl<'a, K: Hash + Eq, V, H: BuildHasher> OccupiedEntry<'a, K, V, H> {
    /// Returns the value.
    #[inline]
    pub fn get(&self) -> &V {
        self.table.entry_at(self.idx).1
    }

    /// Returns the value mutably.
    #[inline]
    pub fn get_mut(&mut self) -> &mut V {
        self.table.value_mut(self.idx)
    }

    /// Converts into a mutable reference tied to the map.
    #[inline]
    pub fn into_mut(self) -> &'a mut V {
        self.table.value_mut(self.idx)
    }

    /// Replaces the value and returns the old one.
    #[inline]
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry and returns the value.
    #[inline]
    pub fn remove(self) -> V {
        self.table.erase(self.idx).1
    }
}

impl<'a, K: Hash + Eq, V, H: BuildHasher> VacantEntry<'a, K, V, H> {
    /// Inserts `value` and returns a reference to it. May grow the table.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        let (idx, _) = table.insert_unique(self.key, value);
        table.value_mut(idx)
    }
}

// =============================================================================
// UnorderedSet
// =============================================================================

/// Hash set.
pub struct UnorderedSet<K, H = ahash::RandomState> {
    table: Table<K, (), H>,
}

impl<K> UnorderedSet<K> {
    /// Creates an empty set.
    #[inline]
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    /// Creates an empty set with at least `count` buckets.
    #[inline]
    pub fn with_buckets(count: usize) -> Self {
        Self {
            table: HashTable::with_buckets(count),
        }
    }
}

impl<K, H> UnorderedSet<K, H> {
    /// Creates an empty set using `hasher`.
    #[inline]
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }

    table_accessors!();

    /// Returns an iterator over keys.
    #[inline]
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter {
            inner: self.table.keys(),
        }
    }

    /// Removes every key, yielding them.
    #[inline]
    pub fn drain(&mut self) -> SetDrain<'_, K, H> {
        SetDrain {
            inner: self.table.drain(),
        }
    }
}

impl<K: Hash + Eq, H: BuildHasher> UnorderedSet<K, H> {
    hashed_accessors!();

    /// Adds `key`. Returns `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, key: K) -> bool {
        self.table.insert_unique(key, ()).1
    }

    /// Returns `true` if the set holds `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(key)
    }

    /// Returns the stored key equal to `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(key).map(|idx| self.table.entry_at(idx).0)
    }

    /// Removes `key`. Returns `true` if it was present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key).is_some()
    }

    /// Removes and returns the stored key equal to `key`.
    #[inline]
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key).map(|(k, _)| k)
    }
}

impl<K, H: Default> Default for UnorderedSet<K, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K: Clone, H: Clone> Clone for UnorderedSet<K, H> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, H> fmt::Debug for UnorderedSet<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, H: BuildHasher> PartialEq for UnorderedSet<K, H> {
    fn eq(&self, other: &Self) -> bool {
        self.table.equal_unique(&other.table)
    }
}

impl<K: Hash + Eq, H: BuildHasher> Eq for UnorderedSet<K, H> {}

impl<K: Hash + Eq, H: BuildHasher + Default> FromIterator<K> for UnorderedSet<K, H> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<K: Hash + Eq, H: BuildHasher> Extend<K> for UnorderedSet<K, H> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

impl<K, H> IntoIterator for UnorderedSet<K, H> {
    type Item = K;
    type IntoIter = SetIntoIter<K, H>;

    fn into_iter(self) -> Self::IntoIter {
        SetIntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, H> IntoIterator for &'a UnorderedSet<K, H> {
    type Item = &'a K;
    type IntoIter = SetIter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// UnorderedMultiMap
// =============================================================================

/// Hash map allowing duplicate keys. Entries sharing a key are adjacent
/// in iteration.
pub struct UnorderedMultiMap<K, V, H = ahash::RandomState> {
    table: Table<K, V, H>,
}

impl<K, V> UnorderedMultiMap<K, V> {
    /// Creates an empty multimap.
    #[inline]
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }
}

impl<K, V, H> UnorderedMultiMap<K, V, H> {
    /// Creates an empty multimap using `hasher`.
    #[inline]
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }

    table_accessors!();

    /// Returns an iterator over entries.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }

    /// Returns an iterator with mutable values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.table.iter_mut()
    }

    /// Removes every entry, yielding them.
    #[inline]
    pub fn drain(&mut self) -> Drain<'_, K, V, H> {
        self.table.drain()
    }
}

impl<K: Hash + Eq, V, H: BuildHasher> UnorderedMultiMap<K, V, H> {
    hashed_accessors!();

    /// Inserts next to any entries with the same key.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.table.insert_multi(key, value);
    }

    /// Number of entries with `key`.
    #[inline]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.count(key)
    }

    /// Returns `true` if some entry has `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(key)
    }

    /// Returns one value stored under `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(key).map(|idx| self.table.entry_at(idx).1)
    }

    /// Iterates over the entries with `key`.
    #[inline]
    pub fn equal_range<Q>(&self, key: &Q) -> EqualRange<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.equal_range(key)
    }

    /// Removes every entry with `key`. Returns how many went.
    #[inline]
    pub fn remove_all<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_multi(key)
    }

    /// Removes one entry with `key` and returns its value.
    #[inline]
    pub fn remove_one<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key).map(|(_, v)| v)
    }
}

impl<K, V, H: Default> Default for UnorderedMultiMap<K, V, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K: Clone, V: Clone, H: Clone> Clone for UnorderedMultiMap<K, V, H> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H> fmt::Debug for UnorderedMultiMap<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.table, f)
    }
}

impl<K: Hash + Eq, V: PartialEq, H: BuildHasher> PartialEq for UnorderedMultiMap<K, V, H> {
    fn eq(&self, other: &Self) -> bool {
        self.table.equal_multi(&other.table)
    }
}

impl<K: Hash + Eq, V: Eq, H: BuildHasher> Eq for UnorderedMultiMap<K, V, H> {}

impl<K: Hash + Eq, V, H: BuildHasher + Default> FromIterator<(K, V)>
    for UnorderedMultiMap<K, V, H>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V, H: BuildHasher> Extend<(K, V)> for UnorderedMultiMap<K, V, H> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, H> IntoIterator for UnorderedMultiMap<K, V, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, H> IntoIterator for &'a UnorderedMultiMap<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// UnorderedMultiSet
// =============================================================================

/// Hash bag.
pub struct UnorderedMultiSet<K, H = ahash::RandomState> {
    table: Table<K, (), H>,
}

impl<K> UnorderedMultiSet<K> {
    /// Creates an empty multiset.
    #[inline]
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }
}

impl<K, H> UnorderedMultiSet<K, H> {
    /// Creates an empty multiset using `hasher`.
    #[inline]
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }

    table_accessors!();

    /// Returns an iterator over keys, duplicates included.
    #[inline]
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter {
            inner: self.table.keys(),
        }
    }
}

impl<K: Hash + Eq, H: BuildHasher> UnorderedMultiSet<K, H> {
    hashed_accessors!();

    /// Adds `key` next to its equals.
    #[inline]
    pub fn insert(&mut self, key: K) {
        self.table.insert_multi(key, ());
    }

    /// Number of copies of `key`.
    #[inline]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.count(key)
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(key)
    }

    /// Iterates over the copies of `key`.
    #[inline]
    pub fn equal_range<Q>(&self, key: &Q) -> impl Iterator<Item = &K> + '_
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.equal_range(key).map(|(k, _)| k)
    }

    /// Removes every copy of `key`. Returns how many went.
    #[inline]
    pub fn remove_all<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_multi(key)
    }

    /// Removes one copy of `key`. Returns `true` if one was present.
    #[inline]
    pub fn remove_one<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_unique(key).is_some()
    }
}

impl<K, H: Default> Default for UnorderedMultiSet<K, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K: Clone, H: Clone> Clone for UnorderedMultiSet<K, H> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, H> fmt::Debug for UnorderedMultiSet<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, H: BuildHasher> PartialEq for UnorderedMultiSet<K, H> {
    fn eq(&self, other: &Self) -> bool {
        self.table.equal_multi(&other.table)
    }
}

impl<K: Hash + Eq, H: BuildHasher> Eq for UnorderedMultiSet<K, H> {}

impl<K: Hash + Eq, H: BuildHasher + Default> FromIterator<K> for UnorderedMultiSet<K, H> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<K: Hash + Eq, H: BuildHasher> Extend<K> for UnorderedMultiSet<K, H> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

impl<K, H> IntoIterator for UnorderedMultiSet<K, H> {
    type Item = K;
    type IntoIter = SetIntoIter<K, H>;

    fn into_iter(self) -> Self::IntoIter {
        SetIntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, H> IntoIterator for &'a UnorderedMultiSet<K, H> {
    type Item = &'a K;
    type IntoIter = SetIter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Set iterators
// =============================================================================

/// Iterator over set keys.
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

impl<K> ExactSizeIterator for SetIter<'_, K> {}

impl<K> FusedIterator for SetIter<'_, K> {}

/// Draining iterator over set keys.
pub struct SetDrain<'a, K, H> {
    inner: Drain<'a, K, (), H>,
}

impl<K, H> Iterator for SetDrain<'_, K, H> {
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

/// Owning iterator over set keys.
pub struct SetIntoIter<K, H> {
    inner: IntoIter<K, (), H>,
}

impl<K, H> Iterator for SetIntoIter<K, H> {
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

impl<K, H> ExactSizeIterator for SetIntoIter<K, H> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_insert_get_remove() {
        let mut map: UnorderedMap<String, u32> = UnorderedMap::new();
        assert_eq!(map.insert("a".into(), 1), None);
        assert_eq!(map.insert("a".into(), 2), Some(1));
        assert_eq!(map.get("a"), Some(&2));
        assert_eq!(map["a"], 2);
        assert_eq!(map.at("b"), Err(Error::KeyNotFound));
        *map.get_mut("a").unwrap() += 1;
        assert_eq!(map.remove("a"), Some(3));
        assert!(map.is_empty());
    }

    #[test]
    fn map_entry_counts_words() {
        let mut counts: UnorderedMap<&str, usize> = UnorderedMap::new();
        for word in "the cat and the hat and the bat".split(' ') {
            *counts.entry(word).or_default() += 1;
        }
        assert_eq!(counts["the"], 3);
        assert_eq!(counts["and"], 2);
        assert_eq!(counts.len(), 5);

        counts.entry("cat").and_modify(|n| *n = 10).or_insert(0);
        assert_eq!(counts["cat"], 10);
        if let Entry::Occupied(e) = counts.entry("bat") {
            assert_eq!(e.remove(), 1);
        }
        assert!(!counts.contains_key("bat"));
    }

    #[test]
    fn map_equality_ignores_order() {
        let a: UnorderedMap<u32, u32> = (0..200).map(|k| (k, k * 2)).collect();
        let b: UnorderedMap<u32, u32> = (0..200).rev().map(|k| (k, k * 2)).collect();
        assert_eq!(a, b);
        let mut c = b.clone();
        c.insert(5, 0);
        assert_ne!(a, c);
    }

    #[test]
    fn set_and_drain() {
        let mut set: UnorderedSet<u32> = [3, 1, 3, 2].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(!set.insert(2));
        assert!(set.contains(&1));
        assert_eq!(set.take(&1), Some(1));
        let mut drained: Vec<u32> = set.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, [2, 3]);
        assert!(set.is_empty());
    }

    #[test]
    fn multimap_groups_keys() {
        let mut map: UnorderedMultiMap<u32, &str> = UnorderedMultiMap::new();
        map.insert(1, "a");
        map.insert(2, "b");
        map.insert(1, "c");
        assert_eq!(map.count(&1), 2);
        let mut values: Vec<&str> = map.equal_range(&1).map(|(_, v)| *v).collect();
        values.sort_unstable();
        assert_eq!(values, ["a", "c"]);
        assert_eq!(map.remove_all(&1), 2);
        assert_eq!(map.len(), 1);

        let x: UnorderedMultiMap<u32, u32> = [(1, 1), (1, 2)].into_iter().collect();
        let y: UnorderedMultiMap<u32, u32> = [(1, 2), (1, 1)].into_iter().collect();
        assert_eq!(x, y);
    }

    #[test]
    fn multiset_counts() {
        let mut bag: UnorderedMultiSet<char> = "mississippi".chars().collect();
        assert_eq!(bag.count(&'s'), 4);
        assert_eq!(bag.count(&'i'), 4);
        assert_eq!(bag.equal_range(&'p').count(), 2);
        assert!(bag.remove_one(&'m'));
        assert!(!bag.contains(&'m'));
        assert_eq!(bag.remove_all(&'s'), 4);
        assert_eq!(bag.len(), 6);
    }

    #[test]
    fn builder_validates() {
        assert_eq!(
            HashTableBuilder::new()
                .max_load_factor(f32::NAN)
                .build::<u32, u32>()
                .map(|_| ())
                .unwrap_err()
                .to_string(),
            "invalid max load factor NaN"
        );

        let set: UnorderedSet<u32> = HashTableBuilder::new().buckets(500).build_set().unwrap();
        assert_eq!(set.bucket_count(), 599);

        let hasher = std::hash::BuildHasherDefault::<std::collections::hash_map::DefaultHasher>::default();
        let mut map = HashTableBuilder::new()
            .hasher(hasher)
            .max_load_factor(2.0)
            .build_multimap::<u32, u32>()
            .unwrap();
        for k in 0..202 {
            map.insert(k, k);
        }
        assert_eq!(map.bucket_count(), 101);
        map.insert(202, 0);
        assert_eq!(map.bucket_count(), 173);
    }
}
