//! Separate-chaining hash table over an owned node pool.
//!
//! The engine behind [`UnorderedMap`](crate::UnorderedMap) and friends.
//! Buckets are a [`Vector`] of chain heads; each chain is a singly-linked
//! list of [`HashNode`]s in the pool, joined by [`Index`] links.
//!
//! ```text
//! buckets: [ NONE | 4 | NONE | 0 | ... ]
//!                   │           │
//!                   ▼           ▼
//!                 [k4]        [k0] ─► [k7] ─► [k7'] ─► NONE
//!                                     └─ equal keys stay adjacent
//! ```
//!
//! Bucket counts are primes from [`PRIME_LIST`], growing by roughly 1.7x.
//! Before each insert the table grows if `len + 1` would exceed
//! `bucket_count * max_load_factor`. Rehashing relinks nodes into the new
//! bucket array; nothing is copied and indices stay valid.
//!
//! # Example
//!
//! ```
//! use nexus_containers::HashTable;
//!
//! let mut table: HashTable<u32, &str> = HashTable::new();
//! assert_eq!(table.bucket_count(), 101);
//!
//! let (a, inserted) = table.insert_unique(1, "one");
//! assert!(inserted);
//! table.insert_multi(2, "two");
//! table.insert_multi(2, "deux");
//!
//! assert_eq!(table.count(&2), 2);
//! assert_eq!(table.find(&1), Some(a));
//! assert_eq!(table.erase_multi(&2), 2);
//! ```

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use std::marker::PhantomData;

use tracing::debug;

use crate::compare::{EqualTo, KeyEq};
use crate::error::{handle_error, Error, Full, Result};
use crate::vector::Vector;
use crate::{BoundedStorage, BoxedStorage, Index, Storage, UnboundedStorage};

/// Bounded hash storage backed by a boxed allocation.
pub type BoxedHashStorage<K, V, Idx = u32> = BoxedStorage<HashNode<K, V, Idx>, Idx>;

/// Unbounded hash storage backed by `slab::Slab`.
pub type SlabHashStorage<K, V> = slab::Slab<HashNode<K, V, usize>>;

/// Default maximum load factor.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 1.0;

/// Bucket count asked for by [`HashTable::new`].
pub const DEFAULT_BUCKETS: usize = 100;

// =============================================================================
// Prime table
// =============================================================================

/// Bucket counts. Starts at 101; each entry is the next prime after
/// `prev * 1.7`, up to the largest prime below `usize::MAX`.
#[cfg(target_pointer_width = "64")]
pub const PRIME_LIST: [usize; 99] = [
    101, 173, 263, 397, 599, 907, 1361, 2053, 3083, 4637, 6959, 10453, 15683, 23531, 35311,
    52967, 79451, 119179, 178781, 268189, 402299, 603457, 905189, 1357787, 2036687, 3055043,
    4582577, 6873871, 10310819, 15466229, 23199347, 34799021, 52198537, 78297827, 117446801,
    176170229, 264255353, 396383041, 594574583, 891861923, 1337792887, 2006689337, 3010034021,
    4515051137, 6772576709, 10158865069, 15238297621, 22857446471, 34286169707, 51429254599,
    77143881917, 115715822899, 173573734363, 260360601547, 390540902329, 585811353559,
    878717030339, 1318075545511, 1977113318311, 2965669977497, 4448504966249, 6672757449409,
    10009136174239, 15013704261371, 22520556392057, 33780834588157, 50671251882247,
    76006877823377, 114010316735089, 171015475102649, 256523212653977, 384784818980971,
    577177228471507, 865765842707309, 1298648764060979, 1947973146091477, 2921959719137273,
    4382939578705967, 6574409368058969, 9861614052088471, 14792421078132871,
    22188631617199337, 33282947425799017, 49924421138698549, 74886631708047827,
    112329947562071807, 168494921343107851, 252742382014661767, 379113573021992729,
    568670359532989111, 853005539299483657, 1279508308949225477, 1919262463423838231,
    2878893695135757317, 4318340542703636011, 6477510814055453699, 9716266221083181299,
    14574399331624771603, 18446744073709551557,
];

/// Bucket counts. Starts at 101; each entry is the next prime after
/// `prev * 1.7`, up to the largest prime below `usize::MAX`.
#[cfg(not(target_pointer_width = "64"))]
pub const PRIME_LIST: [usize; 44] = [
    101, 173, 263, 397, 599, 907, 1361, 2053, 3083, 4637, 6959, 10453, 15683, 23531, 35311,
    52967, 79451, 119179, 178781, 268189, 402299, 603457, 905189, 1357787, 2036687, 3055043,
    4582577, 6873871, 10310819, 15466229, 23199347, 34799021, 52198537, 78297827, 117446801,
    176170229, 264255353, 396383041, 594574583, 891861923, 1337792887, 2006689337, 3010034021,
    4294967291,
];

/// Smallest tabulated prime `>= n`, clamped to the largest entry.
///
/// ```
/// use nexus_containers::hashtable::next_prime;
///
/// assert_eq!(next_prime(0), 101);
/// assert_eq!(next_prime(101), 101);
/// assert_eq!(next_prime(102), 173);
/// ```
pub fn next_prime(n: usize) -> usize {
    let pos = PRIME_LIST.partition_point(|&p| p < n);
    PRIME_LIST[pos.min(PRIME_LIST.len() - 1)]
}

// =============================================================================
// Node
// =============================================================================

/// A chain link: key, value and the next node in the bucket.
#[derive(Debug, Clone)]
pub struct HashNode<K, V, Idx: Index = usize> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Idx,
}

#[inline]
fn node<K, V, S, Idx: Index>(storage: &S, idx: Idx) -> &HashNode<K, V, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    debug_assert!(idx.is_some());
    // Safety: callers only pass indices reached through bucket chains
    unsafe { storage.get_unchecked(idx) }
}

#[inline]
fn bucket_index<H: BuildHasher, Q: Hash + ?Sized>(hasher: &H, key: &Q, count: usize) -> usize {
    (hasher.hash_one(key) % count as u64) as usize
}

fn new_buckets<Idx: Index>(count: usize) -> Result<Vector<Idx>> {
    let mut buckets = Vector::try_with_capacity(count)?;
    buckets.try_insert_n(0, count, Idx::NONE)?;
    Ok(buckets)
}

// =============================================================================
// HashTable
// =============================================================================

/// A separate-chaining hash table.
///
/// Holds unique or duplicate keys depending on which insert path is used.
/// Equal keys always sit next to each other in their chain.
///
/// # Type Parameters
///
/// - `K`, `V`: Key and value types
/// - `H`: Hasher builder (default `ahash::RandomState`)
/// - `E`: Key equality (default [`EqualTo`])
/// - `S`: Node pool (default [`SlabHashStorage<K, V>`])
/// - `Idx`: Index type (default `usize`, matching `slab`)
pub struct HashTable<
    K,
    V,
    H = ahash::RandomState,
    E = EqualTo,
    S = SlabHashStorage<K, V>,
    Idx: Index = usize,
> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    buckets: Vector<Idx>,
    storage: S,
    len: usize,
    max_load_factor: f32,
    hasher: H,
    eq: E,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx> + Default,
    H: Default,
    E: Default,
{
    /// Creates an empty table with [`DEFAULT_BUCKETS`] rounded up to a
    /// prime (101 buckets).
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates an empty table with at least `count` buckets.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_buckets(count: usize) -> Self {
        Self::try_with_config(count, H::default(), E::default(), S::default())
            .unwrap_or_else(|e| handle_error(e))
    }
}

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx> + Default,
    E: Default,
{
    /// Creates an empty table using `hasher`.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_hasher(hasher: H) -> Self {
        Self::try_with_config(DEFAULT_BUCKETS, hasher, E::default(), S::default())
            .unwrap_or_else(|e| handle_error(e))
    }
}

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
    H: Default,
    E: Default,
{
    /// Creates an empty table over `storage`. Anything already in the pool
    /// is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_storage(storage: S) -> Self {
        Self::try_with_config(DEFAULT_BUCKETS, H::default(), E::default(), storage)
            .unwrap_or_else(|e| handle_error(e))
    }
}

impl<K, V, H, E, S, Idx: Index> Default for HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx> + Default,
    H: Default,
    E: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Structure - no hashing needed
// =============================================================================

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    /// Creates an empty table from its parts.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the bucket array cannot be allocated.
    pub fn try_with_config(bucket_count: usize, hasher: H, eq: E, mut storage: S) -> Result<Self> {
        storage.clear();
        Ok(Self {
            buckets: new_buckets(next_prime(bucket_count))?,
            storage,
            len: 0,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            hasher,
            eq,
            _marker: PhantomData,
        })
    }

    /// Returns the number of entries.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest entry count the index type can address.
    #[inline]
    pub fn max_size(&self) -> usize {
        let node_size = mem::size_of::<HashNode<K, V, Idx>>().max(1);
        Idx::NONE.as_usize().min(isize::MAX as usize / node_size)
    }

    /// Returns the hasher builder.
    #[inline]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns the key equality.
    #[inline]
    pub fn key_eq(&self) -> &E {
        &self.eq
    }

    /// Returns the number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Largest bucket count the table will ever use.
    #[inline]
    pub fn max_bucket_count(&self) -> usize {
        PRIME_LIST[PRIME_LIST.len() - 1]
    }

    /// Number of entries chained in bucket `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n >= bucket_count()`.
    pub fn bucket_size(&self, n: usize) -> usize {
        self.bucket_iter(n).count()
    }

    /// Iterates over the chain in bucket `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n >= bucket_count()`.
    #[inline]
    pub fn bucket_iter(&self, n: usize) -> Chain<'_, K, V, S, Idx> {
        Chain {
            storage: &self.storage,
            node: self.buckets[n],
            limit: usize::MAX,
            _marker: PhantomData,
        }
    }

    /// Average entries per bucket.
    #[inline]
    pub fn load_factor(&self) -> f32 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.len as f32 / self.buckets.len() as f32
        }
    }

    /// Load factor above which inserts grow the table.
    #[inline]
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Sets the maximum load factor. Takes effect on the next insert.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLoadFactor`] for NaN or values `<= 0`.
    pub fn set_max_load_factor(&mut self, ml: f32) -> Result<()> {
        if ml.is_nan() || ml <= 0.0 {
            return Err(Error::InvalidLoadFactor(ml));
        }
        self.max_load_factor = ml;
        Ok(())
    }

    /// Returns the entry at `idx`.
    #[inline]
    pub fn get(&self, idx: Idx) -> Option<(&K, &V)> {
        self.storage.get(idx).map(|n| (&n.key, &n.value))
    }

    /// Returns the entry at `idx` with a mutable value.
    #[inline]
    pub fn get_mut(&mut self, idx: Idx) -> Option<(&K, &mut V)> {
        self.storage.get_mut(idx).map(|n| (&n.key, &mut n.value))
    }

    #[inline]
    pub(crate) fn entry_at(&self, idx: Idx) -> (&K, &V) {
        let n = node(&self.storage, idx);
        (&n.key, &n.value)
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, idx: Idx) -> &mut V {
        // Safety: callers pass indices returned by lookups or inserts
        unsafe { &mut self.storage.get_unchecked_mut(idx).value }
    }

    /// Removes every entry. The bucket count is kept.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.buckets.fill(Idx::NONE);
        self.len = 0;
    }

    /// Exchanges the contents of two tables.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns an iterator over entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V, S, Idx> {
        Iter {
            buckets: &self.buckets,
            storage: &self.storage,
            bucket: 0,
            node: self.buckets.first().copied().unwrap_or(Idx::NONE),
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, S, Idx> {
        IterMut {
            node: self.buckets.first().copied().unwrap_or(Idx::NONE),
            buckets: &self.buckets,
            storage: &mut self.storage,
            bucket: 0,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over keys.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V, S, Idx> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over values.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V, S, Idx> {
        Values { inner: self.iter() }
    }

    /// Removes every entry, yielding them. Whatever the caller does not
    /// consume is dropped with the iterator. The bucket count is kept.
    pub fn drain(&mut self) -> Drain<'_, K, V, H, E, S, Idx> {
        Drain {
            table: self,
            bucket: 0,
        }
    }

    /// Unlinks the head of the first non-empty bucket at or after `*bucket`.
    fn take_next(&mut self, bucket: &mut usize) -> Option<(K, V)> {
        while *bucket < self.buckets.len() {
            let head = self.buckets[*bucket];
            if head.is_some() {
                // Safety: chain heads are occupied
                let n = unsafe { self.storage.remove_unchecked(head) };
                self.buckets[*bucket] = n.next;
                self.len -= 1;
                return Some((n.key, n.value));
            }
            *bucket += 1;
        }
        None
    }
}

// =============================================================================
// Hashed operations
// =============================================================================

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
    K: Hash,
    H: BuildHasher,
    E: KeyEq<K>,
{
    /// Bucket that `key` hashes to.
    #[inline]
    pub fn bucket<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        bucket_index(&self.hasher, key, self.buckets.len())
    }

    /// First node in `bucket` whose key equals `key`.
    fn find_in<Q>(&self, bucket: usize, key: &Q) -> Option<Idx>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        E: KeyEq<Q>,
    {
        let mut cur = self.buckets[bucket];
        while cur.is_some() {
            let n = node(&self.storage, cur);
            if self.eq.equal(n.key.borrow(), key) {
                return Some(cur);
            }
            cur = n.next;
        }
        None
    }

    /// Returns a node whose key equals `key`; the first of the run for
    /// duplicate keys.
    #[inline]
    pub fn find<Q>(&self, key: &Q) -> Option<Idx>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.find_in(self.bucket(key), key)
    }

    /// Returns `true` if some node has `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.find(key).is_some()
    }

    /// Number of nodes with `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.bucket_iter(self.bucket(key))
            .filter(|(k, _)| self.eq.equal((*k).borrow(), key))
            .count()
    }

    /// Iterates over the run of nodes with `key`.
    pub fn equal_range<Q>(&self, key: &Q) -> Chain<'_, K, V, S, Idx>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        let first = self.find(key).unwrap_or(Idx::NONE);
        let mut limit = 0;
        let mut cur = first;
        while cur.is_some() {
            let n = node(&self.storage, cur);
            if !self.eq.equal(n.key.borrow(), key) {
                break;
            }
            limit += 1;
            cur = n.next;
        }
        Chain {
            storage: &self.storage,
            node: first,
            limit,
            _marker: PhantomData,
        }
    }

    /// Removes the node at `idx` and returns its entry.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied.
    pub fn erase(&mut self, idx: Idx) -> (K, V) {
        let Some(target) = self.storage.get(idx) else {
            panic!("invalid hash table index {idx:?}");
        };
        let bucket = self.bucket(&target.key);

        let mut prev = Idx::NONE;
        let mut cur = self.buckets[bucket];
        while cur != idx {
            prev = cur;
            cur = node(&self.storage, cur).next;
        }
        self.unlink_after(bucket, prev, idx)
    }

    /// Unlinks `idx`, whose chain predecessor in `bucket` is `prev`.
    fn unlink_after(&mut self, bucket: usize, prev: Idx, idx: Idx) -> (K, V) {
        // Safety: idx is linked into bucket
        let n = unsafe { self.storage.remove_unchecked(idx) };
        if prev.is_none() {
            self.buckets[bucket] = n.next;
        } else {
            // Safety: prev precedes idx in the same chain
            unsafe { self.storage.get_unchecked_mut(prev) }.next = n.next;
        }
        self.len -= 1;
        (n.key, n.value)
    }

    /// Removes the node with `key`, if any.
    pub fn erase_unique<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        let bucket = self.bucket(key);
        let mut cur = self.buckets[bucket];
        if cur.is_none() {
            return None;
        }
        let mut prev = Idx::NONE;
        while cur.is_some() {
            let n = node(&self.storage, cur);
            if self.eq.equal(n.key.borrow(), key) {
                return Some(self.unlink_after(bucket, prev, cur));
            }
            prev = cur;
            cur = n.next;
        }
        None
    }

    /// Removes every node with `key` and returns how many went.
    pub fn erase_multi<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        let bucket = self.bucket(key);
        let mut removed = 0;
        let mut prev = Idx::NONE;
        let mut cur = self.buckets[bucket];
        while cur.is_some() {
            let n = node(&self.storage, cur);
            let next = n.next;
            if self.eq.equal(n.key.borrow(), key) {
                self.unlink_after(bucket, prev, cur);
                removed += 1;
            } else if removed > 0 {
                // The run is contiguous
                break;
            } else {
                prev = cur;
            }
            cur = next;
        }
        removed
    }

    // ========================================================================
    // Rehash
    // ========================================================================

    /// Moves every node into a fresh array of `count` buckets. Runs of equal
    /// keys keep their order.
    ///
    /// Every target bucket is hashed before any link changes, so a failed
    /// allocation or a panicking hasher leaves the table as it was.
    fn replace_buckets(&mut self, count: usize) -> Result<()> {
        let mut buckets: Vector<Idx> = new_buckets(count)?;
        let mut targets: Vector<usize> = Vector::try_with_capacity(self.len)?;
        for b in 0..self.buckets.len() {
            let mut x = self.buckets[b];
            while x.is_some() {
                let n = node(&self.storage, x);
                targets.push_back(bucket_index(&self.hasher, &n.key, count));
                x = n.next;
            }
        }

        // Consecutive nodes bound for the same bucket move as one segment,
        // which keeps every run of equal keys contiguous.
        let mut t = 0;
        for b in 0..self.buckets.len() {
            let mut x = self.buckets[b];
            while x.is_some() {
                let target = targets[t];
                let first = x;
                let mut last = x;
                t += 1;
                x = node(&self.storage, x).next;
                while x.is_some() && targets[t] == target {
                    last = x;
                    t += 1;
                    x = node(&self.storage, x).next;
                }
                // Safety: last is occupied
                unsafe { self.storage.get_unchecked_mut(last) }.next = buckets[target];
                buckets[target] = first;
            }
        }

        debug!(
            old_buckets = self.buckets.len(),
            new_buckets = count,
            len = self.len,
            "hash table rehashed"
        );
        self.buckets = buckets;
        Ok(())
    }

    /// Resizes to `next_prime(count)` buckets when growing, or when
    /// shrinking leaves the load comfortably below the maximum.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the new bucket array cannot be
    /// allocated; the table is unchanged.
    pub fn try_rehash(&mut self, count: usize) -> Result<()> {
        let p = next_prime(count);
        let current = self.buckets.len();
        if p > current {
            self.replace_buckets(p)
        } else if (self.len as f32 / p as f32) < self.max_load_factor - 0.25
            && (p as f32) < current as f32 * 0.75
        {
            self.replace_buckets(p)
        } else {
            Ok(())
        }
    }

    /// See [`try_rehash`](Self::try_rehash).
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn rehash(&mut self, count: usize) {
        self.try_rehash(count).unwrap_or_else(|e| handle_error(e));
    }

    /// Sizes the table for `count` entries without exceeding the maximum
    /// load factor.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn reserve(&mut self, count: usize) {
        self.rehash(self.buckets_for(count));
    }

    /// Smallest bucket count that holds `count` entries at the maximum load.
    fn buckets_for(&self, count: usize) -> usize {
        (count as f64 / f64::from(self.max_load_factor)).ceil() as usize
    }

    fn grow_for_insert(&mut self) {
        let need = self.len + 1;
        if need as f64 > self.buckets.len() as f64 * f64::from(self.max_load_factor) {
            self.rehash(self.buckets_for(need));
        }
    }

    /// Where a new node for `key` goes: its bucket, and either the node it
    /// follows (multi) or the equal node already present (unique).
    fn locate(&self, key: &K) -> (usize, Idx) {
        let bucket = self.bucket(key);
        (bucket, self.find_in(bucket, key).unwrap_or(Idx::NONE))
    }

    /// Links a freshly allocated `idx` after `anchor`, or at the head of
    /// `bucket` when `anchor` is `NONE`.
    fn link(&mut self, bucket: usize, anchor: Idx, idx: Idx) {
        let next = if anchor.is_some() {
            // Safety: anchor was found in this chain
            let a = unsafe { self.storage.get_unchecked_mut(anchor) };
            mem::replace(&mut a.next, idx)
        } else {
            mem::replace(&mut self.buckets[bucket], idx)
        };
        // Safety: idx was just allocated
        unsafe { self.storage.get_unchecked_mut(idx) }.next = next;
        self.len += 1;
    }

    // ========================================================================
    // Comparison
    // ========================================================================

    /// `true` if both tables hold the same unique keys with equal values.
    pub fn equal_unique(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        self.len == other.len
            && self.iter().all(|(k, v)| {
                other
                    .find(k)
                    .is_some_and(|idx| other.entry_at(idx).1 == v)
            })
    }

    /// `true` if every run of equal keys in one table matches a run in the
    /// other with the same values in any order.
    pub fn equal_multi(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        if self.len != other.len {
            return false;
        }
        for b in 0..self.buckets.len() {
            let mut cur = self.buckets[b];
            while cur.is_some() {
                let key = &node(&self.storage, cur).key;
                let ours: Vec<&V> = self.equal_range(key).map(|(_, v)| v).collect();
                let theirs: Vec<&V> = other.equal_range(key).map(|(_, v)| v).collect();
                if !is_permutation(&ours, &theirs) {
                    return false;
                }
                for _ in 0..ours.len() {
                    cur = node(&self.storage, cur).next;
                }
            }
        }
        true
    }
}

fn is_permutation<V: PartialEq>(a: &[&V], b: &[&V]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match (0..b.len()).find(|&i| !used[i] && b[i] == *x) {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

// =============================================================================
// Bounded storage impl - fallible insertion
// =============================================================================

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: BoundedStorage<HashNode<K, V, Idx>, Index = Idx>,
    K: Hash,
    H: BuildHasher,
    E: KeyEq<K>,
{
    /// Inserts unless an equal key exists.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if the pool is full.
    ///
    /// # Panics
    ///
    /// Panics if growing the bucket array fails to allocate.
    pub fn try_insert_unique(
        &mut self,
        key: K,
        value: V,
    ) -> core::result::Result<(Idx, bool), Full<(K, V)>> {
        self.grow_for_insert();
        let (bucket, existing) = self.locate(&key);
        if existing.is_some() {
            return Ok((existing, false));
        }
        let idx = self
            .storage
            .try_insert(HashNode {
                key,
                value,
                next: Idx::NONE,
            })
            .map_err(|e| Full((e.0.key, e.0.value)))?;
        self.link(bucket, Idx::NONE, idx);
        Ok((idx, true))
    }

    /// Inserts right after an equal key, or at the head of its bucket.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if the pool is full.
    ///
    /// # Panics
    ///
    /// Panics if growing the bucket array fails to allocate.
    pub fn try_insert_multi(
        &mut self,
        key: K,
        value: V,
    ) -> core::result::Result<Idx, Full<(K, V)>> {
        self.grow_for_insert();
        let (bucket, anchor) = self.locate(&key);
        let idx = self
            .storage
            .try_insert(HashNode {
                key,
                value,
                next: Idx::NONE,
            })
            .map_err(|e| Full((e.0.key, e.0.value)))?;
        self.link(bucket, anchor, idx);
        Ok(idx)
    }
}

// =============================================================================
// Unbounded storage impl - infallible insertion
// =============================================================================

impl<K, V, H, E, S, Idx: Index> HashTable<K, V, H, E, S, Idx>
where
    S: UnboundedStorage<HashNode<K, V, Idx>, Index = Idx>,
    K: Hash,
    H: BuildHasher,
    E: KeyEq<K>,
{
    /// Inserts unless an equal key exists.
    ///
    /// Returns the new node and `true`, or the existing node and `false`
    /// (the arguments are dropped).
    pub fn insert_unique(&mut self, key: K, value: V) -> (Idx, bool) {
        self.grow_for_insert();
        let (bucket, existing) = self.locate(&key);
        if existing.is_some() {
            return (existing, false);
        }
        let idx = self.storage.insert(HashNode {
            key,
            value,
            next: Idx::NONE,
        });
        self.link(bucket, Idx::NONE, idx);
        (idx, true)
    }

    /// Inserts right after an equal key, or at the head of its bucket.
    pub fn insert_multi(&mut self, key: K, value: V) -> Idx {
        self.grow_for_insert();
        let (bucket, anchor) = self.locate(&key);
        let idx = self.storage.insert(HashNode {
            key,
            value,
            next: Idx::NONE,
        });
        self.link(bucket, anchor, idx);
        idx
    }
}

// =============================================================================
// Trait impls
// =============================================================================

impl<K, V, H, E, S, Idx: Index> Clone for HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx> + Clone,
    H: Clone,
    E: Clone,
{
    /// Clones the pool and buckets; indices in the clone match the original.
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            storage: self.storage.clone(),
            len: self.len,
            max_load_factor: self.max_load_factor,
            hasher: self.hasher.clone(),
            eq: self.eq.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H, E, S, Idx: Index> fmt::Debug
    for HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, H, E, S, Idx: Index> IntoIterator for &'a HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H, E, S, Idx: Index> IntoIterator for &'a mut HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, H, E, S, Idx: Index> IntoIterator for HashTable<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, H, E, S, Idx>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            bucket: 0,
        }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over entries in bucket order.
pub struct Iter<'a, K, V, S, Idx: Index> {
    buckets: &'a [Idx],
    storage: &'a S,
    bucket: usize,
    node: Idx,
    remaining: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, S, Idx: Index> Clone for Iter<'_, K, V, S, Idx> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            storage: self.storage,
            bucket: self.bucket,
            node: self.node,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Iter<'a, K, V, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // Entries remain, so a non-empty bucket lies ahead
        while self.node.is_none() {
            self.bucket += 1;
            self.node = self.buckets[self.bucket];
        }
        let n = node(self.storage, self.node);
        self.node = n.next;
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> FusedIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

/// Iterator with mutable values.
pub struct IterMut<'a, K, V, S, Idx: Index> {
    buckets: &'a [Idx],
    storage: &'a mut S,
    bucket: usize,
    node: Idx,
    remaining: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for IterMut<'a, K, V, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while self.node.is_none() {
            self.bucket += 1;
            self.node = self.buckets[self.bucket];
        }
        // Safety: node is linked and visited once, so the extended
        // references never alias
        let n = unsafe { self.storage.get_unchecked_mut(self.node) };
        self.node = n.next;
        self.remaining -= 1;
        unsafe { Some((&*(&n.key as *const K), &mut *(&mut n.value as *mut V))) }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for IterMut<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

/// Iterator over keys.
pub struct Keys<'a, K, V, S, Idx: Index> {
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Keys<'a, K, V, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
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

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Keys<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

/// Iterator over values.
pub struct Values<'a, K, V, S, Idx: Index> {
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Values<'a, K, V, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
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

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> ExactSizeIterator for Values<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

/// Iterator along one chain: a whole bucket from
/// [`bucket_iter`](HashTable::bucket_iter), or a run of equal keys from
/// [`equal_range`](HashTable::equal_range).
pub struct Chain<'a, K, V, S, Idx: Index> {
    storage: &'a S,
    node: Idx,
    limit: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> Iterator for Chain<'a, K, V, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.limit == 0 || self.node.is_none() {
            return None;
        }
        self.limit -= 1;
        let n = node(self.storage, self.node);
        self.node = n.next;
        Some((&n.key, &n.value))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Index + 'a> FusedIterator for Chain<'a, K, V, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

/// Draining iterator. Entries left unconsumed are dropped with it.
pub struct Drain<'a, K, V, H, E, S, Idx: Index>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    table: &'a mut HashTable<K, V, H, E, S, Idx>,
    bucket: usize,
}

impl<K, V, H, E, S, Idx: Index> Iterator for Drain<'_, K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.table.take_next(&mut self.bucket)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<K, V, H, E, S, Idx: Index> ExactSizeIterator for Drain<'_, K, V, H, E, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

impl<K, V, H, E, S, Idx: Index> Drop for Drain<'_, K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    fn drop(&mut self) {
        for _ in self.by_ref() {}
    }
}

/// Owning iterator in bucket order.
pub struct IntoIter<K, V, H, E, S, Idx: Index>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    table: HashTable<K, V, H, E, S, Idx>,
    bucket: usize,
}

impl<K, V, H, E, S, Idx: Index> Iterator for IntoIter<K, V, H, E, S, Idx>
where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>,
{
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.table.take_next(&mut self.bucket)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<K, V, H, E, S, Idx: Index> ExactSizeIterator for IntoIter<K, V, H, E, S, Idx> where
    S: Storage<HashNode<K, V, Idx>, Index = Idx>
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::cell::Cell;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{BuildHasherDefault, Hasher};
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    type Table = HashTable<u32, u32>;

    #[test]
    fn prime_list_is_increasing() {
        assert_eq!(PRIME_LIST[0], 101);
        assert!(PRIME_LIST.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(next_prime(usize::MAX), PRIME_LIST[PRIME_LIST.len() - 1]);
        assert_eq!(next_prime(174), 263);
    }

    #[test]
    fn grows_at_load_factor_one() {
        let mut table = Table::new();
        assert_eq!(table.bucket_count(), 101);
        for k in 0..101 {
            table.insert_unique(k, k);
        }
        assert_eq!(table.bucket_count(), 101);
        for k in 101..150 {
            table.insert_unique(k, k);
        }
        assert_eq!(table.bucket_count(), 173);
        assert_eq!(table.len(), 150);
        for k in 0..150 {
            assert_eq!(table.find(&k).map(|i| *table.entry_at(i).1), Some(k));
        }
    }

    #[test]
    fn unique_returns_existing() {
        let mut table = Table::new();
        let (idx, inserted) = table.insert_unique(7, 1);
        assert!(inserted);
        assert_eq!(table.insert_unique(7, 2), (idx, false));
        assert_eq!(table.get(idx), Some((&7, &1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn multi_keeps_equal_keys_adjacent() {
        let mut table = Table::new();
        for v in 0..4 {
            table.insert_multi(5, v);
            table.insert_multi(5 + 101, v);
        }
        assert_eq!(table.count(&5), 4);
        assert_eq!(table.equal_range(&5).count(), 4);
        assert!(table.equal_range(&5).all(|(k, _)| *k == 5));

        // Every key's run is contiguous in its chain
        for b in 0..table.bucket_count() {
            let keys: Vec<u32> = table.bucket_iter(b).map(|(k, _)| *k).collect();
            let mut seen = Vec::new();
            for w in keys.chunk_by(|a, b| a == b) {
                assert!(!seen.contains(&w[0]));
                seen.push(w[0]);
            }
        }
    }

    #[test]
    fn rehash_keeps_runs_in_order() {
        let mut table = Table::new();
        for v in 0..5 {
            table.insert_multi(1, v);
        }
        let before: Vec<u32> = table.equal_range(&1).map(|(_, v)| *v).collect();
        table.rehash(1000);
        assert_eq!(table.bucket_count(), 1361);
        let after: Vec<u32> = table.equal_range(&1).map(|(_, v)| *v).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn rehash_keeps_every_run_contiguous() {
        let mut table = Table::new();
        for v in 0..8 {
            for k in 0..60 {
                table.insert_multi(k, v);
            }
        }
        assert_eq!(table.bucket_count(), 599);
        let runs = |t: &Table| -> Vec<Vec<u32>> {
            (0..60).map(|k| t.equal_range(&k).map(|(_, v)| *v).collect()).collect()
        };
        let before = runs(&table);
        table.rehash(700);
        assert_eq!(table.bucket_count(), 907);
        assert_eq!(runs(&table), before);
        assert!(before.iter().all(|run| run.len() == 8));
        assert_eq!(table.iter().count(), 480);
    }

    /// Hashes a fixed number of times, then panics.
    #[derive(Clone)]
    struct Tripwire(Rc<Cell<usize>>);

    struct TripwireHasher(DefaultHasher, Rc<Cell<usize>>);

    impl BuildHasher for Tripwire {
        type Hasher = TripwireHasher;

        fn build_hasher(&self) -> TripwireHasher {
            TripwireHasher(DefaultHasher::new(), Rc::clone(&self.0))
        }
    }

    impl Hasher for TripwireHasher {
        fn write(&mut self, bytes: &[u8]) {
            self.0.write(bytes);
        }

        fn finish(&self) -> u64 {
            let left = self.1.get();
            if left == 0 {
                panic!("hasher tripped");
            }
            self.1.set(left - 1);
            self.0.finish()
        }
    }

    #[test]
    fn panicking_hash_during_rehash_leaves_table_intact() {
        let budget = Rc::new(Cell::new(usize::MAX));
        let mut table: HashTable<u32, u32, Tripwire> =
            HashTable::with_hasher(Tripwire(Rc::clone(&budget)));
        for k in 0..100 {
            table.insert_multi(k % 40, k);
        }

        budget.set(30);
        let result = panic::catch_unwind(AssertUnwindSafe(|| table.rehash(1000)));
        assert!(result.is_err());
        budget.set(usize::MAX);

        assert_eq!(table.bucket_count(), 101);
        assert_eq!(table.len(), 100);
        assert_eq!(table.iter().count(), 100);
        for k in 0..40 {
            let expected = if k < 20 { 3 } else { 2 };
            assert_eq!(table.count(&k), expected, "key {k}");
        }

        table.rehash(1000);
        assert_eq!(table.bucket_count(), 1361);
        assert_eq!(table.iter().count(), 100);
    }

    #[test]
    fn load_factor_below_one_grows_early() {
        let mut table = Table::new();
        table.set_max_load_factor(0.5).unwrap();
        let mut worst = 0.0f32;
        for k in 0..150 {
            table.insert_unique(k, k);
            worst = worst.max(table.load_factor());
        }
        // next prime >= 150 / 0.5
        assert_eq!(table.bucket_count(), 397);
        for k in 150..300 {
            table.insert_unique(k, k);
            worst = worst.max(table.load_factor());
        }
        assert!(worst <= 0.5, "worst load {worst}");
        assert!((0..300).all(|k| table.contains(&k)));
    }

    #[test]
    fn bucket_demand_is_exact_for_large_counts() {
        let mut table = Table::new();
        // 2^24 + 1 is not representable as f32
        assert_eq!(table.buckets_for(16_777_217), 16_777_217);
        table.set_max_load_factor(0.5).unwrap();
        assert_eq!(table.buckets_for(16_777_217), 33_554_434);
        assert_eq!(table.buckets_for(0), 0);
    }

    #[test]
    fn rehash_shrinks_only_when_worthwhile() {
        let mut table = Table::with_buckets(170);
        assert_eq!(table.bucket_count(), 173);
        for k in 0..90 {
            table.insert_unique(k, k);
        }
        // 90 / 101 is too close to the maximum
        table.rehash(0);
        assert_eq!(table.bucket_count(), 173);

        for k in 10..90 {
            table.erase_unique(&k);
        }
        table.rehash(0);
        assert_eq!(table.bucket_count(), 101);
        assert!((0..10).all(|k| table.contains(&k)));
    }

    #[test]
    fn reserve_uses_load_factor() {
        let mut table = Table::new();
        table.set_max_load_factor(0.5).unwrap();
        table.reserve(150);
        assert_eq!(table.bucket_count(), 397);
        assert_eq!(table.max_load_factor(), 0.5);
    }

    #[test]
    fn invalid_load_factor() {
        let mut table = Table::new();
        assert_eq!(table.set_max_load_factor(0.0), Err(Error::InvalidLoadFactor(0.0)));
        assert!(table.set_max_load_factor(-1.0).is_err());
        assert!(table.set_max_load_factor(f32::NAN).is_err());
        assert_eq!(table.max_load_factor(), DEFAULT_MAX_LOAD_FACTOR);
    }

    #[test]
    fn erase_paths() {
        let mut table = Table::new();
        assert_eq!(table.erase_unique(&3), None);

        let a = table.insert_multi(3, 0);
        table.insert_multi(3, 1);
        table.insert_multi(104, 2);
        assert_eq!(table.erase(a), (3, 0));
        assert_eq!(table.erase_unique(&3), Some((3, 1)));
        assert_eq!(table.erase_multi(&3), 0);
        assert_eq!(table.erase_multi(&104), 1);
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid hash table index")]
    fn erase_vacant_index_panics() {
        let mut table = Table::new();
        table.erase(3);
    }

    #[test]
    fn load_factor_and_buckets() {
        let mut table = Table::new();
        for k in 0..50 {
            table.insert_unique(k, k);
        }
        assert!((table.load_factor() - 50.0 / 101.0).abs() < 1e-6);
        let total: usize = (0..table.bucket_count()).map(|b| table.bucket_size(b)).sum();
        assert_eq!(total, 50);
        assert!(table.bucket_iter(table.bucket(&7)).any(|(k, _)| *k == 7));
        assert_eq!(table.max_bucket_count(), *PRIME_LIST.last().unwrap());
    }

    #[test]
    fn iterators_and_drain() {
        let mut table = Table::new();
        for k in 0..300 {
            table.insert_unique(k, k);
        }
        assert_eq!(table.iter().len(), 300);
        for (_, v) in table.iter_mut() {
            *v += 1;
        }
        let sum: u32 = table.values().sum();
        assert_eq!(sum, (1..=300).sum());
        let mut keys: Vec<u32> = table.keys().copied().collect();
        keys.sort_unstable();
        assert!(keys.into_iter().eq(0..300));

        let buckets = table.bucket_count();
        let mut drain = table.drain();
        assert!(drain.next().is_some());
        drop(drain);
        assert!(table.is_empty());
        assert_eq!(table.bucket_count(), buckets);
        assert_eq!(table.iter().count(), 0);

        table.insert_unique(1, 1);
        assert!(table.into_iter().eq([(1, 1)]));
    }

    #[test]
    fn clone_preserves_indices() {
        let mut table = Table::new();
        let idx = table.insert_unique(9, 90).0;
        let copy = table.clone();
        assert_eq!(copy.get(idx), Some((&9, &90)));
        assert!(copy.equal_unique(&table));
    }

    #[test]
    fn equality_ignores_order() {
        let hasher = BuildHasherDefault::<DefaultHasher>::default();
        let mut a: HashTable<u32, u32, _> = HashTable::with_hasher(hasher.clone());
        let mut b: HashTable<u32, u32, _> = HashTable::with_hasher(hasher);
        for (k, v) in [(1, 1), (1, 2), (2, 3)] {
            a.insert_multi(k, v);
        }
        for (k, v) in [(2, 3), (1, 2), (1, 1)] {
            b.insert_multi(k, v);
        }
        assert!(a.equal_multi(&b));
        b.insert_multi(2, 4);
        assert!(!a.equal_multi(&b));
        a.insert_multi(2, 5);
        assert!(!a.equal_multi(&b));
    }

    #[test]
    fn bounded_storage_reports_full() {
        let mut table: HashTable<u32, u32, ahash::RandomState, EqualTo, BoxedHashStorage<u32, u32>, u32> =
            HashTable::with_storage(BoxedHashStorage::with_capacity(4));
        for k in 0..4 {
            assert!(table.try_insert_unique(k, k).unwrap().1);
        }
        assert!(!table.try_insert_unique(0, 9).unwrap().1);
        assert_eq!(table.try_insert_unique(7, 7).unwrap_err().into_inner(), (7, 7));
        assert_eq!(table.try_insert_multi(5, 5).unwrap_err().into_inner(), (5, 5));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn stress_against_hashmap() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0xb0c4e7);
        let mut table = Table::new();
        let mut reference: HashMap<u32, u32> = HashMap::new();

        for step in 0..20_000u32 {
            let key = rng.random_range(0..3_000);
            match rng.random_range(0..10) {
                0..=5 => {
                    let fresh = !reference.contains_key(&key);
                    if fresh {
                        reference.insert(key, step);
                    }
                    assert_eq!(table.insert_unique(key, step).1, fresh);
                }
                6..=8 => {
                    assert_eq!(
                        table.erase_unique(&key).map(|(_, v)| v),
                        reference.remove(&key)
                    );
                }
                _ => {
                    let found = table.find(&key).map(|i| *table.entry_at(i).1);
                    assert_eq!(found, reference.get(&key).copied());
                }
            }
            assert!(table.load_factor() <= table.max_load_factor());
        }

        assert_eq!(table.len(), reference.len());
        for (k, v) in &table {
            assert_eq!(reference.get(k), Some(v));
        }
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

    const COUNT: u64 = 100_000;

    #[test]
    #[ignore]
    fn bench_hashtable_insert_find_erase() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        table.reserve(COUNT as usize);
        let mut insert = Histogram::<u64>::new(3).unwrap();
        let mut find = Histogram::<u64>::new(3).unwrap();
        let mut erase = Histogram::<u64>::new(3).unwrap();

        for i in 0..COUNT {
            let start = rdtscp();
            table.insert_unique(i, i);
            insert.record(rdtscp() - start).unwrap();
        }
        for i in 0..COUNT {
            let start = rdtscp();
            let _ = std::hint::black_box(table.find(&i));
            find.record(rdtscp() - start).unwrap();
        }
        for i in 0..COUNT {
            let start = rdtscp();
            let _ = std::hint::black_box(table.erase_unique(&i));
            erase.record(rdtscp() - start).unwrap();
        }

        print_histogram("insert_unique", &insert);
        print_histogram("find", &find);
        print_histogram("erase_unique", &erase);
    }
}
