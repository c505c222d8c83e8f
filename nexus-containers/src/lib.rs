//! Generic containers over explicit allocation and node pools.
//!
//! Two families live here:
//!
//! ```text
//! Contiguous (raw allocation)   Vector, Deque
//! Node-based (pooled nodes)     List, RbTree, HashTable
//! ```
//!
//! Contiguous containers own a raw buffer from [`alloc`] and construct
//! elements in place with the [`uninit`] helpers. Growth is strongly
//! exception safe: a failed reallocation leaves the container untouched.
//!
//! Node-based containers never allocate nodes themselves. Nodes live in a
//! [`Storage`] pool and link to each other by [`Index`], so a node keeps
//! its index for as long as it is in the container:
//!
//! ```text
//! Storage (Slab / BoxedStorage)  - owns nodes, hands out stable indices
//! List / RbTree / HashTable      - link indices, never move nodes
//! ```
//!
//! Pick the pool by type parameter. `slab::Slab` grows on demand and gives
//! infallible inserts; [`BoxedStorage`] is fixed at construction and its
//! inserts return [`Full`] when exhausted.
//!
//! # Quick Start
//!
//! ```
//! use nexus_containers::{Deque, OrderedMap, UnorderedSet, Vector};
//!
//! let mut v: Vector<u32> = (0..4).collect();
//! v.insert(2, 99);
//! assert_eq!(v, [0, 1, 99, 2, 3]);
//!
//! let mut d = Deque::new();
//! d.push_front(1);
//! d.push_back(2);
//! assert_eq!(d[0], 1);
//!
//! let mut prices = OrderedMap::new();
//! prices.insert(101, "bid");
//! prices.insert(99, "ask");
//! assert_eq!(prices.first_key_value(), Some((&99, &"ask")));
//!
//! let seen: UnorderedSet<&str> = ["a", "b", "a"].into_iter().collect();
//! assert_eq!(seen.len(), 2);
//! ```
//!
//! # Modules
//!
//! - [`vector`], [`deque`]: contiguous sequences
//! - [`list`]: doubly linked list over a pool
//! - [`rbtree`], [`map`]: ordered engine and its map/set wrappers
//! - [`hashtable`], [`unordered`]: chained hash engine and its wrappers
//! - [`adapters`], [`heap`]: stack, queue, priority queue, heap algorithms

#![warn(missing_docs)]

pub mod adapters;
pub mod alloc;
pub mod compare;
pub mod deque;
pub mod error;
pub mod hashtable;
pub mod heap;
pub mod index;
pub mod list;
pub mod map;
pub mod rbtree;
pub mod storage;
pub mod uninit;
pub mod unordered;
pub mod vector;

pub use adapters::{FrontSequence, PriorityQueue, Queue, SequenceContainer, Stack};
pub use compare::{Compare, EqualTo, Greater, KeyEq, Less};
pub use deque::Deque;
pub use error::{Error, Full, Result};
pub use hashtable::{BoxedHashStorage, HashTable, SlabHashStorage};
pub use index::Index;
pub use list::{BoxedListStorage, List, SlabListStorage};
pub use map::{OrderedMap, OrderedMultiMap, OrderedMultiSet, OrderedSet};
pub use rbtree::{BoxedRbStorage, InvariantViolation, RbTree, SlabRbStorage};
pub use storage::{BoundedStorage, BoxedStorage, Storage, UnboundedStorage};
pub use unordered::{
    HashTableBuilder, UnorderedMap, UnorderedMultiMap, UnorderedMultiSet, UnorderedSet,
};
pub use vector::Vector;
