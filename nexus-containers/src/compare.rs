//! Key ordering and key equality.
//!
//! Ordered containers only ever ask "is `a` less than `b`?". Two keys are
//! equivalent when neither is less than the other, so a comparator never
//! needs an equality operator.
//!
//! Any `Fn(&K, &K) -> bool` closure is a comparator:
//!
//! ```
//! use nexus_containers::{Compare, OrderedSet};
//!
//! let by_len = |a: &String, b: &String| a.len() < b.len();
//! assert!(by_len.less(&"ab".to_string(), &"abc".to_string()));
//!
//! let mut set = OrderedSet::with_comparator(by_len);
//! set.insert("ccc".to_string());
//! set.insert("a".to_string());
//! set.insert("zzz".to_string()); // same length as "ccc", rejected
//! assert_eq!(set.len(), 2);
//! ```

/// A strict weak order over `K`.
pub trait Compare<K: ?Sized> {
    /// Returns `true` if `a` orders strictly before `b`.
    fn less(&self, a: &K, b: &K) -> bool;

    /// Returns `true` if neither key orders before the other.
    #[inline]
    fn equivalent(&self, a: &K, b: &K) -> bool {
        !self.less(a, b) && !self.less(b, a)
    }
}

/// Ascending order via [`Ord`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Less;

impl<K: Ord + ?Sized> Compare<K> for Less {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Descending order via [`Ord`].
///
/// With [`PriorityQueue`](crate::PriorityQueue) this gives a min-heap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Greater;

impl<K: Ord + ?Sized> Compare<K> for Greater {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a > b
    }
}

impl<K: ?Sized, F> Compare<K> for F
where
    F: Fn(&K, &K) -> bool,
{
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        self(a, b)
    }
}

/// Key equality for hashed containers.
///
/// Must agree with the hasher: equal keys hash equally.
pub trait KeyEq<K: ?Sized> {
    /// Returns `true` if the keys are equal.
    fn equal(&self, a: &K, b: &K) -> bool;
}

/// Equality via [`Eq`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EqualTo;

impl<K: Eq + ?Sized> KeyEq<K> for EqualTo {
    #[inline]
    fn equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn less_and_greater() {
        assert!(Less.less(&1, &2));
        assert!(!Less.less(&2, &2));
        assert!(Greater.less(&3, &2));
        assert!(Less.equivalent(&4, &4));
    }

    #[test]
    fn closure_comparator() {
        let by_abs = |a: &i32, b: &i32| a.abs() < b.abs();
        assert!(by_abs.less(&1, &-2));
        assert!(by_abs.equivalent(&-3, &3));
    }

    #[test]
    fn equal_to() {
        assert!(EqualTo.equal("a", "a"));
        assert!(!EqualTo.equal(&1, &2));
    }
}
