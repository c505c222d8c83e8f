//! Binary heap algorithms over slices.
//!
//! The slice is a max-heap with respect to the comparator: no element is
//! [`less`](Compare::less) than its children, so the front is the greatest.
//! Pass [`Greater`](crate::Greater) for a min-heap.
//!
//! ```
//! use nexus_containers::heap;
//! use nexus_containers::Less;
//!
//! let mut v = vec![3, 1, 4, 1, 5, 9, 2, 6];
//! heap::make_heap(&mut v, &Less);
//! assert_eq!(v[0], 9);
//! heap::sort_heap(&mut v, &Less);
//! assert_eq!(v, [1, 1, 2, 3, 4, 5, 6, 9]);
//! ```

use crate::compare::Compare;

#[inline]
fn parent(pos: usize) -> usize {
    (pos - 1) / 2
}

/// Moves the element at `pos` toward the root until its parent is not less.
fn sift_up<T, C: Compare<T>>(heap: &mut [T], mut pos: usize, comp: &C) {
    while pos > 0 {
        let p = parent(pos);
        if !comp.less(&heap[p], &heap[pos]) {
            break;
        }
        heap.swap(p, pos);
        pos = p;
    }
}

/// Moves the element at `pos` toward the leaves, following the greater child,
/// within `heap[..len]`.
fn sift_down<T, C: Compare<T>>(heap: &mut [T], mut pos: usize, len: usize, comp: &C) {
    loop {
        let left = 2 * pos + 1;
        if left >= len {
            break;
        }
        let right = left + 1;

        let greater = if right < len && comp.less(&heap[left], &heap[right]) {
            right
        } else {
            left
        };

        if !comp.less(&heap[pos], &heap[greater]) {
            break;
        }
        heap.swap(pos, greater);
        pos = greater;
    }
}

/// Restores the heap after the last element was appended.
///
/// `heap[..len - 1]` must already be a heap. Empty slices are left alone.
pub fn push_heap<T, C: Compare<T>>(heap: &mut [T], comp: &C) {
    if let Some(last) = heap.len().checked_sub(1) {
        sift_up(heap, last, comp);
    }
}

/// Moves the greatest element to the back and re-heaps the rest.
///
/// Afterwards `heap[..len - 1]` is a heap and `heap[len - 1]` is the old
/// front.
pub fn pop_heap<T, C: Compare<T>>(heap: &mut [T], comp: &C) {
    let len = heap.len();
    if len <= 1 {
        return;
    }
    heap.swap(0, len - 1);
    sift_down(heap, 0, len - 1, comp);
}

/// Rearranges `heap` into a heap in O(n).
pub fn make_heap<T, C: Compare<T>>(heap: &mut [T], comp: &C) {
    let len = heap.len();
    if len <= 1 {
        return;
    }
    for pos in (0..=parent(len - 1)).rev() {
        sift_down(heap, pos, len, comp);
    }
}

/// Sorts a heap into ascending order.
///
/// `heap` must already be a heap.
pub fn sort_heap<T, C: Compare<T>>(heap: &mut [T], comp: &C) {
    for end in (2..=heap.len()).rev() {
        pop_heap(&mut heap[..end], comp);
    }
}

/// Returns `true` if no element is less than its children.
pub fn is_heap<T, C: Compare<T>>(heap: &[T], comp: &C) -> bool {
    (1..heap.len()).all(|pos| !comp.less(&heap[parent(pos)], &heap[pos]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Greater, Less};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn push_pop_orders() {
        let mut v = Vec::new();
        for x in [5, 3, 8, 1, 9, 2] {
            v.push(x);
            push_heap(&mut v, &Less);
            assert!(is_heap(&v, &Less));
        }
        let mut out = Vec::new();
        while !v.is_empty() {
            pop_heap(&mut v, &Less);
            out.push(v.pop().unwrap());
        }
        assert_eq!(out, [9, 8, 5, 3, 2, 1]);
    }

    #[test]
    fn greater_is_min_heap() {
        let mut v = vec![4, 7, 1, 9, 3];
        make_heap(&mut v, &Greater);
        assert_eq!(v[0], 1);
        sort_heap(&mut v, &Greater);
        assert_eq!(v, [9, 7, 4, 3, 1]);
    }

    #[test]
    fn empty_and_single() {
        let mut empty: [u32; 0] = [];
        push_heap(&mut empty, &Less);
        pop_heap(&mut empty, &Less);
        make_heap(&mut empty, &Less);
        sort_heap(&mut empty, &Less);
        assert!(is_heap(&empty, &Less));

        let mut one = [7];
        pop_heap(&mut one, &Less);
        assert_eq!(one, [7]);
    }

    #[test]
    fn detects_broken_heap() {
        assert!(is_heap(&[9, 5, 8, 1], &Less));
        assert!(!is_heap(&[9, 5, 8, 6, 10], &Less));
    }

    #[test]
    fn stress_sort_matches_std() {
        let mut rng = SmallRng::seed_from_u64(0x4ea9);
        for _ in 0..200 {
            let len = rng.random_range(0..64);
            let mut v: Vec<i32> = (0..len).map(|_| rng.random_range(-50..50)).collect();
            let mut expected = v.clone();
            expected.sort_unstable();

            make_heap(&mut v, &Less);
            assert!(is_heap(&v, &Less));
            sort_heap(&mut v, &Less);
            assert_eq!(v, expected);
        }
    }
}
