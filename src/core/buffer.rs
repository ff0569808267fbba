/*!
 * Bounded Ordered Buffer
 * Fixed-capacity window shared by the trace, log, and metric stores
 *
 * The buffer enforces capacity, not order: callers determine the sort
 * position before inserting. Exceeding capacity evicts the element at
 * index 0 synchronously, so a store can reconcile dependent indexes
 * before its insert returns.
 */

use std::collections::VecDeque;
use std::ops::Index;

#[derive(Debug, Clone)]
pub struct BoundedOrderedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    reached_capacity: bool,
}

impl<T> BoundedOrderedBuffer<T> {
    /// Create a buffer holding at most `capacity` elements.
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            reached_capacity: false,
        }
    }

    /// Insert at an explicit position. When the insert pushes the count
    /// past capacity, the oldest element (index 0) is removed and
    /// returned; the caller must reconcile its indexes before treating
    /// the insertion as complete. Inserting at index 0 into a full
    /// buffer therefore evicts the element just inserted.
    #[must_use = "the evicted element's dependent indexes must be reconciled"]
    pub fn insert(&mut self, index: usize, item: T) -> Option<T> {
        self.items.insert(index, item);
        if self.items.len() >= self.capacity {
            self.reached_capacity = true;
        }
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn remove_at(&mut self, index: usize) -> T {
        self.items
            .remove(index)
            .expect("remove_at index out of bounds")
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once capacity has ever been reached. Tells callers the
    /// visible window might be missing older data. Reset by `clear`.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.reached_capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> + ExactSizeIterator {
        self.items.iter_mut()
    }

    /// Remove and return every element matching `pred`, preserving the
    /// order of the remainder.
    pub fn drain_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut index = 0;
        while index < self.items.len() {
            if pred(&self.items[index]) {
                removed.push(self.items.remove(index).unwrap());
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Drop all elements and reset the capacity-reached marker: a
    /// cleared window is not missing older data.
    pub fn clear(&mut self) {
        self.items.clear();
        self.reached_capacity = false;
    }
}

impl<T> Index<usize> for BoundedOrderedBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
