//! Fixed-capacity ring buffer
//!
//! Storage is allocated once; pushing into a full buffer overwrites the oldest
//! slot in O(1) instead of shifting the whole window.

/// Bounded FIFO ring with overwrite-on-full semantics
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    /// Index of the oldest element
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create a ring holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append an item, returning the evicted oldest item when full
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(item);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(item);
            self.head = (self.head + 1) % capacity;
            evicted
        }
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    pub fn newest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.len - 1) % self.capacity();
        self.slots[idx].as_ref()
    }

    pub fn oldest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Remove all items, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        let capacity = self.capacity();
        let mut items = Vec::with_capacity(self.len);
        for i in 0..self.len {
            if let Some(item) = self.slots[(self.head + i) % capacity].take() {
                items.push(item);
            }
        }
        self.head = 0;
        self.len = 0;
        items
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut ring = RingBuffer::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.oldest(), Some(&2));
        assert_eq!(ring.newest(), Some(&4));
        assert_eq!(ring.push(5), Some(2));
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut ring = RingBuffer::new(7);
        for i in 0..100 {
            ring.push(i);
            assert!(ring.len() <= ring.capacity());
        }
    }

    #[test]
    fn test_drain_resets() {
        let mut ring = RingBuffer::new(4);
        for i in 0..6 {
            ring.push(i);
        }
        assert_eq!(ring.drain(), vec![2, 3, 4, 5]);
        assert!(ring.is_empty());
        ring.push(9);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_reverse_iteration() {
        let mut ring = RingBuffer::new(3);
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.iter().rev().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn test_zero_capacity_is_promoted() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.newest(), Some(&"b"));
    }
}
