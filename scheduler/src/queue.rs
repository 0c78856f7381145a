//! Indexed binary min-heap used as the waiting queue.
//!
//! The heap stores arena slots keyed by the customer's share, with
//! `Customer::heap_index` as a back-pointer so arbitrary deletion is
//! O(log n) instead of a linear scan. Equal shares order by `wait_start_ms`,
//! so long-waiting customers come out first.
//!
//! Precondition violations (inserting a queued slot, deleting an absent one)
//! are typed errors with no state change; callers log them.

use thiserror::Error;

use customer::arena::CustomerArena;
use customer::model::Slot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitQueueError {
    #[error("waiting queue is full ({0} slots)")]
    Full(usize),
    #[error("customer slot {0} is already queued")]
    AlreadyQueued(Slot),
    #[error("customer slot {0} is not queued")]
    NotQueued(Slot),
    #[error("customer slot {0} is not allocated")]
    Unallocated(Slot),
}

#[derive(Debug)]
pub struct WaitQueue {
    heap: Vec<Slot>,
    capacity: usize,
}

impl WaitQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Slot with the smallest key, without removing it.
    pub fn peek_min(&self) -> Option<Slot> {
        self.heap.first().copied()
    }

    /// Queued slots in heap layout order (not sorted).
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.heap.iter().copied()
    }

    pub fn insert(&mut self, customers: &mut CustomerArena, slot: Slot) -> Result<(), WaitQueueError> {
        if self.heap.len() >= self.capacity {
            return Err(WaitQueueError::Full(self.capacity));
        }

        let c = customers
            .get_mut(slot)
            .ok_or(WaitQueueError::Unallocated(slot))?;
        if c.heap_index.is_some() {
            return Err(WaitQueueError::AlreadyQueued(slot));
        }

        let pos = self.heap.len();
        c.heap_index = Some(pos);
        self.heap.push(slot);
        self.sift_up(customers, pos);
        Ok(())
    }

    pub fn pop_min(&mut self, customers: &mut CustomerArena) -> Option<Slot> {
        let top = *self.heap.first()?;
        let last = self.heap.pop()?;

        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.write_index(customers, 0);
            self.sift_down(customers, 0);
        }

        if let Some(c) = customers.get_mut(top) {
            c.heap_index = None;
        }
        Some(top)
    }

    pub fn delete(&mut self, customers: &mut CustomerArena, slot: Slot) -> Result<(), WaitQueueError> {
        let pos = customers
            .get(slot)
            .ok_or(WaitQueueError::Unallocated(slot))?
            .heap_index
            .ok_or(WaitQueueError::NotQueued(slot))?;
        if self.heap.get(pos).copied() != Some(slot) {
            return Err(WaitQueueError::NotQueued(slot));
        }

        let Some(last) = self.heap.pop() else {
            return Err(WaitQueueError::NotQueued(slot));
        };

        if pos < self.heap.len() {
            self.heap[pos] = last;
            self.write_index(customers, pos);

            // The replacement can be smaller than the parent of the removed
            // position, so a single sift direction is not enough.
            if pos > 0 && self.less(customers, self.heap[pos], self.heap[(pos - 1) / 2]) {
                self.sift_up(customers, pos);
            } else {
                self.sift_down(customers, pos);
            }
        }

        if let Some(c) = customers.get_mut(slot) {
            c.heap_index = None;
        }
        Ok(())
    }

    /// Ordering key: share first, then time spent waiting.
    fn key(customers: &CustomerArena, slot: Slot) -> (f64, u64) {
        customers
            .get(slot)
            .map(|c| (c.share, c.wait_start_ms))
            .unwrap_or((f64::INFINITY, u64::MAX))
    }

    fn less(&self, customers: &CustomerArena, a: Slot, b: Slot) -> bool {
        let (share_a, wait_a) = Self::key(customers, a);
        let (share_b, wait_b) = Self::key(customers, b);
        share_a < share_b || (share_a == share_b && wait_a < wait_b)
    }

    fn write_index(&mut self, customers: &mut CustomerArena, pos: usize) {
        let slot = self.heap[pos];
        if let Some(c) = customers.get_mut(slot) {
            c.heap_index = Some(pos);
        }
    }

    fn swap(&mut self, customers: &mut CustomerArena, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.write_index(customers, a);
        self.write_index(customers, b);
    }

    fn sift_up(&mut self, customers: &mut CustomerArena, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.less(customers, self.heap[pos], self.heap[parent]) {
                self.swap(customers, pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, customers: &mut CustomerArena, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            if left >= self.heap.len() {
                break;
            }

            let mut child = left;
            let right = left + 1;
            if right < self.heap.len() && self.less(customers, self.heap[right], self.heap[left]) {
                child = right;
            }

            if self.less(customers, self.heap[child], self.heap[pos]) {
                self.swap(customers, pos, child);
                pos = child;
            } else {
                break;
            }
        }
    }
}
