//! Fixed-capacity slot arena for customer records.
//!
//! Cross-references elsewhere in the scheduler (tool -> occupant, waiting
//! queue -> member) are plain slot indices, so records never move once
//! allocated and a freed slot can be recycled from the free-list.

use thiserror::Error;

use crate::model::{Customer, Slot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("customer arena is full ({0} slots)")]
    Full(usize),
}

#[derive(Debug)]
pub struct CustomerArena {
    slots: Vec<Option<Customer>>,
    free: Vec<Slot>,
}

impl CustomerArena {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        // Pop order is ascending slot numbers.
        let free = (0..capacity).rev().collect();

        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Place a record into a free slot and return its index.
    pub fn allocate(&mut self, customer: Customer) -> Result<Slot, ArenaError> {
        let slot = self.free.pop().ok_or(ArenaError::Full(self.capacity()))?;
        self.slots[slot] = Some(customer);
        Ok(slot)
    }

    /// Free a slot, returning the record that occupied it.
    pub fn release(&mut self, slot: Slot) -> Option<Customer> {
        let customer = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(customer)
    }

    pub fn get(&self, slot: Slot) -> Option<&Customer> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Customer> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// All allocated records, with their slots.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Customer)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }
}
