//! Bounded, compacting table of live connection slots.
//!
//! Entries are stored densely in a `Vec` and located through an identifier
//! index, so lookups, inserts and removals are all O(1). Removal fills the
//! freed position with the last entry; iteration order is never stable.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use crate::error::AdmissionError;

/// Connection slots keyed by socket descriptor.
pub struct SlotTable<T> {
    entries: Vec<(RawFd, T)>,
    index: HashMap<RawFd, usize>,
    capacity: usize,
}

impl<T> SlotTable<T> {
    /// Creates an empty table that admits at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Admits `value` under `id`.
    ///
    /// # Returns
    /// A mutable reference to the stored value, valid until the entry is removed,
    /// or [`AdmissionError::AtCapacity`] when the table is full and
    /// [`AdmissionError::Duplicate`] when `id` is already present.
    pub fn try_insert(&mut self, id: RawFd, value: T) -> Result<&mut T, AdmissionError> {
        if self.is_at_capacity() {
            return Err(AdmissionError::AtCapacity {
                capacity: self.capacity,
            });
        }

        if self.index.contains_key(&id) {
            return Err(AdmissionError::Duplicate(id));
        }

        let position = self.entries.len();
        self.entries.push((id, value));
        self.index.insert(id, position);

        Ok(&mut self.entries[position].1)
    }

    /// Removes the entry for `id`, moving the last entry into its place.
    pub fn remove(&mut self, id: RawFd) -> Option<T> {
        let position = self.index.remove(&id)?;
        let (_, value) = self.entries.swap_remove(position);

        // swap_remove moved the former last entry into `position`
        if let Some((moved, _)) = self.entries.get(position) {
            self.index.insert(*moved, position);
        }

        Some(value)
    }

    pub fn get_mut(&mut self, id: RawFd) -> Option<&mut T> {
        let position = *self.index.get(&id)?;
        self.entries.get_mut(position).map(|(_, value)| value)
    }

    pub fn contains(&self, id: RawFd) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_at_capacity(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Identifiers currently held, in internal (unspecified) order.
    pub fn ids(&self) -> Vec<RawFd> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Removes every entry and hands them back to the caller.
    pub fn drain(&mut self) -> Vec<(RawFd, T)> {
        self.index.clear();
        self.entries.drain(..).collect()
    }
}
