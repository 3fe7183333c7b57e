//! Address table implementation.
//!
//! A table is a fixed grid of `bucket_count × bucket_size` slots. Slots hold
//! record ids; records themselves live in the manager.

use crate::domain::AddressId;

/// Which of the two tables a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    New,
    Tried,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::New => "new",
            TableKind::Tried => "tried",
        }
    }
}

/// Coordinates of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotPosition {
    pub bucket: usize,
    pub position: usize,
}

impl SlotPosition {
    pub fn new(bucket: usize, position: usize) -> Self {
        Self { bucket, position }
    }
}

/// Result of [`AddressTable::place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The slot was empty.
    Inserted,
    /// The slot already held this id.
    AlreadyPresent,
    /// The incumbent lost the collision and was evicted from the slot.
    Replaced(AddressId),
    /// The incumbent kept the slot.
    Rejected,
}

/// A table of buckets (either New or Tried)
#[derive(Debug, Clone)]
pub struct AddressTable {
    kind: TableKind,
    bucket_count: usize,
    bucket_size: usize,
    slots: Vec<Option<AddressId>>,
    occupied: usize,
}

impl AddressTable {
    /// Create an empty table
    pub fn new(kind: TableKind, bucket_count: usize, bucket_size: usize) -> Self {
        Self {
            kind,
            bucket_count,
            bucket_size,
            slots: vec![None; bucket_count * bucket_size],
            occupied: 0,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of occupied slots
    pub fn count(&self) -> usize {
        self.occupied
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, slot: SlotPosition) -> usize {
        debug_assert!(slot.bucket < self.bucket_count && slot.position < self.bucket_size);
        slot.bucket * self.bucket_size + slot.position
    }

    /// Id stored at `slot`, if any
    pub fn get(&self, slot: SlotPosition) -> Option<AddressId> {
        self.slots[self.index(slot)]
    }

    /// Put `id` into `slot`.
    ///
    /// On collision `candidate_wins` is asked about the incumbent; if it
    /// answers `true` the incumbent is evicted and returned for the caller
    /// to account for.
    pub fn place<F>(&mut self, slot: SlotPosition, id: AddressId, candidate_wins: F) -> PlaceOutcome
    where
        F: FnOnce(AddressId) -> bool,
    {
        let index = self.index(slot);
        match self.slots[index] {
            None => {
                self.slots[index] = Some(id);
                self.occupied += 1;
                PlaceOutcome::Inserted
            }
            Some(existing) if existing == id => PlaceOutcome::AlreadyPresent,
            Some(existing) => {
                if candidate_wins(existing) {
                    self.slots[index] = Some(id);
                    PlaceOutcome::Replaced(existing)
                } else {
                    PlaceOutcome::Rejected
                }
            }
        }
    }

    /// Empty `slot`, returning what it held
    pub fn remove(&mut self, slot: SlotPosition) -> Option<AddressId> {
        let index = self.index(slot);
        let removed = self.slots[index].take();
        if removed.is_some() {
            self.occupied -= 1;
        }
        removed
    }

    /// All slots referencing `id`
    pub fn positions_of(&self, id: AddressId) -> Vec<SlotPosition> {
        self.occupied_slots()
            .filter(|(_, held)| *held == id)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Iterate over occupied slots in bucket order
    pub fn occupied_slots(&self) -> impl Iterator<Item = (SlotPosition, AddressId)> + '_ {
        let bucket_size = self.bucket_size;
        self.slots.iter().enumerate().filter_map(move |(index, held)| {
            held.map(|id| (SlotPosition::new(index / bucket_size, index % bucket_size), id))
        })
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.occupied = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_into_empty_slot() {
        let mut table = AddressTable::new(TableKind::New, 4, 4);
        let slot = SlotPosition::new(1, 2);
        assert_eq!(table.place(slot, AddressId(1), |_| false), PlaceOutcome::Inserted);
        assert_eq!(table.get(slot), Some(AddressId(1)));
        assert_eq!(table.count(), 1);
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    fn test_place_same_id_is_noop() {
        let mut table = AddressTable::new(TableKind::Tried, 2, 2);
        let slot = SlotPosition::new(0, 1);
        table.place(slot, AddressId(5), |_| false);
        assert_eq!(table.place(slot, AddressId(5), |_| true), PlaceOutcome::AlreadyPresent);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_collision_policy_decides() {
        let mut table = AddressTable::new(TableKind::New, 2, 2);
        let slot = SlotPosition::new(1, 1);
        table.place(slot, AddressId(1), |_| false);

        assert_eq!(table.place(slot, AddressId(2), |_| false), PlaceOutcome::Rejected);
        assert_eq!(table.get(slot), Some(AddressId(1)));

        let outcome = table.place(slot, AddressId(2), |incumbent| incumbent == AddressId(1));
        assert_eq!(outcome, PlaceOutcome::Replaced(AddressId(1)));
        assert_eq!(table.get(slot), Some(AddressId(2)));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_remove_and_positions() {
        let mut table = AddressTable::new(TableKind::New, 3, 2);
        table.place(SlotPosition::new(0, 0), AddressId(7), |_| false);
        table.place(SlotPosition::new(2, 1), AddressId(7), |_| false);
        table.place(SlotPosition::new(1, 0), AddressId(8), |_| false);

        assert_eq!(
            table.positions_of(AddressId(7)),
            vec![SlotPosition::new(0, 0), SlotPosition::new(2, 1)]
        );
        assert_eq!(table.remove(SlotPosition::new(0, 0)), Some(AddressId(7)));
        assert_eq!(table.remove(SlotPosition::new(0, 0)), None);
        assert_eq!(table.count(), 2);

        table.clear();
        assert_eq!(table.count(), 0);
        assert_eq!(table.occupied_slots().count(), 0);
    }
}
