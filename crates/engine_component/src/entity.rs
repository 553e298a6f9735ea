//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight identifier with no inherent data. It pairs a
//! slot index with a generation counter: when a slot is freed and handed out
//! again its generation is bumped, so stale identifiers held elsewhere (for
//! example by a pending event) never alias the new occupant.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A unique entity identifier.
///
/// Entities are pure identifiers; they carry no data of their own. Components
/// are attached to entities to give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Build an entity from its raw parts.
    #[must_use]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index. Indices are reused after reclamation.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The generation of the slot at the time this identifier was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack the identifier into a single `u64` (generation in the high bits).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates entity identifiers, recycling freed slots with a bumped
/// generation.
#[derive(Debug)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    /// Upper bound on the number of slots. Defaults to `u32::MAX`.
    capacity: u32,
    live: usize,
}

impl EntityAllocator {
    /// Creates a new allocator with the full `u32` index space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_limit(u32::MAX)
    }

    /// Creates an allocator that hands out at most `limit` distinct slots.
    #[must_use]
    pub fn with_capacity_limit(limit: u32) -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            capacity: limit,
            live: 0,
        }
    }

    /// Allocates a fresh entity ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ResourceExhausted`] once every slot is in use.
    pub fn allocate(&mut self) -> Result<Entity, StoreError> {
        // FIFO reuse spreads generation bumps across slots.
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            self.live += 1;
            return Ok(Entity::from_parts(index, slot.generation));
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| StoreError::ResourceExhausted)?;
        if index >= self.capacity {
            return Err(StoreError::ResourceExhausted);
        }
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.live += 1;
        Ok(Entity::from_parts(index, 0))
    }

    /// Frees an entity's slot. Returns `false` if the identifier was stale.
    ///
    /// A slot whose generation cannot be bumped any further is retired for
    /// good rather than risk handing out an identifier equal to an old one.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        self.live -= 1;
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push_back(entity.index);
        }
        true
    }

    /// Returns `true` if `entity` refers to the current occupant of a live slot.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.live
    }

    /// Returns the number of slots ever handed out, live or not.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the live entity occupying slot `index`, if any.
    #[must_use]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        let slot = self.slots.get(index)?;
        slot.alive
            .then(|| Entity::from_parts(index as u32, slot.generation))
    }

    /// Iterates over all live entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.slots.len()).filter_map(|index| self.entity_at(index))
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate().unwrap();
        let e2 = alloc.allocate().unwrap();
        let e3 = alloc.allocate().unwrap();
        assert_eq!(e1.index(), 0);
        assert_eq!(e2.index(), 1);
        assert_eq!(e3.index(), 2);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_freed_slot_is_reused_with_new_generation() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate().unwrap();
        assert!(alloc.free(old));
        let new = alloc.allocate().unwrap();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), old.generation() + 1);
        assert!(!alloc.is_alive(old));
        assert!(alloc.is_alive(new));
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate().unwrap();
        assert!(alloc.free(e));
        assert!(!alloc.free(e));
        assert_eq!(alloc.count(), 0);
    }

    #[test]
    fn test_capacity_limit_exhausts() {
        let mut alloc = EntityAllocator::with_capacity_limit(2);
        alloc.allocate().unwrap();
        let e = alloc.allocate().unwrap();
        assert!(matches!(
            alloc.allocate(),
            Err(StoreError::ResourceExhausted)
        ));
        // Freeing a slot makes room again.
        alloc.free(e);
        assert!(alloc.allocate().is_ok());
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::from_parts(999, 3);
        let bytes = rmp_serde::to_vec(&entity).unwrap();
        let restored: Entity = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entity, restored);
    }

    #[test]
    fn test_to_bits_packs_generation_high() {
        let entity = Entity::from_parts(7, 1);
        assert_eq!(entity.to_bits(), (1u64 << 32) | 7);
    }
}
