//! Per-type component storage.
//!
//! Each component type lives in its own [`SparseSet`]: a sparse vector indexed
//! by entity slot points into dense, parallel `entities`/`data` vectors. Point
//! lookups are O(1) and iteration walks the dense arrays contiguously.

use std::any::Any;

use crate::component::{Component, ComponentMeta};
use crate::entity::Entity;

/// A sparse set holding every component of type `T`.
#[derive(Debug, Clone)]
pub struct SparseSet<T> {
    /// `sparse[entity.index()]` is the dense row of that entity, if any.
    sparse: Vec<Option<u32>>,
    /// Entity IDs in dense order. `entities[i]` owns `data[i]`.
    entities: Vec<Entity>,
    data: Vec<T>,
}

impl<T> SparseSet<T> {
    /// Create a new, empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Returns the number of components stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the set holds no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn row(&self, entity: Entity) -> Option<usize> {
        let row = (*self.sparse.get(entity.index() as usize)?)? as usize;
        // The slot may have been recycled; only the exact generation matches.
        (self.entities[row] == entity).then_some(row)
    }

    /// Returns `true` if `entity` has a component in this set.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.row(entity).is_some()
    }

    /// Insert a component. Hands the value back if the entity already has one.
    pub fn insert(&mut self, entity: Entity, value: T) -> Result<(), T> {
        if self.contains(entity) {
            return Err(value);
        }
        let index = entity.index() as usize;
        if self.sparse.len() <= index {
            self.sparse.resize(index + 1, None);
        }
        self.sparse[index] = Some(self.entities.len() as u32);
        self.entities.push(entity);
        self.data.push(value);
        Ok(())
    }

    /// Remove and return the component of `entity`.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let row = self.row(entity)?;
        self.sparse[entity.index() as usize] = None;
        self.entities.swap_remove(row);
        let value = self.data.swap_remove(row);
        // Re-point the entity that was moved into the vacated row.
        if let Some(&moved) = self.entities.get(row) {
            self.sparse[moved.index() as usize] = Some(row as u32);
        }
        Some(value)
    }

    /// Get a reference to the component of `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.row(entity).map(|row| &self.data[row])
    }

    /// Get a mutable reference to the component of `entity`.
    #[must_use]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.row(entity).map(|row| &mut self.data[row])
    }

    /// Entities holding a component of this type, in dense order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate over `(entity, component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.data.iter())
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`SparseSet`], so the store can hold every
/// component type in one map.
pub(crate) trait ErasedStorage {
    fn meta(&self) -> ComponentMeta;
    fn contains(&self, entity: Entity) -> bool;
    fn remove_erased(&mut self, entity: Entity) -> bool;
    fn entities(&self) -> &[Entity];
    fn len(&self) -> usize;
    /// Serialise the component of `entity` into a JSON value.
    fn to_value(&self, entity: Entity) -> Option<serde_json::Result<serde_json::Value>>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for SparseSet<T> {
    fn meta(&self) -> ComponentMeta {
        T::meta()
    }

    fn contains(&self, entity: Entity) -> bool {
        SparseSet::contains(self, entity)
    }

    fn remove_erased(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn entities(&self) -> &[Entity] {
        SparseSet::entities(self)
    }

    fn len(&self) -> usize {
        SparseSet::len(self)
    }

    fn to_value(&self, entity: Entity) -> Option<serde_json::Result<serde_json::Value>> {
        self.get(entity).map(serde_json::to_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(index: u32) -> Entity {
        Entity::from_parts(index, 0)
    }

    #[test]
    fn test_insert_and_get() {
        let mut set = SparseSet::new();
        set.insert(e(3), 1.5f32).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(e(3)), Some(&1.5));
        assert_eq!(set.get(e(2)), None);
    }

    #[test]
    fn test_duplicate_insert_returns_value() {
        let mut set = SparseSet::new();
        set.insert(e(0), 1u8).unwrap();
        assert_eq!(set.insert(e(0), 2u8), Err(2));
        assert_eq!(set.get(e(0)), Some(&1));
    }

    #[test]
    fn test_remove_repoints_moved_row() {
        let mut set = SparseSet::new();
        set.insert(e(0), 'a').unwrap();
        set.insert(e(1), 'b').unwrap();
        set.insert(e(2), 'c').unwrap();

        assert_eq!(set.remove(e(0)), Some('a'));
        // `c` was swapped into row 0 and must still be reachable.
        assert_eq!(set.get(e(2)), Some(&'c'));
        assert_eq!(set.get(e(1)), Some(&'b'));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_stale_generation_does_not_match() {
        let mut set = SparseSet::new();
        set.insert(Entity::from_parts(4, 1), 10u32).unwrap();
        assert!(!set.contains(Entity::from_parts(4, 0)));
        assert!(set.contains(Entity::from_parts(4, 1)));
    }

    #[test]
    fn test_insert_then_remove_restores_layout() {
        let mut set = SparseSet::new();
        set.insert(e(0), 1u32).unwrap();
        set.insert(e(1), 2u32).unwrap();
        let before: Vec<_> = set.iter().map(|(e, v)| (e, *v)).collect();

        set.insert(e(5), 3u32).unwrap();
        set.remove(e(5));

        let after: Vec<_> = set.iter().map(|(e, v)| (e, *v)).collect();
        assert_eq!(before, after);
    }
}
