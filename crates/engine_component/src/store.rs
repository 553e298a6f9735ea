//! The entity-component store.
//!
//! The [`Store`] owns all simulation state: the entity allocator and one
//! sparse set per component type. It has no scheduling knowledge; systems
//! reach it through their per-invocation context.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::component::{Component, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::error::StoreError;
use crate::snapshot::{self, SnapshotRow};
use crate::storage::{ErasedStorage, SparseSet};

/// The canonical simulation state.
pub struct Store {
    allocator: EntityAllocator,
    /// One storage per component type, ordered by type ID for stable scans.
    storages: BTreeMap<ComponentTypeId, Box<dyn ErasedStorage>>,
    /// Entities pinned against reclamation, with their pin counts.
    retained: HashMap<Entity, u32>,
    /// Bumped on every structural change; open cursors compare against it.
    epoch: u64,
}

impl Store {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(EntityAllocator::new())
    }

    /// Create a store with a custom allocator (e.g. a bounded one).
    #[must_use]
    pub fn with_allocator(allocator: EntityAllocator) -> Self {
        Self {
            allocator,
            storages: BTreeMap::new(),
            retained: HashMap::new(),
            epoch: 0,
        }
    }

    // -- Entity lifecycle --

    /// Allocate a fresh entity with no components.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ResourceExhausted`] if the identifier space is
    /// used up.
    pub fn create_entity(&mut self) -> Result<Entity, StoreError> {
        let entity = self.allocator.allocate()?;
        self.epoch += 1;
        Ok(entity)
    }

    /// Remove every component of `entity` and free its identifier.
    ///
    /// A retained entity keeps its identifier until released; it is freed
    /// by the next [`Store::reclaim_void`] after that.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.ensure_alive(entity)?;
        for storage in self.storages.values_mut() {
            storage.remove_erased(entity);
        }
        if !self.retained.contains_key(&entity) {
            self.allocator.free(entity);
        }
        self.epoch += 1;
        Ok(())
    }

    /// Returns `true` if `entity` is a live identifier.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Returns the number of live entities (including void ones).
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.allocator.count()
    }

    /// Iterate over every live entity in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter()
    }

    fn ensure_alive(&self, entity: Entity) -> Result<(), StoreError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(StoreError::EntityNotFound(entity))
        }
    }

    // -- Reclamation --

    /// Pin `entity` so [`Store::reclaim_void`] never frees it. Pins nest.
    pub fn retain(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.ensure_alive(entity)?;
        *self.retained.entry(entity).or_insert(0) += 1;
        Ok(())
    }

    /// Drop one pin on `entity`. Returns `false` if it was not pinned.
    pub fn release(&mut self, entity: Entity) -> bool {
        match self.retained.get_mut(&entity) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.retained.remove(&entity);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `entity` is pinned by [`Store::retain`].
    #[must_use]
    pub fn is_retained(&self, entity: Entity) -> bool {
        self.retained.contains_key(&entity)
    }

    /// Returns `true` if `entity` has no components at all.
    #[must_use]
    pub fn is_void(&self, entity: Entity) -> bool {
        self.storages.values().all(|s| !s.contains(entity))
    }

    /// Free every live entity that has no components and is not retained.
    ///
    /// Returns the number of identifiers reclaimed.
    pub fn reclaim_void(&mut self) -> usize {
        let void: Vec<Entity> = self
            .allocator
            .iter()
            .filter(|e| !self.retained.contains_key(e) && self.is_void(*e))
            .collect();
        for &entity in &void {
            self.allocator.free(entity);
        }
        if !void.is_empty() {
            self.epoch += 1;
            debug!(reclaimed = void.len(), "reclaimed void entities");
        }
        void.len()
    }

    // -- Component operations --

    fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.storages
            .get(&T::component_type_id())
            .and_then(|s| s.as_any().downcast_ref())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        self.storages
            .get_mut(&T::component_type_id())
            .and_then(|s| s.as_any_mut().downcast_mut())
    }

    /// Attach `component` to `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] for a stale identifier,
    /// [`StoreError::DuplicateComponent`] if the entity already has a `T`,
    /// [`StoreError::TypeConflict`] if another Rust type claimed `T`'s name.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), StoreError> {
        self.ensure_alive(entity)?;
        let storage = self
            .storages
            .entry(T::component_type_id())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()) as Box<dyn ErasedStorage>)
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .ok_or(StoreError::TypeConflict {
                component: T::type_name(),
            })?;
        storage
            .insert(entity, component)
            .map_err(|_| StoreError::DuplicateComponent {
                entity,
                component: T::type_name(),
            })?;
        self.epoch += 1;
        Ok(())
    }

    /// Detach and return the `T` of `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] for a stale identifier,
    /// [`StoreError::ComponentNotFound`] if the entity has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, StoreError> {
        self.ensure_alive(entity)?;
        let removed = self
            .storage_mut::<T>()
            .and_then(|s| s.remove(entity))
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })?;
        self.epoch += 1;
        Ok(removed)
    }

    /// Type-erased removal by [`ComponentTypeId`].
    pub fn remove_component_by_id(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<(), StoreError> {
        self.ensure_alive(entity)?;
        let storage = self
            .storages
            .get_mut(&type_id)
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: "<unregistered>",
            })?;
        if !storage.remove_erased(entity) {
            return Err(StoreError::ComponentNotFound {
                entity,
                component: storage.meta().name,
            });
        }
        self.epoch += 1;
        Ok(())
    }

    /// Get the `T` of `entity`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        self.ensure_alive(entity)?;
        self.storage::<T>()
            .and_then(|s| s.get(entity))
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    /// Get the `T` of `entity` mutably. This is not a structural change.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        self.ensure_alive(entity)?;
        self.storage_mut::<T>()
            .and_then(|s| s.get_mut(entity))
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    /// Returns `true` if `entity` has a `T`.
    #[must_use]
    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        self.has(entity, T::component_type_id())
    }

    /// Returns `true` if `entity` has a component of type `type_id`.
    #[must_use]
    pub fn has(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.storages
            .get(&type_id)
            .is_some_and(|s| s.contains(entity))
    }

    /// Types of every component `entity` carries, in type ID order.
    pub fn component_types(&self, entity: Entity) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.storages
            .iter()
            .filter(move |(_, s)| s.contains(entity))
            .map(|(&type_id, _)| type_id)
    }

    /// Check that `T` may be stored under its name.
    ///
    /// # Errors
    ///
    /// [`StoreError::TypeConflict`] if another Rust type already claimed
    /// `T`'s name.
    pub fn check_type<T: Component>(&self) -> Result<(), StoreError> {
        match self.storages.get(&T::component_type_id()) {
            Some(s) if !s.as_any().is::<SparseSet<T>>() => Err(StoreError::TypeConflict {
                component: T::type_name(),
            }),
            _ => Ok(()),
        }
    }

    /// Name of a component type that has been stored at least once.
    #[must_use]
    pub fn component_name(&self, type_id: ComponentTypeId) -> Option<&'static str> {
        self.storages.get(&type_id).map(|s| s.meta().name)
    }

    /// Iterate over every `(entity, &T)` pair.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>().into_iter().flat_map(SparseSet::iter)
    }

    /// Total number of components across all types.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.storages.values().map(|s| s.len()).sum()
    }

    /// The structural version. Changes whenever components or entities are
    /// added or removed.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    // -- Query --

    /// Lazily yield every entity whose component set is a superset of
    /// `types`. An empty `types` matches every live entity.
    ///
    /// The iterator borrows the store, so it cannot observe structural
    /// mutation. Use [`Store::cursor`] to interleave lookups and mutation.
    pub fn query<'a>(&'a self, types: &[ComponentTypeId]) -> Query<'a> {
        Query {
            store: self,
            plan: self.plan(types),
            pos: 0,
        }
    }

    /// Open an owned cursor over the same result set as [`Store::query`].
    #[must_use]
    pub fn cursor(&self, types: &[ComponentTypeId]) -> QueryCursor {
        QueryCursor {
            plan: self.plan(types),
            epoch: self.epoch,
            pos: 0,
        }
    }

    fn plan(&self, types: &[ComponentTypeId]) -> Plan {
        let mut types = types.to_vec();
        types.sort();
        types.dedup();
        if types.is_empty() {
            return Plan::AllEntities;
        }
        if types.iter().any(|t| !self.storages.contains_key(t)) {
            return Plan::Empty;
        }
        // Drive iteration from the smallest storage.
        let driver = types
            .iter()
            .copied()
            .min_by_key(|t| self.storages[t].len())
            .unwrap_or(types[0]);
        let others = types.into_iter().filter(|t| *t != driver).collect();
        Plan::Driven { driver, others }
    }

    /// Resolve the candidate at `pos` for `plan`. `None` once exhausted;
    /// `Some(None)` for a candidate that does not match.
    fn candidate(&self, plan: &Plan, pos: usize) -> Option<Option<Entity>> {
        match plan {
            Plan::Empty => None,
            Plan::AllEntities => {
                if pos >= self.allocator.slot_count() {
                    return None;
                }
                Some(self.allocator.entity_at(pos))
            }
            Plan::Driven { driver, others } => {
                let entity = *self.storages.get(driver)?.entities().get(pos)?;
                let matched = others.iter().all(|t| self.has(entity, *t));
                Some(matched.then_some(entity))
            }
        }
    }

    // -- Snapshot --

    /// Enumerate every attribute of every component.
    ///
    /// Rows are ordered by entity, then component name, then attribute name.
    pub fn snapshot(&self) -> Result<Vec<SnapshotRow>, StoreError> {
        let mut storages: Vec<&dyn ErasedStorage> =
            self.storages.values().map(Box::as_ref).collect();
        storages.sort_by_key(|s| s.meta().name);

        let mut rows = Vec::new();
        for entity in self.allocator.iter() {
            for storage in &storages {
                let Some(value) = storage.to_value(entity) else {
                    continue;
                };
                let meta = storage.meta();
                let value = value.map_err(|e| StoreError::Snapshot {
                    component: meta.name,
                    message: e.to_string(),
                })?;
                rows.extend(snapshot::attributes(value).into_iter().map(
                    |(attribute, value)| SnapshotRow {
                        entity,
                        component: meta.name,
                        attribute,
                        value,
                    },
                ));
            }
        }
        Ok(rows)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entities", &self.allocator.count())
            .field("component_types", &self.storages.len())
            .field("components", &self.component_count())
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Plan {
    Empty,
    AllEntities,
    Driven {
        driver: ComponentTypeId,
        others: Vec<ComponentTypeId>,
    },
}

/// Borrowing query iterator returned by [`Store::query`].
pub struct Query<'a> {
    store: &'a Store,
    plan: Plan,
    pos: usize,
}

impl Iterator for Query<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        loop {
            let candidate = self.store.candidate(&self.plan, self.pos)?;
            self.pos += 1;
            if let Some(entity) = candidate {
                return Some(entity);
            }
        }
    }
}

/// An owned query cursor returned by [`Store::cursor`].
///
/// The cursor does not borrow the store, so a system may read and mutate
/// component values between steps. Structural changes in between are
/// detected on the next step.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    plan: Plan,
    epoch: u64,
    pos: usize,
}

impl QueryCursor {
    /// Advance to the next matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentModification`] if the store was
    /// structurally modified since the cursor was opened.
    pub fn next(&mut self, store: &Store) -> Result<Option<Entity>, StoreError> {
        if store.epoch != self.epoch {
            return Err(StoreError::ConcurrentModification);
        }
        loop {
            let Some(candidate) = store.candidate(&self.plan, self.pos) else {
                return Ok(None);
            };
            self.pos += 1;
            if let Some(entity) = candidate {
                return Ok(Some(entity));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct Mass(f32);

    impl Component for Mass {
        fn type_name() -> &'static str {
            "Mass"
        }
    }

    fn pos() -> ComponentTypeId {
        Position::component_type_id()
    }

    fn vel() -> ComponentTypeId {
        Velocity::component_type_id()
    }

    #[test]
    fn test_query_superset_scenario() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        store.add_component(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();

        let hits: Vec<_> = store.query(&[pos(), vel()]).collect();
        assert_eq!(hits, vec![e]);

        let misses: Vec<_> = store.query(&[pos(), Mass::component_type_id()]).collect();
        assert!(misses.is_empty());
    }

    #[test]
    fn test_query_filters_partial_matches() {
        let mut store = Store::new();
        let both = store.create_entity().unwrap();
        let only_pos = store.create_entity().unwrap();
        store.add_component(both, Position { x: 0.0, y: 0.0 }).unwrap();
        store.add_component(both, Velocity { dx: 0.0, dy: 0.0 }).unwrap();
        store.add_component(only_pos, Position { x: 1.0, y: 1.0 }).unwrap();

        let mut hits: Vec<_> = store.query(&[pos()]).collect();
        hits.sort();
        assert_eq!(hits, vec![both, only_pos]);
        assert_eq!(store.query(&[vel(), pos()]).collect::<Vec<_>>(), vec![both]);
    }

    #[test]
    fn test_empty_query_matches_all_live_entities() {
        let mut store = Store::new();
        let a = store.create_entity().unwrap();
        let b = store.create_entity().unwrap();
        store.despawn(a).unwrap();
        assert_eq!(store.query(&[]).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_query_is_restartable() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Mass(1.0)).unwrap();
        let ty = [Mass::component_type_id()];
        assert_eq!(store.query(&ty).count(), 1);

        let f = store.create_entity().unwrap();
        store.add_component(f, Mass(2.0)).unwrap();
        // A fresh call re-scans current state.
        assert_eq!(store.query(&ty).count(), 2);
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Mass(1.0)).unwrap();
        let err = store.add_component(e, Mass(2.0)).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateComponent {
                entity: e,
                component: "Mass"
            }
        );
        assert_eq!(store.get::<Mass>(e).unwrap(), &Mass(1.0));
    }

    #[test]
    fn test_remove_missing_component_not_found() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        assert!(store.remove_component::<Mass>(e).unwrap_err().is_not_found());
        assert!(
            store
                .remove_component_by_id(e, Mass::component_type_id())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_add_then_remove_restores_state() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        let other = store.create_entity().unwrap();
        store.add_component(other, Velocity { dx: 3.0, dy: 4.0 }).unwrap();

        let before = store.snapshot().unwrap();
        let count_before = store.component_count();

        store.add_component(e, Velocity { dx: 9.0, dy: 9.0 }).unwrap();
        let removed = store.remove_component::<Velocity>(e).unwrap();
        assert_eq!(removed, Velocity { dx: 9.0, dy: 9.0 });

        assert_eq!(store.snapshot().unwrap(), before);
        assert_eq!(store.component_count(), count_before);
        assert_eq!(
            store.query(&[vel()]).collect::<Vec<_>>(),
            vec![other]
        );
    }

    #[test]
    fn test_stale_entity_is_not_found() {
        let mut store = Store::new();
        let old = store.create_entity().unwrap();
        store.despawn(old).unwrap();
        let new = store.create_entity().unwrap();
        assert_eq!(new.index(), old.index());

        assert_eq!(
            store.add_component(old, Mass(1.0)),
            Err(StoreError::EntityNotFound(old))
        );
        assert!(store.add_component(new, Mass(1.0)).is_ok());
    }

    #[test]
    fn test_reclaim_void_skips_retained() {
        let mut store = Store::new();
        let void = store.create_entity().unwrap();
        let pinned = store.create_entity().unwrap();
        let busy = store.create_entity().unwrap();
        store.add_component(busy, Mass(1.0)).unwrap();
        store.retain(pinned).unwrap();

        assert_eq!(store.reclaim_void(), 1);
        assert!(!store.is_alive(void));
        assert!(store.is_alive(pinned));
        assert!(store.is_alive(busy));

        assert!(store.release(pinned));
        assert!(!store.release(pinned));
        assert_eq!(store.reclaim_void(), 1);
        assert!(!store.is_alive(pinned));
    }

    #[test]
    fn test_retained_entity_survives_despawn_until_released() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Mass(1.0)).unwrap();
        store.retain(e).unwrap();

        store.despawn(e).unwrap();
        assert!(store.is_alive(e));
        assert!(store.is_void(e));

        store.release(e);
        store.reclaim_void();
        assert!(!store.is_alive(e));
    }

    #[test]
    fn test_cursor_allows_value_mutation() {
        let mut store = Store::new();
        for i in 0..3 {
            let e = store.create_entity().unwrap();
            store.add_component(e, Position { x: i as f32, y: 0.0 }).unwrap();
        }

        let mut cursor = store.cursor(&[pos()]);
        while let Some(e) = cursor.next(&store).unwrap() {
            store.get_mut::<Position>(e).unwrap().y = 5.0;
        }
        assert!(store.iter::<Position>().all(|(_, p)| (p.y - 5.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_cursor_rejects_structural_mutation() {
        let mut store = Store::new();
        for _ in 0..2 {
            let e = store.create_entity().unwrap();
            store.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        }

        let mut cursor = store.cursor(&[pos()]);
        let first = cursor.next(&store).unwrap().unwrap();
        store.add_component(first, Mass(1.0)).unwrap();
        assert_eq!(
            cursor.next(&store),
            Err(StoreError::ConcurrentModification)
        );
    }

    #[test]
    fn test_snapshot_rows() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        store.add_component(e, Mass(3.0)).unwrap();

        let rows = store.snapshot().unwrap();
        let flat: Vec<_> = rows
            .iter()
            .map(|r| (r.component, r.attribute.as_str(), r.value.clone()))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Mass", "value", json!(3.0)),
                ("Position", "x", json!(1.0)),
                ("Position", "y", json!(2.0)),
            ]
        );
        assert!(rows.iter().all(|r| r.entity == e));
    }

    #[test]
    fn test_resource_exhausted() {
        let mut store = Store::with_allocator(EntityAllocator::with_capacity_limit(1));
        store.create_entity().unwrap();
        assert_eq!(store.create_entity(), Err(StoreError::ResourceExhausted));
    }
}
