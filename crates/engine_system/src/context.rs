//! Per-invocation contexts handed to system code.
//!
//! [`SystemContext`] is what a system's startup half sees; [`CleanupContext`]
//! is what its cleanup half sees once the handle's event fires. Both expose
//! the store only through [`StoreAccess`], which refuses component types the
//! system did not declare.

use std::rc::Rc;

use engine_component::{
    Access, Commands, Component, ComponentTypeId, Entity, Query, QueryCursor, Store, StoreError,
};
use engine_event::{EventError, EventId, Schedule, SimTime};

use crate::config::SystemConfig;
use crate::process::{HandleId, ProcessTable, Wake};
use crate::world::{Queue, World};

/// Store access limited to a system's declared [`QueryDescriptor`].
///
/// [`QueryDescriptor`]: engine_component::QueryDescriptor
pub struct StoreAccess<'a> {
    store: &'a mut Store,
    config: Rc<SystemConfig>,
}

impl<'a> StoreAccess<'a> {
    fn new(store: &'a mut Store, config: Rc<SystemConfig>) -> Self {
        Self { store, config }
    }

    fn check<T: Component>(&self, access: Access) -> Result<(), StoreError> {
        self.check_named(T::component_type_id(), T::type_name(), access)
    }

    fn check_id(&self, type_id: ComponentTypeId, access: Access) -> Result<(), StoreError> {
        let name = self.store.component_name(type_id).unwrap_or("<unregistered>");
        self.check_named(type_id, name, access)
    }

    /// Despawning removes every component, so it needs write access to each.
    fn check_despawn(&self, entity: Entity) -> Result<(), StoreError> {
        for type_id in self.store.component_types(entity) {
            self.check_id(type_id, Access::Write)?;
        }
        Ok(())
    }

    fn check_named(
        &self,
        type_id: ComponentTypeId,
        component: &'static str,
        access: Access,
    ) -> Result<(), StoreError> {
        if self.config.access.permits(type_id, access) {
            Ok(())
        } else {
            Err(StoreError::AccessNotDeclared {
                system: self.config.name.clone(),
                component,
                access,
            })
        }
    }

    /// Read the `T` of `entity`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        self.check::<T>(Access::Read)?;
        self.store.get(entity)
    }

    /// Mutate the `T` of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        self.check::<T>(Access::Write)?;
        self.store.get_mut(entity)
    }

    /// Returns whether `entity` has a `T`.
    pub fn contains<T: Component>(&self, entity: Entity) -> Result<bool, StoreError> {
        self.check::<T>(Access::Read)?;
        Ok(self.store.contains::<T>(entity))
    }

    /// Iterate over every `(entity, &T)` pair.
    pub fn iter<T: Component>(&self) -> Result<impl Iterator<Item = (Entity, &T)>, StoreError> {
        self.check::<T>(Access::Read)?;
        Ok(self.store.iter::<T>())
    }

    /// Entities carrying every type in `types`. See [`Store::query`].
    pub fn query(&self, types: &[ComponentTypeId]) -> Result<Query<'_>, StoreError> {
        for &type_id in types {
            self.check_id(type_id, Access::Read)?;
        }
        Ok(self.store.query(types))
    }

    /// Open a cursor over the same result set as [`StoreAccess::query`].
    pub fn cursor(&self, types: &[ComponentTypeId]) -> Result<QueryCursor, StoreError> {
        for &type_id in types {
            self.check_id(type_id, Access::Read)?;
        }
        Ok(self.store.cursor(types))
    }

    /// Step a cursor opened by [`StoreAccess::cursor`].
    pub fn step(&self, cursor: &mut QueryCursor) -> Result<Option<Entity>, StoreError> {
        cursor.next(&*self.store)
    }

    /// Attach a `T` to `entity`.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), StoreError> {
        self.check::<T>(Access::Write)?;
        self.store.add_component(entity, component)
    }

    /// Detach and return the `T` of `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, StoreError> {
        self.check::<T>(Access::Write)?;
        self.store.remove_component(entity)
    }

    /// Allocate a new, empty entity.
    pub fn create_entity(&mut self) -> Result<Entity, StoreError> {
        self.store.create_entity()
    }

    /// Strip every component from `entity` and free it unless retained.
    ///
    /// Requires write access to every component type `entity` carries.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.check_despawn(entity)?;
        self.store.despawn(entity)
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.is_alive(entity)
    }

    /// Pin `entity` against reclamation. See [`Store::retain`].
    pub fn retain(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.store.retain(entity)
    }

    /// Drop one pin on `entity`.
    pub fn release(&mut self, entity: Entity) -> bool {
        self.store.release(entity)
    }
}

/// Everything a system's startup half can touch.
pub struct SystemContext<'a> {
    access: StoreAccess<'a>,
    queue: &'a mut Queue,
    processes: &'a mut ProcessTable,
    commands: Commands,
    published: Vec<HandleId>,
    stop_requested: bool,
}

/// What one startup invocation left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Handles published during the invocation, in order.
    pub handles: Vec<HandleId>,
    /// Whether the system asked the run to stop.
    pub stop_requested: bool,
}

impl<'a> SystemContext<'a> {
    /// Open a context for one invocation of the system described by `config`.
    pub fn new(world: &'a mut World, queue: &'a mut Queue, config: Rc<SystemConfig>) -> Self {
        let World { store, processes } = world;
        Self {
            access: StoreAccess::new(store, config),
            queue,
            processes,
            commands: Commands::new(),
            published: Vec::new(),
            stop_requested: false,
        }
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Name of the running system.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.access.config.name
    }

    /// The store, limited to declared component types.
    pub fn store(&mut self) -> &mut StoreAccess<'a> {
        &mut self.access
    }

    /// Queue adding a `T` to `entity` once this invocation returns.
    pub fn defer_add<T: Component>(&mut self, entity: Entity, component: T) -> Result<(), StoreError> {
        self.access.check::<T>(Access::Write)?;
        self.commands.add_component(entity, component);
        Ok(())
    }

    /// Queue removing the `T` of `entity` once this invocation returns.
    pub fn defer_remove<T: Component>(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.access.check::<T>(Access::Write)?;
        self.commands.remove_component::<T>(entity);
        Ok(())
    }

    /// Queue despawning `entity` once this invocation returns.
    ///
    /// Requires write access to every component type `entity` carries now.
    pub fn defer_despawn(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.access.check_despawn(entity)?;
        self.commands.despawn(entity);
        Ok(())
    }

    /// Publish a handle whose `cleanup` runs when `wake` fires.
    ///
    /// A system publishes exactly one handle per invocation.
    pub fn make_handle(
        &mut self,
        wake: Wake,
        cleanup: impl FnOnce(&mut CleanupContext<'_>) -> anyhow::Result<()> + 'static,
    ) -> Result<HandleId, EventError> {
        let id = self.processes.spawn(
            &mut *self.queue,
            self.access.config.clone(),
            wake,
            Box::new(cleanup),
        )?;
        self.published.push(id);
        Ok(id)
    }

    /// Create an unscheduled event for handles to wait on.
    pub fn event(&mut self) -> EventId {
        self.queue.event()
    }

    /// Create an event firing at `schedule`.
    pub fn timeout(&mut self, schedule: Schedule) -> Result<EventId, EventError> {
        self.queue.timeout(schedule)
    }

    /// Give an unscheduled event its firing time.
    pub fn trigger(&mut self, id: EventId, schedule: Schedule) -> Result<(), EventError> {
        self.queue.trigger(id, schedule)
    }

    /// Ask the coordinator to stop after the current cycle.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Handles published so far in this invocation.
    #[must_use]
    pub fn published(&self) -> &[HandleId] {
        &self.published
    }

    /// Apply the deferred structural changes in order, or none of them if
    /// any would fail.
    pub fn apply_deferred(&mut self) -> Result<(), StoreError> {
        self.commands.apply(&mut *self.access.store)
    }

    /// Close the context. Deferred changes not yet applied are dropped.
    #[must_use]
    pub fn finish(self) -> Invocation {
        Invocation {
            handles: self.published,
            stop_requested: self.stop_requested,
        }
    }
}

/// Everything a system's cleanup half can touch.
pub struct CleanupContext<'a> {
    access: StoreAccess<'a>,
    queue: &'a mut Queue,
    handle: HandleId,
}

impl<'a> CleanupContext<'a> {
    pub(crate) fn new(
        store: &'a mut Store,
        queue: &'a mut Queue,
        config: Rc<SystemConfig>,
        handle: HandleId,
    ) -> Self {
        Self {
            access: StoreAccess::new(store, config),
            queue,
            handle,
        }
    }

    /// Current virtual time: the firing time of the handle's event.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// The handle being cleaned up.
    #[must_use]
    pub const fn handle(&self) -> HandleId {
        self.handle
    }

    /// Name of the owning system.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.access.config.name
    }

    /// The store, limited to declared component types.
    pub fn store(&mut self) -> &mut StoreAccess<'a> {
        &mut self.access
    }

    /// Create an unscheduled event.
    pub fn event(&mut self) -> EventId {
        self.queue.event()
    }

    /// Create an event firing at `schedule`.
    pub fn timeout(&mut self, schedule: Schedule) -> Result<EventId, EventError> {
        self.queue.timeout(schedule)
    }

    /// Give an unscheduled event its firing time.
    pub fn trigger(&mut self, id: EventId, schedule: Schedule) -> Result<(), EventError> {
        self.queue.trigger(id, schedule)
    }
}
