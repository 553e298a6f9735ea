//! Deferred structural changes.
//!
//! Structural mutation (adding or removing components, despawning) while a
//! [`QueryCursor`](crate::QueryCursor) is open is rejected with
//! [`StoreError::ConcurrentModification`]. Systems that discover structural
//! work mid-iteration queue it on a [`Commands`] buffer instead; the buffer is
//! applied in order once the system's invocation has returned.
//!
//! Application is all or nothing. The whole buffer is replayed against a
//! shadow of the store's membership first, and the store is only touched if
//! every command would succeed.

use std::collections::{HashMap, HashSet};

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::StoreError;
use crate::store::Store;

type Insert = Box<dyn FnOnce(&mut Store) -> Result<(), StoreError>>;

enum Command {
    Add {
        entity: Entity,
        type_id: ComponentTypeId,
        name: &'static str,
        check_type: fn(&Store) -> Result<(), StoreError>,
        insert: Insert,
    },
    Remove {
        entity: Entity,
        type_id: ComponentTypeId,
        name: &'static str,
    },
    Despawn {
        entity: Entity,
    },
}

/// Membership changes of a buffer replayed over a store, without touching it.
struct Shadow<'a> {
    store: &'a Store,
    present: HashMap<(Entity, ComponentTypeId), bool>,
    wiped: HashSet<Entity>,
    dead: HashSet<Entity>,
}

impl<'a> Shadow<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            present: HashMap::new(),
            wiped: HashSet::new(),
            dead: HashSet::new(),
        }
    }

    fn ensure_alive(&self, entity: Entity) -> Result<(), StoreError> {
        if self.store.is_alive(entity) && !self.dead.contains(&entity) {
            Ok(())
        } else {
            Err(StoreError::EntityNotFound(entity))
        }
    }

    fn has(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        match self.present.get(&(entity, type_id)) {
            Some(&present) => present,
            None => !self.wiped.contains(&entity) && self.store.has(entity, type_id),
        }
    }

    fn replay(&mut self, command: &Command) -> Result<(), StoreError> {
        match *command {
            Command::Add {
                entity,
                type_id,
                name,
                check_type,
                ..
            } => {
                self.ensure_alive(entity)?;
                check_type(self.store)?;
                if self.has(entity, type_id) {
                    return Err(StoreError::DuplicateComponent {
                        entity,
                        component: name,
                    });
                }
                self.present.insert((entity, type_id), true);
            }
            Command::Remove {
                entity,
                type_id,
                name,
            } => {
                self.ensure_alive(entity)?;
                if !self.has(entity, type_id) {
                    return Err(StoreError::ComponentNotFound {
                        entity,
                        component: name,
                    });
                }
                self.present.insert((entity, type_id), false);
            }
            Command::Despawn { entity } => {
                self.ensure_alive(entity)?;
                self.present.retain(|&(e, _), _| e != entity);
                self.wiped.insert(entity);
                if !self.store.is_retained(entity) {
                    self.dead.insert(entity);
                }
            }
        }
        Ok(())
    }
}

/// An ordered buffer of structural store changes.
#[derive(Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue [`Store::add_component`].
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.queue.push(Command::Add {
            entity,
            type_id: T::component_type_id(),
            name: T::type_name(),
            check_type: Store::check_type::<T>,
            insert: Box::new(move |store| store.add_component(entity, component)),
        });
    }

    /// Queue [`Store::remove_component`], discarding the removed value.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.queue.push(Command::Remove {
            entity,
            type_id: T::component_type_id(),
            name: T::type_name(),
        });
    }

    /// Queue [`Store::despawn`].
    pub fn despawn(&mut self, entity: Entity) {
        self.queue.push(Command::Despawn { entity });
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check that every queued command would succeed, in order.
    ///
    /// # Errors
    ///
    /// The error the first failing command would raise.
    pub fn validate(&self, store: &Store) -> Result<(), StoreError> {
        let mut shadow = Shadow::new(store);
        self.queue.iter().try_for_each(|command| shadow.replay(command))
    }

    /// Apply every queued command in order, leaving the buffer empty.
    ///
    /// # Errors
    ///
    /// If any command would fail, returns its error and applies none of
    /// them. The buffer is emptied either way.
    pub fn apply(&mut self, store: &mut Store) -> Result<(), StoreError> {
        let validated = self.validate(store);
        let queue = std::mem::take(&mut self.queue);
        validated?;
        for command in queue {
            match command {
                Command::Add { insert, .. } => insert(store)?,
                Command::Remove {
                    entity, type_id, ..
                } => store.remove_component_by_id(entity, type_id)?,
                Command::Despawn { entity } => store.despawn(entity)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("len", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Serialize, PartialEq)]
    struct Tag;

    impl Component for Tag {
        fn type_name() -> &'static str {
            "Tag"
        }
    }

    #[test]
    fn test_commands_apply_in_order() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();

        let mut commands = Commands::new();
        commands.add_component(e, Tag);
        commands.remove_component::<Tag>(e);
        commands.add_component(e, Tag);
        assert_eq!(commands.len(), 3);

        commands.apply(&mut store).unwrap();
        assert!(commands.is_empty());
        assert!(store.contains::<Tag>(e));
    }

    #[derive(Debug, Serialize, PartialEq)]
    struct Counter(u32);

    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    #[test]
    fn test_failing_buffer_applies_nothing() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Counter(1)).unwrap();
        let epoch = store.epoch();

        let mut commands = Commands::new();
        commands.add_component(e, Tag);
        commands.add_component(e, Counter(2));

        assert_eq!(
            commands.apply(&mut store),
            Err(StoreError::DuplicateComponent {
                entity: e,
                component: "Counter",
            })
        );
        assert!(commands.is_empty());
        assert!(!store.contains::<Tag>(e));
        assert_eq!(store.get::<Counter>(e), Ok(&Counter(1)));
        assert_eq!(store.epoch(), epoch);
    }

    #[test]
    fn test_remove_before_add_is_not_found() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();

        let mut commands = Commands::new();
        commands.remove_component::<Tag>(e);
        commands.add_component(e, Tag);

        let err = commands.apply(&mut store).unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.contains::<Tag>(e));
    }

    #[test]
    fn test_validation_follows_earlier_commands() {
        let mut store = Store::new();
        let e = store.create_entity().unwrap();
        store.add_component(e, Tag).unwrap();

        let mut commands = Commands::new();
        commands.despawn(e);
        commands.add_component(e, Counter(1));
        assert_eq!(commands.validate(&store), Err(StoreError::EntityNotFound(e)));

        store.retain(e).unwrap();
        commands.apply(&mut store).unwrap();
        assert!(!store.contains::<Tag>(e));
        assert_eq!(store.get::<Counter>(e), Ok(&Counter(1)));
    }
}
