//! The state every event callback mutates.

use engine_component::Store;
use engine_event::{EventError, EventQueue};

use crate::process::{HandleId, ProcessTable};

/// The event queue driving a [`World`].
pub type Queue = EventQueue<World>;

/// Component data plus the bookkeeping of outstanding suspension handles.
#[derive(Debug, Default)]
pub struct World {
    /// Entities and their components.
    pub store: Store,
    /// Every handle published so far.
    pub processes: ProcessTable,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the cleanup of handle `id`. Called from the handle's wake event.
    pub(crate) fn resume(&mut self, queue: &mut Queue, id: HandleId) -> Result<(), EventError> {
        let Some((config, cleanup)) = self.processes.begin_cleanup(id) else {
            return Ok(());
        };
        let mut ctx = crate::CleanupContext::new(&mut self.store, queue, config.clone(), id);
        let outcome = cleanup(&mut ctx);
        self.processes.finish_cleanup(queue, id, &config, outcome)
    }
}
