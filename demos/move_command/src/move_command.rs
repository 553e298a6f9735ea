//! Move-command system: plans the next leg for every idle vehicle.
//!
//! An idle vehicle that is still more than [`ARRIVAL_THRESHOLD`] away from
//! its destination (on either axis) gets an [`IncomingCommand`] covering half
//! the remaining distance. The planner wakes on a fixed period.

use components::{Commandable, Destination, IncomingCommand, MoveCommand, Position};
use engine_component::{Component, QueryDescriptor};
use engine_system::{System, SystemConfig, SystemContext, Wake};
use tracing::debug;

/// Distance below which a vehicle counts as arrived.
pub const ARRIVAL_THRESHOLD: f64 = 1e-2;

/// Issues move commands to idle vehicles.
#[derive(Debug)]
pub struct MoveCommandSystem {
    config: SystemConfig,
    period: f64,
}

impl MoveCommandSystem {
    /// Re-plan every `period` units of virtual time.
    #[must_use]
    pub fn new(period: f64) -> Self {
        let access = QueryDescriptor::new()
            .with_read::<Commandable>()
            .with_read::<Position>()
            .with_read::<Destination>()
            .with_write::<IncomingCommand>();
        Self {
            config: SystemConfig::new("move_command", access),
            period,
        }
    }
}

impl System for MoveCommandSystem {
    fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        let types = [
            Commandable::component_type_id(),
            Position::component_type_id(),
            Destination::component_type_id(),
        ];
        let mut issued = 0;
        let mut cursor = ctx.store().cursor(&types)?;
        while let Some(entity) = ctx.store().step(&mut cursor)? {
            let store = ctx.store();
            if !store.get::<Commandable>(entity)?.is_idle()
                || store.contains::<IncomingCommand>(entity)?
            {
                continue;
            }
            let remaining =
                store.get::<Destination>(entity)?.vec() - store.get::<Position>(entity)?.vec();
            let delta = remaining / 2.0;
            if delta.abs().max_element() > ARRIVAL_THRESHOLD {
                ctx.defer_add(entity, IncomingCommand {
                    command: MoveCommand { delta },
                })?;
                issued += 1;
            }
        }
        debug!(now = %ctx.now(), issued, "planned moves");

        ctx.make_handle(Wake::After(self.period), |_| Ok(()))?;
        Ok(())
    }
}
