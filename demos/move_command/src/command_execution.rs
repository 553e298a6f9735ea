//! Command-execution system: starts incoming commands and finishes them
//! when they complete.
//!
//! Starting a command moves it from [`IncomingCommand`] to
//! [`ExecutingCommand`] with a random duration in `[0, 1)`. The handle wakes
//! at the earliest completion among all executing commands; its cleanup
//! applies every command completed by then and returns those vehicles to
//! idle. In-flight work lives in the store, so a handle cancelled at a cycle
//! boundary loses nothing: the next cycle waits on the same completions.

use components::{CommandState, Commandable, ExecutingCommand, IncomingCommand, Position};
use engine_component::{Component, Entity, QueryDescriptor};
use engine_event::SimTime;
use engine_system::{CleanupContext, System, SystemConfig, SystemContext, Wake};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

/// Executes move commands after a random delay.
#[derive(Debug)]
pub struct CommandExecutionSystem {
    config: SystemConfig,
    rng: StdRng,
}

impl CommandExecutionSystem {
    /// Draw command durations from `rng`.
    #[must_use]
    pub fn new(rng: StdRng) -> Self {
        let access = QueryDescriptor::new()
            .with_write::<Commandable>()
            .with_write::<IncomingCommand>()
            .with_write::<ExecutingCommand>()
            .with_write::<Position>();
        Self {
            config: SystemConfig::new("command_execution", access),
            rng,
        }
    }
}

impl System for CommandExecutionSystem {
    fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        let now = ctx.now().as_f64();
        let mut earliest = ctx
            .store()
            .iter::<ExecutingCommand>()?
            .map(|(_, executing)| executing.completes_at)
            .reduce(f64::min);

        let types = [
            Commandable::component_type_id(),
            IncomingCommand::component_type_id(),
        ];
        let mut started = 0;
        let mut cursor = ctx.store().cursor(&types)?;
        while let Some(entity) = ctx.store().step(&mut cursor)? {
            let command = ctx.store().get::<IncomingCommand>(entity)?.command;
            let completes_at = now + self.rng.random::<f64>();
            ctx.store().get_mut::<Commandable>(entity)?.state = CommandState::Executing;
            ctx.defer_remove::<IncomingCommand>(entity)?;
            ctx.defer_add(entity, ExecutingCommand {
                command,
                completes_at,
            })?;
            earliest = Some(earliest.map_or(completes_at, |t| t.min(completes_at)));
            started += 1;
        }
        debug!(now = %ctx.now(), started, ?earliest, "started commands");

        let wake = match earliest {
            Some(at) => Wake::At(SimTime::new(at.max(now))?),
            None => Wake::Never,
        };
        ctx.make_handle(wake, finish_completed)?;
        Ok(())
    }
}

/// Apply every command due by now and idle its vehicle.
fn finish_completed(ctx: &mut CleanupContext<'_>) -> anyhow::Result<()> {
    let now = ctx.now().as_f64();
    let due: Vec<Entity> = ctx
        .store()
        .iter::<ExecutingCommand>()?
        .filter(|(_, executing)| executing.completes_at <= now)
        .map(|(entity, _)| entity)
        .collect();

    for &entity in &due {
        let executing = ctx.store().remove_component::<ExecutingCommand>(entity)?;
        ctx.store()
            .get_mut::<Position>(entity)?
            .translate(executing.command.delta);
        ctx.store().get_mut::<Commandable>(entity)?.state = CommandState::Idling;
    }
    debug!(now = %ctx.now(), finished = due.len(), "finished commands");
    Ok(())
}
