//! The [`System`] trait.

use crate::config::SystemConfig;
use crate::context::SystemContext;

/// A unit of simulation logic.
///
/// Each cycle the coordinator calls [`System::update`] once per registered
/// system, in registration order. The update performs the startup half of
/// the system's work and publishes exactly one handle through
/// [`SystemContext::make_handle`]; the rest happens in that handle's
/// cleanup.
pub trait System {
    /// Name, access set and fault policy. Read once at registration.
    fn config(&self) -> &SystemConfig;

    /// Run the startup half.
    ///
    /// # Errors
    ///
    /// Any error is a startup fault: it halts the run unless the system is
    /// best-effort.
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()>;
}

/// A [`System`] built from a closure.
pub struct FnSystem<F> {
    config: SystemConfig,
    update: F,
}

/// Wrap `update` as a system described by `config`.
pub fn from_fn<F>(config: SystemConfig, update: F) -> FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> anyhow::Result<()>,
{
    FnSystem { config, update }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> anyhow::Result<()>,
{
    fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        (self.update)(ctx)
    }
}

impl<F> std::fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSystem")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use engine_component::QueryDescriptor;

    use super::*;
    use crate::process::Wake;
    use crate::world::{Queue, World};

    #[test]
    fn test_fn_system_runs_closure() {
        let mut calls = 0;
        let mut system = from_fn(SystemConfig::new("tick", QueryDescriptor::new()), |ctx| {
            ctx.make_handle(Wake::After(1.0), |_| Ok(()))?;
            Ok(())
        });
        assert_eq!(system.config().name, "tick");

        let mut world = World::new();
        let mut queue = Queue::new();
        let config = Rc::new(system.config().clone());
        for _ in 0..2 {
            let mut ctx = SystemContext::new(&mut world, &mut queue, config.clone());
            system.update(&mut ctx).unwrap();
            calls += ctx.finish().handles.len();
        }
        assert_eq!(calls, 2);
        assert_eq!(world.processes.waiting(), 2);
    }
}
