//! The move-command scenario.
//!
//! A fleet of vehicles starts at the origin, all heading to the same
//! destination. [`MoveCommandSystem`] repeatedly commands each idle vehicle
//! halfway there; [`CommandExecutionSystem`] carries the commands out after
//! random delays. The coordinator's cycles follow whichever happens first:
//! a planning period elapsing or a command completing.

pub mod command_execution;
pub mod move_command;

use components::{Commandable, Destination, Position};
use engine_app::{Coordinator, CycleConfig};
use engine_component::{Entity, Store, StoreError};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub use command_execution::CommandExecutionSystem;
pub use move_command::{ARRIVAL_THRESHOLD, MoveCommandSystem};

/// Parameters of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    /// Number of vehicles.
    pub vehicles: u32,
    /// Where every vehicle is heading.
    pub destination: Destination,
    /// Planner wake period.
    pub replan_period: f64,
    /// Seed for command durations.
    pub seed: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            vehicles: 1000,
            destination: Destination::new(10.0, 10.0),
            replan_period: 1.0,
            seed: 0,
        }
    }
}

/// Create `count` idle vehicles at the origin heading to `destination`.
///
/// # Errors
///
/// [`StoreError::ResourceExhausted`] if the store runs out of identifiers.
pub fn spawn_vehicles(
    store: &mut Store,
    count: u32,
    destination: Destination,
) -> Result<Vec<Entity>, StoreError> {
    (0..count)
        .map(|_| {
            let vehicle = store.create_entity()?;
            store.add_component(vehicle, Position::default())?;
            store.add_component(vehicle, Commandable::default())?;
            store.add_component(vehicle, destination)?;
            Ok(vehicle)
        })
        .collect()
}

/// Register the scenario's systems and vehicles on `coordinator`.
///
/// # Errors
///
/// See [`spawn_vehicles`].
pub fn install(
    coordinator: &mut Coordinator,
    scenario: &Scenario,
) -> Result<Vec<Entity>, StoreError> {
    let vehicles = spawn_vehicles(
        coordinator.store_mut(),
        scenario.vehicles,
        scenario.destination,
    )?;
    coordinator.register(MoveCommandSystem::new(scenario.replan_period));
    coordinator.register(CommandExecutionSystem::new(StdRng::seed_from_u64(scenario.seed)));
    Ok(vehicles)
}

/// Build a coordinator ready to run `scenario`.
///
/// # Errors
///
/// See [`spawn_vehicles`].
pub fn build(config: CycleConfig, scenario: &Scenario) -> Result<Coordinator, StoreError> {
    let mut coordinator = Coordinator::new(config);
    install(&mut coordinator, scenario)?;
    Ok(coordinator)
}

/// Largest remaining distance to the destination over all vehicles.
#[must_use]
pub fn max_remaining(store: &Store) -> f64 {
    store
        .iter::<Position>()
        .filter_map(|(vehicle, position)| {
            let destination = store.get::<Destination>(vehicle).ok()?;
            Some(destination.vec().distance(position.vec()))
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use components::{CommandState, ExecutingCommand, IncomingCommand};
    use engine_app::TerminationReason;
    use engine_event::SimTime;

    use super::*;

    fn small(vehicles: u32) -> Scenario {
        Scenario {
            vehicles,
            ..Scenario::default()
        }
    }

    #[test]
    fn test_spawned_vehicles_are_idle_at_origin() {
        let mut store = Store::new();
        let vehicles = spawn_vehicles(&mut store, 3, Destination::new(10.0, 10.0)).unwrap();
        assert_eq!(vehicles.len(), 3);
        for vehicle in vehicles {
            assert_eq!(store.get::<Position>(vehicle), Ok(&Position::default()));
            assert!(store.get::<Commandable>(vehicle).unwrap().is_idle());
        }
    }

    #[test]
    fn test_first_cycle_starts_every_command() {
        let mut coordinator = build(CycleConfig::new().max_cycles(1), &small(4)).unwrap();
        let summary = coordinator.run().unwrap();
        assert_eq!(summary.cycles, 1);

        let store = coordinator.store();
        // Every vehicle was planned and started in cycle one; the earliest
        // completion ended the cycle and idled at least one vehicle.
        assert_eq!(store.iter::<IncomingCommand>().count(), 0);
        let idle = store
            .iter::<Commandable>()
            .filter(|(_, c)| c.state == CommandState::Idling)
            .count();
        assert!(idle >= 1);
        assert_eq!(idle + store.iter::<ExecutingCommand>().count(), 4);
    }

    #[test]
    fn test_first_move_is_halfway() {
        let mut coordinator = build(CycleConfig::new().max_cycles(1), &small(1)).unwrap();
        coordinator.run().unwrap();

        let (_, position) = coordinator.store().iter::<Position>().next().unwrap();
        assert_eq!(*position, Position::new(5.0, 5.0));
    }

    #[test]
    fn test_vehicles_converge_on_destination() {
        let horizon = SimTime::new(50.0).unwrap();
        let mut coordinator = build(CycleConfig::new().horizon(horizon), &small(20)).unwrap();
        let summary = coordinator.run().unwrap();

        assert_eq!(summary.reason, TerminationReason::Horizon);
        assert_eq!(summary.end_time, horizon);
        assert!(max_remaining(coordinator.store()) <= 2.0 * ARRIVAL_THRESHOLD * 2f64.sqrt());
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = |seed| {
            let scenario = Scenario { seed, ..small(5) };
            let mut coordinator = build(CycleConfig::new().max_cycles(20), &scenario).unwrap();
            let summary = coordinator.run().unwrap();
            (summary.end_time, coordinator.store().snapshot().unwrap())
        };
        assert_eq!(run(7), run(7));
    }
}
