//! Coordinator cycle loop.
//!
//! One cycle:
//!
//! 1. Stop if the clock has reached the horizon or nothing can wake the
//!    coordinator again.
//! 2. Invoke every system in priority order. Each must publish exactly one
//!    handle.
//! 3. Fire events until the first handle's cleanup has completed.
//! 4. Cancel the handles that are still waiting.
//!
//! The coordinator's own resumption is an event on the queue: a kickoff
//! event at the start of the run, then a fresh waker per cycle that the
//! first completing handle triggers at the current time. Handles due at the
//! same instant as the winner therefore also complete before the cycle ends.

use engine_component::Store;
use engine_event::{EventId, Schedule, SimTime};
use engine_record::Recorder;
use engine_system::{Queue, System, SystemContext, World};
use tracing::{debug, info, warn};

use crate::error::{CycleError, RunError};
use crate::registry::SystemRegistry;

/// Configuration for the coordinator cycle loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleConfig {
    /// Events at or after this time never fire.
    pub horizon: SimTime,
    /// Maximum number of cycles to run (0 = unlimited).
    pub max_cycles: u64,
}

impl CycleConfig {
    /// Unbounded horizon, unlimited cycles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the horizon.
    #[must_use]
    pub fn horizon(mut self, horizon: SimTime) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the cycle limit.
    #[must_use]
    pub fn max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = max_cycles;
        self
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            horizon: SimTime::INFINITY,
            max_cycles: 0,
        }
    }
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The clock reached the horizon.
    Horizon,
    /// No scheduled event remained to wake the coordinator.
    Exhausted,
    /// The configured cycle limit was reached.
    CycleLimit,
    /// A system requested a stop.
    Stopped,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Cycles executed.
    pub cycles: u64,
    /// Virtual time at termination.
    pub end_time: SimTime,
    /// Why the run ended.
    pub reason: TerminationReason,
    /// Events fired over the run, including the coordinator's own.
    pub events_fired: u64,
    /// Best-effort faults that were logged and skipped.
    pub skipped_faults: usize,
}

enum Wakeup {
    Woken,
    Horizon,
    Exhausted,
}

/// The cycle coordinator.
pub struct Coordinator {
    config: CycleConfig,
    world: World,
    queue: Queue,
    registry: SystemRegistry,
    recorder: Option<Box<dyn Recorder>>,
    cycle: u64,
    skipped_faults: usize,
    stop_requested: bool,
}

impl Coordinator {
    /// Create a coordinator with an empty world at time zero.
    #[must_use]
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            world: World::new(),
            queue: Queue::new(),
            registry: SystemRegistry::new(),
            recorder: None,
            cycle: 0,
            skipped_faults: 0,
            stop_requested: false,
        }
    }

    /// Forward a snapshot of the store to `recorder` after every cycle's
    /// invocations.
    #[must_use]
    pub fn with_recorder(mut self, recorder: impl Recorder + 'static) -> Self {
        self.recorder = Some(Box::new(recorder));
        self
    }

    /// Append a system. Returns its priority (0 runs first).
    pub fn register(&mut self, system: impl System + 'static) -> usize {
        self.registry.register(system)
    }

    /// Returns the cycles executed so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns the loop configuration.
    #[must_use]
    pub const fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Returns a reference to the system registry.
    #[must_use]
    pub const fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Returns a reference to the world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Returns a reference to the store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.world.store
    }

    /// Returns a mutable reference to the store, for seeding a scenario.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.world.store
    }

    /// Returns a reference to the event queue.
    #[must_use]
    pub const fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Returns a mutable reference to the event queue.
    pub fn queue_mut(&mut self) -> &mut Queue {
        &mut self.queue
    }

    /// Run cycles until the horizon, exhaustion, the cycle limit, a stop
    /// request or a fatal error.
    ///
    /// Outstanding handles are cancelled on every exit path. A coordinator
    /// may run again: the world and the clock carry over, while the cycle
    /// count, skipped faults and stop request start afresh.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error with the virtual time it occurred at.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        self.cycle = 0;
        self.skipped_faults = 0;
        self.stop_requested = false;
        let fired_before = self.queue.fired_count();
        info!(
            horizon = %self.config.horizon,
            max_cycles = self.config.max_cycles,
            systems = self.registry.len(),
            "starting run"
        );

        let outcome = self.run_cycles();
        let cancelled = self.world.processes.cancel_waiting(&mut self.queue);
        self.world.processes.disarm(&mut self.queue);
        self.world.processes.prune();
        let now = self.queue.now();

        let reason = match outcome {
            Ok(reason) => reason,
            Err(error) => {
                if let Some(recorder) = &mut self.recorder
                    && let Err(flush_error) = recorder.flush()
                {
                    warn!(error = %flush_error, "failed to flush recorder");
                }
                warn!(cycle = self.cycle, %now, cancelled, error = %error, "run failed");
                return Err(RunError { time: now, error });
            }
        };

        if let Some(recorder) = &mut self.recorder {
            recorder
                .flush()
                .map_err(|error| RunError { time: now, error: error.into() })?;
        }

        let summary = RunSummary {
            cycles: self.cycle,
            end_time: now,
            reason,
            events_fired: self.queue.fired_count() - fired_before,
            skipped_faults: self.skipped_faults,
        };
        info!(
            cycles = summary.cycles,
            %now,
            reason = ?summary.reason,
            events = summary.events_fired,
            cancelled,
            "run complete"
        );
        Ok(summary)
    }

    fn run_cycles(&mut self) -> Result<TerminationReason, CycleError> {
        let kickoff = self.world.processes.arm(&mut self.queue);
        self.queue.trigger(kickoff, Schedule::now())?;
        let mut waker = kickoff;

        loop {
            match self.wait_for(waker)? {
                Wakeup::Woken => {}
                Wakeup::Horizon => return self.reach_horizon(),
                Wakeup::Exhausted => return Ok(TerminationReason::Exhausted),
            }

            let cancelled = self.world.processes.cancel_waiting(&mut self.queue);
            self.world.processes.take_completed();
            self.world.processes.prune();
            self.queue.forget_retired();
            if cancelled > 0 {
                debug!(cycle = self.cycle, cancelled, "cancelled stale handles");
            }

            if self.stop_requested {
                return Ok(TerminationReason::Stopped);
            }
            if self.config.max_cycles > 0 && self.cycle >= self.config.max_cycles {
                return Ok(TerminationReason::CycleLimit);
            }
            if self.queue.now() >= self.config.horizon {
                return self.reach_horizon();
            }

            self.cycle += 1;
            debug!(cycle = self.cycle, now = %self.queue.now(), "cycle start");
            waker = self.world.processes.arm(&mut self.queue);
            self.invoke_systems()?;
            self.record()?;
        }
    }

    /// Fire events until `waker` fires.
    fn wait_for(&mut self, waker: EventId) -> Result<Wakeup, CycleError> {
        loop {
            let Some(next) = self.queue.peek_time() else {
                return Ok(Wakeup::Exhausted);
            };
            if next >= self.config.horizon {
                return Ok(Wakeup::Horizon);
            }
            let fired = self.queue.advance(&mut self.world)?;
            self.check_faults()?;
            if let Some(fired) = fired
                && fired.id == waker
            {
                debug!(cycle = self.cycle, now = %fired.time, "coordinator woken");
                return Ok(Wakeup::Woken);
            }
        }
    }

    fn reach_horizon(&mut self) -> Result<TerminationReason, CycleError> {
        let horizon = self.config.horizon;
        if horizon.is_finite() && self.queue.now() < horizon {
            self.queue.fast_forward(horizon)?;
        }
        Ok(TerminationReason::Horizon)
    }

    fn check_faults(&mut self) -> Result<(), CycleError> {
        for fault in self.world.processes.take_faults() {
            if !fault.best_effort {
                return Err(CycleError::SystemFault {
                    system: fault.system,
                    error: fault.error,
                });
            }
            self.skipped_faults += 1;
        }
        Ok(())
    }

    fn invoke_systems(&mut self) -> Result<(), CycleError> {
        for entry in self.registry.iter_mut() {
            let name = entry.config.name.as_str();
            let mut ctx =
                SystemContext::new(&mut self.world, &mut self.queue, entry.config.clone());
            let outcome = entry
                .system
                .update(&mut ctx)
                .and_then(|()| ctx.apply_deferred().map_err(anyhow::Error::from));
            let invocation = ctx.finish();
            self.stop_requested |= invocation.stop_requested;

            let error = match outcome {
                Ok(()) if invocation.handles.len() == 1 => continue,
                Ok(()) => {
                    return Err(CycleError::ProtocolViolation {
                        system: name.to_owned(),
                        count: invocation.handles.len(),
                    });
                }
                Err(error) => error,
            };

            for handle in invocation.handles {
                self.world.processes.cancel(&mut self.queue, handle);
            }
            if let Some(event_error) = error.downcast_ref::<engine_event::EventError>() {
                return Err(CycleError::Event(event_error.clone()));
            }
            if !entry.config.best_effort {
                return Err(CycleError::SystemFault {
                    system: name.to_owned(),
                    error,
                });
            }
            warn!(
                cycle = self.cycle,
                system = name,
                now = %self.queue.now(),
                error = %error,
                "startup failed, skipping system this cycle"
            );
            self.skipped_faults += 1;
        }
        Ok(())
    }

    fn record(&mut self) -> Result<(), CycleError> {
        let Some(recorder) = &mut self.recorder else {
            return Ok(());
        };
        let rows = self.world.store.snapshot()?;
        recorder.record(self.queue.now(), &rows)?;
        Ok(())
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("cycle", &self.cycle)
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::QueryDescriptor;
    use engine_system::{SystemConfig, Wake, from_fn};

    use super::*;

    fn periodic(name: &str, period: f64) -> impl System + 'static {
        from_fn(SystemConfig::new(name, QueryDescriptor::new()), move |ctx| {
            ctx.make_handle(Wake::After(period), |_| Ok(()))?;
            Ok(())
        })
    }

    #[test]
    fn test_cycle_advances_counter() {
        let mut coordinator = Coordinator::new(CycleConfig::new().max_cycles(2));
        coordinator.register(periodic("tick", 1.0));
        assert_eq!(coordinator.cycle(), 0);

        let summary = coordinator.run().unwrap();
        assert_eq!(coordinator.cycle(), 2);
        assert_eq!(summary.reason, TerminationReason::CycleLimit);
        // Cycle 1 starts at 0, cycle 2 at 1, and cycle 2's handle wakes at 2.
        assert_eq!(summary.end_time, SimTime::new(2.0).unwrap());
    }

    #[test]
    fn test_no_systems_exhausts_after_one_cycle() {
        let mut coordinator = Coordinator::new(CycleConfig::new());
        let summary = coordinator.run().unwrap();
        assert_eq!(summary.reason, TerminationReason::Exhausted);
        assert_eq!(summary.cycles, 1);
    }

    #[test]
    fn test_horizon_fast_forwards_clock() {
        let horizon = SimTime::new(10.0).unwrap();
        let mut coordinator = Coordinator::new(CycleConfig::new().horizon(horizon));
        coordinator.register(periodic("tick", 3.0));

        let summary = coordinator.run().unwrap();
        assert_eq!(summary.reason, TerminationReason::Horizon);
        assert_eq!(summary.cycles, 4);
        assert_eq!(summary.end_time, horizon);
        assert!(coordinator.queue().is_empty());
    }

    #[test]
    fn test_default_config_is_unbounded() {
        let config = CycleConfig::default();
        assert_eq!(config.horizon, SimTime::INFINITY);
        assert_eq!(config.max_cycles, 0);
    }
}
