//! Suspension handles.
//!
//! A system's invocation is split in two halves. The *startup* half runs
//! synchronously inside [`System::update`](crate::System::update) and ends by
//! publishing a handle. The *cleanup* half runs later, inside the callback of
//! the event the handle waits on:
//!
//! ```text
//! Waiting --wake event fires--> CleaningUp --Ok--> Done
//!                                          --Err-> Faulted
//! Waiting --cancel()--> Cancelled
//! ```
//!
//! Because event callbacks never overlap, no two cleanups ever interleave.
//! A handle's wake binding is either an event it owns (created from a delay
//! or absolute time) or a shared event it merely subscribes to.

use std::collections::BTreeMap;
use std::rc::Rc;

use engine_event::{CallbackKey, EventError, EventId, Schedule, SimTime};
use tracing::{debug, warn};

use crate::config::SystemConfig;
use crate::context::CleanupContext;
use crate::world::{Queue, World};

/// The deferred half of a system invocation.
pub type Cleanup = Box<dyn FnOnce(&mut CleanupContext<'_>) -> anyhow::Result<()>>;

/// Identifies a suspension handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Published, waiting for its event.
    Waiting,
    /// Its cleanup is running.
    CleaningUp,
    /// Cleanup returned `Ok`. Terminal.
    Done,
    /// Cleanup returned an error. Terminal.
    Faulted,
    /// Cancelled before its event fired; cleanup never runs. Terminal.
    Cancelled,
}

impl HandleState {
    /// Returns `true` for the terminal states.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Faulted | Self::Cancelled)
    }
}

/// What a handle waits on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    /// A fresh event after a delay from now.
    After(f64),
    /// A fresh event at an absolute time.
    At(SimTime),
    /// An existing event, possibly shared with other handles. Cancelling the
    /// handle only unsubscribes from it.
    On(EventId),
    /// Nothing. The handle completes only if cancelled.
    Never,
}

enum Binding {
    Owned(EventId),
    Shared(EventId, CallbackKey),
    Unbound,
}

struct Process {
    config: Rc<SystemConfig>,
    state: HandleState,
    binding: Binding,
    cleanup: Option<Cleanup>,
}

/// A cleanup that returned an error.
#[derive(Debug)]
pub struct Fault {
    /// The handle whose cleanup failed.
    pub handle: HandleId,
    /// Name of the owning system.
    pub system: String,
    /// Whether the owning system is best-effort.
    pub best_effort: bool,
    /// Virtual time of the failure.
    pub time: SimTime,
    /// What went wrong.
    pub error: anyhow::Error,
}

/// Every handle published so far, plus the coordinator's waker.
///
/// The waker is a manually triggered event. The first handle to complete
/// after [`ProcessTable::arm`] schedules it at the current time; later
/// completions leave it alone.
#[derive(Default)]
pub struct ProcessTable {
    next_id: u64,
    processes: BTreeMap<HandleId, Process>,
    completed: Vec<HandleId>,
    faults: Vec<Fault>,
    waker: Option<EventId>,
}

impl ProcessTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a handle that runs `cleanup` when `wake` fires.
    ///
    /// # Errors
    ///
    /// Whatever the queue reports for `wake`: a delay or time in the past,
    /// a non-finite time, or an event that is unknown or no longer pending.
    pub fn spawn(
        &mut self,
        queue: &mut Queue,
        config: Rc<SystemConfig>,
        wake: Wake,
        cleanup: Cleanup,
    ) -> Result<HandleId, EventError> {
        let id = HandleId(self.next_id);
        let resume = move |queue: &mut Queue, world: &mut World| world.resume(queue, id);
        let binding = match wake {
            Wake::After(delay) => {
                let event = queue.schedule(Schedule::In(delay), resume)?;
                Binding::Owned(event)
            }
            Wake::At(time) => {
                let event = queue.schedule(Schedule::At(time), resume)?;
                Binding::Owned(event)
            }
            Wake::On(event) => Binding::Shared(event, queue.subscribe(event, resume)?),
            Wake::Never => Binding::Unbound,
        };
        self.next_id += 1;
        debug!(handle = %id, system = %config.name, ?wake, "published handle");
        self.processes.insert(
            id,
            Process {
                config,
                state: HandleState::Waiting,
                binding,
                cleanup: Some(cleanup),
            },
        );
        Ok(id)
    }

    /// Lifecycle state of `id`, until [`ProcessTable::prune`] drops it.
    #[must_use]
    pub fn state(&self, id: HandleId) -> Option<HandleState> {
        self.processes.get(&id).map(|p| p.state)
    }

    /// Number of handles still waiting.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.state == HandleState::Waiting)
            .count()
    }

    /// Cancel a waiting handle. Its cleanup is dropped without running.
    ///
    /// Idempotent: returns `false` if the handle is unknown or not waiting.
    pub fn cancel(&mut self, queue: &mut Queue, id: HandleId) -> bool {
        let Some(process) = self.processes.get_mut(&id) else {
            return false;
        };
        if process.state != HandleState::Waiting {
            return false;
        }
        match process.binding {
            Binding::Owned(event) => {
                queue.cancel(event);
            }
            Binding::Shared(event, key) => {
                queue.unsubscribe(event, key);
            }
            Binding::Unbound => {}
        }
        process.state = HandleState::Cancelled;
        process.cleanup = None;
        debug!(handle = %id, system = %process.config.name, "cancelled handle");
        true
    }

    /// Cancel every waiting handle. Returns how many were cancelled.
    pub fn cancel_waiting(&mut self, queue: &mut Queue) -> usize {
        let waiting: Vec<HandleId> = self
            .processes
            .iter()
            .filter(|(_, p)| p.state == HandleState::Waiting)
            .map(|(id, _)| *id)
            .collect();
        waiting
            .into_iter()
            .filter(|id| self.cancel(queue, *id))
            .count()
    }

    /// Create a fresh waker event and return it. Replaces any previous
    /// waker, cancelling it if it never fired.
    pub fn arm(&mut self, queue: &mut Queue) -> EventId {
        self.disarm(queue);
        let waker = queue.event();
        self.waker = Some(waker);
        waker
    }

    /// Drop the current waker, if any.
    pub fn disarm(&mut self, queue: &mut Queue) {
        if let Some(waker) = self.waker.take() {
            queue.cancel(waker);
        }
    }

    /// Handles that completed since the last call, in completion order.
    pub fn take_completed(&mut self) -> Vec<HandleId> {
        std::mem::take(&mut self.completed)
    }

    /// Cleanup faults since the last call.
    pub fn take_faults(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.faults)
    }

    /// Forget every handle in a terminal state.
    pub fn prune(&mut self) {
        self.processes.retain(|_, p| !p.state.is_finished());
    }

    pub(crate) fn begin_cleanup(&mut self, id: HandleId) -> Option<(Rc<SystemConfig>, Cleanup)> {
        let process = self.processes.get_mut(&id)?;
        if process.state != HandleState::Waiting {
            return None;
        }
        let cleanup = process.cleanup.take()?;
        process.state = HandleState::CleaningUp;
        Some((process.config.clone(), cleanup))
    }

    pub(crate) fn finish_cleanup(
        &mut self,
        queue: &mut Queue,
        id: HandleId,
        config: &SystemConfig,
        outcome: anyhow::Result<()>,
    ) -> Result<(), EventError> {
        let error = match outcome {
            Ok(()) => {
                self.set_state(id, HandleState::Done);
                self.completed.push(id);
                debug!(handle = %id, system = %config.name, now = %queue.now(), "handle done");
                if let Some(waker) = self.waker.take() {
                    queue.trigger(waker, Schedule::now())?;
                }
                return Ok(());
            }
            Err(error) => error,
        };

        self.set_state(id, HandleState::Faulted);
        // Queue misuse is never recoverable, best-effort or not.
        if let Some(event_error) = error.downcast_ref::<EventError>() {
            return Err(event_error.clone());
        }
        if config.best_effort {
            warn!(handle = %id, system = %config.name, now = %queue.now(), error = %error, "cleanup failed, dropping handle");
        }
        self.faults.push(Fault {
            handle: id,
            system: config.name.clone(),
            best_effort: config.best_effort,
            time: queue.now(),
            error,
        });
        Ok(())
    }

    fn set_state(&mut self, id: HandleId, state: HandleState) {
        if let Some(process) = self.processes.get_mut(&id) {
            process.state = state;
        }
    }
}

impl std::fmt::Debug for ProcessTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTable")
            .field("handles", &self.processes.len())
            .field("waiting", &self.waiting())
            .field("completed", &self.completed)
            .field("faults", &self.faults.len())
            .field("waker", &self.waker)
            .finish()
    }
}
