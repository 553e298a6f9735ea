//! Event-queue error types.

use crate::queue::{EventId, EventState};
use crate::time::SimTime;

/// Errors that can occur while scheduling or driving events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    /// Something tried to schedule an event strictly before the current time.
    #[error("causality violation: cannot schedule at {requested} when now is {now}")]
    CausalityViolation {
        /// The queue's virtual time at the attempt.
        now: SimTime,
        /// The time that was asked for.
        requested: f64,
    },

    /// A time or delay was NaN or infinite.
    #[error("invalid virtual time: {0}")]
    InvalidTime(f64),

    /// The event identifier was never issued by this queue.
    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    /// The event already has a firing time.
    #[error("event {0} is already scheduled")]
    AlreadyScheduled(EventId),

    /// The event has left the `Pending` state.
    #[error("event {id} is {state:?}, not pending")]
    NotPending {
        /// The event in question.
        id: EventId,
        /// Its current state.
        state: EventState,
    },

    /// A pending event would be skipped by moving the clock.
    #[error("event {id} is pending at {time}, before the requested time")]
    PendingBefore {
        /// The earliest pending event.
        id: EventId,
        /// Its firing time.
        time: SimTime,
    },
}
