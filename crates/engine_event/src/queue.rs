//! The discrete-event queue.
//!
//! Pending events are kept in a `BTreeMap` keyed by `(time, sequence)`. The
//! sequence number is assigned when an event is scheduled, so events at equal
//! times fire strictly in insertion order and a deterministic simulation
//! replays the same firing order every run.
//!
//! Each event moves through
//!
//! ```text
//! Pending --advance()--> Triggered --(callbacks run)--> Retired
//! Pending --cancel()--> Cancelled
//! ```
//!
//! `Retired` and `Cancelled` are terminal. Terminal events keep their slot,
//! so their state and firing time stay observable, until
//! [`EventQueue::forget_retired`] drops it.
//!
//! The queue is generic over the state `S` its callbacks mutate. Callbacks
//! receive the queue itself as well, so they can schedule follow-up events.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::EventError;
use crate::time::SimTime;

/// A callback run when its event triggers.
pub type Callback<S> = Box<dyn FnOnce(&mut EventQueue<S>, &mut S) -> Result<(), EventError>>;

/// Identifies an event for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

/// Identifies one callback registration, for [`EventQueue::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackKey(u64);

/// Lifecycle state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    /// Created, possibly scheduled, not yet fired.
    Pending,
    /// Popped by `advance()`; its callbacks are running.
    Triggered,
    /// Callbacks have run. Terminal.
    Retired,
    /// Dropped before firing. Terminal.
    Cancelled,
}

/// When an event should fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// After a delay relative to the current time.
    In(f64),
    /// At an absolute time.
    At(SimTime),
}

impl Schedule {
    /// Fire at the current time, after everything already scheduled for it.
    #[must_use]
    pub const fn now() -> Self {
        Self::In(0.0)
    }
}

/// Returned by [`EventQueue::advance`] for each fired event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    /// The event that fired.
    pub id: EventId,
    /// Its firing time (now the queue's current time).
    pub time: SimTime,
    /// Its insertion sequence number.
    pub seq: u64,
}

struct EventSlot<S> {
    state: EventState,
    /// `(time, seq)` once scheduled.
    key: Option<(SimTime, u64)>,
    callbacks: Vec<(CallbackKey, Callback<S>)>,
}

/// A priority queue of events in virtual time.
pub struct EventQueue<S> {
    now: SimTime,
    next_id: u64,
    next_seq: u64,
    next_key: u64,
    pending: BTreeMap<(SimTime, u64), EventId>,
    events: HashMap<EventId, EventSlot<S>>,
    fired: u64,
}

impl<S> EventQueue<S> {
    /// Create an empty queue at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_id: 0,
            next_seq: 0,
            next_key: 0,
            pending: BTreeMap::new(),
            events: HashMap::new(),
            fired: 0,
        }
    }

    /// Current virtual time. Never decreases.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// `true` when no scheduled event remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of scheduled, unfired events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Firing time of the next scheduled event.
    #[must_use]
    pub fn peek_time(&self) -> Option<SimTime> {
        self.pending.keys().next().map(|(time, _)| *time)
    }

    /// Number of events fired so far.
    #[must_use]
    pub const fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Lifecycle state of `id`, if it was issued by this queue.
    #[must_use]
    pub fn state(&self, id: EventId) -> Option<EventState> {
        self.events.get(&id).map(|slot| slot.state)
    }

    /// Firing time of `id`, once scheduled.
    #[must_use]
    pub fn time_of(&self, id: EventId) -> Option<SimTime> {
        self.events.get(&id)?.key.map(|(time, _)| time)
    }

    /// Resolve `schedule` into an absolute time no earlier than now.
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidTime`] for NaN or infinite input, or a delay that
    /// overflows the clock,
    /// [`EventError::CausalityViolation`] for a time strictly in the past.
    pub fn resolve(&self, schedule: Schedule) -> Result<SimTime, EventError> {
        let (requested, in_order) = match schedule {
            Schedule::In(delay) => {
                if !delay.is_finite() {
                    return Err(EventError::InvalidTime(delay));
                }
                (self.now.as_f64() + delay, delay >= 0.0)
            }
            Schedule::At(at) => {
                if !at.is_finite() {
                    return Err(EventError::InvalidTime(at.as_f64()));
                }
                (at.as_f64(), at >= self.now)
            }
        };
        if !requested.is_finite() {
            return Err(EventError::InvalidTime(requested));
        }
        if !in_order {
            return Err(EventError::CausalityViolation {
                now: self.now,
                requested,
            });
        }
        SimTime::new(requested)
    }

    /// Create a pending event with no firing time. It fires only once
    /// [`EventQueue::trigger`] schedules it.
    pub fn event(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.insert(
            id,
            EventSlot {
                state: EventState::Pending,
                key: None,
                callbacks: Vec::new(),
            },
        );
        id
    }

    /// Create an event that fires at `schedule` with no callbacks yet.
    pub fn timeout(&mut self, schedule: Schedule) -> Result<EventId, EventError> {
        let time = self.resolve(schedule)?;
        let id = self.event();
        self.insert(id, time);
        Ok(id)
    }

    /// Create an event that fires at `schedule` and runs `callback`.
    pub fn schedule(
        &mut self,
        schedule: Schedule,
        callback: impl FnOnce(&mut EventQueue<S>, &mut S) -> Result<(), EventError> + 'static,
    ) -> Result<EventId, EventError> {
        let id = self.timeout(schedule)?;
        self.subscribe(id, callback)?;
        Ok(id)
    }

    /// Give an unscheduled pending event its firing time.
    ///
    /// # Errors
    ///
    /// [`EventError::AlreadyScheduled`] if it already has one,
    /// [`EventError::NotPending`] if it has fired or been cancelled, plus the
    /// errors of [`EventQueue::resolve`].
    pub fn trigger(&mut self, id: EventId, schedule: Schedule) -> Result<(), EventError> {
        let slot = self.events.get(&id).ok_or(EventError::UnknownEvent(id))?;
        if slot.state != EventState::Pending {
            return Err(EventError::NotPending {
                id,
                state: slot.state,
            });
        }
        if slot.key.is_some() {
            return Err(EventError::AlreadyScheduled(id));
        }
        let time = self.resolve(schedule)?;
        self.insert(id, time);
        Ok(())
    }

    fn insert(&mut self, id: EventId, time: SimTime) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((time, seq), id);
        if let Some(slot) = self.events.get_mut(&id) {
            slot.key = Some((time, seq));
        }
        trace!(event = %id, %time, seq, "scheduled event");
    }

    /// Register `callback` on a pending event. Callbacks run in
    /// registration order.
    pub fn subscribe(
        &mut self,
        id: EventId,
        callback: impl FnOnce(&mut EventQueue<S>, &mut S) -> Result<(), EventError> + 'static,
    ) -> Result<CallbackKey, EventError> {
        let key = CallbackKey(self.next_key);
        let slot = self.events.get_mut(&id).ok_or(EventError::UnknownEvent(id))?;
        if slot.state != EventState::Pending {
            return Err(EventError::NotPending {
                id,
                state: slot.state,
            });
        }
        self.next_key += 1;
        slot.callbacks.push((key, Box::new(callback)));
        Ok(key)
    }

    /// Remove one callback from a pending event. Returns `false` if it was
    /// not registered there (or the event already fired).
    pub fn unsubscribe(&mut self, id: EventId, key: CallbackKey) -> bool {
        let Some(slot) = self.events.get_mut(&id) else {
            return false;
        };
        let before = slot.callbacks.len();
        slot.callbacks.retain(|(k, _)| *k != key);
        slot.callbacks.len() != before
    }

    /// Drop a pending event and its callbacks without running them.
    ///
    /// Idempotent: returns `false` if the event is not pending.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let Some(slot) = self.events.get_mut(&id) else {
            return false;
        };
        if slot.state != EventState::Pending {
            return false;
        }
        if let Some(key) = slot.key {
            self.pending.remove(&key);
        }
        slot.state = EventState::Cancelled;
        slot.callbacks.clear();
        trace!(event = %id, "cancelled event");
        true
    }

    /// Pop the earliest pending event, move the clock to its time and run
    /// its callbacks in registration order.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Propagates the first callback error. The event is retired regardless
    /// and its remaining callbacks are dropped.
    pub fn advance(&mut self, state: &mut S) -> Result<Option<Fired>, EventError> {
        let Some(((time, seq), id)) = self.pending.pop_first() else {
            return Ok(None);
        };
        self.now = time;
        self.fired += 1;

        let callbacks = match self.events.get_mut(&id) {
            Some(slot) => {
                slot.state = EventState::Triggered;
                std::mem::take(&mut slot.callbacks)
            }
            None => Vec::new(),
        };
        trace!(event = %id, %time, seq, callbacks = callbacks.len(), "firing event");

        let mut result = Ok(());
        for (_, callback) in callbacks {
            if let Err(err) = callback(self, state) {
                result = Err(err);
                break;
            }
        }

        if let Some(slot) = self.events.get_mut(&id) {
            slot.state = EventState::Retired;
        }
        result.map(|()| Some(Fired { id, time, seq }))
    }

    /// Drop the slots of retired and cancelled events.
    ///
    /// Their ids become unknown to [`EventQueue::state`] and
    /// [`EventQueue::time_of`]. Returns the number of slots dropped.
    pub fn forget_retired(&mut self) -> usize {
        let before = self.events.len();
        self.events.retain(|_, slot| {
            !matches!(slot.state, EventState::Retired | EventState::Cancelled)
        });
        before - self.events.len()
    }

    /// Move the clock forward to `to` without firing anything.
    ///
    /// # Errors
    ///
    /// [`EventError::CausalityViolation`] if `to` is in the past,
    /// [`EventError::PendingBefore`] if an event is scheduled before `to`.
    pub fn fast_forward(&mut self, to: SimTime) -> Result<(), EventError> {
        if to < self.now {
            return Err(EventError::CausalityViolation {
                now: self.now,
                requested: to.as_f64(),
            });
        }
        if let Some((&(time, _), &id)) = self.pending.iter().next() {
            if time < to {
                return Err(EventError::PendingBefore { id, time });
            }
        }
        self.now = to;
        Ok(())
    }
}

impl<S> Default for EventQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for EventQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("events", &self.events.len())
            .field("fired", &self.fired)
            .finish()
    }
}
