//! # engine_event
//!
//! A time-ordered trigger mechanism with no knowledge of entities or systems.
//!
//! This crate provides:
//!
//! - [`SimTime`]: totally ordered virtual time.
//! - [`EventQueue`]: pending events ordered by `(time, insertion sequence)`,
//!   each carrying an ordered list of callbacks.
//! - [`EventError`]: scheduling and lifecycle errors.

pub mod error;
pub mod queue;
pub mod time;

pub use error::EventError;
pub use queue::{Callback, CallbackKey, EventId, EventQueue, EventState, Fired, Schedule};
pub use time::SimTime;
