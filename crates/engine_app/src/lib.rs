//! # engine_app
//!
//! The cycle coordinator.
//!
//! The [`Coordinator`] owns the [`World`](engine_system::World) and the event
//! queue, and drives registered systems cycle by cycle. Each cycle every
//! system runs its startup half and publishes one handle; the coordinator
//! then fires events until the first handle's cleanup has completed, cancels
//! the rest, and starts the next cycle. Cycle boundaries therefore follow the
//! earliest-completing wake condition rather than a fixed timestep.
//!
//! ## Usage
//!
//! ```rust
//! use engine_app::{Coordinator, CycleConfig, TerminationReason};
//! use engine_component::QueryDescriptor;
//! use engine_event::SimTime;
//! use engine_system::{SystemConfig, Wake, from_fn};
//!
//! let config = CycleConfig::new().horizon(SimTime::new(100.0).unwrap());
//! let mut coordinator = Coordinator::new(config);
//! coordinator.register(from_fn(
//!     SystemConfig::new("every_ten", QueryDescriptor::new()),
//!     |ctx| {
//!         ctx.make_handle(Wake::After(10.0), |_| Ok(()))?;
//!         Ok(())
//!     },
//! ));
//!
//! let summary = coordinator.run().unwrap();
//! assert_eq!(summary.reason, TerminationReason::Horizon);
//! assert_eq!(summary.cycles, 10);
//! ```

pub mod cycle;
pub mod error;
pub mod registry;

pub use cycle::{Coordinator, CycleConfig, RunSummary, TerminationReason};
pub use error::{CycleError, ErrorKind, RunError};
pub use registry::SystemRegistry;
