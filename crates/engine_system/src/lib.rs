//! # engine_system
//!
//! Systems and their suspension handles.
//!
//! A [`System`] runs in two halves. Its *startup* half runs inside
//! [`System::update`] with a [`SystemContext`], and ends by publishing a
//! handle that waits on an event. Its *cleanup* half runs with a
//! [`CleanupContext`] when that event fires. Both halves see the store only
//! through the component types declared in the system's [`SystemConfig`].
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::QueryDescriptor;
//! use engine_system::{SystemConfig, Wake, from_fn};
//!
//! let heartbeat = from_fn(SystemConfig::new("heartbeat", QueryDescriptor::new()), |ctx| {
//!     ctx.make_handle(Wake::After(1.0), |cleanup| {
//!         tracing::info!(now = %cleanup.now(), "beat");
//!         Ok(())
//!     })?;
//!     Ok(())
//! });
//! # let _ = heartbeat;
//! ```

pub mod config;
pub mod context;
pub mod process;
pub mod system;
pub mod world;

pub use config::SystemConfig;
pub use context::{CleanupContext, Invocation, StoreAccess, SystemContext};
pub use process::{Cleanup, Fault, HandleId, HandleState, ProcessTable, Wake};
pub use system::{FnSystem, System, from_fn};
pub use world::{Queue, World};
