//! # engine_component
//!
//! The entity-component store of the simulation engine. It owns all
//! simulation state and knows nothing about scheduling.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract all ECS data must satisfy.
//! - [`Entity`]: generational entity identifiers.
//! - [`EntityAllocator`]: slot allocator with generation-tagged reuse.
//! - [`SparseSet`]: per-type storage with O(1) point lookups.
//! - [`Store`]: the store itself, with queries, cursors, reclamation and snapshots.
//! - [`Commands`]: deferred structural changes.
//! - [`QueryDescriptor`]: declarative data access requirements for systems.

pub mod commands;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod snapshot;
pub mod storage;
pub mod store;

pub use commands::Commands;
pub use component::{Component, ComponentMeta, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use error::StoreError;
pub use query::{Access, QueryDescriptor};
pub use snapshot::{SCALAR_ATTRIBUTE, SnapshotRow};
pub use storage::SparseSet;
pub use store::{Query, QueryCursor, Store};
