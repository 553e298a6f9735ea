//! Store-level error types.
//!
//! These are surfaced synchronously to the calling system, which decides
//! whether they are fatal.

use crate::entity::Entity;
use crate::query::Access;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The entity already carries a component of this type.
    #[error("{entity} already has a `{component}` component")]
    DuplicateComponent {
        /// The entity the insert targeted.
        entity: Entity,
        /// Name of the duplicated component type.
        component: &'static str,
    },

    /// The entity does not carry a component of this type.
    #[error("{entity} has no `{component}` component")]
    ComponentNotFound {
        /// The entity that was looked up.
        entity: Entity,
        /// Name of the missing component type.
        component: &'static str,
    },

    /// The entity identifier is stale or was never issued.
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// The entity identifier space is exhausted.
    #[error("entity identifier space exhausted")]
    ResourceExhausted,

    /// The store was structurally modified while a query cursor was open.
    #[error("store structurally modified during query iteration")]
    ConcurrentModification,

    /// Two distinct Rust types registered under the same component name.
    #[error("another type is already registered as `{component}`")]
    TypeConflict {
        /// The contested component name.
        component: &'static str,
    },

    /// A component could not be serialised into snapshot attributes.
    #[error("failed to snapshot `{component}`: {message}")]
    Snapshot {
        /// Name of the component type.
        component: &'static str,
        /// The serialiser's message.
        message: String,
    },

    /// A system touched a component type outside its declared access set.
    #[error("system `{system}` did not declare {access} access to `{component}`")]
    AccessNotDeclared {
        /// Name of the offending system.
        system: String,
        /// Name of the component type.
        component: &'static str,
        /// The access that was attempted.
        access: Access,
    },
}

impl StoreError {
    /// Returns `true` for the lookup-miss variants.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ComponentNotFound { .. } | Self::EntityNotFound(_)
        )
    }
}
