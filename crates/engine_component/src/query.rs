//! Access descriptors for system data access declarations.
//!
//! A [`QueryDescriptor`] declares which component types a system reads and
//! writes. Systems declare it once at registration; the per-invocation
//! contexts consult it before handing out component data, so a system can
//! only mutate the types it said it would.

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// The kind of access being requested for a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Immutable access.
    Read,
    /// Mutable access, including adding and removing the component.
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Describes the data access requirements of a system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Component types the system reads immutably.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the system writes (mutable access).
    pub writes: Vec<ComponentTypeId>,
}

impl QueryDescriptor {
    /// Create a new empty query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.reads.push(type_id);
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.writes.push(type_id);
        self
    }

    /// Typed shorthand for [`QueryDescriptor::read`].
    #[must_use]
    pub fn with_read<T: Component>(self) -> Self {
        self.read(T::component_type_id())
    }

    /// Typed shorthand for [`QueryDescriptor::write`].
    #[must_use]
    pub fn with_write<T: Component>(self) -> Self {
        self.write(T::component_type_id())
    }

    /// Returns `true` if the descriptor grants `access` to `type_id`.
    ///
    /// Write access implies read access.
    #[must_use]
    pub fn permits(&self, type_id: ComponentTypeId, access: Access) -> bool {
        match access {
            Access::Read => self.reads.contains(&type_id) || self.writes.contains(&type_id),
            Access::Write => self.writes.contains(&type_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_implies_read() {
        let velocity = ComponentTypeId(2);
        let q = QueryDescriptor::new().write(velocity);
        assert!(q.permits(velocity, Access::Read));
        assert!(q.permits(velocity, Access::Write));
    }

    #[test]
    fn test_read_does_not_grant_write() {
        let transform = ComponentTypeId(1);
        let q = QueryDescriptor::new().read(transform);
        assert!(q.permits(transform, Access::Read));
        assert!(!q.permits(transform, Access::Write));
    }

    #[test]
    fn test_undeclared_type_denied() {
        let q = QueryDescriptor::new().read(ComponentTypeId(1));
        assert!(!q.permits(ComponentTypeId(3), Access::Read));
    }
}
