//! The [`Component`] trait and the identity of component types.
//!
//! Components must be `Serialize`: a snapshot walks a component's fields by
//! serialising it, so the store never needs to know a component's layout.
//!
//! A [`ComponentTypeId`] is the FNV-1a 64-bit hash of the type's name. Names,
//! not Rust `TypeId`s, decide identity, so ids agree across builds and runs
//! and recorded snapshots stay comparable.

use serde::{Deserialize, Serialize};

/// Stable identity of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    /// Hash `name` with FNV-1a 64.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::OFFSET;
        let mut at = 0;
        while at < bytes.len() {
            hash = (hash ^ bytes[at] as u64).wrapping_mul(Self::PRIME);
            at += 1;
        }
        Self(hash)
    }

    /// Identity of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

/// Identity and name of a component type, kept next to its erased storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentMeta {
    pub type_id: ComponentTypeId,
    pub name: &'static str,
}

/// A typed record attached to one entity.
///
/// ```rust
/// use serde::Serialize;
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Serialize)]
/// struct Fuel {
///     litres: f64,
/// }
///
/// impl Component for Fuel {
///     fn type_name() -> &'static str { "Fuel" }
/// }
/// ```
pub trait Component: Serialize + 'static {
    /// Name used for identity, snapshots and error messages.
    fn type_name() -> &'static str;

    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    fn meta() -> ComponentMeta {
        ComponentMeta {
            type_id: Self::component_type_id(),
            name: Self::type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Fuel {
        litres: f64,
    }

    impl Component for Fuel {
        fn type_name() -> &'static str {
            "Fuel"
        }
    }

    #[test]
    fn test_id_is_hash_of_name() {
        assert_eq!(Fuel::component_type_id(), ComponentTypeId::from_name("Fuel"));
        assert_eq!(ComponentTypeId::of::<Fuel>(), ComponentTypeId::from_name("Fuel"));
        assert_ne!(ComponentTypeId::from_name("Fuel"), ComponentTypeId::from_name("Cargo"));
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(ComponentTypeId::from_name(""), ComponentTypeId(0xcbf2_9ce4_8422_2325));
        assert_eq!(ComponentTypeId::from_name("a"), ComponentTypeId(0xaf63_dc4c_8601_ec8c));
    }

    #[test]
    fn test_meta_names_the_type() {
        let meta = Fuel::meta();
        assert_eq!(meta.name, "Fuel");
        assert_eq!(meta.type_id, ComponentTypeId::of::<Fuel>());
    }
}
