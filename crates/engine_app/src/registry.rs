//! System registry: the ordered list of systems the coordinator invokes.
//!
//! Registration order is priority order. Every cycle walks the registry from
//! the first registered system to the last.

use std::rc::Rc;

use engine_system::{System, SystemConfig};

/// A system plus the configuration it declared at registration.
pub(crate) struct RegisteredSystem {
    pub(crate) config: Rc<SystemConfig>,
    pub(crate) system: Box<dyn System>,
}

/// Registry of all systems known to the coordinator.
#[derive(Default)]
pub struct SystemRegistry {
    systems: Vec<RegisteredSystem>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system. Returns its priority (0 runs first).
    ///
    /// The system's [`SystemConfig`] is read once, here.
    pub fn register(&mut self, system: impl System + 'static) -> usize {
        let config = Rc::new(system.config().clone());
        self.systems.push(RegisteredSystem {
            config,
            system: Box::new(system),
        });
        self.systems.len() - 1
    }

    /// Returns the configuration of a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SystemConfig> {
        self.systems
            .iter()
            .map(|s| s.config.as_ref())
            .find(|c| c.name == name)
    }

    /// System names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|s| s.config.name.as_str())
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegisteredSystem> {
        self.systems.iter_mut()
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{ComponentTypeId, QueryDescriptor};
    use engine_system::from_fn;

    use super::*;

    fn make_system(name: &str) -> impl System + 'static {
        from_fn(
            SystemConfig::new(
                name,
                QueryDescriptor::new()
                    .read(ComponentTypeId(1))
                    .write(ComponentTypeId(2)),
            ),
            |_| Ok(()),
        )
    }

    #[test]
    fn test_register_assigns_priority_in_order() {
        let mut registry = SystemRegistry::new();
        assert_eq!(registry.register(make_system("physics")), 0);
        assert_eq!(registry.register(make_system("ai")), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["physics", "ai"]);
    }

    #[test]
    fn test_get_by_name() {
        let mut registry = SystemRegistry::new();
        registry.register(make_system("physics"));
        let config = registry.get("physics").unwrap();
        assert!(config.access.permits(ComponentTypeId(2), engine_component::Access::Write));
        assert!(registry.get("ai").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = SystemRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(format!("{registry:?}"), "[]");
    }
}
