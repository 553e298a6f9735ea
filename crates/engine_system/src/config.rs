//! System configuration.

use engine_component::QueryDescriptor;

/// Configuration for a system.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Human-readable system name (e.g. `"move_command"`).
    pub name: String,
    /// The data access requirements of this system.
    pub access: QueryDescriptor,
    /// A best-effort system's faults are logged and its handle is dropped
    /// for the cycle instead of halting the run.
    pub best_effort: bool,
}

impl SystemConfig {
    /// Create a new system config with the given name and access set.
    #[must_use]
    pub fn new(name: impl Into<String>, access: QueryDescriptor) -> Self {
        Self {
            name: name.into(),
            access,
            best_effort: false,
        }
    }

    /// Mark this system best-effort.
    #[must_use]
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentTypeId;

    use super::*;

    #[test]
    fn test_config_defaults_to_fatal_faults() {
        let config = SystemConfig::new(
            "physics",
            QueryDescriptor::new()
                .read(ComponentTypeId(1))
                .write(ComponentTypeId(2)),
        );
        assert_eq!(config.name, "physics");
        assert!(!config.best_effort);
        assert!(config.best_effort().best_effort);
    }
}
