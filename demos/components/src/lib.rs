//! Component definitions for the move-command demo.
//!
//! Vehicles carry a [`Position`], a [`Destination`] and a [`Commandable`]
//! state. A planner hands idle vehicles an [`IncomingCommand`]; an executor
//! turns it into an [`ExecutingCommand`] with a completion time and applies
//! the move once that time arrives.

use engine_component::Component;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A point in the plane.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The position as a vector.
    #[must_use]
    pub const fn vec(self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Move by `delta`.
    pub fn translate(&mut self, delta: DVec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

/// Where a vehicle is heading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Destination {
    /// Create a new destination.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The destination as a vector.
    #[must_use]
    pub const fn vec(self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }
}

impl Component for Destination {
    fn type_name() -> &'static str {
        "Destination"
    }
}

/// Whether a vehicle is free to take a command.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandState {
    /// Waiting for a command.
    #[default]
    Idling,
    /// Carrying out a command.
    Executing,
}

/// Marks an entity as able to receive commands.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commandable {
    /// Current command state.
    pub state: CommandState,
}

impl Commandable {
    /// Returns `true` if the vehicle can take a new command.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == CommandState::Idling
    }
}

impl Component for Commandable {
    fn type_name() -> &'static str {
        "Commandable"
    }
}

/// A relative move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MoveCommand {
    /// Displacement to apply.
    pub delta: DVec2,
}

/// A command issued but not yet started.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IncomingCommand {
    /// The issued command.
    pub command: MoveCommand,
}

impl Component for IncomingCommand {
    fn type_name() -> &'static str {
        "IncomingCommand"
    }
}

/// The command a vehicle is carrying out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExecutingCommand {
    /// The command being executed.
    pub command: MoveCommand,
    /// Virtual time at which it completes.
    pub completes_at: f64,
}

impl Component for ExecutingCommand {
    fn type_name() -> &'static str {
        "ExecutingCommand"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_translate() {
        let mut position = Position::default();
        position.translate(DVec2::new(5.0, -2.5));
        assert_eq!(position, Position::new(5.0, -2.5));
    }

    #[test]
    fn test_commandable_defaults_to_idle() {
        assert!(Commandable::default().is_idle());
        let busy = Commandable {
            state: CommandState::Executing,
        };
        assert!(!busy.is_idle());
    }

    #[test]
    fn test_nested_command_serialises_structured() {
        let executing = ExecutingCommand {
            command: MoveCommand {
                delta: DVec2::new(1.0, 2.0),
            },
            completes_at: 0.5,
        };
        assert_eq!(
            serde_json::to_value(executing).unwrap(),
            json!({ "command": { "delta": [1.0, 2.0] }, "completes_at": 0.5 })
        );
    }

    #[test]
    fn test_type_names_are_distinct() {
        let ids = [
            Position::component_type_id(),
            Destination::component_type_id(),
            Commandable::component_type_id(),
            IncomingCommand::component_type_id(),
            ExecutingCommand::component_type_id(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
