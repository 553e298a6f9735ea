//! Attribute-level snapshots of the store.
//!
//! A snapshot flattens every component into `(entity, component, attribute,
//! value)` rows, the shape the persistence collaborator stores under its
//! `Entity → Component → Attribute → Value` naming scheme.

use serde::Serialize;
use serde_json::Value;

use crate::entity::Entity;

/// Attribute name used for components that do not serialise to a map
/// (newtypes, enums, scalars).
pub const SCALAR_ATTRIBUTE: &str = "value";

/// One attribute of one component of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    /// The owning entity.
    pub entity: Entity,
    /// The component type name.
    pub component: &'static str,
    /// The attribute (field) name.
    pub attribute: String,
    /// The attribute value. Nested records stay structured.
    pub value: Value,
}

/// Split a serialised component into its named attributes.
pub(crate) fn attributes(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(fields) => fields.into_iter().collect(),
        other => vec![(SCALAR_ATTRIBUTE.to_owned(), other)],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_struct_splits_into_fields() {
        let attrs = attributes(json!({ "x": 1.0, "y": 2.0 }));
        assert_eq!(
            attrs,
            vec![
                ("x".to_owned(), json!(1.0)),
                ("y".to_owned(), json!(2.0)),
            ]
        );
    }

    #[test]
    fn test_scalar_uses_value_attribute() {
        let attrs = attributes(json!("Idling"));
        assert_eq!(attrs, vec![(SCALAR_ATTRIBUTE.to_owned(), json!("Idling"))]);
    }

    #[test]
    fn test_nested_record_stays_structured() {
        let attrs = attributes(json!({ "command": { "delta": [1.0, 0.5] } }));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].1, json!({ "delta": [1.0, 0.5] }));
    }
}
