//! Centralized property access for nodes and relationships.
//!
//! These functions keep derive-macro generated code independent of the cell
//! layout.

use crate::value::{NodeCell, RelationshipCell, Value};

/// Read a property from a [`NodeCell`] by key.
///
/// Returns `None` if the property does not exist on the node.
pub fn node_prop(node: &NodeCell, key: &str) -> Option<Value> {
    node.properties.get(key).cloned()
}

/// Read a property from a [`RelationshipCell`] by key.
///
/// Returns `None` if the property does not exist on the relationship.
pub fn rel_prop(rel: &RelationshipCell, key: &str) -> Option<Value> {
    rel.properties.get(key).cloned()
}
