//! Conversion between `neo4rs::BoltType` and [`Value`].
//!
//! Bolt rows are decoded into the protocol-neutral [`Value`] before any
//! typed conversion runs, so the same `FromCyflowValue` impls serve both
//! transports.

use neo4rs::BoltType;

use crate::error::CyflowError;
use crate::value::{NodeCell, PathCell, RelationshipCell, Value};

/// Returns a human-readable name for a [`neo4rs::BoltType`] variant.
pub fn bolt_type_name(v: &BoltType) -> &'static str {
    match v {
        BoltType::Null(_) => "Null",
        BoltType::Boolean(_) => "Boolean",
        BoltType::Integer(_) => "Integer",
        BoltType::Float(_) => "Float",
        BoltType::String(_) => "String",
        BoltType::Bytes(_) => "Bytes",
        BoltType::List(_) => "List",
        BoltType::Map(_) => "Map",
        BoltType::Node(_) => "Node",
        BoltType::Relation(_) => "Relationship",
        BoltType::UnboundedRelation(_) => "UnboundedRelationship",
        BoltType::Path(_) => "Path",
        BoltType::Point2D(_) => "Point2D",
        BoltType::Point3D(_) => "Point3D",
        BoltType::Duration(_) => "Duration",
        BoltType::Date(_) => "Date",
        BoltType::Time(_) => "Time",
        BoltType::LocalTime(_) => "LocalTime",
        BoltType::LocalDateTime(_) => "LocalDateTime",
        BoltType::DateTime(_) => "DateTime",
        BoltType::DateTimeZoneId(_) => "DateTimeZoneId",
    }
}

fn bolt_map(map: neo4rs::BoltMap) -> Result<std::collections::BTreeMap<String, Value>, CyflowError> {
    map.value
        .into_iter()
        .map(|(k, v)| Ok((k.value, from_bolt(v)?)))
        .collect()
}

fn bolt_node(n: neo4rs::BoltNode) -> Result<NodeCell, CyflowError> {
    let labels = n
        .labels
        .value
        .into_iter()
        .filter_map(|l| match l {
            BoltType::String(s) => Some(s.value),
            _ => None,
        })
        .collect();
    Ok(NodeCell {
        id: n.id.value,
        labels,
        properties: bolt_map(n.properties)?,
    })
}

fn bolt_relation(r: neo4rs::BoltRelation) -> Result<RelationshipCell, CyflowError> {
    Ok(RelationshipCell {
        id: r.id.value,
        rel_type: r.typ.value,
        start_node_id: Some(r.start_node_id.value),
        end_node_id: Some(r.end_node_id.value),
        properties: bolt_map(r.properties)?,
    })
}

fn bolt_unbounded(r: neo4rs::BoltUnboundedRelation) -> Result<RelationshipCell, CyflowError> {
    Ok(RelationshipCell {
        id: r.id.value,
        rel_type: r.typ.value,
        start_node_id: None,
        end_node_id: None,
        properties: bolt_map(r.properties)?,
    })
}

fn temporal(what: &str, e: neo4rs::Error) -> CyflowError {
    CyflowError::Mapping(format!("Bolt{what}: {e}"))
}

/// Decode one Bolt value.
///
/// Points become maps with `srid`, `x`, `y` (and `z`) keys. Zone-id date
/// times are resolved to their fixed offset.
pub fn from_bolt(value: BoltType) -> Result<Value, CyflowError> {
    Ok(match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Boolean(b.value),
        BoltType::Integer(i) => Value::Integer(i.value),
        BoltType::Float(f) => Value::Float(f.value),
        BoltType::String(s) => Value::String(s.value),
        BoltType::Bytes(b) => Value::Bytes(b.value.to_vec()),
        BoltType::List(xs) => Value::List(xs.value.into_iter().map(from_bolt).collect::<Result<_, _>>()?),
        BoltType::Map(m) => Value::Map(bolt_map(m)?),
        BoltType::Node(n) => Value::Node(bolt_node(n)?),
        BoltType::Relation(r) => Value::Relationship(bolt_relation(r)?),
        BoltType::UnboundedRelation(r) => Value::Relationship(bolt_unbounded(r)?),
        BoltType::Path(p) => {
            let mut nodes = Vec::new();
            for n in p.nodes.value {
                match n {
                    BoltType::Node(n) => nodes.push(bolt_node(n)?),
                    other => {
                        return Err(CyflowError::type_mismatch("Node", bolt_type_name(&other), "path node"))
                    }
                }
            }
            let mut relationships = Vec::new();
            for r in p.rels.value {
                match r {
                    BoltType::UnboundedRelation(r) => relationships.push(bolt_unbounded(r)?),
                    BoltType::Relation(r) => relationships.push(bolt_relation(r)?),
                    other => {
                        return Err(CyflowError::type_mismatch(
                            "Relationship",
                            bolt_type_name(&other),
                            "path relationship",
                        ))
                    }
                }
            }
            Value::Path(PathCell { nodes, relationships })
        }
        BoltType::Point2D(p) => Value::map([
            ("srid", Value::Integer(p.sr_id.value)),
            ("x", Value::Float(p.x.value)),
            ("y", Value::Float(p.y.value)),
        ]),
        BoltType::Point3D(p) => Value::map([
            ("srid", Value::Integer(p.sr_id.value)),
            ("x", Value::Float(p.x.value)),
            ("y", Value::Float(p.y.value)),
            ("z", Value::Float(p.z.value)),
        ]),
        BoltType::Duration(d) => Value::Duration(d.into()),
        BoltType::Date(d) => Value::Date(d.try_into().map_err(|e| temporal("Date", e))?),
        BoltType::Time(t) => {
            let (time, offset) = t.into();
            Value::Time(time, offset)
        }
        BoltType::LocalTime(t) => Value::LocalTime(t.into()),
        BoltType::LocalDateTime(dt) => {
            Value::LocalDateTime(dt.try_into().map_err(|e| temporal("LocalDateTime", e))?)
        }
        BoltType::DateTime(dt) => Value::DateTime(dt.try_into().map_err(|e| temporal("DateTime", e))?),
        BoltType::DateTimeZoneId(dt) => {
            Value::DateTime((&dt).try_into().map_err(|e| temporal("DateTimeZoneId", e))?)
        }
    })
}

/// Encode a parameter value for the Bolt driver.
///
/// Graph entities are sent by id; paths cannot be parameters.
pub fn to_bolt(value: Value) -> Result<BoltType, CyflowError> {
    Ok(match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Boolean(b) => BoltType::from(b),
        Value::Integer(i) => BoltType::from(i),
        Value::Float(f) => BoltType::from(f),
        Value::String(s) => BoltType::from(s),
        Value::Bytes(b) => BoltType::Bytes(neo4rs::BoltBytes::new(bytes::Bytes::from(b))),
        Value::List(xs) => {
            let items = xs.into_iter().map(to_bolt).collect::<Result<Vec<_>, _>>()?;
            BoltType::List(neo4rs::BoltList::from(items))
        }
        Value::Map(m) => {
            let map = m
                .into_iter()
                .map(|(k, v)| Ok((neo4rs::BoltString::from(k.as_str()), to_bolt(v)?)))
                .collect::<Result<neo4rs::BoltMap, CyflowError>>()?;
            BoltType::Map(map)
        }
        Value::Node(n) => BoltType::from(n.id),
        Value::Relationship(r) => BoltType::from(r.id),
        Value::Path(_) => {
            return Err(CyflowError::Mapping("a path cannot be sent as a parameter".into()));
        }
        Value::Date(d) => BoltType::from(d),
        Value::LocalTime(t) => BoltType::from(t),
        Value::Time(t, offset) => BoltType::from((t, offset)),
        Value::LocalDateTime(dt) => BoltType::from(dt),
        Value::DateTime(dt) => BoltType::from(dt),
        Value::Duration(d) => BoltType::from(d),
    })
}

/// Decode a whole Bolt row given its column names.
pub fn row_from_bolt(row: &neo4rs::Row, columns: &[String]) -> Result<Vec<Value>, CyflowError> {
    columns
        .iter()
        .map(|c| {
            let cell = row
                .get::<BoltType>(c)
                .map_err(|e| CyflowError::Mapping(format!("column '{c}': {e}")))?;
            from_bolt(cell)
        })
        .collect()
}
