//! Conversion between REST JSON bodies and [`Value`].
//!
//! The REST API answers in three shapes:
//!
//! - the legacy `/cypher` endpoint: `{columns, data: [[cell, ...]]}` with
//!   entity cells in "rest" form (`self`, `data`, `metadata`, ...);
//! - the transactional endpoint with `resultDataContents: ["rest"]`: one
//!   `rest` array per row, same entity form;
//! - the transactional endpoint with `["row", "graph"]`: plain property maps
//!   in `row`, entity ids in `meta`, labels and endpoints in `graph`.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value as Json;

use crate::deserializer::ResultSet;
use crate::error::{CyflowError, ServerException};
use crate::value::{NodeCell, PathCell, RelationshipCell, Value};

/// Plain JSON into a [`Value`]. Objects become maps; no entity detection.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s),
        Json::Array(xs) => Value::List(xs.into_iter().map(from_json).collect()),
        Json::Object(m) => Value::Map(m.into_iter().map(|(k, v)| (k, from_json(v))).collect()),
    }
}

/// The numeric id at the end of an entity URL (`.../node/42`).
pub fn id_from_url(url: &str) -> Option<i64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn properties(data: Option<Json>) -> BTreeMap<String, Value> {
    match data {
        Some(Json::Object(m)) => m.into_iter().map(|(k, v)| (k, from_json(v))).collect(),
        _ => BTreeMap::new(),
    }
}

fn metadata_id(obj: &serde_json::Map<String, Json>) -> Option<i64> {
    obj.get("metadata")
        .and_then(|m| m.get("id"))
        .and_then(Json::as_i64)
        .or_else(|| obj.get("self").and_then(Json::as_str).and_then(id_from_url))
}

fn string_list(json: Option<&Json>) -> Vec<String> {
    json.and_then(Json::as_array)
        .map(|xs| xs.iter().filter_map(|x| x.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

fn rest_entity(mut obj: serde_json::Map<String, Json>) -> Result<Value, serde_json::Map<String, Json>> {
    let self_url = match obj.get("self").and_then(Json::as_str) {
        Some(s) => s.to_owned(),
        None => return Err(obj),
    };
    if !obj.contains_key("data") {
        return Err(obj);
    }
    let Some(id) = metadata_id(&obj) else {
        return Err(obj);
    };
    if self_url.contains("/relationship/") {
        let rel_type = obj
            .get("type")
            .and_then(Json::as_str)
            .or_else(|| obj.get("metadata").and_then(|m| m.get("type")).and_then(Json::as_str))
            .unwrap_or_default()
            .to_owned();
        let start = obj.get("start").and_then(Json::as_str).and_then(id_from_url);
        let end = obj.get("end").and_then(Json::as_str).and_then(id_from_url);
        Ok(Value::Relationship(RelationshipCell {
            id,
            rel_type,
            start_node_id: start,
            end_node_id: end,
            properties: properties(obj.remove("data")),
        }))
    } else {
        let labels = string_list(obj.get("metadata").and_then(|m| m.get("labels")));
        Ok(Value::Node(NodeCell {
            id,
            labels,
            properties: properties(obj.remove("data")),
        }))
    }
}

fn rest_path(obj: &serde_json::Map<String, Json>) -> Option<Value> {
    let nodes = obj.get("nodes")?.as_array()?;
    let rels = obj.get("relationships")?.as_array()?;
    obj.get("length")?;
    let node_ids: Vec<i64> = nodes.iter().filter_map(|n| n.as_str().and_then(id_from_url)).collect();
    let relationships = rels
        .iter()
        .filter_map(|r| r.as_str().and_then(id_from_url))
        .enumerate()
        .map(|(i, id)| RelationshipCell {
            id,
            rel_type: String::new(),
            start_node_id: node_ids.get(i).copied(),
            end_node_id: node_ids.get(i + 1).copied(),
            properties: BTreeMap::new(),
        })
        .collect();
    let nodes = node_ids
        .into_iter()
        .map(|id| NodeCell {
            id,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        })
        .collect();
    Some(Value::Path(PathCell { nodes, relationships }))
}

/// JSON in "rest" form into a [`Value`], recognising node, relationship and
/// path objects.
pub fn from_rest_json(json: Json) -> Value {
    match json {
        Json::Array(xs) => Value::List(xs.into_iter().map(from_rest_json).collect()),
        Json::Object(obj) => {
            if let Some(path) = rest_path(&obj) {
                return path;
            }
            match rest_entity(obj) {
                Ok(entity) => entity,
                Err(obj) => Value::Map(obj.into_iter().map(|(k, v)| (k, from_rest_json(v))).collect()),
            }
        }
        other => from_json(other),
    }
}

/// Labels and endpoints collected from a row's `graph` section.
#[derive(Debug, Default)]
pub struct GraphIndex {
    labels: HashMap<i64, Vec<String>>,
    relationships: HashMap<i64, (String, Option<i64>, Option<i64>)>,
}

fn json_id(json: Option<&Json>) -> Option<i64> {
    match json? {
        Json::String(s) => s.parse().ok(),
        Json::Number(n) => n.as_i64(),
        _ => None,
    }
}

impl GraphIndex {
    pub fn from_graph(graph: Option<&Json>) -> Self {
        let mut index = GraphIndex::default();
        let Some(graph) = graph else {
            return index;
        };
        for node in graph.get("nodes").and_then(Json::as_array).into_iter().flatten() {
            if let Some(id) = json_id(node.get("id")) {
                index.labels.insert(id, string_list(node.get("labels")));
            }
        }
        for rel in graph.get("relationships").and_then(Json::as_array).into_iter().flatten() {
            if let Some(id) = json_id(rel.get("id")) {
                let rel_type = rel.get("type").and_then(Json::as_str).unwrap_or_default().to_owned();
                index.relationships.insert(
                    id,
                    (rel_type, json_id(rel.get("startNode")), json_id(rel.get("endNode"))),
                );
            }
        }
        index
    }
}

/// Zip one `row` cell with its `meta` entry.
///
/// Cells whose meta marks them as a node or relationship become entity
/// cells; labels and endpoints come from `graph`.
pub fn from_row_meta(cell: Json, meta: Option<&Json>, graph: &GraphIndex) -> Value {
    match (cell, meta) {
        (Json::Object(m), Some(Json::Object(meta))) => {
            let id = meta.get("id").and_then(Json::as_i64);
            let kind = meta.get("type").and_then(Json::as_str);
            match (id, kind) {
                (Some(id), Some("node")) => Value::Node(NodeCell {
                    id,
                    labels: graph.labels.get(&id).cloned().unwrap_or_default(),
                    properties: properties(Some(Json::Object(m))),
                }),
                (Some(id), Some("relationship")) => {
                    let (rel_type, start, end) = graph
                        .relationships
                        .get(&id)
                        .cloned()
                        .unwrap_or_default();
                    Value::Relationship(RelationshipCell {
                        id,
                        rel_type,
                        start_node_id: start,
                        end_node_id: end,
                        properties: properties(Some(Json::Object(m))),
                    })
                }
                _ => from_json(Json::Object(m)),
            }
        }
        (Json::Array(xs), Some(Json::Array(metas))) if xs.len() == metas.len() => Value::List(
            xs.into_iter()
                .zip(metas.iter())
                .map(|(x, m)| from_row_meta(x, Some(m), graph))
                .collect(),
        ),
        (cell, _) => from_json(cell),
    }
}

fn iso_duration(d: &std::time::Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        format!("PT{secs}S")
    } else {
        format!("PT{secs}.{nanos:09}S")
    }
}

/// Encode a parameter value as JSON.
///
/// Temporal values are sent as ISO-8601 strings and graph entities by id.
pub fn to_json(value: &Value) -> Result<Json, CyflowError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| CyflowError::Mapping(format!("{f} cannot be sent as JSON")))?,
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
        Value::List(xs) => Json::Array(xs.iter().map(to_json).collect::<Result<_, _>>()?),
        Value::Map(m) => Json::Object(
            m.iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v)?)))
                .collect::<Result<_, CyflowError>>()?,
        ),
        Value::Node(n) => Json::from(n.id),
        Value::Relationship(r) => Json::from(r.id),
        Value::Path(_) => return Err(CyflowError::Mapping("a path cannot be sent as a parameter".into())),
        Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
        Value::LocalTime(t) => Json::String(t.format("%H:%M:%S%.f").to_string()),
        Value::Time(t, offset) => Json::String(format!("{}{}", t.format("%H:%M:%S%.f"), offset)),
        Value::LocalDateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
        Value::Duration(d) => Json::String(iso_duration(d)),
    })
}

/// Encode a whole parameter map.
pub fn params_to_json(params: &BTreeMap<String, Value>) -> Result<Json, CyflowError> {
    Ok(Json::Object(
        params
            .iter()
            .map(|(k, v)| Ok((k.clone(), to_json(v)?)))
            .collect::<Result<_, CyflowError>>()?,
    ))
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// `GET /db/data/`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRoot {
    pub neo4j_version: String,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub cypher: Option<String>,
}

/// One entry of a transactional response's `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementError {
    pub code: String,
    pub message: String,
}

impl StatementError {
    pub fn into_exception(self) -> ServerException {
        ServerException::from_code(&self.code, &self.message)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementRow {
    #[serde(default)]
    pub row: Option<Vec<Json>>,
    #[serde(default)]
    pub meta: Option<Vec<Json>>,
    #[serde(default)]
    pub rest: Option<Vec<Json>>,
    #[serde(default)]
    pub graph: Option<Json>,
}

impl StatementRow {
    fn into_values(self) -> Vec<Value> {
        if let Some(rest) = self.rest {
            return rest.into_iter().map(from_rest_json).collect();
        }
        let graph = GraphIndex::from_graph(self.graph.as_ref());
        let meta = self.meta.unwrap_or_default();
        self.row
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, cell)| from_row_meta(cell, meta.get(i), &graph))
            .collect()
    }
}

/// One statement's result in a transactional response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<StatementRow>,
}

impl StatementResult {
    pub fn into_result_set(self) -> ResultSet {
        let rows = self.data.into_iter().map(StatementRow::into_values).collect();
        ResultSet::new(self.columns, rows)
    }
}

/// The body of any transactional endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionalResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<StatementError>,
    #[serde(default)]
    pub commit: Option<String>,
}

/// The body of a legacy `/cypher` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CypherResponse {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<Json>>,
}

impl CypherResponse {
    pub fn into_result_set(self) -> ResultSet {
        let rows = self
            .data
            .into_iter()
            .map(|row| row.into_iter().map(from_rest_json).collect())
            .collect();
        ResultSet::new(self.columns, rows)
    }
}

#[derive(Debug, Deserialize)]
struct ExceptionBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    exception: Option<String>,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default, rename = "stackTrace")]
    stack_trace: Vec<String>,
    #[serde(default)]
    errors: Vec<StatementError>,
}

/// Parse a non-2xx body into a structured exception.
///
/// Accepts both the legacy `{message, exception, fullname, stackTrace}` body
/// and the newer `{errors: [{code, message}]}` body.
pub fn parse_exception(body: &str) -> Option<ServerException> {
    let parsed: ExceptionBody = serde_json::from_str(body).ok()?;
    if let Some(exception) = parsed.exception {
        return Some(ServerException {
            full_name: parsed.fullname.unwrap_or_else(|| exception.clone()),
            exception,
            code: None,
            message: parsed.message.unwrap_or_default(),
            stack_trace: parsed.stack_trace,
        });
    }
    parsed.errors.into_iter().next().map(StatementError::into_exception)
}
