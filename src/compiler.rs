//! Turns a clause sequence into the text and parameters sent to the server.
//!
//! Compilation is where deferred builder errors surface, where clauses are
//! checked against the server's capabilities and where the parameter set is
//! flattened. A compiled query is immutable.

use std::collections::BTreeMap;
use std::time::Duration;

use cyflow_core::{ParameterStore, ResultFormat, ResultMode, UsageError, Value};

use crate::capabilities::CypherCapabilities;
use crate::clause::{Clause, ClauseKind, ClauseSequence, StartTarget, Template};
use crate::transaction::TransactionExecutionPolicy;
use crate::transport::TransportKind;

/// Settings that travel with a query but are not part of its text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMeta {
    pub custom_headers: BTreeMap<String, String>,
    pub max_execution_time: Option<Duration>,
    pub policy: TransactionExecutionPolicy,
    /// Caller label reported in operation events.
    pub identifier: Option<String>,
}

/// Everything a fluent query carries.
#[derive(Debug, Clone, Default)]
pub struct QueryParts {
    pub clauses: ClauseSequence,
    pub params: ParameterStore,
    pub meta: QueryMeta,
    /// First error raised while building; reported at compile time.
    pub error: Option<UsageError>,
}

/// A query ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub parameters: BTreeMap<String, Value>,
    pub result_mode: ResultMode,
    pub result_format: ResultFormat,
    /// Columns of the last `RETURN`, when they can be read off the text.
    pub columns: Option<Vec<String>>,
    pub custom_headers: BTreeMap<String, String>,
    pub max_execution_time: Option<Duration>,
    pub policy: TransactionExecutionPolicy,
    pub identifier: Option<String>,
}

impl CompiledQuery {
    /// A statement with no parameters or metadata, mostly for probes and tests.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: BTreeMap::new(),
            result_mode: ResultMode::SingleColumn,
            result_format: ResultFormat::RestGraph,
            columns: None,
            custom_headers: BTreeMap::new(),
            max_execution_time: None,
            policy: TransactionExecutionPolicy::Allowed,
            identifier: None,
        }
    }
}

/// Compile `parts` for a server with `caps` reached over `transport`.
///
/// `mode` is `None` for statements whose results are discarded.
pub fn compile(
    parts: &QueryParts,
    caps: &CypherCapabilities,
    transport: TransportKind,
    mode: Option<ResultMode>,
) -> Result<CompiledQuery, UsageError> {
    if let Some(e) = &parts.error {
        return Err(e.clone());
    }
    let clauses = parts.clauses.to_vec();
    if clauses.is_empty() {
        return Err(UsageError::MalformedQuery("the query has no clauses".into()));
    }
    validate(&clauses)?;
    for clause in &clauses {
        gate(clause.kind, caps)?;
    }
    if mode.is_some() && !clauses.iter().any(|c| c.kind.is_return()) {
        return Err(UsageError::MalformedQuery(
            "results were requested but the query has no RETURN clause".into(),
        ));
    }

    let dollar = caps.supports_dollar_parameters;
    let mut lines = Vec::with_capacity(clauses.len());
    let mut i = 0;
    while i < clauses.len() {
        let clause = clauses[i];

        if clause.kind == ClauseKind::Start {
            let run = clauses[i..].iter().take_while(|c| c.kind == ClauseKind::Start).count();
            let starts = &clauses[i..i + run];
            i += run;
            if caps.supports_start {
                let points: Vec<String> = starts.iter().map(|c| c.body.render(dollar)).collect();
                lines.push(format!("START {}", points.join(", ")));
                continue;
            }
            let where_run = match clauses.get(i) {
                Some(c) if c.kind == ClauseKind::Where => {
                    1 + clauses[i + 1..]
                        .iter()
                        .take_while(|c| matches!(c.kind, ClauseKind::AndWhere | ClauseKind::OrWhere))
                        .count()
                }
                _ => 0,
            };
            let following = &clauses[i..i + where_run];
            i += where_run;
            lines.extend(rewrite_start(starts, following, dollar));
            continue;
        }

        lines.push(render_clause(clause, dollar));
        i += 1;
    }

    let parameters = parts.params.flatten()?;
    if let Some(missing) = clauses
        .iter()
        .flat_map(|c| c.body.param_names())
        .find(|name| !parameters.contains_key(*name))
    {
        return Err(UsageError::MissingParameter(missing.to_owned()));
    }

    let columns = clauses
        .iter()
        .rev()
        .find(|c| c.kind.is_return())
        .and_then(|c| return_columns(&c.body.render(dollar)));

    let result_mode = mode.unwrap_or(ResultMode::Set);
    let result_format = match (transport, result_mode) {
        (TransportKind::Bolt, _) => ResultFormat::Bolt,
        (TransportKind::Rest, ResultMode::Set) => ResultFormat::Rest,
        (TransportKind::Rest, _) => ResultFormat::RestGraph,
    };

    Ok(CompiledQuery {
        text: lines.join("\n"),
        parameters,
        result_mode,
        result_format,
        columns,
        custom_headers: parts.meta.custom_headers.clone(),
        max_execution_time: parts.meta.max_execution_time,
        policy: parts.meta.policy,
        identifier: parts.meta.identifier.clone(),
    })
}

fn validate(clauses: &[&Clause]) -> Result<(), UsageError> {
    for (i, clause) in clauses.iter().enumerate() {
        let prev = i.checked_sub(1).map(|j| clauses[j].kind);
        let ok = match clause.kind {
            ClauseKind::AndWhere | ClauseKind::OrWhere => prev.is_some_and(ClauseKind::is_where),
            ClauseKind::Yield => prev == Some(ClauseKind::Call),
            ClauseKind::OnCreateSet | ClauseKind::OnMatchSet => matches!(
                prev,
                Some(ClauseKind::Merge | ClauseKind::OnCreateSet | ClauseKind::OnMatchSet)
            ),
            _ => true,
        };
        if !ok {
            let needs = match clause.kind {
                ClauseKind::Yield => "CALL",
                ClauseKind::OnCreateSet | ClauseKind::OnMatchSet => "MERGE",
                _ => "WHERE",
            };
            return Err(UsageError::MalformedQuery(format!(
                "{} must follow {needs}",
                clause.kind.keyword()
            )));
        }
    }
    Ok(())
}

fn gate(kind: ClauseKind, caps: &CypherCapabilities) -> Result<(), UsageError> {
    let supported = match kind {
        ClauseKind::OptionalMatch => caps.supports_optional_match,
        ClauseKind::Merge | ClauseKind::OnCreateSet | ClauseKind::OnMatchSet => caps.supports_merge,
        ClauseKind::Unwind => caps.supports_unwind,
        ClauseKind::DetachDelete => caps.supports_detach_delete,
        ClauseKind::Call | ClauseKind::Yield => caps.supports_stored_procedures,
        ClauseKind::CreateUnique => caps.supports_create_unique,
        _ => true,
    };
    if supported {
        Ok(())
    } else {
        Err(UsageError::UnsupportedFeature {
            feature: kind.keyword().to_owned(),
            version: caps.version.to_string(),
        })
    }
}

fn render_clause(clause: &Clause, dollar: bool) -> String {
    match clause.kind {
        ClauseKind::Raw => clause.body.render(dollar),
        ClauseKind::Union | ClauseKind::UnionAll => clause.kind.keyword().to_owned(),
        kind => format!("{} {}", kind.keyword(), clause.body.render(dollar)),
    }
}

/// `START a=node($p0)` becomes `MATCH (a) WHERE id(a) IN $p0`. A `WHERE`
/// group that follows is folded into the same condition.
fn rewrite_start(starts: &[&Clause], following: &[&Clause], dollar: bool) -> Vec<String> {
    let mut patterns = Vec::with_capacity(starts.len());
    let mut filter = Template::default();
    for (n, point) in starts.iter().filter_map(|c| c.start.as_ref()).enumerate() {
        let ident = &point.identifier;
        patterns.push(match point.target {
            StartTarget::Node => format!("({ident})"),
            StartTarget::Relationship => format!("()-[{ident}]-()"),
        });
        if n > 0 {
            filter.push_text(" AND ");
        }
        filter.push_text(format!("id({ident}) IN "));
        filter.push_param(point.param.clone());
    }

    let mut lines = vec![format!("MATCH {}", patterns.join(", "))];
    if following.is_empty() {
        lines.push(format!("WHERE {}", filter.render(dollar)));
        return lines;
    }
    let group: Vec<String> = following.iter().map(|c| render_clause(c, dollar)).collect();
    // The first entry of the group is the WHERE clause itself.
    let group = group.join("\n");
    let inner = group.strip_prefix("WHERE ").unwrap_or(&group);
    lines.push(format!("WHERE {} AND ({inner})", filter.render(dollar)));
    lines
}

/// Byte offsets of characters outside brackets and quotes.
fn top_level(text: &str) -> Vec<(usize, char)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 => out.push((i, c)),
            _ => {}
        }
    }
    out
}

/// Split on commas that are not nested in brackets or quotes.
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(text) {
        if c == ',' {
            parts.push(text[start..i].trim());
            start = i + 1;
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Column names of a `RETURN` body: the alias after `AS`, otherwise the
/// expression text. `None` for `*`.
pub fn return_columns(body: &str) -> Option<Vec<String>> {
    let items = split_top_level(body);
    if items.is_empty() || items.contains(&"*") {
        return None;
    }
    let columns = items
        .into_iter()
        .map(|item| {
            let alias = top_level(item)
                .into_iter()
                .filter(|(i, c)| {
                    c.is_whitespace()
                        && item
                            .get(*i + 1..*i + 4)
                            .is_some_and(|s| s.eq_ignore_ascii_case("as ") || s.eq_ignore_ascii_case("as\n"))
                })
                .last()
                .map(|(i, _)| item[i + 4..].trim().trim_matches('`'));
            alias.unwrap_or(item).to_owned()
        })
        .collect();
    Some(columns)
}
