//! The fluent Cypher builder.
//!
//! Every method returns a new query and leaves the receiver untouched, so a
//! partial query can be shared and extended in several directions:
//!
//! ```rust
//! # use cyflow::fluent::CypherFluentQuery;
//! let people = CypherFluentQuery::new().match_("(n:Person)");
//! let adults = people.where_("n.age >= 18");
//! let named = people.where_("n.name = $name").with_param("name", "Alice");
//!
//! assert_eq!(people.query_text().unwrap(), "MATCH (n:Person)");
//! assert_eq!(adults.query_text().unwrap(), "MATCH (n:Person)\nWHERE n.age >= 18");
//! assert!(named.query_text().unwrap().ends_with("WHERE n.name = $name"));
//! ```
//!
//! Text passed to clause methods is literal Cypher. Parameter references in
//! it (`$name`, or `{name}` on old servers) are tracked and re-rendered in
//! the syntax the connected server understands. Literal values given to the
//! builder itself are always bound as parameters.
//!
//! Errors raised while building (an unknown property, an ambiguous
//! relationship direction) are kept and reported when the query compiles.

use std::time::Duration;

use cyflow_core::traits::{CyflowNode, CyflowRelation, FromCyflow, FromCyflowValue, IntoCyflowValue, ToCyflowParams};
use cyflow_core::{CyflowError, NodeReference, RelationshipReference, ResultSet, UsageError, Value};

use crate::blocking;
use crate::capabilities::CypherCapabilities;
use crate::clause::{escape_identifier, Clause, ClauseKind, StartPoint, StartTarget, Template};
use crate::client::GraphClient;
use crate::compiler::{compile, split_top_level, CompiledQuery, QueryParts};
use crate::direction::{relationship_pattern, resolve, Direction};
use crate::fragment::CypherFragment;
use crate::predicate::Predicate;
use crate::query::CypherQuery;
use crate::transaction::TransactionExecutionPolicy;
use crate::transport::TransportKind;

/// An immutable chain of Cypher clauses.
///
/// Obtain one from [`GraphClient::cypher`] to run it, or from
/// [`CypherFluentQuery::new`] to only build and inspect text.
#[derive(Clone, Default)]
pub struct CypherFluentQuery {
    client: Option<GraphClient>,
    parts: QueryParts,
}

impl std::fmt::Debug for CypherFluentQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CypherFluentQuery")
            .field("connected", &self.client.is_some())
            .field("parts", &self.parts)
            .finish()
    }
}

impl CypherFluentQuery {
    /// A query with no client. It can be compiled but not run.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_client(client: GraphClient) -> Self {
        Self {
            client: Some(client),
            parts: QueryParts::default(),
        }
    }

    pub fn parts(&self) -> &QueryParts {
        &self.parts
    }

    pub fn client(&self) -> Option<&GraphClient> {
        self.client.as_ref()
    }

    fn update(&self, f: impl FnOnce(&mut QueryParts)) -> Self {
        let mut next = self.clone();
        f(&mut next.parts);
        next
    }

    fn push(&self, kind: ClauseKind, body: Template) -> Self {
        self.update(|p| p.clauses = p.clauses.push(Clause::new(kind, body)))
    }

    fn push_text(&self, kind: ClauseKind, text: &str) -> Self {
        self.push(kind, Template::parse(text))
    }

    fn fail(&self, error: UsageError) -> Self {
        self.update(|p| {
            p.error.get_or_insert(error);
        })
    }

    /// Bind `value` under a generated name and append a clause built from it.
    fn push_bound(&self, kind: ClauseKind, value: Value, body: impl FnOnce(String) -> Template) -> Self {
        let (params, name) = self.parts.params.bind(value);
        self.update(|p| {
            p.params = params;
            p.clauses = p.clauses.push(Clause::new(kind, body(name)));
        })
    }

    fn push_predicate(&self, kind: ClauseKind, predicate: Predicate) -> Self {
        match predicate.render(self.parts.params.clone()) {
            Ok((body, params)) => self.update(|p| {
                p.params = params;
                p.clauses = p.clauses.push(Clause::new(kind, body));
            }),
            Err(e) => self.fail(e),
        }
    }

    fn start_point(&self, identifier: &str, target: StartTarget, ids: Vec<i64>) -> Self {
        let ids = Value::List(ids.into_iter().map(Value::Integer).collect());
        let (params, name) = self.parts.params.bind(ids);
        let point = StartPoint {
            identifier: identifier.to_owned(),
            target,
            param: name,
        };
        self.update(|p| {
            p.params = params;
            p.clauses = p.clauses.push(Clause::start(point));
        })
    }

    // -----------------------------------------------------------------------
    // Reading clauses
    // -----------------------------------------------------------------------

    /// `START identifier=node($p)`.
    ///
    /// Servers without `START` get `MATCH (identifier) WHERE id(identifier) IN $p`.
    /// Consecutive start points share one clause.
    pub fn start_node(&self, identifier: &str, node: &NodeReference) -> Self {
        self.start_point(identifier, StartTarget::Node, vec![node.id()])
    }

    pub fn start_nodes<'a>(&self, identifier: &str, nodes: impl IntoIterator<Item = &'a NodeReference>) -> Self {
        let ids = nodes.into_iter().map(NodeReference::id).collect();
        self.start_point(identifier, StartTarget::Node, ids)
    }

    pub fn start_relationship(&self, identifier: &str, relationship: &RelationshipReference) -> Self {
        self.start_point(identifier, StartTarget::Relationship, vec![relationship.id()])
    }

    pub fn match_(&self, pattern: &str) -> Self {
        self.push_text(ClauseKind::Match, pattern)
    }

    pub fn optional_match(&self, pattern: &str) -> Self {
        self.push_text(ClauseKind::OptionalMatch, pattern)
    }

    pub fn where_(&self, condition: &str) -> Self {
        self.push_text(ClauseKind::Where, condition)
    }

    /// `AND condition`, continuing a `WHERE`.
    pub fn and_where(&self, condition: &str) -> Self {
        self.push_text(ClauseKind::AndWhere, condition)
    }

    pub fn or_where(&self, condition: &str) -> Self {
        self.push_text(ClauseKind::OrWhere, condition)
    }

    /// `WHERE` from a [`Predicate`], binding its literals.
    ///
    /// ```rust
    /// # use cyflow::fluent::CypherFluentQuery;
    /// use cyflow::predicate::prop;
    ///
    /// let q = CypherFluentQuery::new()
    ///     .match_("(f:Foo)")
    ///     .where_pred(prop("f", "Prop").eq("abc"));
    /// let compiled = q.compile().unwrap();
    /// assert_eq!(compiled.text, "MATCH (f:Foo)\nWHERE (f.Prop = $p0)");
    /// assert_eq!(compiled.parameters["p0"], "abc".into());
    /// ```
    pub fn where_pred(&self, predicate: Predicate) -> Self {
        self.push_predicate(ClauseKind::Where, predicate)
    }

    pub fn and_where_pred(&self, predicate: Predicate) -> Self {
        self.push_predicate(ClauseKind::AndWhere, predicate)
    }

    pub fn or_where_pred(&self, predicate: Predicate) -> Self {
        self.push_predicate(ClauseKind::OrWhere, predicate)
    }

    pub fn with(&self, items: &str) -> Self {
        self.push_text(ClauseKind::With, items)
    }

    pub fn unwind(&self, expression: &str) -> Self {
        self.push_text(ClauseKind::Unwind, expression)
    }

    /// `UNWIND $p AS identifier` over bound values.
    pub fn unwind_values<V: IntoCyflowValue>(&self, values: impl IntoIterator<Item = V>, identifier: &str) -> Self {
        let list = Value::List(values.into_iter().map(IntoCyflowValue::into_value).collect());
        let identifier = identifier.to_owned();
        self.push_bound(ClauseKind::Unwind, list, |name| {
            Template::param(name).then(Template::text(format!(" AS {identifier}")))
        })
    }

    pub fn call(&self, procedure: &str) -> Self {
        self.push_text(ClauseKind::Call, procedure)
    }

    pub fn yield_(&self, items: &str) -> Self {
        self.push_text(ClauseKind::Yield, items)
    }

    pub fn union(&self) -> Self {
        self.push(ClauseKind::Union, Template::default())
    }

    pub fn union_all(&self) -> Self {
        self.push(ClauseKind::UnionAll, Template::default())
    }

    // -----------------------------------------------------------------------
    // Writing clauses
    // -----------------------------------------------------------------------

    pub fn create(&self, pattern: &str) -> Self {
        self.push_text(ClauseKind::Create, pattern)
    }

    pub fn create_unique(&self, pattern: &str) -> Self {
        self.push_text(ClauseKind::CreateUnique, pattern)
    }

    /// `CREATE (identifier:Label $p)` with `entity`'s fields as properties.
    ///
    /// ```rust,ignore
    /// client.cypher()
    ///     .create_entity("p", Person { id: 0, name: "Alice".into(), age: Some(30) })
    ///     .execute_without_results()
    ///     .await?;
    /// ```
    pub fn create_entity<N: CyflowNode + ToCyflowParams>(&self, identifier: &str, entity: N) -> Self {
        let props = Value::map(entity.to_params());
        let head = format!("({identifier}:{} ", escape_identifier(N::LABEL));
        self.push_bound(ClauseKind::Create, props, |name| {
            Template::text(head).then(Template::param(name)).then(Template::text(")"))
        })
    }

    pub fn merge(&self, pattern: &str) -> Self {
        self.push_text(ClauseKind::Merge, pattern)
    }

    pub fn on_create_set(&self, assignments: &str) -> Self {
        self.push_text(ClauseKind::OnCreateSet, assignments)
    }

    pub fn on_match_set(&self, assignments: &str) -> Self {
        self.push_text(ClauseKind::OnMatchSet, assignments)
    }

    pub fn set(&self, assignments: &str) -> Self {
        self.push_text(ClauseKind::Set, assignments)
    }

    /// `SET identifier += $p`, copying every field of `properties`.
    pub fn set_properties(&self, identifier: &str, properties: impl ToCyflowParams) -> Self {
        let props = Value::map(properties.to_params());
        let head = format!("{identifier} += ");
        self.push_bound(ClauseKind::Set, props, |name| Template::text(head).then(Template::param(name)))
    }

    pub fn remove(&self, items: &str) -> Self {
        self.push_text(ClauseKind::Remove, items)
    }

    pub fn delete(&self, identifiers: &str) -> Self {
        self.push_text(ClauseKind::Delete, identifiers)
    }

    pub fn detach_delete(&self, identifiers: &str) -> Self {
        self.push_text(ClauseKind::DetachDelete, identifiers)
    }

    /// `FOREACH (body)`. Pass the body without the outer parentheses.
    pub fn for_each(&self, body: &str) -> Self {
        let body = Template::text("(").then(Template::parse(body)).then(Template::text(")"));
        self.push(ClauseKind::ForEach, body)
    }

    /// `CREATE (a)-[:R]->(b)`, with the direction worked out from `R`'s
    /// declared source and target labels for `A` and `B`.
    pub fn relate<R, A, B>(&self, a: &str, b: &str) -> Self
    where
        R: CyflowRelation,
        A: CyflowNode,
        B: CyflowNode,
    {
        match relationship_pattern::<R, A, B>(a, b, "") {
            Ok(pattern) => self.push(ClauseKind::Create, Template::text(pattern)),
            Err(e) => self.fail(e),
        }
    }

    /// Like [`relate`](Self::relate), setting `relationship`'s fields as
    /// properties of the new relationship.
    pub fn relate_with<R, A, B>(&self, a: &str, b: &str, relationship: R) -> Self
    where
        R: CyflowRelation + ToCyflowParams,
        A: CyflowNode,
        B: CyflowNode,
    {
        let direction = match resolve::<R>(A::LABEL, B::LABEL) {
            Ok(d) => d,
            Err(e) => return self.fail(e),
        };
        let ty = escape_identifier(R::TYPE);
        let (open, close) = match direction {
            Direction::Forward => (format!("({a})-[:{ty} "), format!("]->({b})")),
            Direction::Reverse => (format!("({a})<-[:{ty} "), format!("]-({b})")),
        };
        let props = Value::map(relationship.to_params());
        self.push_bound(ClauseKind::Create, props, |name| {
            Template::text(open).then(Template::param(name)).then(Template::text(close))
        })
    }

    // -----------------------------------------------------------------------
    // Ordering and paging
    // -----------------------------------------------------------------------

    pub fn order_by(&self, items: &str) -> Self {
        self.push_text(ClauseKind::OrderBy, items)
    }

    /// `ORDER BY a DESC, b DESC`.
    pub fn order_by_desc(&self, items: &str) -> Self {
        let items: Vec<String> = split_top_level(items).into_iter().map(|i| format!("{i} DESC")).collect();
        self.push_text(ClauseKind::OrderBy, &items.join(", "))
    }

    pub fn skip(&self, count: u64) -> Self {
        self.push_bound(ClauseKind::Skip, count.into(), Template::param)
    }

    pub fn limit(&self, count: u64) -> Self {
        self.push_bound(ClauseKind::Limit, count.into(), Template::param)
    }

    /// Append text verbatim, with no keyword.
    pub fn raw(&self, text: &str) -> Self {
        self.push_text(ClauseKind::Raw, text)
    }

    /// Append a [`CypherFragment`], usually built with `cypher_query!`.
    pub fn fragment(&self, fragment: CypherFragment) -> Self {
        let next = self.push_text(ClauseKind::Raw, fragment.text());
        fragment
            .params()
            .iter()
            .fold(next, |q, (name, value)| q.with_param(name, value.clone()))
    }

    // -----------------------------------------------------------------------
    // Parameters and settings
    // -----------------------------------------------------------------------

    /// Bind a named parameter referenced as `$name` (or `{name}`).
    ///
    /// Binding the same name twice with different values fails at compile time.
    pub fn with_param(&self, name: &str, value: impl IntoCyflowValue) -> Self {
        let params = self.parts.params.bind_named(name, value.into_value());
        self.update(|p| p.params = params)
    }

    pub fn with_params<K, V>(&self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: IntoCyflowValue,
    {
        params
            .into_iter()
            .fold(self.clone(), |q, (name, value)| q.with_param(name.as_ref(), value))
    }

    /// Bind every field of a [`ToCyflowParams`] struct as a named parameter.
    pub fn with_params_from(&self, source: impl ToCyflowParams) -> Self {
        let mut params: Vec<_> = source.to_params().into_iter().collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        self.with_params(params)
    }

    /// Ask the server to abort the statement after `limit`.
    pub fn max_execution_time(&self, limit: Duration) -> Self {
        self.update(|p| p.meta.max_execution_time = Some(limit))
    }

    /// Send an extra HTTP header with this statement. Ignored over Bolt.
    pub fn custom_header(&self, name: &str, value: &str) -> Self {
        let (name, value) = (name.to_owned(), value.to_owned());
        self.update(|p| {
            p.meta.custom_headers.insert(name, value);
        })
    }

    /// Label reported in operation events.
    pub fn identifier(&self, identifier: &str) -> Self {
        let identifier = identifier.to_owned();
        self.update(|p| p.meta.identifier = Some(identifier))
    }

    pub fn execution_policy(&self, policy: TransactionExecutionPolicy) -> Self {
        self.update(|p| p.meta.policy = policy)
    }

    // -----------------------------------------------------------------------
    // Returning
    // -----------------------------------------------------------------------

    /// `RETURN expression`, read as one column of `T`.
    ///
    /// ```rust,ignore
    /// let people: Vec<Node<Person>> = client.cypher()
    ///     .match_("(n:Person)")
    ///     .where_("n.Name = {name}")
    ///     .with_param("name", "Alice")
    ///     .return_::<Node<Person>>("n")
    ///     .fetch_all()
    ///     .await?;
    /// ```
    pub fn return_<T: FromCyflowValue>(&self, expression: &str) -> CypherQuery<T> {
        CypherQuery::single(self.push_text(ClauseKind::Return, expression))
    }

    pub fn return_distinct<T: FromCyflowValue>(&self, expression: &str) -> CypherQuery<T> {
        CypherQuery::single(self.push_text(ClauseKind::ReturnDistinct, expression))
    }

    /// `RETURN a AS x, b AS y`, read column by column into the members of `T`.
    ///
    /// The items must be listed explicitly. `RETURN *` has no defined column
    /// order (Bolt reports it alphabetically) and is rejected at compile time.
    pub fn return_projection<T: FromCyflow>(&self, items: &str) -> CypherQuery<T> {
        CypherQuery::projection(self.push_projection(ClauseKind::Return, items))
    }

    pub fn return_distinct_projection<T: FromCyflow>(&self, items: &str) -> CypherQuery<T> {
        CypherQuery::projection(self.push_projection(ClauseKind::ReturnDistinct, items))
    }

    fn push_projection(&self, kind: ClauseKind, items: &str) -> Self {
        let next = self.push_text(kind, items);
        if split_top_level(items).iter().any(|item| item.trim() == "*") {
            return next.fail(UsageError::MalformedQuery(
                "projections need explicit return items, not `*`".into(),
            ));
        }
        next
    }

    // -----------------------------------------------------------------------
    // Compiling and running
    // -----------------------------------------------------------------------

    pub(crate) fn target(&self) -> (CypherCapabilities, TransportKind) {
        match &self.client {
            Some(client) => (client.capabilities().unwrap_or_default(), client.transport_kind()),
            None => (CypherCapabilities::default(), TransportKind::Bolt),
        }
    }

    /// Compile for a given server, without a client.
    pub fn compile_with(
        &self,
        caps: &CypherCapabilities,
        transport: TransportKind,
    ) -> Result<CompiledQuery, CyflowError> {
        Ok(compile(&self.parts, caps, transport, None)?)
    }

    /// Compile for the connected server, or a current one when detached.
    pub fn compile(&self) -> Result<CompiledQuery, CyflowError> {
        let (caps, transport) = self.target();
        self.compile_with(&caps, transport)
    }

    pub fn query_text(&self) -> Result<String, CyflowError> {
        Ok(self.compile()?.text)
    }

    pub(crate) fn compile_for_results(
        &self,
        mode: cyflow_core::ResultMode,
    ) -> Result<(GraphClient, CompiledQuery), CyflowError> {
        let client = self.client.clone().ok_or(UsageError::NotConnected)?;
        let caps = client.require_capabilities()?;
        let compiled = compile(&self.parts, &caps, client.transport_kind(), Some(mode))?;
        Ok((client, compiled))
    }

    /// Run the query and discard its rows.
    ///
    /// Inside a transaction on the HTTP transport the statement is queued
    /// and submitted with the next flush or commit.
    pub async fn execute_without_results(&self) -> Result<(), CyflowError> {
        let client = self.client.clone().ok_or(UsageError::NotConnected)?;
        let caps = client.require_capabilities()?;
        let compiled = compile(&self.parts, &caps, client.transport_kind(), None)?;
        let _rows: ResultSet = client.dispatch(&compiled, false).await?;
        Ok(())
    }

    pub fn execute_without_results_blocking(&self) -> Result<(), CyflowError> {
        blocking::block_on(self.execute_without_results())?
    }
}

/// Start a query from an entity that came back from a query.
///
/// The entity remembers the client that decoded it. Hand-built (detached)
/// references fail with [`UsageError::DetachedReference`].
pub trait EntityQueryExt {
    /// `START identifier=node(id)` (or the equivalent `MATCH`) on the owning client.
    fn start_query(&self, identifier: &str) -> Result<CypherFluentQuery, CyflowError>;
}

fn owning_client(link: std::sync::Arc<dyn std::any::Any + Send + Sync>) -> Result<GraphClient, CyflowError> {
    GraphClient::from_link(link).ok_or_else(|| UsageError::Unsupported("entity is linked to a foreign client".into()).into())
}

impl EntityQueryExt for NodeReference {
    fn start_query(&self, identifier: &str) -> Result<CypherFluentQuery, CyflowError> {
        let client = owning_client(self.require_client()?)?;
        Ok(client.cypher().start_node(identifier, self))
    }
}

impl EntityQueryExt for RelationshipReference {
    fn start_query(&self, identifier: &str) -> Result<CypherFluentQuery, CyflowError> {
        let client = owning_client(self.require_client()?)?;
        Ok(client.cypher().start_relationship(identifier, self))
    }
}

impl<T> EntityQueryExt for cyflow_core::Node<T> {
    fn start_query(&self, identifier: &str) -> Result<CypherFluentQuery, CyflowError> {
        self.reference().start_query(identifier)
    }
}
