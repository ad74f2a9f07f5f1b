//! Node and relationship references, and their typed projections.

use std::any::Any;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::decode::{decode, DecodeContext};
use crate::error::{CyflowError, UsageError};
use crate::traits::{CyflowNode, CyflowRelation, FromCyflowValue};
use crate::value::{type_name, Value};

/// A weak back-reference to the client that produced an entity.
///
/// Never keeps the client alive. The facade crate downcasts the upgraded
/// `Arc` to its own client type.
pub type ClientLink = Weak<dyn Any + Send + Sync>;

fn upgrade(
    link: Option<&ClientLink>,
    entity: &'static str,
    id: i64,
) -> Result<Arc<dyn Any + Send + Sync>, UsageError> {
    link.and_then(Weak::upgrade)
        .ok_or(UsageError::DetachedReference { entity, id })
}

/// Identifies a node by its database id.
///
/// Equality and hashing only look at the id.
#[derive(Debug, Clone)]
pub struct NodeReference {
    id: i64,
    client: Option<ClientLink>,
}

impl NodeReference {
    pub fn new(id: i64, client: Option<ClientLink>) -> Self {
        Self { id, client }
    }

    /// A reference with no client. It cannot start queries.
    pub fn detached(id: i64) -> Self {
        Self { id, client: None }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// True when no client is attached, or the client has been dropped.
    pub fn is_detached(&self) -> bool {
        self.client.as_ref().and_then(Weak::upgrade).is_none()
    }

    pub fn client_link(&self) -> Option<&ClientLink> {
        self.client.as_ref()
    }

    /// Upgrade the client link, failing with [`UsageError::DetachedReference`].
    pub fn require_client(&self) -> Result<Arc<dyn Any + Send + Sync>, UsageError> {
        upgrade(self.client.as_ref(), "node", self.id)
    }
}

impl PartialEq for NodeReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeReference {}

impl Hash for NodeReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Identifies a relationship by its database id.
#[derive(Debug, Clone)]
pub struct RelationshipReference {
    id: i64,
    start: Option<NodeReference>,
    end: Option<NodeReference>,
    client: Option<ClientLink>,
}

impl RelationshipReference {
    pub fn new(id: i64, start: Option<i64>, end: Option<i64>, client: Option<ClientLink>) -> Self {
        Self {
            id,
            start: start.map(|s| NodeReference::new(s, client.clone())),
            end: end.map(|e| NodeReference::new(e, client.clone())),
            client,
        }
    }

    pub fn detached(id: i64) -> Self {
        Self::new(id, None, None, None)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn start_node(&self) -> Option<&NodeReference> {
        self.start.as_ref()
    }

    pub fn end_node(&self) -> Option<&NodeReference> {
        self.end.as_ref()
    }

    pub fn is_detached(&self) -> bool {
        self.client.as_ref().and_then(Weak::upgrade).is_none()
    }

    pub fn client_link(&self) -> Option<&ClientLink> {
        self.client.as_ref()
    }

    pub fn require_client(&self) -> Result<Arc<dyn Any + Send + Sync>, UsageError> {
        upgrade(self.client.as_ref(), "relationship", self.id)
    }
}

impl PartialEq for RelationshipReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RelationshipReference {}

impl Hash for RelationshipReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A typed node payload paired with its reference.
///
/// Two `Node`s are equal when they point at the same database id, whatever
/// their payloads hold.
///
/// ```rust,ignore
/// let people: Vec<Node<Person>> = client.cypher()
///     .match_("(n:Person)")
///     .return_::<Node<Person>>("n")
///     .fetch_all()
///     .await?;
/// println!("{} is node {}", people[0].name, people[0].reference().id());
/// ```
#[derive(Debug, Clone)]
pub struct Node<T> {
    reference: NodeReference,
    data: T,
}

impl<T> Node<T> {
    pub fn new(reference: NodeReference, data: T) -> Self {
        Self { reference, data }
    }

    pub fn reference(&self) -> &NodeReference {
        &self.reference
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Deref for Node<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl<T> Eq for Node<T> {}

impl<T: CyflowNode> FromCyflowValue for Node<T> {
    const ENTITY: bool = true;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Node(n) => {
                let data = T::from_node(&n, ctx)?;
                Ok(Node::new(NodeReference::new(n.id, ctx.client()), data))
            }
            other => Err(CyflowError::type_mismatch("Node", type_name(&other), T::LABEL)),
        }
    }
}

/// A typed relationship payload paired with its reference.
#[derive(Debug, Clone)]
pub struct RelationshipInstance<T> {
    reference: RelationshipReference,
    data: T,
}

impl<T> RelationshipInstance<T> {
    pub fn new(reference: RelationshipReference, data: T) -> Self {
        Self { reference, data }
    }

    pub fn reference(&self) -> &RelationshipReference {
        &self.reference
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Deref for RelationshipInstance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> PartialEq for RelationshipInstance<T> {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl<T> Eq for RelationshipInstance<T> {}

impl<T: CyflowRelation> FromCyflowValue for RelationshipInstance<T> {
    const ENTITY: bool = true;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Relationship(r) => {
                let data = T::from_rel(&r, ctx)?;
                let reference =
                    RelationshipReference::new(r.id, r.start_node_id, r.end_node_id, ctx.client());
                Ok(RelationshipInstance::new(reference, data))
            }
            other => Err(CyflowError::type_mismatch("Relationship", type_name(&other), T::TYPE)),
        }
    }
}

impl FromCyflowValue for NodeReference {
    const ENTITY: bool = true;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Node(n) => Ok(NodeReference::new(n.id, ctx.client())),
            Value::Integer(id) => Ok(NodeReference::new(id, ctx.client())),
            other => Err(CyflowError::type_mismatch("Node", type_name(&other), "NodeReference")),
        }
    }
}

impl FromCyflowValue for RelationshipReference {
    const ENTITY: bool = true;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Relationship(r) => Ok(RelationshipReference::new(
                r.id,
                r.start_node_id,
                r.end_node_id,
                ctx.client(),
            )),
            Value::Integer(id) => Ok(RelationshipReference::new(id, None, None, ctx.client())),
            other => Err(CyflowError::type_mismatch(
                "Relationship",
                type_name(&other),
                "RelationshipReference",
            )),
        }
    }
}

/// A typed graph path.
///
/// `N` is the node payload type. Each node along the path is decoded via
/// `N::from_node()`; relationships are kept as typed references since path
/// segments may not carry start/end ids.
///
/// ```rust,ignore
/// // MATCH p = (a:Person)-[:KNOWS*..3]->(b:Person) RETURN p
/// let paths: Vec<GraphPath<Person>> = query.return_::<GraphPath<Person>>("p").fetch_all().await?;
/// ```
#[derive(Debug, Clone)]
pub struct GraphPath<N> {
    /// Ordered nodes along the path.
    pub nodes: Vec<Node<N>>,
    /// Relationships connecting consecutive nodes.
    pub relationships: Vec<RelationshipReference>,
}

impl<N> GraphPath<N> {
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

impl<N: CyflowNode> FromCyflowValue for GraphPath<N> {
    const ENTITY: bool = true;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Path(p) => {
                let nodes = p
                    .nodes
                    .into_iter()
                    .map(|n| decode::<Node<N>>(Value::Node(n), ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let relationships = p
                    .relationships
                    .into_iter()
                    .map(|r| RelationshipReference::new(r.id, r.start_node_id, r.end_node_id, ctx.client()))
                    .collect();
                Ok(GraphPath { nodes, relationships })
            }
            other => Err(CyflowError::type_mismatch("Path", type_name(&other), "GraphPath")),
        }
    }
}
