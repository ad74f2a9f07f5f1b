//! Convenience re-exports for common cyflow usage.
//!
//! ```rust
//! use cyflow::prelude::*;
//! ```
//!
//! This imports the derive macros, `cypher!` and `cypher_query!`, the
//! client and query types, the transaction options, entity wrappers and
//! the error types. The core traits are re-exported under `*Trait` names
//! where they would clash with the derives.

pub use crate::{cypher, cypher_query, CyflowEnum, CyflowNode, CyflowRelation, FromCyflow, ToCyflowParams};
pub use cyflow_core::traits::{
    CyflowEnum as CyflowEnumTrait, CyflowNode as CyflowNodeTrait, CyflowRelation as CyflowRelationTrait,
    FromCyflow as FromCyflowTrait, FromCyflowValue, IntoCyflowValue, ToCyflowParams as ToCyflowParamsTrait,
};
pub use cyflow_core::{
    CyflowError, GraphPath, Node, NodeReference, ProjectionMatching, RelationshipInstance, RelationshipReference,
    UsageError, Value,
};

pub use crate::client::GraphClient;
pub use crate::config::{ClientConfig, ClientOptions};
pub use crate::context::CallContext;
pub use crate::fluent::{CypherFluentQuery, EntityQueryExt};
pub use crate::predicate::{prop, prop_of, Predicate};
pub use crate::query::CypherQuery;
pub use crate::stream::CypherStream;
pub use crate::transaction::{TransactionExecutionPolicy, TransactionScopeOption, TransactionState};
