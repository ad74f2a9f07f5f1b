//! Wire protocols behind the client.
//!
//! The transaction coordinator and the client only see these two traits.
//! [`rest::RestTransport`] speaks the HTTP API, [`bolt::BoltTransport`]
//! speaks Bolt through `neo4rs`.

use async_trait::async_trait;
use cyflow_core::{CyflowError, ResultSet};

use crate::capabilities::ServerVersion;
use crate::compiler::CompiledQuery;

pub mod bolt;
pub mod rest;

pub use self::bolt::BoltTransport;
pub use self::rest::RestTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Rest,
    Bolt,
}

/// A connection to the database.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    /// Ask the server which version it runs.
    async fn server_version(&self) -> Result<ServerVersion, CyflowError>;

    /// Run one statement in its own transaction.
    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, CyflowError>;

    /// Open a server-side transaction.
    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, CyflowError>;
}

/// The server side of one open transaction.
#[async_trait]
pub trait TransactionBackend: Send + 'static {
    /// Whether statements run as soon as they are enqueued rather than in batches.
    fn flushes_eagerly(&self) -> bool;

    /// Run `statements` in order.
    ///
    /// Returns one outcome per statement attempted. Submission stops at the
    /// first failure, so the last outcome is the only one that can be an error.
    async fn submit(&mut self, statements: &[CompiledQuery]) -> Vec<Result<ResultSet, CyflowError>>;

    async fn commit(&mut self) -> Result<(), CyflowError>;

    async fn rollback(&mut self) -> Result<(), CyflowError>;
}
