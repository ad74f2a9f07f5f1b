//! The Bolt transport, on top of `neo4rs`.
//!
//! Statements in a transaction run as soon as they are enqueued; there is
//! nothing to batch on a Bolt session.

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{BoltType, ConfigBuilder, Graph, Query, Row, Txn};
use tracing::debug;

use cyflow_core::bolt::{from_bolt, row_from_bolt, to_bolt};
use cyflow_core::{CyflowError, ResultSet, ServerException};

use super::{TransactionBackend, Transport, TransportKind};
use crate::capabilities::ServerVersion;
use crate::compiler::CompiledQuery;
use crate::config::ClientConfig;

const VERSION_PROBE: &str = "CALL dbms.components() YIELD versions RETURN versions[0] AS version";

/// Surface server failures as `ServerApplication` when the driver message
/// carries a status code.
fn driver_error(e: neo4rs::Error) -> CyflowError {
    match ServerException::from_driver_message(&e.to_string()) {
        Some(exception) => CyflowError::ServerApplication(exception),
        None => CyflowError::Neo4j(e),
    }
}

fn to_query(compiled: &CompiledQuery) -> Result<Query, CyflowError> {
    let mut query = neo4rs::query(&compiled.text);
    for (name, value) in &compiled.parameters {
        query = query.param(name, to_bolt(value.clone())?);
    }
    Ok(query)
}

/// Collects rows, reading cells by the query's declared columns. A query
/// whose columns are unknown (`RETURN *`) is read by key, in key order.
struct RowCollector<'a> {
    declared: Option<&'a [String]>,
    result: ResultSet,
}

impl<'a> RowCollector<'a> {
    fn new(query: &'a CompiledQuery) -> Self {
        let declared = query.columns.as_deref();
        Self {
            declared,
            result: ResultSet::new(declared.map(<[String]>::to_vec).unwrap_or_default(), Vec::new()),
        }
    }

    fn push(&mut self, row: &Row) -> Result<(), CyflowError> {
        match self.declared {
            Some(columns) => self.result.rows.push(row_from_bolt(row, columns)?),
            None => {
                let cells: BTreeMap<String, BoltType> = row
                    .to()
                    .map_err(|e| CyflowError::Mapping(format!("row: {e}")))?;
                if self.result.columns.is_empty() {
                    self.result.columns = cells.keys().cloned().collect();
                }
                let values = cells.into_values().map(from_bolt).collect::<Result<Vec<_>, _>>()?;
                self.result.rows.push(values);
            }
        }
        Ok(())
    }

    fn finish(self) -> ResultSet {
        self.result
    }
}

/// Talks Bolt through a pooled `neo4rs::Graph`.
pub struct BoltTransport {
    graph: Graph,
}

impl BoltTransport {
    pub async fn connect(config: &ClientConfig) -> Result<Self, CyflowError> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let graph = Graph::connect(builder.build()?).await?;
        Ok(Self { graph })
    }

    /// Wrap an already connected graph.
    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Transport for BoltTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bolt
    }

    async fn server_version(&self) -> Result<ServerVersion, CyflowError> {
        let mut stream = self.graph.execute(neo4rs::query(VERSION_PROBE)).await.map_err(driver_error)?;
        let row = stream
            .next()
            .await
            .map_err(driver_error)?
            .ok_or_else(|| CyflowError::missing_field("version", "dbms.components"))?;
        let version: String = row
            .get("version")
            .map_err(|e| CyflowError::Mapping(format!("version: {e}")))?;
        ServerVersion::parse(&version)
            .ok_or_else(|| CyflowError::protocol(None, "unrecognised server version", version))
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, CyflowError> {
        debug!(text = %query.text, "bolt autocommit");
        let mut stream = self.graph.execute(to_query(query)?).await.map_err(driver_error)?;
        let mut rows = RowCollector::new(query);
        while let Some(row) = stream.next().await.map_err(driver_error)? {
            rows.push(&row)?;
        }
        Ok(rows.finish())
    }

    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, CyflowError> {
        let txn = self.graph.start_txn().await.map_err(driver_error)?;
        Ok(Box::new(BoltTransaction { txn: Some(txn) }))
    }
}

struct BoltTransaction {
    txn: Option<Txn>,
}

impl BoltTransaction {
    fn txn(&mut self) -> Result<&mut Txn, CyflowError> {
        self.txn.as_mut().ok_or_else(|| {
            CyflowError::protocol(None, "bolt transaction already finished", String::new())
        })
    }

    async fn run(&mut self, query: &CompiledQuery) -> Result<ResultSet, CyflowError> {
        let compiled = to_query(query)?;
        let txn = self.txn()?;
        let mut stream = txn.execute(compiled).await.map_err(driver_error)?;
        let mut rows = RowCollector::new(query);
        while let Some(row) = stream.next(txn.handle()).await.map_err(driver_error)? {
            rows.push(&row)?;
        }
        Ok(rows.finish())
    }
}

#[async_trait]
impl TransactionBackend for BoltTransaction {
    fn flushes_eagerly(&self) -> bool {
        true
    }

    async fn submit(&mut self, statements: &[CompiledQuery]) -> Vec<Result<ResultSet, CyflowError>> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            debug!(text = %statement.text, "bolt statement");
            let outcome = self.run(statement).await;
            let failed = outcome.is_err();
            out.push(outcome);
            if failed {
                break;
            }
        }
        out
    }

    async fn commit(&mut self) -> Result<(), CyflowError> {
        match self.txn.take() {
            Some(txn) => txn.commit().await.map_err(driver_error),
            None => Err(CyflowError::protocol(None, "bolt transaction already finished", String::new())),
        }
    }

    async fn rollback(&mut self) -> Result<(), CyflowError> {
        match self.txn.take() {
            Some(txn) => txn.rollback().await.map_err(driver_error),
            None => Ok(()),
        }
    }
}
