//! An in-memory transport that records what the client sends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cyflow::capabilities::ServerVersion;
use cyflow::compiler::CompiledQuery;
use cyflow::config::ClientOptions;
use cyflow::transport::{TransactionBackend, Transport, TransportKind};
use cyflow::GraphClient;
use cyflow_core::{CyflowError, ResultSet, ServerException, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute(String),
    Begin(u64),
    Submit(u64, Vec<String>),
    Commit(u64),
    Rollback(u64),
}

enum Outcome {
    Rows(ResultSet),
    Fail(ServerException),
}

struct Rule {
    pattern: String,
    outcome: Outcome,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    rules: Vec<Rule>,
    next_tx: u64,
    fail_commit: bool,
    fail_rollback: bool,
}

/// Answers every statement with the first rule whose pattern occurs in its
/// text, or an empty result.
#[derive(Clone)]
pub struct MockTransport {
    kind: TransportKind,
    version: ServerVersion,
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Batches transaction statements like the HTTP API.
    pub fn rest(version: &str) -> Self {
        Self::new(TransportKind::Rest, version)
    }

    /// Runs transaction statements immediately like Bolt.
    pub fn bolt(version: &str) -> Self {
        Self::new(TransportKind::Bolt, version)
    }

    fn new(kind: TransportKind, version: &str) -> Self {
        Self {
            kind,
            version: ServerVersion::parse(version).unwrap(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn respond(&self, pattern: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        let result = ResultSet::new(columns.iter().map(|c| c.to_string()).collect(), rows);
        self.state.lock().unwrap().rules.push(Rule {
            pattern: pattern.to_owned(),
            outcome: Outcome::Rows(result),
        });
        self
    }

    pub fn fail(&self, pattern: &str, code: &str, message: &str) -> &Self {
        self.state.lock().unwrap().rules.push(Rule {
            pattern: pattern.to_owned(),
            outcome: Outcome::Fail(ServerException::from_code(code, message)),
        });
        self
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Every statement text the server saw, in order.
    pub fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .flat_map(|c| match c {
                Call::Execute(text) => vec![text],
                Call::Submit(_, texts) => texts,
                _ => vec![],
            })
            .collect()
    }

    fn answer(&self, text: &str) -> Result<ResultSet, CyflowError> {
        let state = self.state.lock().unwrap();
        match state.rules.iter().find(|r| text.contains(&r.pattern)).map(|r| &r.outcome) {
            Some(Outcome::Rows(rows)) => Ok(rows.clone()),
            Some(Outcome::Fail(e)) => Err(CyflowError::ServerApplication(e.clone())),
            None => Ok(ResultSet::empty()),
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn server_version(&self) -> Result<ServerVersion, CyflowError> {
        Ok(self.version)
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, CyflowError> {
        self.record(Call::Execute(query.text.clone()));
        self.answer(&query.text)
    }

    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, CyflowError> {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_tx += 1;
            state.next_tx
        };
        self.record(Call::Begin(id));
        Ok(Box::new(MockTransaction {
            id,
            transport: self.clone(),
        }))
    }
}

struct MockTransaction {
    id: u64,
    transport: MockTransport,
}

#[async_trait]
impl TransactionBackend for MockTransaction {
    fn flushes_eagerly(&self) -> bool {
        self.transport.kind == TransportKind::Bolt
    }

    async fn submit(&mut self, statements: &[CompiledQuery]) -> Vec<Result<ResultSet, CyflowError>> {
        let mut sent = Vec::new();
        let mut outcomes = Vec::new();
        for statement in statements {
            sent.push(statement.text.clone());
            let outcome = self.transport.answer(&statement.text);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        self.transport.record(Call::Submit(self.id, sent));
        outcomes
    }

    async fn commit(&mut self) -> Result<(), CyflowError> {
        self.transport.record(Call::Commit(self.id));
        if self.transport.state.lock().unwrap().fail_commit {
            return Err(CyflowError::ServerApplication(ServerException::from_code(
                "Neo.TransientError.Transaction.Terminated",
                "commit rejected",
            )));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), CyflowError> {
        self.transport.record(Call::Rollback(self.id));
        if self.transport.state.lock().unwrap().fail_rollback {
            return Err(CyflowError::ServerApplication(ServerException::from_code(
                "Neo.ClientError.Transaction.TransactionNotFound",
                "unknown transaction",
            )));
        }
        Ok(())
    }
}

pub async fn connected(transport: &MockTransport) -> GraphClient {
    connected_with(transport, ClientOptions::default()).await
}

/// Route client logs to the test writer; `RUST_LOG=cyflow=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn connected_with(transport: &MockTransport, options: ClientOptions) -> GraphClient {
    init_tracing();
    let client = GraphClient::new(transport.clone(), options);
    client.connect_transport().await.unwrap();
    client
}

pub fn node(id: i64, label: &str, props: &[(&str, Value)]) -> Value {
    Value::Node(cyflow_core::NodeCell {
        id,
        labels: vec![label.to_owned()],
        properties: props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    })
}
