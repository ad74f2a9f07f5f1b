//! The HTTP transport.
//!
//! Autocommit statements go to `transaction/commit` on servers that support
//! single-request transactions and to the legacy `cypher` endpoint otherwise.
//! Transactions are opened with `POST transaction`, fed with `POST {tx}`,
//! committed with `POST {tx}/commit` and rolled back with `DELETE {tx}`.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use tracing::debug;

use cyflow_core::json::{params_to_json, parse_exception, CypherResponse, ServiceRoot, TransactionalResponse};
use cyflow_core::{CyflowError, ResultFormat, ResultSet};

use super::{TransactionBackend, Transport, TransportKind};
use crate::capabilities::{CypherCapabilities, ServerVersion};
use crate::compiler::CompiledQuery;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatementBody<'a> {
    statement: &'a str,
    parameters: Json,
    result_data_contents: &'static [&'static str],
}

#[derive(Serialize)]
struct StatementsBody<'a> {
    statements: Vec<StatementBody<'a>>,
}

#[derive(Serialize)]
struct LegacyCypherBody<'a> {
    query: &'a str,
    params: Json,
}

fn statements_body(statements: &[CompiledQuery]) -> Result<StatementsBody<'_>, CyflowError> {
    let statements = statements
        .iter()
        .map(|q| {
            Ok(StatementBody {
                statement: &q.text,
                parameters: params_to_json(&q.parameters)?,
                result_data_contents: match q.result_format {
                    ResultFormat::Rest => &["rest"],
                    _ => &["row", "graph"],
                },
            })
        })
        .collect::<Result<Vec<_>, CyflowError>>()?;
    Ok(StatementsBody { statements })
}

/// Read a JSON body, turning non-2xx statuses into errors.
async fn read_body<T: DeserializeOwned>(response: Response) -> Result<T, CyflowError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(match parse_exception(&body) {
            Some(exception) => CyflowError::ServerApplication(exception),
            None => CyflowError::protocol(Some(status.as_u16()), format!("unexpected status {status}"), body),
        });
    }
    serde_json::from_str(&body).map_err(|e| {
        CyflowError::protocol(Some(status.as_u16()), format!("malformed response: {e}"), body)
    })
}

/// Per-statement outcomes of a transactional response, in order.
fn outcomes(response: TransactionalResponse, submitted: usize) -> Vec<Result<ResultSet, CyflowError>> {
    let mut out: Vec<_> = response
        .results
        .into_iter()
        .map(|r| Ok(r.into_result_set()))
        .collect();
    if let Some(error) = response.errors.into_iter().next() {
        out.truncate(submitted.saturating_sub(1));
        out.push(Err(CyflowError::ServerApplication(error.into_exception())));
    }
    out
}

fn single_outcome(response: TransactionalResponse) -> Result<ResultSet, CyflowError> {
    outcomes(response, 1)
        .into_iter()
        .next()
        .unwrap_or_else(|| Ok(ResultSet::empty()))
}

/// Where an autocommit statement is sent.
#[derive(Debug, PartialEq, Eq)]
enum Autocommit {
    Transactional(String),
    Legacy(String),
}

/// `implicit` is `None` until the server version has been probed.
fn autocommit_endpoint(root: &ServiceRoot, implicit: Option<bool>, base_url: &str) -> Autocommit {
    match (&root.transaction, implicit) {
        (Some(tx), Some(true) | None) => Autocommit::Transactional(format!("{}/commit", tx.trim_end_matches('/'))),
        _ => Autocommit::Legacy(
            root.cypher
                .clone()
                .unwrap_or_else(|| format!("{base_url}/db/data/cypher")),
        ),
    }
}

#[derive(Clone)]
struct Http {
    client: reqwest::Client,
    user: Option<String>,
    password: Option<String>,
}

impl Http {
    fn request(&self, method: Method, url: &str, query: Option<&CompiledQuery>) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json; charset=UTF-8")
            .header("X-Stream", "true");
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        if let Some(query) = query {
            if let Some(limit) = query.max_execution_time {
                request = request.header("max-execution-time", limit.as_millis().to_string());
            }
            for (name, value) in &query.custom_headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        request
    }
}

/// Talks to the server's HTTP API.
pub struct RestTransport {
    http: Http,
    base_url: String,
    root: OnceCell<ServiceRoot>,
    implicit_transactions: OnceLock<bool>,
}

impl RestTransport {
    /// `base_url` is the server address, e.g. `http://localhost:7474`.
    pub fn new(
        base_url: &str,
        user: Option<String>,
        password: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, CyflowError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: Http {
                client: builder.build()?,
                user,
                password,
            },
            base_url: base_url.trim_end_matches('/').to_string(),
            root: OnceCell::new(),
            implicit_transactions: OnceLock::new(),
        })
    }

    async fn root(&self) -> Result<&ServiceRoot, CyflowError> {
        self.root
            .get_or_try_init(|| async {
                let url = format!("{}/db/data/", self.base_url);
                debug!(url = %url, "discovering service root");
                let response = self.http.request(Method::GET, &url, None).send().await?;
                read_body::<ServiceRoot>(response).await
            })
            .await
    }

    fn transaction_url(&self, root: &ServiceRoot) -> Option<String> {
        root.transaction.clone()
    }

}

#[async_trait]
impl Transport for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn server_version(&self) -> Result<ServerVersion, CyflowError> {
        let root = self.root().await?;
        let version = ServerVersion::parse(&root.neo4j_version).ok_or_else(|| {
            CyflowError::protocol(None, "unrecognised server version", root.neo4j_version.clone())
        })?;
        let caps = CypherCapabilities::for_version(version);
        let _ = self.implicit_transactions.set(caps.supports_implicit_transactions);
        Ok(version)
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, CyflowError> {
        let root = self.root().await?;
        match autocommit_endpoint(root, self.implicit_transactions.get().copied(), &self.base_url) {
            Autocommit::Transactional(url) => {
                debug!(url = %url, "autocommit statement");
                let body = statements_body(std::slice::from_ref(query))?;
                let response = self.http.request(Method::POST, &url, Some(query)).json(&body).send().await?;
                single_outcome(read_body(response).await?)
            }
            Autocommit::Legacy(url) => {
                debug!(url = %url, "legacy cypher statement");
                let body = LegacyCypherBody {
                    query: &query.text,
                    params: params_to_json(&query.parameters)?,
                };
                let response = self.http.request(Method::POST, &url, Some(query)).json(&body).send().await?;
                Ok(read_body::<CypherResponse>(response).await?.into_result_set())
            }
        }
    }

    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, CyflowError> {
        let root = self.root().await?;
        let url = self.transaction_url(root).ok_or_else(|| {
            CyflowError::protocol(None, "server has no transactional endpoint", root.neo4j_version.clone())
        })?;
        let response = self
            .http
            .request(Method::POST, &url, None)
            .json(&StatementsBody { statements: Vec::new() })
            .send()
            .await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body: TransactionalResponse = read_body(response).await?;
        if let Some(error) = body.errors.into_iter().next() {
            return Err(CyflowError::ServerApplication(error.into_exception()));
        }
        let tx_url = location
            .or_else(|| body.commit.map(|c| c.trim_end_matches("/commit").to_owned()))
            .ok_or_else(|| CyflowError::protocol(Some(201), "transaction has no location", String::new()))?;
        debug!(tx = %tx_url, "opened transaction");
        Ok(Box::new(RestTransaction {
            http: self.http.clone(),
            url: tx_url,
        }))
    }
}

struct RestTransaction {
    http: Http,
    url: String,
}

#[async_trait]
impl TransactionBackend for RestTransaction {
    fn flushes_eagerly(&self) -> bool {
        false
    }

    async fn submit(&mut self, statements: &[CompiledQuery]) -> Vec<Result<ResultSet, CyflowError>> {
        if statements.is_empty() {
            return Vec::new();
        }
        let sent = async {
            let body = statements_body(statements)?;
            let response = self
                .http
                .request(Method::POST, &self.url, statements.first())
                .json(&body)
                .send()
                .await?;
            read_body::<TransactionalResponse>(response).await
        };
        match sent.await {
            Ok(response) => outcomes(response, statements.len()),
            Err(e) => vec![Err(e)],
        }
    }

    async fn commit(&mut self) -> Result<(), CyflowError> {
        let url = format!("{}/commit", self.url);
        let response = self
            .http
            .request(Method::POST, &url, None)
            .json(&StatementsBody { statements: Vec::new() })
            .send()
            .await?;
        let body: TransactionalResponse = read_body(response).await?;
        match body.errors.into_iter().next() {
            Some(error) => Err(CyflowError::ServerApplication(error.into_exception())),
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), CyflowError> {
        let response = self.http.request(Method::DELETE, &self.url, None).send().await?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        let body = response.text().await?;
        Err(match parse_exception(&body) {
            Some(exception) => CyflowError::ServerApplication(exception),
            None => CyflowError::protocol(Some(status.as_u16()), "rollback failed", body),
        })
    }
}
