//! The graph client.

use std::any::Any;
use std::sync::{Arc, OnceLock, RwLock, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use cyflow_core::{ClientLink, CyflowError, DecodeContext, ResultSet, UsageError};

use crate::blocking;
use crate::capabilities::{CypherCapabilities, ServerVersion};
use crate::compiler::CompiledQuery;
use crate::config::{ClientConfig, ClientOptions};
use crate::context::CallContext;
use crate::events::{OperationCompletedEvent, OperationCompletedHook};
use crate::fluent::CypherFluentQuery;
use crate::transaction::{AmbientTransaction, Transaction, TransactionExecutionPolicy, TransactionScopeOption};
use crate::transport::{BoltTransport, RestTransport, Transport, TransportKind};

struct ClientInner {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    capabilities: OnceLock<CypherCapabilities>,
    hooks: RwLock<Vec<OperationCompletedHook>>,
}

/// A connection to one Neo4j server.
///
/// Cheap to clone; clones share the transport, the capabilities and the
/// registered hooks. Ambient transactions are not stored here but in the
/// [`CallContext`] installed around the calling code.
///
/// ```rust,no_run
/// # use cyflow::prelude::*;
/// # async fn example() -> Result<(), CyflowError> {
/// let client = GraphClient::connect("bolt://localhost:7687", "neo4j", "secret").await?;
/// let names: Vec<String> = client
///     .cypher()
///     .match_("(p:Person)")
///     .return_::<String>("p.name")
///     .fetch_all()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GraphClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("transport", &self.inner.transport.kind())
            .field("version", &self.server_version())
            .finish()
    }
}

impl GraphClient {
    /// Wrap a transport. Call [`connect_transport`](Self::connect_transport)
    /// before running queries.
    pub fn new(transport: impl Transport, options: ClientOptions) -> Self {
        Self::from_arc(Arc::new(transport), options)
    }

    pub fn from_arc(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                options,
                capabilities: OnceLock::new(),
                hooks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Build the transport `config` describes and connect it.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self, CyflowError> {
        Self::connect_with_options(config, ClientOptions::from(config)).await
    }

    pub async fn connect_with_options(config: &ClientConfig, options: ClientOptions) -> Result<Self, CyflowError> {
        let transport: Arc<dyn Transport> = match config.transport_kind()? {
            TransportKind::Rest => Arc::new(RestTransport::new(
                &config.uri,
                Some(config.user.clone()),
                Some(config.password.clone()),
                config.request_timeout(),
            )?),
            TransportKind::Bolt => Arc::new(BoltTransport::connect(config).await?),
        };
        let client = Self::from_arc(transport, options);
        client.connect_transport().await?;
        Ok(client)
    }

    /// Connect with default settings.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, CyflowError> {
        let config = ClientConfig {
            uri: uri.to_owned(),
            user: user.to_owned(),
            password: password.to_owned(),
            ..ClientConfig::default()
        };
        Self::connect_with(&config).await
    }

    pub fn connect_blocking(uri: &str, user: &str, password: &str) -> Result<Self, CyflowError> {
        blocking::block_on(Self::connect(uri, user, password))?
    }

    pub fn connect_with_blocking(config: &ClientConfig) -> Result<Self, CyflowError> {
        blocking::block_on(Self::connect_with(config))?
    }

    /// Probe the server version and fix the capabilities.
    ///
    /// Does nothing when already connected.
    pub async fn connect_transport(&self) -> Result<(), CyflowError> {
        if self.is_connected() {
            return Ok(());
        }
        let version = self.inner.transport.server_version().await?;
        let caps = CypherCapabilities::for_version(version);
        if self.inner.capabilities.set(caps).is_ok() {
            info!(version = %version, transport = ?self.transport_kind(), "connected");
        }
        Ok(())
    }

    pub fn connect_transport_blocking(&self) -> Result<(), CyflowError> {
        blocking::block_on(self.connect_transport())?
    }

    pub fn is_connected(&self) -> bool {
        self.inner.capabilities.get().is_some()
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.capabilities().map(|c| c.version)
    }

    pub fn capabilities(&self) -> Option<CypherCapabilities> {
        self.inner.capabilities.get().copied()
    }

    pub(crate) fn require_capabilities(&self) -> Result<CypherCapabilities, UsageError> {
        self.capabilities().ok_or(UsageError::NotConnected)
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.inner.transport.kind()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Start a new query.
    pub fn cypher(&self) -> CypherFluentQuery {
        CypherFluentQuery::with_client(self.clone())
    }

    /// A fresh call context. Install it with [`CallContext::scope`].
    pub fn context(&self) -> CallContext {
        CallContext::new()
    }

    /// Begin a transaction scope in the installed call context.
    ///
    /// Fails with [`UsageError::NoCallContext`] outside
    /// [`CallContext::scope`].
    pub async fn begin_transaction(&self, scope: TransactionScopeOption) -> Result<Transaction, CyflowError> {
        let context = CallContext::current().ok_or(UsageError::NoCallContext)?;
        self.begin_transaction_in(&context, scope).await
    }

    /// Begin a transaction scope in an explicit call context.
    pub async fn begin_transaction_in(
        &self,
        context: &CallContext,
        scope: TransactionScopeOption,
    ) -> Result<Transaction, CyflowError> {
        let caps = self.require_capabilities()?;
        Transaction::begin(self.inner.transport.as_ref(), &caps, context, scope).await
    }

    pub fn begin_transaction_blocking(&self, scope: TransactionScopeOption) -> Result<Transaction, CyflowError> {
        let context = CallContext::current().ok_or(UsageError::NoCallContext)?;
        blocking::block_on(self.begin_transaction_in(&context, scope))?
    }

    /// Whether queries issued here would run in an open transaction.
    pub fn in_transaction(&self) -> bool {
        CallContext::current().is_some_and(|c| c.in_transaction())
    }

    pub fn current_transaction(&self) -> Option<AmbientTransaction> {
        CallContext::current()
            .and_then(|c| c.ambient())
            .map(AmbientTransaction::new)
    }

    /// Register a listener for completed operations.
    pub fn on_operation_completed(&self, hook: impl Fn(&OperationCompletedEvent) + Send + Sync + 'static) {
        self.inner
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    pub(crate) fn decode_context(&self) -> DecodeContext {
        DecodeContext::new(Arc::clone(&self.inner.options.converters), Some(self.link()))
    }

    fn link(&self) -> ClientLink {
        let inner: Arc<dyn Any + Send + Sync> = self.inner.clone();
        Arc::downgrade(&inner)
    }

    /// The client behind a link handed out to decoded entities.
    pub(crate) fn from_link(link: Arc<dyn Any + Send + Sync>) -> Option<Self> {
        link.downcast::<ClientInner>().ok().map(|inner| Self { inner })
    }

    pub(crate) fn annotate(&self, error: CyflowError, query: &CompiledQuery) -> CyflowError {
        if self.inner.options.include_query_in_errors {
            error.with_query(query.text.clone())
        } else {
            error
        }
    }

    /// Run a compiled statement against the ambient transaction or in its
    /// own transaction.
    ///
    /// Inside a batching transaction the statement is only queued unless
    /// `wants_rows` is set, in which case the queue is flushed first.
    pub(crate) async fn dispatch(&self, query: &CompiledQuery, wants_rows: bool) -> Result<ResultSet, CyflowError> {
        if !self.is_connected() {
            return Err(UsageError::NotConnected.into());
        }
        let ambient = CallContext::current().and_then(|c| c.ambient());
        match (query.policy, &ambient) {
            (TransactionExecutionPolicy::Required, None) => return Err(UsageError::TransactionRequired.into()),
            (TransactionExecutionPolicy::Denied, Some(_)) => return Err(UsageError::TransactionDenied.into()),
            _ => {}
        }

        let started = Instant::now();
        let outcome = match ambient {
            Some(tx) => {
                debug!(tx = tx.id(), text = %query.text, "dispatch in transaction");
                match tx.enqueue(query.clone()).await {
                    Ok(pending) if wants_rows || tx.is_eager() => pending.wait().await,
                    Ok(_) => Ok(ResultSet::empty()),
                    Err(e) => Err(e),
                }
            }
            None => {
                debug!(text = %query.text, "dispatch");
                self.inner.transport.execute(query).await
            }
        };
        self.report(query, started, &outcome);
        outcome.map_err(|e| self.annotate(e, query))
    }

    fn report(&self, query: &CompiledQuery, started: Instant, outcome: &Result<ResultSet, CyflowError>) {
        let event = OperationCompletedEvent {
            identifier: query.identifier.clone(),
            query_text: query.text.clone(),
            elapsed: started.elapsed(),
            resources_returned: outcome.as_ref().map_or(0, ResultSet::len),
            error: outcome.as_ref().err().map(ToString::to_string),
        };
        if let Some(error) = &event.error {
            warn!(identifier = ?event.identifier, error = %error, "operation failed");
        }
        let hooks = self.inner.hooks.read().unwrap_or_else(PoisonError::into_inner).clone();
        for hook in hooks {
            hook(&event);
        }
    }
}
