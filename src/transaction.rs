//! Transaction coordination.
//!
//! A transaction is shared by its owning handle and any joined handles. The
//! state machine is the same for every transport: statements are queued,
//! flushed in order and the first failure aborts everything after it and
//! rolls the transaction back. The transport only decides whether a queued
//! statement is submitted right away.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

use cyflow_core::{CyflowError, ResultSet, UsageError};

use crate::blocking;
use crate::capabilities::CypherCapabilities;
use crate::compiler::CompiledQuery;
use crate::context::{CallContext, FrameKind};
use crate::transport::{TransactionBackend, Transport};

/// How [`GraphClient::begin_transaction`](crate::GraphClient::begin_transaction)
/// relates to an ambient transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionScopeOption {
    /// Join the ambient transaction, or start one if there is none.
    #[default]
    Join,
    /// Suspend the ambient transaction and start an independent one.
    RequiresNew,
    /// Run without a transaction until the scope ends.
    Suppress,
}

/// Whether a query may, must or must not run in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionExecutionPolicy {
    #[default]
    Allowed,
    Required,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// A suppressed scope has no transaction.
    NoTransaction,
    Open,
    Committed,
    RolledBack,
}

impl TransactionState {
    fn describe(self) -> &'static str {
        match self {
            TransactionState::NoTransaction => "absent",
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        }
    }
}

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// A copy of `e` for a second recipient.
fn replay(e: &CyflowError) -> CyflowError {
    match e.root() {
        CyflowError::ServerApplication(exception) => CyflowError::ServerApplication(exception.clone()),
        CyflowError::Usage(usage) => CyflowError::Usage(usage.clone()),
        CyflowError::ServerProtocol { status, message, body } => CyflowError::ServerProtocol {
            status: *status,
            message: message.clone(),
            body: body.clone(),
        },
        other => CyflowError::protocol(None, other.to_string(), String::new()),
    }
}

fn aborted() -> CyflowError {
    UsageError::TransactionAborted.into()
}

struct Queued {
    query: CompiledQuery,
    reply: oneshot::Sender<Result<ResultSet, CyflowError>>,
}

struct TxInner {
    backend: Box<dyn TransactionBackend>,
    queue: Vec<Queued>,
    failure: Option<String>,
}

/// The shared part of a transaction.
pub(crate) struct TxCore {
    id: u64,
    eager: bool,
    /// The server discards the transaction itself when a statement fails.
    server_rolls_back: bool,
    state: Mutex<TransactionState>,
    joins: AtomicUsize,
    inner: AsyncMutex<TxInner>,
}

impl TxCore {
    fn new(backend: Box<dyn TransactionBackend>, server_rolls_back: bool) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            eager: backend.flushes_eagerly(),
            server_rolls_back,
            state: Mutex::new(TransactionState::Open),
            joins: AtomicUsize::new(0),
            inner: AsyncMutex::new(TxInner {
                backend,
                queue: Vec::new(),
                failure: None,
            }),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> TransactionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TransactionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == TransactionState::Open
    }

    /// Whether statements run as soon as they are enqueued.
    pub(crate) fn is_eager(&self) -> bool {
        self.eager
    }

    pub(crate) fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), UsageError> {
        match self.state() {
            TransactionState::Open => Ok(()),
            other => Err(UsageError::TransactionNotOpen { state: other.describe() }),
        }
    }

    /// Queue `query`. Eager transports run it before this returns.
    pub(crate) async fn enqueue(self: &Arc<Self>, query: CompiledQuery) -> Result<PendingResult, CyflowError> {
        self.ensure_open()?;
        let (reply, rx) = oneshot::channel();
        let mut inner = self.inner.lock().await;
        self.ensure_open()?;
        debug!(tx = self.id, text = %query.text, "enqueue");
        inner.queue.push(Queued { query, reply });
        if self.eager {
            // The statement's own outcome is delivered through `rx`.
            if let Err(e) = self.flush_locked(&mut inner).await {
                debug!(tx = self.id, error = %e, "eager statement failed");
            }
        }
        Ok(PendingResult {
            rx,
            core: Arc::clone(self),
        })
    }

    pub(crate) async fn flush(&self) -> Result<(), CyflowError> {
        let mut inner = self.inner.lock().await;
        self.ensure_open()?;
        self.flush_locked(&mut inner).await
    }

    async fn flush_locked(&self, inner: &mut TxInner) -> Result<(), CyflowError> {
        if inner.queue.is_empty() {
            return Ok(());
        }
        let (queries, replies): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.queue)
            .into_iter()
            .map(|q| (q.query, q.reply))
            .unzip();
        debug!(tx = self.id, statements = queries.len(), "flush");
        let outcomes = inner.backend.submit(&queries).await;

        let mut replies = replies.into_iter();
        let mut failure = None;
        for outcome in outcomes {
            let Some(reply) = replies.next() else { break };
            if let Err(e) = &outcome {
                failure = Some(replay(e));
            }
            let _ = reply.send(outcome);
            if failure.is_some() {
                break;
            }
        }
        if failure.is_none() && replies.len() > 0 {
            failure = Some(CyflowError::protocol(
                None,
                format!("server answered {} of {} statements", queries.len() - replies.len(), queries.len()),
                String::new(),
            ));
        }
        for reply in replies {
            let _ = reply.send(Err(aborted()));
        }

        match failure {
            None => Ok(()),
            Some(e) => {
                inner.failure = Some(e.to_string());
                let server_side = matches!(e.root(), CyflowError::ServerApplication(_));
                match self.rollback_locked(inner).await {
                    Err(rollback) if server_side && self.server_rolls_back => {
                        debug!(tx = self.id, error = %rollback, "transaction already discarded by the server");
                    }
                    Err(rollback) => return Err(rollback),
                    Ok(()) => {}
                }
                Err(e)
            }
        }
    }

    async fn rollback_locked(&self, inner: &mut TxInner) -> Result<(), CyflowError> {
        self.set_state(TransactionState::RolledBack);
        for queued in inner.queue.drain(..) {
            let _ = queued.reply.send(Err(aborted()));
        }
        debug!(tx = self.id, "rollback");
        inner.backend.rollback().await.map_err(|e| {
            warn!(tx = self.id, error = %e, "rollback failed");
            CyflowError::RollbackFailed {
                rollback: Box::new(e),
                original: inner.failure.clone(),
            }
        })
    }

    pub(crate) async fn commit(&self) -> Result<(), CyflowError> {
        let joined = self.join_count();
        if joined > 0 {
            return Err(UsageError::OutstandingJoinedScopes { count: joined }.into());
        }
        let mut inner = self.inner.lock().await;
        self.ensure_open()?;
        self.flush_locked(&mut inner).await?;
        debug!(tx = self.id, "commit");
        match inner.backend.commit().await {
            Ok(()) => {
                self.set_state(TransactionState::Committed);
                Ok(())
            }
            Err(e) => {
                inner.failure = Some(e.to_string());
                self.rollback_locked(&mut inner).await?;
                Err(e)
            }
        }
    }

    pub(crate) async fn rollback(&self) -> Result<(), CyflowError> {
        let mut inner = self.inner.lock().await;
        if self.state() == TransactionState::Committed {
            return Err(UsageError::TransactionNotOpen { state: "committed" }.into());
        }
        self.rollback_locked(&mut inner).await
    }

    /// Roll back from a synchronous context, such as `Drop`.
    fn abandon(self: &Arc<Self>) {
        if !self.is_open() {
            return;
        }
        self.set_state(TransactionState::RolledBack);
        if let Ok(mut inner) = self.inner.try_lock() {
            for queued in inner.queue.drain(..) {
                let _ = queued.reply.send(Err(aborted()));
            }
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => match blocking::fallback_runtime() {
                Ok(runtime) => runtime.handle().clone(),
                Err(e) => {
                    warn!(tx = self.id, error = %e, "transaction dropped with no runtime to roll it back");
                    return;
                }
            },
        };
        warn!(tx = self.id, "transaction dropped before completion, rolling back");
        let core = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = core.rollback().await {
                warn!(tx = core.id, error = %e, "background rollback failed");
            }
        });
    }
}

/// The result of a statement queued in a transaction.
pub struct PendingResult {
    rx: oneshot::Receiver<Result<ResultSet, CyflowError>>,
    core: Arc<TxCore>,
}

impl PendingResult {
    /// Wait for the statement's rows, flushing the queue if it has not been
    /// submitted yet.
    pub async fn wait(mut self) -> Result<ResultSet, CyflowError> {
        if let Ok(outcome) = self.rx.try_recv() {
            return outcome;
        }
        if let Err(e) = self.core.flush().await {
            debug!(tx = self.core.id, error = %e, "flush before wait failed");
        }
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(aborted()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    Joined,
    Suppressed,
}

/// A handle on a transaction scope.
///
/// Dropping a handle that was neither committed nor rolled back rolls the
/// transaction back. For a joined handle that dooms the shared transaction.
pub struct Transaction {
    core: Option<Arc<TxCore>>,
    role: Role,
    context: CallContext,
    frame: Option<u64>,
    done: bool,
}

impl Transaction {
    pub(crate) async fn begin(
        transport: &dyn Transport,
        caps: &CypherCapabilities,
        context: &CallContext,
        scope: TransactionScopeOption,
    ) -> Result<Self, CyflowError> {
        if scope == TransactionScopeOption::Suppress {
            let frame = context.push(FrameKind::Suppressed);
            return Ok(Self {
                core: None,
                role: Role::Suppressed,
                context: context.clone(),
                frame: Some(frame),
                done: false,
            });
        }

        if scope == TransactionScopeOption::Join {
            if let Some(core) = context.ambient() {
                core.ensure_open()?;
                core.joins.fetch_add(1, Ordering::SeqCst);
                debug!(tx = core.id, joins = core.join_count(), "joined ambient transaction");
                return Ok(Self {
                    core: Some(core),
                    role: Role::Joined,
                    context: context.clone(),
                    frame: None,
                    done: false,
                });
            }
        }

        if !caps.supports_transactions {
            return Err(UsageError::UnsupportedFeature {
                feature: "transactions".into(),
                version: caps.version.to_string(),
            }
            .into());
        }
        let core = TxCore::new(transport.begin().await?, caps.auto_rolls_back_on_error);
        debug!(tx = core.id, "began transaction");
        let frame = context.push(FrameKind::Transaction(Arc::clone(&core)));
        Ok(Self {
            core: Some(core),
            role: Role::Owner,
            context: context.clone(),
            frame: Some(frame),
            done: false,
        })
    }

    /// `None` for a suppressed scope.
    pub fn id(&self) -> Option<u64> {
        self.core.as_ref().map(|c| c.id)
    }

    pub fn state(&self) -> TransactionState {
        match &self.core {
            Some(core) => core.state(),
            None => TransactionState::NoTransaction,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.role == Role::Joined
    }

    /// Joined scopes still open on this transaction.
    pub fn join_count(&self) -> usize {
        self.core.as_ref().map_or(0, |c| c.join_count())
    }

    /// The context this scope lives in.
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Submit every queued statement now.
    pub async fn flush(&self) -> Result<(), CyflowError> {
        match &self.core {
            Some(core) => core.flush().await,
            None => Ok(()),
        }
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.context.remove(frame);
        }
    }

    fn leave_join(&self) {
        if let Some(core) = &self.core {
            let _ = core
                .joins
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }
    }

    /// Complete this scope.
    ///
    /// Only the owning handle commits the server transaction; a joined
    /// handle just closes its scope, and fails with
    /// [`UsageError::TransactionNotOpen`] when the shared transaction has
    /// already ended. If the owner still has joined scopes
    /// open the commit fails with [`UsageError::OutstandingJoinedScopes`]
    /// and the transaction is rolled back.
    pub async fn commit(mut self) -> Result<(), CyflowError> {
        self.done = true;
        match self.role {
            Role::Suppressed => {
                self.pop_frame();
                Ok(())
            }
            Role::Joined => {
                self.leave_join();
                match &self.core {
                    Some(core) => Ok(core.ensure_open()?),
                    None => Ok(()),
                }
            }
            Role::Owner => {
                let Some(core) = self.core.clone() else { return Ok(()) };
                let result = core.commit().await;
                if result.is_err() && core.is_open() {
                    if let Err(e) = core.rollback().await {
                        warn!(tx = core.id, error = %e, "rollback after failed commit failed");
                    }
                }
                self.pop_frame();
                result
            }
        }
    }

    /// Roll back. On a joined handle this rolls back the shared transaction.
    pub async fn rollback(mut self) -> Result<(), CyflowError> {
        self.done = true;
        if self.role == Role::Joined {
            self.leave_join();
        }
        self.pop_frame();
        match &self.core {
            Some(core) => core.rollback().await,
            None => Ok(()),
        }
    }

    pub fn commit_blocking(self) -> Result<(), CyflowError> {
        blocking::block_on(self.commit())?
    }

    pub fn rollback_blocking(self) -> Result<(), CyflowError> {
        blocking::block_on(self.rollback())?
    }

    pub fn flush_blocking(&self) -> Result<(), CyflowError> {
        blocking::block_on(self.flush())?
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.role == Role::Joined {
            self.leave_join();
        }
        self.pop_frame();
        if let Some(core) = &self.core {
            core.abandon();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

/// A view of the ambient transaction, from
/// [`GraphClient::current_transaction`](crate::GraphClient::current_transaction).
#[derive(Clone)]
pub struct AmbientTransaction {
    core: Arc<TxCore>,
}

impl AmbientTransaction {
    pub(crate) fn new(core: Arc<TxCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> u64 {
        self.core.id()
    }

    pub fn state(&self) -> TransactionState {
        self.core.state()
    }

    pub fn join_count(&self) -> usize {
        self.core.join_count()
    }

    pub async fn flush(&self) -> Result<(), CyflowError> {
        self.core.flush().await
    }
}

impl std::fmt::Debug for AmbientTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientTransaction")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
