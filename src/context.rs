//! The call context that carries ambient transactions.
//!
//! A [`CallContext`] is a stack of frames. Beginning a transaction pushes a
//! frame, ending it pops the frame, and every query dispatched while the
//! context is installed runs against the innermost open transaction.
//! Install a context for a block of async code with [`CallContext::scope`].
//!
//! ```rust,ignore
//! let ctx = client.context();
//! ctx.scope(async {
//!     let tx = client.begin_transaction(TransactionScopeOption::Join).await?;
//!     client.cypher().create("(n:X)").execute_without_results().await?;
//!     tx.commit().await
//! }).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::transaction::TxCore;

tokio::task_local! {
    static CURRENT: CallContext;
}

#[derive(Clone)]
pub(crate) enum FrameKind {
    Transaction(Arc<TxCore>),
    /// Queries run outside any transaction until this frame is popped.
    Suppressed,
}

struct Frame {
    id: u64,
    kind: FrameKind,
}

#[derive(Default)]
struct Frames {
    stack: Vec<Frame>,
    next_id: u64,
}

/// Holder of the ambient transaction for one logical flow of calls.
///
/// Cloning shares the same stack. Separate contexts never see each other's
/// transactions.
#[derive(Clone, Default)]
pub struct CallContext {
    frames: Arc<Mutex<Frames>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` with this context installed.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.clone(), fut).await
    }

    /// Run `f` with this context installed, for blocking callers.
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self.clone(), f)
    }

    /// The context installed around the running code, if any.
    pub fn current() -> Option<CallContext> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Whether both values share one stack.
    pub fn same_as(&self, other: &CallContext) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }

    pub fn depth(&self) -> usize {
        self.lock().stack.len()
    }

    /// Whether queries would currently run inside an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.ambient().is_some_and(|tx| tx.is_open())
    }

    fn lock(&self) -> MutexGuard<'_, Frames> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The transaction of the innermost frame, unless it is suppressed.
    pub(crate) fn ambient(&self) -> Option<Arc<TxCore>> {
        match self.lock().stack.last().map(|f| &f.kind) {
            Some(FrameKind::Transaction(core)) => Some(Arc::clone(core)),
            _ => None,
        }
    }

    pub(crate) fn push(&self, kind: FrameKind) -> u64 {
        let mut frames = self.lock();
        let id = frames.next_id;
        frames.next_id += 1;
        frames.stack.push(Frame { id, kind });
        id
    }

    /// Remove a frame wherever it sits, so out-of-order completion keeps
    /// the remaining frames intact.
    pub(crate) fn remove(&self, id: u64) {
        self.lock().stack.retain(|f| f.id != id);
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("depth", &self.depth())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
