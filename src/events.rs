//! Notifications about completed operations.

use std::sync::Arc;
use std::time::Duration;

/// Reported once for every dispatched statement, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCompletedEvent {
    /// The label set with `identifier()` on the query.
    pub identifier: Option<String>,
    pub query_text: String,
    pub elapsed: Duration,
    /// Rows returned. Zero for failed and queued statements.
    pub resources_returned: usize,
    /// Error message when the operation failed.
    pub error: Option<String>,
}

impl OperationCompletedEvent {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A registered listener. Called synchronously on the dispatching task.
pub type OperationCompletedHook = Arc<dyn Fn(&OperationCompletedEvent) + Send + Sync>;
