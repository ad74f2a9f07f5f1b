//! Running async operations from synchronous code.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

use cyflow_core::{CyflowError, UsageError};

static FALLBACK: OnceLock<Runtime> = OnceLock::new();

pub(crate) fn fallback_runtime() -> Result<&'static Runtime, CyflowError> {
    if let Some(runtime) = FALLBACK.get() {
        return Ok(runtime);
    }
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("cyflow-blocking")
        .build()?;
    // A concurrent caller may have won the race; either runtime will do.
    let _ = FALLBACK.set(runtime);
    FALLBACK
        .get()
        .ok_or_else(|| UsageError::Unsupported("could not start a runtime for blocking calls".into()).into())
}

/// Block the current thread on `fut`.
///
/// Inside a multi-thread runtime the worker is handed off with
/// `block_in_place`. A current-thread runtime cannot do that and is
/// rejected. Outside any runtime a shared background runtime is used.
pub(crate) fn block_on<F: Future>(fut: F) -> Result<F::Output, CyflowError> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => Ok(tokio::task::block_in_place(|| handle.block_on(fut))),
            _ => Err(UsageError::Unsupported(
                "blocking calls need a multi-thread runtime; use the async API on a current-thread runtime".into(),
            )
            .into()),
        },
        Err(_) => Ok(fallback_runtime()?.block_on(fut)),
    }
}
