
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{BotError, Result};

/// Run `future` until it completes, `timeout` elapses or `cancel` fires,
/// whichever happens first.
///
/// A future that loses the race is dropped. Blocking work it spawned keeps
/// running on the blocking pool until the HTTP client's own timeout ends it,
/// but its result is discarded.
#[inline]
pub async fn with_deadline<T, F>(
    operation: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(BotError::Cancelled(operation.to_string()));
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("{} cancelled", operation);
            Err(BotError::Cancelled(operation.to_string()))
        }
        outcome = tokio::time::timeout(timeout, future) => {
            outcome.unwrap_or_else(|_| {
                debug!("{} timed out after {:?}", operation, timeout);
                Err(BotError::Timeout {
                    operation: operation.to_string(),
                    after: timeout,
                })
            })
        }
    }
}

/// Run blocking work on the blocking thread pool
#[inline]
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BotError::Other(anyhow::anyhow!("Blocking task failed: {e}")))?
}
