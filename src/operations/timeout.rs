use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Race `future` against a deadline.
///
/// The future runs on its own task. When the deadline wins only the wait is
/// abandoned: the task keeps running to completion in the background and its
/// result is discarded. Callers that need the work itself to stop must pass
/// a cancellation token into it.
pub async fn with_timeout<F, T>(future: F, timeout: Duration, operation: &str) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(future);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(AppError::Internal(format!(
            "'{}' task failed: {}",
            operation, join_error
        ))),
        Err(_) => {
            warn!(
                operation = %operation,
                timeout_ms = timeout.as_millis() as u64,
                "Deadline exceeded, abandoning wait"
            );
            Err(AppError::Timeout(format!(
                "'{}' exceeded its {}ms deadline",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
