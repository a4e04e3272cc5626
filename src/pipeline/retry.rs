//! Retry wrapper around single task attempts

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::{AttemptResult, Result, WorkItem};
use crate::pipeline::normalize;

/// Run `attempt` until it succeeds, at most `max_retries + 1` times.
///
/// The closure receives the one-based attempt number. A fixed `delay`
/// separates consecutive attempts. An `Err` that [`is_retryable`] counts as a
/// failed attempt; any other `Err` is returned at once. The last result is
/// returned whether or not it succeeded.
///
/// [`is_retryable`]: crate::core::MutualsError::is_retryable
pub async fn process_with_retry<F, Fut>(
    item: &WorkItem,
    max_retries: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<AttemptResult>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AttemptResult>>,
{
    let total = max_retries.saturating_add(1);
    let mut number = 1;

    loop {
        info!(
            row = item.row_index,
            attempt = number,
            of = total,
            target = %item.target_identifier,
            "Attempt started"
        );
        let result = match attempt(number).await {
            Ok(result) => result,
            Err(e) if e.is_retryable() => normalize::error_result(e),
            Err(e) => {
                warn!(row = item.row_index, attempt = number, error = %e, "Attempt aborted");
                return Err(e);
            }
        };

        if result.success {
            info!(row = item.row_index, attempt = number, "Attempt succeeded");
            return Ok(result);
        }

        warn!(
            row = item.row_index,
            attempt = number,
            payload = %result.result_payload,
            detail = result.error_detail.as_deref().unwrap_or(""),
            "Attempt failed"
        );

        if number >= total {
            warn!(row = item.row_index, attempts = total, "All attempts failed");
            return Ok(result);
        }

        number += 1;
        tokio::time::sleep(delay).await;
    }
}
