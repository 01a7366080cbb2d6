//! Bounded retry helper for callers of the coordination core.
//!
//! Operations in the core never retry internally; callers that want to
//! converge on success (periodic reconciliation, replica catch-up) wrap a
//! single idempotent call in [`retry_forever`] and bound it with a
//! [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Repeatedly invokes `f` until it succeeds or `token` is cancelled.
///
/// Sleeps `interval` between attempts. At least one attempt is always
/// made. On cancellation no further attempt is made and the most recent
/// error is returned; on success returns `Ok(())`.
pub async fn retry_forever<F, Fut, E>(
    token: &CancellationToken,
    label: &str,
    mut f: F,
    interval: Duration,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    loop {
        let err = match f().await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        warn!(label, error = %err, "attempt failed, retrying");

        tokio::select! {
            _ = token.cancelled() => return Err(err),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
