//! Fixed-interval repetition with cooperative cancellation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `action` now and then again `interval` after each run completes,
/// until `token` is cancelled.
///
/// The interval is measured from the end of one run to the start of the
/// next, so a slow action delays later runs instead of overlapping them or
/// producing a burst of catch-up runs. Cancellation is observed after each
/// run and while waiting; a run that has started always finishes.
pub async fn run_periodic<F, Fut>(token: &CancellationToken, interval: Duration, mut action: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        action().await;

        if token.is_cancelled() {
            return;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
