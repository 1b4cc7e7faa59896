//! Cooperative cancellation over a `watch` flag. A dropped sender means the
//! run can no longer be cancelled, not that it was.

use std::future::Future;

use tokio::sync::watch;

pub fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

/// Resolves once the flag is set.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs `fut` unless cancellation arrives first, in which case `None`.
pub async fn or_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => None,
        out = fut => Some(out),
    }
}
