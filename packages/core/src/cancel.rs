//! Racing backend round trips against a cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Run `fut` unless `cancel` fires first.
///
/// An already-fired token short-circuits before `fut` is polled, so no
/// request reaches the backend.
pub(crate) async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}

/// Sleep for `duration`, waking early with [`Error::Cancelled`].
pub(crate) async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    cancellable(cancel, async {
        tokio::time::sleep(duration).await;
        Ok::<_, Error>(())
    })
    .await
}
