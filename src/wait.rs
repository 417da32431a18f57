//! Bounded polling for wait mode

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::{Error, Result};

/// Default bound for wait mode
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed interval between wait mode checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll `check` until it reports the condition met.
///
/// The first check runs immediately. `Ok(false)` sleeps `interval` and checks
/// again; `Ok(true)` ends the wait. An `Err` from `check` aborts the wait at
/// once and is returned unchanged. Once `timeout` has elapsed without the
/// condition being met, returns [`Error::Timeout`].
pub async fn poll_immediate<F, Fut>(
    interval: Duration,
    timeout: Duration,
    description: &str,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        if check().await? {
            return Ok(());
        }
        trace!(description = %description, "Condition not yet met");

        if start.elapsed() >= timeout {
            return Err(Error::Timeout {
                description: description.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }

        tokio::time::sleep(interval).await;
    }
}
