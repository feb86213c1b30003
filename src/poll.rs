use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{Error, Result};

/// Polling behaviour for readiness waits and namespace deletion waits.
///
/// The source system polled every 5 seconds with no upper bound; the
/// deadline here is a deliberate strengthening so a stuck rollout surfaces
/// as `DeadlineExceeded` instead of hanging the request forever. A `None`
/// timeout restores the unbounded behaviour.
#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Blocks until `is_ready` holds for a freshly fetched object, `failure`
/// reports a terminal reason, the fetch itself errors, or the deadline
/// passes.
pub async fn wait_until_ready<T, F, Fut>(
    settings: &PollSettings,
    what: &str,
    mut fetch: F,
    is_ready: impl Fn(&T) -> bool,
    failure: impl Fn(&T) -> Option<String>,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = settings.timeout.map(|t| Instant::now() + t);
    loop {
        let current = fetch().await?;
        if is_ready(&current) {
            return Ok(());
        }
        if let Some(reason) = failure(&current) {
            return Err(Error::RolloutFailed {
                what: what.to_string(),
                reason,
            });
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded {
                    what: what.to_string(),
                    seconds: settings.timeout.unwrap_or_default().as_secs(),
                });
            }
        }
        debug!(what, "not ready yet, polling again");
        tokio::time::sleep(settings.interval).await;
    }
}
