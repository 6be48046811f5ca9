//! Polling of remote conditions with timeout and cancellation

use super::ClusterError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {}s waiting for {what}", .timeout.as_secs())]
    Timeout { what: String, timeout: Duration },

    #[error("cancelled while waiting for {what}")]
    Cancelled { what: String },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Outcome of one probe
#[derive(Debug)]
pub enum Probe<T> {
    Done(T),
    Continue,
}

/// Calls `probe` every `interval` until it reports `Done`, `timeout`
/// elapses, or `cancel` fires. Probe errors end the wait.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    cancel: &CancellationToken,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, ClusterError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                what: what.to_string(),
            });
        }

        attempts += 1;
        if let Probe::Done(value) = probe().await? {
            debug!(what, attempts, "Condition met");
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                what: what.to_string(),
                timeout,
            });
        }

        let sleep = interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled { what: what.to_string() });
            }
            _ = tokio::time::sleep(sleep) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_done_after_polls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = wait_for(
            "build",
            &CancellationToken::new(),
            Duration::from_secs(5),
            Duration::from_millis(5),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                        Ok(Probe::Done(42))
                    } else {
                        Ok(Probe::Continue)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = wait_for::<(), _, _>(
            "pod kit-a-kaniko",
            &CancellationToken::new(),
            Duration::from_millis(30),
            Duration::from_millis(10),
            || async { Ok(Probe::Continue) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WaitError::Timeout { .. }));
        assert!(err.to_string().contains("pod kit-a-kaniko"));
    }

    #[tokio::test]
    async fn test_cancelled_while_sleeping() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = wait_for::<(), _, _>(
            "build",
            &cancel,
            Duration::from_secs(30),
            Duration::from_secs(10),
            || async { Ok(Probe::Continue) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_probe_error_propagates() {
        let err = wait_for::<(), _, _>(
            "build",
            &CancellationToken::new(),
            Duration::from_secs(1),
            Duration::from_millis(10),
            || async { Err(ClusterError::Api("boom".to_string())) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Cluster(_)));
    }
}
