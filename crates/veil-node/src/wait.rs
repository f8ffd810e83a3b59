//! Cancellable, deadline-bearing waits on a swarm engine
//!
//! Every wait races the operation against the caller's
//! [`CancellationToken`] and an optional deadline. Cancellation and expiry
//! surface as distinct errors.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use veil_core::{EngineResult, TransferProgress};

use crate::error::{NodeError, NodeResult};

/// Resolves after `timeout`, or never when there is none
async fn expiry(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(after) => {
            tokio::time::sleep(after).await;
            after
        }
        None => std::future::pending().await,
    }
}

/// Wait for an engine readiness signal
pub async fn until_ready<F>(
    ready: F,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> NodeResult<()>
where
    F: Future<Output = EngineResult<()>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(NodeError::Cancelled),
        after = expiry(timeout) => Err(NodeError::TimedOut(after)),
        result = ready => result.map_err(NodeError::from),
    }
}

fn ticker(every: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn log_progress(progress: &TransferProgress) {
    info!(
        bytes = progress.bytes_transferred,
        total = progress.total_bytes,
        percent = progress.percent(),
        complete = progress.is_complete,
        "Transfer progress"
    );
}

/// Poll `query` every `every` until it reports completion
///
/// The first poll happens immediately.
pub async fn poll_until_complete<Q, Fut>(
    mut query: Q,
    every: Duration,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> NodeResult<TransferProgress>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<TransferProgress>>,
{
    let deadline = expiry(timeout);
    tokio::pin!(deadline);
    let mut interval = ticker(every);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(NodeError::Cancelled),
            after = &mut deadline => return Err(NodeError::TimedOut(after)),
            _ = interval.tick() => {}
        }

        // A stalled query must not outlive the token or the deadline
        let progress = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(NodeError::Cancelled),
            after = &mut deadline => return Err(NodeError::TimedOut(after)),
            result = query() => result?,
        };
        log_progress(&progress);
        if progress.is_complete {
            return Ok(progress);
        }
    }
}

/// Poll `query` every `every` until the token is cancelled
///
/// Returns the last observed progress; an engine error ends the wait.
pub async fn serve_until_cancelled<Q, Fut>(
    mut query: Q,
    every: Duration,
    token: &CancellationToken,
) -> NodeResult<TransferProgress>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<TransferProgress>>,
{
    let mut interval = ticker(every);
    let mut last = TransferProgress::default();

    loop {
        let polled = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            _ = interval.tick() => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = query() => Some(result?),
            },
        };

        match polled {
            Some(progress) => {
                log_progress(&progress);
                last = progress;
            }
            None => {
                debug!("Serving stopped by cancellation");
                return Ok(last);
            }
        }
    }
}

/// Sleep for `duration` unless cancelled first; returns false on cancellation
pub async fn linger(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
