//! Job control for cancellation: cooperative tokens first, task abort second.
//!
//! Every admitted job gets a `CancellationToken` when it enters the active set.
//! Cancelling a job trips the token; the worker's progress callback sees it and
//! unwinds the engine call. If the worker does not stop within the grace
//! period the task is aborted, which drops the engine future (and kills any
//! child process it owns).

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Error returned when a download is stopped by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download cancelled by user")
    }
}

impl std::error::Error for JobAborted {}

/// A running worker task together with its cancellation token.
#[derive(Debug)]
pub struct WorkerHandle {
    pub token: CancellationToken,
    pub task: JoinHandle<()>,
}

/// How a worker ended after a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker noticed the token and returned within the grace period.
    Cooperative,
    /// The grace period elapsed and the task was aborted.
    Forced,
}

/// Request cancellation, wait up to `grace`, then abort the task.
pub async fn stop_worker(handle: WorkerHandle, grace: Duration) -> StopOutcome {
    let WorkerHandle { token, mut task } = handle;
    token.cancel();
    match tokio::time::timeout(grace, &mut task).await {
        Ok(_) => StopOutcome::Cooperative,
        Err(_) => {
            task.abort();
            // Wait for the abort to land so the engine future is dropped before cleanup.
            let _ = task.await;
            StopOutcome::Forced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cooperative_worker_stops_within_grace() {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move { child.cancelled().await });
        let outcome = stop_worker(WorkerHandle { token, task }, Duration::from_secs(1)).await;
        assert_eq!(outcome, StopOutcome::Cooperative);
    }

    #[tokio::test]
    async fn stubborn_worker_is_aborted() {
        let token = CancellationToken::new();
        let task = tokio::spawn(std::future::pending::<()>());
        let outcome = stop_worker(WorkerHandle { token: token.clone(), task }, Duration::from_millis(20)).await;
        assert_eq!(outcome, StopOutcome::Forced);
        assert!(token.is_cancelled());
    }
}
