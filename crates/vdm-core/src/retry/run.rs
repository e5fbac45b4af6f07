//! Retry loop: run an async operation until success, a terminal error, or cancellation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Why `run_with_retry` stopped without a value.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The cancellation token fired while waiting between attempts.
    Cancelled,
    /// The last error, with the number of attempts made.
    GaveUp { error: E, attempts: u32 },
}

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// `on_retry(next_attempt, &error, delay)` is called before each sleep. The sleep
/// is cut short when `cancel` fires.
pub async fn run_with_retry<T, E, Op, Fut, C, R>(
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    classify: C,
    mut on_retry: R,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorKind,
    R: FnMut(u32, &E, Duration),
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryError::GaveUp {
                            error: e,
                            attempts: attempt,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        on_retry(attempt + 1, &e, d);
                        match cancel {
                            Some(token) => {
                                tokio::select! {
                                    _ = token.cancelled() => return Err(RetryError::Cancelled),
                                    _ = tokio::time::sleep(d) => {}
                                }
                            }
                            None => tokio::time::sleep(d).await,
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn kind_of(e: &&'static str) -> ErrorKind {
        if e.contains("timed out") {
            ErrorKind::Timeout
        } else {
            ErrorKind::Forbidden
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let mut retries = Vec::new();
        let out = run_with_retry(
            &policy,
            None,
            kind_of,
            |n, _, _| retries.push(n),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("timed out")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_stops_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let out: Result<(), _> = run_with_retry(
            &policy,
            None,
            kind_of,
            |_, _, _| {},
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("HTTP Error 403") }
            },
        )
        .await;
        match out {
            Err(RetryError::GaveUp { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempt_bound() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let out: Result<(), _> =
            run_with_retry(&policy, None, kind_of, |_, _, _| {}, || async { Err("timed out") })
                .await;
        assert!(matches!(out, Err(RetryError::GaveUp { attempts: 3, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        let t = token.clone();
        let out: Result<(), _> = run_with_retry(
            &policy,
            Some(&token),
            kind_of,
            move |_, _, _| t.cancel(),
            || async { Err("timed out") },
        )
        .await;
        assert!(matches!(out, Err(RetryError::Cancelled)));
    }
}
