use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of a failure for retry purposes.
///
/// Engine errors arrive as free text; `classify` maps them into these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (socket/read).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP 403 or an equivalent access refusal.
    Forbidden,
    /// Content is blocked in the caller's region.
    RegionLocked,
    /// Private, age-restricted, or sign-in-only content.
    Restricted,
    /// Any other explicit HTTP error status.
    Http(u16),
    /// The URL is malformed or no extractor supports it.
    InvalidUrl,
    /// Anything unclassified.
    Other,
}

impl ErrorKind {
    /// Transient kinds may succeed if retried; everything else is terminal.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Connection)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-delay retry policy with an attempt bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::DOWNLOAD)
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            delay: Duration::from_millis(cfg.delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Decide whether a failed attempt should be retried.
    ///
    /// `attempt` is 1-based (1 = first attempt). Terminal kinds never retry.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay)
    }
}
