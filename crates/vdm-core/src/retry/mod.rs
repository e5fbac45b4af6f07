//! Retry policy and error classification.
//!
//! Engine failures arrive as text. `classify` maps them to an `ErrorKind`,
//! `RetryPolicy::decide` turns that into retry-or-stop, and `JobFailure`
//! carries the user-facing message once a job gives up.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_message, http_status_in};
pub use error::{friendly_message, JobFailure};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryError};
