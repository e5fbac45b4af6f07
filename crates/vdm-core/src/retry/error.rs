//! User-facing failure type produced when a job ends in `Error`.

use regex::Regex;
use std::sync::OnceLock;

use super::classify::classify_message;
use super::policy::ErrorKind;
use crate::engine::EngineError;

/// Final failure of a job, as reported to the scheduler.
///
/// `message` is what the user sees; `detail` keeps the raw engine text for logs
/// and the job's `error_detail` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

fn youtube_said_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"YouTube said: ([^\n]*)").expect("valid regex"))
}

/// Friendly text for a classified failure.
pub fn friendly_message(kind: ErrorKind, raw: &str) -> String {
    match kind {
        ErrorKind::Forbidden => {
            "Access forbidden (HTTP 403). The site may be limiting downloads or restricting this video."
                .to_string()
        }
        ErrorKind::RegionLocked => {
            "Video unavailable in your region due to geographical restrictions.".to_string()
        }
        ErrorKind::Restricted => {
            "This video is private, age-restricted, or requires sign-in.".to_string()
        }
        ErrorKind::Http(code) => {
            format!("Server returned HTTP error {}. Please try again later.", code)
        }
        ErrorKind::InvalidUrl => format!("Unsupported or invalid URL: {}", first_line(raw)),
        ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Other => {
            match youtube_said_re().captures(raw).and_then(|c| c.get(1)) {
                Some(m) => format!("Download error: YouTube error: {}", m.as_str().trim()),
                None => format!("Download error: {}", first_line(raw)),
            }
        }
    }
}

fn first_line(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix("ERROR:").map(str::trim_start).unwrap_or(s);
    s.lines().next().unwrap_or("")
}

impl JobFailure {
    pub fn new(kind: ErrorKind, raw: impl Into<String>) -> Self {
        let detail = raw.into();
        Self {
            kind,
            message: friendly_message(kind, &detail),
            detail,
        }
    }

    /// Classify a raw message and wrap it.
    pub fn from_message(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::new(classify_message(&raw), raw)
    }

    /// Wrap an engine error. Spawn and output errors are terminal `Other`.
    pub fn from_engine(e: &EngineError) -> Self {
        match e {
            EngineError::Failed(msg) => Self::from_message(msg.clone()),
            other => {
                let detail = other.to_string();
                Self {
                    kind: ErrorKind::Other,
                    message: format!("Error: {}", detail),
                    detail,
                }
            }
        }
    }

    /// A transient failure that kept recurring until the attempt bound.
    pub fn exhausted(e: &EngineError, attempts: u32) -> Self {
        let mut f = Self::from_engine(e);
        f.message = format!("{} (gave up after {} attempts)", f.message, attempts);
        f
    }
}
