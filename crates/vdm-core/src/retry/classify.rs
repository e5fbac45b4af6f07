//! Classify engine error messages into retry policy error kinds.

use regex::Regex;
use std::sync::OnceLock;

use crate::engine::EngineError;
use crate::retry::policy::ErrorKind;

fn http_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)HTTP Error (\d{3})").expect("valid regex"))
}

/// Extracts the status code from an "HTTP Error NNN" fragment, if any.
pub fn http_status_in(message: &str) -> Option<u16> {
    http_status_re()
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify a raw engine message.
///
/// Terminal markers are checked before transient ones so that e.g.
/// "HTTP Error 403" inside a connection error is still terminal.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("http error 403") || lower.contains("403: forbidden") {
        return ErrorKind::Forbidden;
    }
    if lower.contains("not available in your country")
        || lower.contains("not available in your region")
        || lower.contains("geo restriction")
        || lower.contains("geo-restrict")
    {
        return ErrorKind::RegionLocked;
    }
    if lower.contains("private video")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age-restricted")
        || lower.contains("members-only")
    {
        return ErrorKind::Restricted;
    }
    if let Some(code) = http_status_in(message) {
        return ErrorKind::Http(code);
    }
    if lower.contains("unsupported url")
        || lower.contains("is not a valid url")
        || lower.contains("invalid url")
    {
        return ErrorKind::InvalidUrl;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return ErrorKind::Timeout;
    }
    if lower.contains("urlopen error")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("connection aborted")
        || lower.contains("remote end closed connection")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("network is unreachable")
        || lower.contains("unable to connect")
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify an engine error into an ErrorKind.
pub fn classify(e: &EngineError) -> ErrorKind {
    match e {
        EngineError::Failed(msg) => classify_message(msg),
        EngineError::Aborted | EngineError::Spawn { .. } | EngineError::Output(_) => {
            ErrorKind::Other
        }
    }
}
