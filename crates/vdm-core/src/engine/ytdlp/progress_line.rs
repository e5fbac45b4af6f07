//! Parse yt-dlp output lines into progress events and file names.

use super::args::PROGRESS_MARKER;
use crate::engine::{EngineProgress, ProgressStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(EngineProgress),
    /// A file the engine started writing.
    Destination(String),
    /// The final merged or converted file.
    Final(String),
    /// Nothing to download; the file already exists.
    AlreadyDownloaded(String),
    Error(String),
    Other,
}

fn num(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field == "NA" || field == "None" {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

fn parse_progress(rest: &str) -> Option<EngineProgress> {
    // The file name is last and may itself contain '|'.
    let mut parts = rest.splitn(7, '|');
    let status = match parts.next()?.trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        "error" => ProgressStatus::Error,
        _ => return None,
    };
    let downloaded = parts.next().and_then(num);
    let total = parts.next().and_then(num);
    let estimate = parts.next().and_then(num);
    let speed = parts.next().and_then(num);
    let eta = parts.next().and_then(num);
    let filename = parts
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "NA")
        .map(String::from);
    Some(EngineProgress {
        status,
        downloaded_bytes: downloaded.map(|v| v as u64),
        total_bytes: total.map(|v| v as u64),
        total_bytes_estimate: estimate.map(|v| v as u64),
        speed,
        eta: eta.map(|v| v as u64),
        filename,
        error: None,
    })
}

pub fn parse_line(line: &str) -> OutputLine {
    let line = line.trim_end();
    if let Some(idx) = line.find(PROGRESS_MARKER) {
        if let Some(p) = parse_progress(&line[idx + PROGRESS_MARKER.len()..]) {
            return OutputLine::Progress(p);
        }
    }
    if let Some(rest) = line.strip_prefix("[download] Destination: ") {
        return OutputLine::Destination(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return OutputLine::Final(unquote(rest));
    }
    if let Some(rest) = line.strip_prefix("[ExtractAudio] Destination: ") {
        return OutputLine::Final(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(name) = rest.strip_suffix(" has already been downloaded") {
            return OutputLine::AlreadyDownloaded(name.trim().to_string());
        }
    }
    if line.starts_with("ERROR:") {
        return OutputLine::Error(line.to_string());
    }
    OutputLine::Other
}
