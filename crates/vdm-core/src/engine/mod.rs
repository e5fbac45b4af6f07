//! Download engine boundary.
//!
//! The engine is opaque: it extracts info, downloads, and reports progress
//! through a callback. A callback error must abort the download promptly.

pub mod ytdlp;

use async_trait::async_trait;
use std::path::Path;

use crate::control::JobAborted;
use crate::job::FormatOptions;

pub use ytdlp::YtDlpEngine;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("download cancelled by user")]
    Aborted,
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Engine-reported failure; the text is what error classification reads.
    #[error("{0}")]
    Failed(String),
    #[error("unexpected engine output: {0}")]
    Output(String),
}

impl From<JobAborted> for EngineError {
    fn from(_: JobAborted) -> Self {
        EngineError::Aborted
    }
}

/// Info obtained without downloading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<f64>,
    pub extractor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
}

/// One progress callback event.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProgress {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Bytes per second.
    pub speed: Option<f64>,
    /// Seconds remaining.
    pub eta: Option<u64>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl EngineProgress {
    fn empty(status: ProgressStatus) -> Self {
        Self {
            status,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
            filename: None,
            error: None,
        }
    }

    pub fn downloading(downloaded: u64, total: Option<u64>) -> Self {
        Self {
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            ..Self::empty(ProgressStatus::Downloading)
        }
    }

    pub fn finished(filename: Option<String>) -> Self {
        Self {
            filename,
            ..Self::empty(ProgressStatus::Finished)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(ProgressStatus::Error)
        }
    }

    /// Exact total if known, otherwise the estimate.
    pub fn total(&self) -> Option<u64> {
        self.total_bytes
            .or(self.total_bytes_estimate)
            .filter(|t| *t > 0)
    }
}

/// What the engine knows after a successful download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Final output file name (merged/converted file when applicable).
    pub filename: Option<String>,
}

pub type ProgressCallback<'a> = dyn FnMut(&EngineProgress) -> Result<(), JobAborted> + Send + 'a;

#[async_trait]
pub trait DownloadEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_info(
        &self,
        url: &str,
        options: &FormatOptions,
    ) -> Result<MediaInfo, EngineError>;

    async fn download(
        &self,
        url: &str,
        options: &FormatOptions,
        output_dir: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<DownloadReport, EngineError>;
}
