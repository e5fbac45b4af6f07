//! Types describing one download job and its runtime state.

use std::path::PathBuf;
use std::sync::Arc;

use super::options::FormatOptions;

/// Normalized job key (canonical URL).
pub type JobKey = String;

/// Raw thumbnail image bytes, shared cheaply between the store and events.
pub type Thumbnail = Arc<[u8]>;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Starting,
    Downloading,
    Complete,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Starting and Downloading both occupy a concurrency slot.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Downloading)
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Allowed edges of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Starting)
                | (Queued, Cancelled)
                | (Starting, Downloading)
                | (Starting, Complete)
                | (Starting, Error)
                | (Starting, Cancelled)
                | (Downloading, Complete)
                | (Downloading, Error)
                | (Downloading, Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How trustworthy the current title is. Updates never lower it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TitleQuality {
    /// "Loading..." shown right after submission.
    Loading,
    /// Generic name built from site and id.
    Placeholder,
    /// Title reported by the site or the engine.
    Real,
}

pub const LOADING_TITLE: &str = "Loading title...";

/// One download request plus its mutable runtime state.
#[derive(Debug, Clone)]
pub struct Job {
    pub key: JobKey,
    pub format_options: FormatOptions,
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub progress_percent: f32,
    pub status_text: String,
    pub title: String,
    pub title_quality: TitleQuality,
    pub thumbnail: Option<Thumbnail>,
    /// Set only on `Complete`.
    pub output_filename: Option<String>,
    /// Full failure text, kept even when the status text is truncated.
    pub error_detail: Option<String>,
}

impl Job {
    pub fn new(key: impl Into<JobKey>, format_options: FormatOptions, output_dir: PathBuf) -> Self {
        Self {
            key: key.into(),
            format_options,
            output_dir,
            status: JobStatus::Queued,
            progress_percent: 0.0,
            status_text: "Queued".to_string(),
            title: LOADING_TITLE.to_string(),
            title_quality: TitleQuality::Loading,
            thumbnail: None,
            output_filename: None,
            error_detail: None,
        }
    }

    /// Only failed jobs can be dismissed.
    pub fn dismissable(&self) -> bool {
        self.status == JobStatus::Error
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_filename
            .as_ref()
            .map(|name| self.output_dir.join(name))
    }
}
