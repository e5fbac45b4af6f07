//! Values handed out by the job store. All are owned copies so callers can act
//! on them after the lock is released.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::control::WorkerHandle;
use crate::job::{Job, JobKey, JobStatus};

/// One admission of a job into the active set.
///
/// The id distinguishes a resubmitted key from an earlier run that was
/// cancelled, so late callbacks from the old worker are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveRun {
    pub key: JobKey,
    pub id: u64,
}

/// A job just moved from pending to active.
#[derive(Debug, Clone)]
pub struct Admission {
    pub run: ActiveRun,
    pub token: CancellationToken,
    pub job: Job,
}

/// What partial-artifact cleanup needs to know about a cancelled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTarget {
    pub output_dir: PathBuf,
    /// Real title, if one was resolved. Placeholders never match filenames.
    pub title: Option<String>,
    /// File names the engine reported while downloading.
    pub reported_files: Vec<String>,
}

/// Result of attaching a spawned worker to its active entry.
#[derive(Debug)]
pub enum Attach {
    Attached,
    /// The job was cancelled before the handle arrived; the caller must stop
    /// the worker and clean up.
    Orphaned {
        handle: WorkerHandle,
        target: CleanupTarget,
    },
    /// The worker already reported completion or failure.
    Finished,
}

/// Result of removing a job for cancellation.
#[derive(Debug)]
pub enum Removed {
    NotFound,
    Pending,
    /// `handle` is None when the worker was not attached yet; the stop then
    /// happens on attach.
    Active {
        handle: Option<WorkerHandle>,
        target: CleanupTarget,
    },
    Finished(JobStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Pending,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.active + self.completed + self.failed
    }
}
