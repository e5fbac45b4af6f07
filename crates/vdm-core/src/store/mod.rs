//! Job store: the single source of truth for queue membership and job state.
//!
//! Four disjoint collections (pending, active, completed, failed) plus a per-key
//! job map, all behind one mutex. Every method is a short critical section
//! that returns owned values; no method blocks, spawns, or emits events.

mod types;


pub use types::{ActiveRun, Admission, Attach, CleanupTarget, Location, QueueCounts, Removed};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::WorkerHandle;
use crate::job::{Job, JobKey, JobStatus, Thumbnail, TitleQuality};
use crate::naming::truncate_for_display;
use crate::retry::JobFailure;

pub const MIN_CONCURRENT: usize = 1;
pub const MAX_CONCURRENT: usize = 5;

/// Status text length kept for display; the full message lives in `error_detail`.
const STATUS_TEXT_MAX: usize = 80;

pub const INITIALIZING_TEXT: &str = "Initializing...";

pub fn clamp_concurrency(n: usize) -> usize {
    n.clamp(MIN_CONCURRENT, MAX_CONCURRENT)
}

#[derive(Debug)]
struct ActiveEntry {
    run: ActiveRun,
    token: CancellationToken,
    worker: Option<JoinHandle<()>>,
    reported_files: Vec<String>,
}

#[derive(Debug)]
struct Orphan {
    token: CancellationToken,
    target: CleanupTarget,
}

#[derive(Debug)]
struct StoreInner {
    pending: VecDeque<JobKey>,
    active: Vec<ActiveEntry>,
    completed: Vec<JobKey>,
    failed: Vec<JobKey>,
    jobs: HashMap<JobKey, Job>,
    max_concurrent: usize,
    next_run: u64,
    /// Runs cancelled before their worker handle was attached, by run id.
    orphans: HashMap<u64, Orphan>,
    /// Orphaned runs handed back for stopping; they keep their slot until released.
    stopping: HashSet<u64>,
}

impl StoreInner {
    fn location(&self, key: &str) -> Option<Location> {
        if self.pending.iter().any(|k| k == key) {
            Some(Location::Pending)
        } else if self.active.iter().any(|e| e.run.key == key) {
            Some(Location::Active)
        } else if self.completed.iter().any(|k| k == key) {
            Some(Location::Completed)
        } else if self.failed.iter().any(|k| k == key) {
            Some(Location::Failed)
        } else {
            None
        }
    }

    fn active_index(&self, run: &ActiveRun) -> Option<usize> {
        self.active
            .iter()
            .position(|e| e.run.id == run.id && e.run.key == run.key)
    }

    fn cleanup_target(job: &Job, reported_files: Vec<String>) -> CleanupTarget {
        CleanupTarget {
            output_dir: job.output_dir.clone(),
            title: (job.title_quality == TitleQuality::Real).then(|| job.title.clone()),
            reported_files,
        }
    }
}

#[derive(Debug)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(2)
    }
}

impl JobStore {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                pending: VecDeque::new(),
                active: Vec::new(),
                completed: Vec::new(),
                failed: Vec::new(),
                jobs: HashMap::new(),
                max_concurrent: clamp_concurrency(max_concurrent),
                next_run: 1,
                orphans: HashMap::new(),
                stopping: HashSet::new(),
            }),
        }
    }

    /// A panic elsewhere must not wedge the queue; the data is still consistent
    /// because every critical section is a handful of infallible mutations.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a job to the back of the pending queue. False if the key is known.
    pub fn insert_pending(&self, job: Job) -> bool {
        let mut s = self.lock();
        if s.location(&job.key).is_some() {
            return false;
        }
        s.pending.push_back(job.key.clone());
        s.jobs.insert(job.key.clone(), job);
        true
    }

    /// Moves as many pending jobs as there are free slots into the active set.
    pub fn admit(&self) -> Vec<Admission> {
        let mut s = self.lock();
        let busy = s.active.len() + s.orphans.len() + s.stopping.len();
        let slots = s.max_concurrent.saturating_sub(busy);
        let mut admitted = Vec::new();
        for _ in 0..slots {
            let Some(key) = s.pending.pop_front() else {
                break;
            };
            let id = s.next_run;
            s.next_run += 1;
            let run = ActiveRun { key: key.clone(), id };
            let token = CancellationToken::new();
            let Some(job) = s.jobs.get_mut(&key) else {
                continue;
            };
            job.status = JobStatus::Starting;
            job.progress_percent = 0.0;
            job.status_text = INITIALIZING_TEXT.to_string();
            let snapshot = job.clone();
            s.active.push(ActiveEntry {
                run: run.clone(),
                token: token.clone(),
                worker: None,
                reported_files: Vec::new(),
            });
            admitted.push(Admission {
                run,
                token,
                job: snapshot,
            });
        }
        admitted
    }

    pub fn attach_worker(&self, run: &ActiveRun, task: JoinHandle<()>) -> Attach {
        let mut s = self.lock();
        if let Some(idx) = s.active_index(run) {
            s.active[idx].worker = Some(task);
            return Attach::Attached;
        }
        match s.orphans.remove(&run.id) {
            Some(Orphan { token, target }) => {
                s.stopping.insert(run.id);
                Attach::Orphaned {
                    handle: WorkerHandle { token, task },
                    target,
                }
            }
            None => Attach::Finished,
        }
    }

    /// Frees the slot of an orphaned run once its worker is stopped.
    pub fn release_stopped(&self, run: &ActiveRun) {
        self.lock().stopping.remove(&run.id);
    }

    /// Stores the clamped limit and returns it.
    pub fn set_max_concurrent(&self, n: usize) -> usize {
        let n = clamp_concurrency(n);
        self.lock().max_concurrent = n;
        n
    }

    pub fn max_concurrent(&self) -> usize {
        self.lock().max_concurrent
    }

    /// Removes a job from whichever collection holds it.
    ///
    /// An active job's token is tripped right away when no worker handle is
    /// attached yet; otherwise stopping the worker is left to the caller.
    pub fn take_for_cancel(&self, key: &str) -> Removed {
        let mut s = self.lock();
        match s.location(key) {
            None => Removed::NotFound,
            Some(Location::Pending) => {
                s.pending.retain(|k| k != key);
                s.jobs.remove(key);
                Removed::Pending
            }
            Some(Location::Active) => {
                let Some(idx) = s.active.iter().position(|e| e.run.key == key) else {
                    return Removed::NotFound;
                };
                let entry = s.active.remove(idx);
                let target = match s.jobs.remove(key) {
                    Some(job) => StoreInner::cleanup_target(&job, entry.reported_files),
                    None => return Removed::NotFound,
                };
                match entry.worker {
                    Some(task) => Removed::Active {
                        handle: Some(WorkerHandle {
                            token: entry.token,
                            task,
                        }),
                        target,
                    },
                    None => {
                        entry.token.cancel();
                        s.orphans.insert(
                            entry.run.id,
                            Orphan {
                                token: entry.token,
                                target: target.clone(),
                            },
                        );
                        Removed::Active {
                            handle: None,
                            target,
                        }
                    }
                }
            }
            Some(Location::Completed) => {
                s.completed.retain(|k| k != key);
                s.jobs
                    .remove(key)
                    .map(|j| Removed::Finished(j.status))
                    .unwrap_or(Removed::NotFound)
            }
            Some(Location::Failed) => {
                s.failed.retain(|k| k != key);
                s.jobs
                    .remove(key)
                    .map(|j| Removed::Finished(j.status))
                    .unwrap_or(Removed::NotFound)
            }
        }
    }

    /// Removes a failed job. False for any other state.
    pub fn dismiss(&self, key: &str) -> bool {
        let mut s = self.lock();
        let Some(pos) = s.failed.iter().position(|k| k == key) else {
            return false;
        };
        s.failed.remove(pos);
        s.jobs.remove(key);
        true
    }

    /// Removes every completed job; returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut s = self.lock();
        let keys = std::mem::take(&mut s.completed);
        for k in &keys {
            s.jobs.remove(k);
        }
        keys.len()
    }

    /// Starting -> Downloading. False if the run is no longer active.
    pub fn mark_downloading(&self, run: &ActiveRun) -> bool {
        let mut s = self.lock();
        if s.active_index(run).is_none() {
            return false;
        }
        match s.jobs.get_mut(&run.key) {
            Some(job) => {
                if job.status.can_transition_to(JobStatus::Downloading) {
                    job.status = JobStatus::Downloading;
                }
                true
            }
            None => false,
        }
    }

    pub fn update_progress(&self, run: &ActiveRun, percent: f32, text: &str) -> bool {
        let mut s = self.lock();
        if s.active_index(run).is_none() {
            return false;
        }
        match s.jobs.get_mut(&run.key) {
            Some(job) => {
                job.progress_percent = percent.clamp(0.0, 100.0);
                job.status_text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Remembers a file the engine is writing, for cleanup on cancel.
    pub fn record_file(&self, run: &ActiveRun, file_name: &str) {
        let mut s = self.lock();
        if let Some(idx) = s.active_index(run) {
            let files = &mut s.active[idx].reported_files;
            if !files.iter().any(|f| f == file_name) {
                files.push(file_name.to_string());
            }
        }
    }

    /// Applies a title/thumbnail if it improves on what the job has.
    ///
    /// Returns the job's display metadata after the update, or None if the job
    /// is gone.
    pub fn apply_metadata(
        &self,
        key: &str,
        title: Option<&str>,
        quality: TitleQuality,
        thumbnail: Option<Thumbnail>,
    ) -> Option<(String, Option<Thumbnail>)> {
        let mut s = self.lock();
        let job = s.jobs.get_mut(key)?;
        if let Some(t) = title.map(str::trim).filter(|t| !t.is_empty()) {
            if quality > job.title_quality {
                job.title = t.to_string();
                job.title_quality = quality;
            }
        }
        if job.thumbnail.is_none() {
            job.thumbnail = thumbnail;
        }
        Some((job.title.clone(), job.thumbnail.clone()))
    }

    /// Active -> completed. None if the run is no longer active.
    pub fn complete(&self, run: &ActiveRun, filename: Option<String>) -> Option<Job> {
        let mut s = self.lock();
        let idx = s.active_index(run)?;
        s.active.remove(idx);
        s.completed.push(run.key.clone());
        let job = s.jobs.get_mut(&run.key)?;
        job.status = JobStatus::Complete;
        job.progress_percent = 100.0;
        job.status_text = "Complete".to_string();
        job.output_filename = filename;
        job.error_detail = None;
        Some(job.clone())
    }

    /// Active -> failed. None if the run is no longer active.
    pub fn fail(&self, run: &ActiveRun, failure: &JobFailure) -> Option<Job> {
        let mut s = self.lock();
        let idx = s.active_index(run)?;
        s.active.remove(idx);
        s.failed.push(run.key.clone());
        let job = s.jobs.get_mut(&run.key)?;
        job.status = JobStatus::Error;
        job.status_text = truncate_for_display(&failure.message, STATUS_TEXT_MAX);
        job.error_detail = Some(failure.detail.clone());
        job.output_filename = None;
        Some(job.clone())
    }

    pub fn get(&self, key: &str) -> Option<Job> {
        self.lock().jobs.get(key).cloned()
    }

    pub fn location(&self, key: &str) -> Option<Location> {
        self.lock().location(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.location(key).is_some()
    }

    /// Keys in display order: pending (FIFO), active, completed, failed.
    pub fn keys(&self) -> Vec<JobKey> {
        let s = self.lock();
        s.pending
            .iter()
            .cloned()
            .chain(s.active.iter().map(|e| e.run.key.clone()))
            .chain(s.completed.iter().cloned())
            .chain(s.failed.iter().cloned())
            .collect()
    }

    pub fn pending_keys(&self) -> Vec<JobKey> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn active_keys(&self) -> Vec<JobKey> {
        self.lock().active.iter().map(|e| e.run.key.clone()).collect()
    }

    pub fn snapshot_all(&self) -> Vec<Job> {
        let s = self.lock();
        s.pending
            .iter()
            .chain(s.active.iter().map(|e| &e.run.key))
            .chain(s.completed.iter())
            .chain(s.failed.iter())
            .filter_map(|k| s.jobs.get(k).cloned())
            .collect()
    }

    pub fn counts(&self) -> QueueCounts {
        let s = self.lock();
        QueueCounts {
            pending: s.pending.len(),
            active: s.active.len(),
            completed: s.completed.len(),
            failed: s.failed.len(),
        }
    }

    /// Nothing pending, nothing running, no cancelled worker awaiting its stop.
    pub fn is_idle(&self) -> bool {
        let s = self.lock();
        s.pending.is_empty() && s.active.is_empty() && s.orphans.is_empty() && s.stopping.is_empty()
    }
}
