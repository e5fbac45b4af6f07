//! Job scheduler.
//!
//! Owns the job store and event bus, admits pending jobs into free slots
//! (FIFO), runs one `Worker` per active job, and handles cancellation with a
//! cooperative stop followed by a forced one. Store access is always a short
//! critical section; events are emitted and tasks spawned after it ends.
//!
//! Methods that start work (`submit`, `pump`, `set_max_concurrent`) spawn
//! tokio tasks and must be called from within a runtime.

mod cancel;
mod pump;
mod report;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::VdmConfig;
use crate::engine::DownloadEngine;
use crate::events::{EventBus, JobEvent};
use crate::job::{FormatOptions, Job, JobKey, JobStatus, Thumbnail};
use crate::retry::RetryPolicy;
use crate::site::{strip_protocol, LinkMode, SiteResolver};
use crate::store::{JobStore, QueueCounts};
use crate::worker::WorkerConfig;

/// Runtime knobs, usually built from `VdmConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    /// How long a cancelled worker gets to stop on its own before it is aborted.
    pub cancel_grace: Duration,
    pub worker: WorkerConfig,
    pub metadata_retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&VdmConfig::default())
    }
}

impl From<&VdmConfig> for SchedulerConfig {
    fn from(cfg: &VdmConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent,
            cancel_grace: Duration::from_millis(cfg.cancel_grace_ms),
            worker: WorkerConfig {
                download_retry: cfg.download_retry().into(),
                extract_retry: cfg.extract_retry().into(),
            },
            metadata_retry: cfg.metadata_retry().into(),
        }
    }
}

struct Shared {
    store: JobStore,
    events: EventBus,
    engine: Arc<dyn DownloadEngine>,
    sites: Arc<dyn SiteResolver>,
    config: SchedulerConfig,
}

/// Cheap to clone; all clones drive the same queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("engine", &self.shared.engine.name())
            .field("counts", &self.shared.store.counts())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        engine: Arc<dyn DownloadEngine>,
        sites: Arc<dyn SiteResolver>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: JobStore::new(config.max_concurrent),
                events: EventBus::new(),
                engine,
                sites,
                config,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        self.shared.events.subscribe()
    }

    fn emit(&self, event: JobEvent) {
        self.shared.events.emit(event);
    }

    /// Queues a job under `key`. False if the key is already known in any state.
    pub fn submit(
        &self,
        key: impl Into<JobKey>,
        options: FormatOptions,
        output_dir: impl Into<PathBuf>,
    ) -> bool {
        let job = Job::new(key, options, output_dir.into());
        let key = job.key.clone();
        if !self.shared.store.insert_pending(job) {
            tracing::debug!(%key, "duplicate submission ignored");
            return false;
        }
        tracing::info!(%key, "job queued");
        self.emit(JobEvent::QueueChanged);
        self.spawn_prefetch(key);
        self.pump();
        true
    }

    /// Validates the options, normalizes the URL into a job key, and submits.
    ///
    /// An `audio/` protocol link forces audio-only output.
    pub fn submit_url(
        &self,
        url: &str,
        mut options: FormatOptions,
        output_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<bool> {
        options.validate()?;
        let (inner, mode) = strip_protocol(url);
        if inner.is_empty() {
            anyhow::bail!("empty URL");
        }
        if mode == Some(LinkMode::Audio) {
            options.audio_only = true;
        }
        let key = self.shared.sites.clean_url(inner);
        Ok(self.submit(key, options, output_dir))
    }

    /// Stores the clamped limit and admits into any new slots. Lowering the
    /// limit never stops running jobs.
    pub fn set_max_concurrent(&self, n: usize) -> usize {
        let n = self.shared.store.set_max_concurrent(n);
        tracing::info!(max_concurrent = n, "concurrency limit changed");
        self.pump();
        n
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.store.max_concurrent()
    }

    pub fn status(&self, key: &str) -> Option<JobStatus> {
        self.shared.store.get(key).map(|j| j.status)
    }

    /// Percent and status text.
    pub fn progress(&self, key: &str) -> Option<(f32, String)> {
        self.shared
            .store
            .get(key)
            .map(|j| (j.progress_percent, j.status_text))
    }

    pub fn title(&self, key: &str) -> Option<String> {
        self.shared.store.get(key).map(|j| j.title)
    }

    pub fn thumbnail(&self, key: &str) -> Option<Thumbnail> {
        self.shared.store.get(key).and_then(|j| j.thumbnail)
    }

    /// Full path of the output file of a completed job.
    pub fn output_path(&self, key: &str) -> Option<PathBuf> {
        self.shared.store.get(key).and_then(|j| j.output_path())
    }

    pub fn snapshot(&self, key: &str) -> Option<Job> {
        self.shared.store.get(key)
    }

    pub fn snapshot_all(&self) -> Vec<Job> {
        self.shared.store.snapshot_all()
    }

    pub fn keys(&self) -> Vec<JobKey> {
        self.shared.store.keys()
    }

    pub fn counts(&self) -> QueueCounts {
        self.shared.store.counts()
    }

    /// No pending or active jobs and no cancelled worker still stopping.
    pub fn is_idle(&self) -> bool {
        self.shared.store.is_idle()
    }
}
