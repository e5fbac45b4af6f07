//! One worker per active job: extract info, download with retries, identify
//! the output, and report back.
//!
//! The worker never touches the store directly. Everything it learns goes
//! through a `JobReporter`, which the scheduler implements.

pub mod artifacts;
pub mod cleanup;
pub mod progress;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::control::JobAborted;
use crate::engine::{DownloadEngine, DownloadReport, EngineError, EngineProgress, ProgressStatus};
use crate::job::{FormatOptions, JobKey};
use crate::retry::{classify, run_with_retry, ErrorKind, JobFailure, RetryError, RetryPolicy};
use crate::store::{ActiveRun, Admission};

/// Receives everything a worker reports. Calls for a run that is no longer
/// active must be ignored by the implementor.
pub trait JobReporter: Send + Sync {
    /// Metadata is known and the transfer is about to start.
    fn engine_started(&self, run: &ActiveRun);
    fn progress(&self, run: &ActiveRun, percent: f32, text: &str);
    /// The engine announced a file it is writing.
    fn file_reported(&self, run: &ActiveRun, file_name: &str);
    /// Title from the engine's own info extraction.
    fn title_resolved(&self, key: &str, title: &str);
    fn completed(&self, run: &ActiveRun, filename: Option<String>);
    fn failed(&self, run: &ActiveRun, failure: JobFailure);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub download_retry: RetryPolicy,
    pub extract_retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            download_retry: RetryPolicy::from(crate::config::RetryConfig::DOWNLOAD),
            extract_retry: RetryPolicy::from(crate::config::RetryConfig::EXTRACT),
        }
    }
}

pub struct Worker {
    run: ActiveRun,
    token: CancellationToken,
    options: FormatOptions,
    output_dir: PathBuf,
    engine: Arc<dyn DownloadEngine>,
    reporter: Arc<dyn JobReporter>,
    config: WorkerConfig,
}

/// How a worker run ended, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed(Option<String>),
    Failed,
    Cancelled,
}

impl Worker {
    pub fn new(
        admission: &Admission,
        engine: Arc<dyn DownloadEngine>,
        reporter: Arc<dyn JobReporter>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            run: admission.run.clone(),
            token: admission.token.clone(),
            options: admission.job.format_options.clone(),
            output_dir: admission.job.output_dir.clone(),
            engine,
            reporter,
            config,
        }
    }

    fn key(&self) -> &JobKey {
        &self.run.key
    }

    fn fail(&self, failure: JobFailure) -> WorkerOutcome {
        tracing::warn!(key = %self.key(), detail = %failure.detail, "job failed: {}", failure.message);
        self.reporter.failed(&self.run, failure);
        WorkerOutcome::Failed
    }

    fn cancelled(&self) -> WorkerOutcome {
        tracing::info!(key = %self.key(), "worker stopped after cancel");
        WorkerOutcome::Cancelled
    }

    pub async fn run(self) -> WorkerOutcome {
        tracing::info!(key = %self.key(), run = self.run.id, engine = self.engine.name(), "worker started");

        let before = match artifacts::snapshot_dir(&self.output_dir) {
            Ok(names) => names,
            Err(e) => {
                return self.fail(JobFailure::from_message(format!(
                    "cannot read output directory {}: {}",
                    self.output_dir.display(),
                    e
                )))
            }
        };

        if let Err(outcome) = self.extract().await {
            return outcome;
        }
        if self.token.is_cancelled() {
            return self.cancelled();
        }

        self.reporter.engine_started(&self.run);

        let (report, finished_name) = match self.download().await {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };

        let reported = report.filename.or(finished_name);
        let filename = self.finish_files(&before, reported.as_deref());
        tracing::info!(key = %self.key(), file = ?filename, "download complete");
        self.reporter.completed(&self.run, filename.clone());
        WorkerOutcome::Completed(filename)
    }

    /// Info extraction gives the engine's own title and catches bad URLs early.
    async fn extract(&self) -> Result<(), WorkerOutcome> {
        let policy = self.config.extract_retry;
        let result = run_with_retry(
            &policy,
            Some(&self.token),
            classify_extraction,
            |next, e: &EngineError, _| {
                tracing::warn!(key = %self.key(), "info extraction failed: {}", e);
                self.reporter.progress(
                    &self.run,
                    0.0,
                    &format!(
                        "Retrying metadata extraction ({}/{})...",
                        next, policy.max_attempts
                    ),
                );
            },
            || async {
                tokio::select! {
                    _ = self.token.cancelled() => Err(EngineError::Aborted),
                    r = self.engine.extract_info(&self.run.key, &self.options) => r,
                }
            },
        )
        .await;
        match result {
            Ok(info) => {
                if let Some(title) = info.title.as_deref().filter(|t| !t.trim().is_empty()) {
                    self.reporter.title_resolved(&self.run.key, title);
                }
                Ok(())
            }
            Err(RetryError::Cancelled) => Err(self.cancelled()),
            Err(RetryError::GaveUp { error, attempts }) => Err(self.give_up(error, attempts)),
        }
    }

    async fn download(&self) -> Result<(DownloadReport, Option<String>), WorkerOutcome> {
        let policy = self.config.download_retry;
        let result = run_with_retry(
            &policy,
            Some(&self.token),
            classify,
            |next, e: &EngineError, _| {
                tracing::warn!(key = %self.key(), "download attempt failed: {}", e);
                self.reporter.progress(
                    &self.run,
                    0.0,
                    &format!(
                        "Connection timed out, retrying ({}/{})...",
                        next, policy.max_attempts
                    ),
                );
            },
            || self.download_once(),
        )
        .await;
        match result {
            Ok(v) => Ok(v),
            Err(RetryError::Cancelled) => Err(self.cancelled()),
            Err(RetryError::GaveUp { error, attempts }) => Err(self.give_up(error, attempts)),
        }
    }

    /// One engine download. Returns the report plus the last filename announced
    /// by a `finished` event.
    async fn download_once(&self) -> Result<(DownloadReport, Option<String>), EngineError> {
        let mut finished: Option<String> = None;
        let run = &self.run;
        let token = &self.token;
        let reporter = &self.reporter;
        let mut on_progress = |event: &EngineProgress| -> Result<(), JobAborted> {
            if token.is_cancelled() {
                return Err(JobAborted);
            }
            if let Some(name) = event.filename.as_deref().map(base_name) {
                reporter.file_reported(run, &name);
                if event.status == ProgressStatus::Finished {
                    finished = Some(name);
                }
            }
            if let Some(update) = progress::describe(event) {
                reporter.progress(run, update.percent, &update.text);
            }
            Ok(())
        };
        let report = self
            .engine
            .download(&run.key, &self.options, &self.output_dir, &mut on_progress)
            .await?;
        Ok((report, finished))
    }

    fn give_up(&self, error: EngineError, attempts: u32) -> WorkerOutcome {
        if matches!(error, EngineError::Aborted) || self.token.is_cancelled() {
            return self.cancelled();
        }
        let failure = if attempts > 1 {
            JobFailure::exhausted(&error, attempts)
        } else {
            JobFailure::from_engine(&error)
        };
        self.fail(failure)
    }

    /// Diffs the directory, picks the output, and tidies up after the engine.
    fn finish_files(&self, before: &HashSet<String>, reported: Option<&str>) -> Option<String> {
        let dir = &self.output_dir;
        let reported = reported.map(base_name);
        let new = match artifacts::new_files(dir, before) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("cannot list {} after download: {}", dir.display(), e);
                return reported;
            }
        };
        let output = artifacts::identify_output(dir, reported.as_deref(), &new);
        if self.options.embeds_subtitles() {
            artifacts::remove_standalone_subtitles(dir, &new, output.as_deref());
        }
        artifacts::touch_all(dir, &new);
        output
    }
}

/// Every extraction failure gets another attempt; only an abort stops early.
fn classify_extraction(e: &EngineError) -> ErrorKind {
    match e {
        EngineError::Aborted => ErrorKind::Other,
        _ => ErrorKind::Connection,
    }
}

/// Engines may report paths; the store and output lookup want bare names.
fn base_name(reported: &str) -> String {
    Path::new(reported)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| reported.to_string())
}
