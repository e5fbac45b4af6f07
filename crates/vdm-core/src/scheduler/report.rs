use crate::events::JobEvent;
use crate::job::TitleQuality;
use crate::retry::JobFailure;
use crate::store::ActiveRun;
use crate::worker::JobReporter;

use super::Scheduler;

const STARTING_TEXT: &str = "Starting download...";

impl JobReporter for Scheduler {
    fn engine_started(&self, run: &ActiveRun) {
        let store = &self.shared.store;
        if store.mark_downloading(run) && store.update_progress(run, 0.0, STARTING_TEXT) {
            self.emit(JobEvent::Progress {
                key: run.key.clone(),
                percent: 0.0,
                text: STARTING_TEXT.to_string(),
            });
        }
    }

    fn progress(&self, run: &ActiveRun, percent: f32, text: &str) {
        if self.shared.store.update_progress(run, percent, text) {
            self.emit(JobEvent::Progress {
                key: run.key.clone(),
                percent: percent.clamp(0.0, 100.0),
                text: text.to_string(),
            });
        }
    }

    fn file_reported(&self, run: &ActiveRun, file_name: &str) {
        self.shared.store.record_file(run, file_name);
    }

    fn title_resolved(&self, key: &str, title: &str) {
        let store = &self.shared.store;
        let improves = store
            .get(key)
            .is_some_and(|j| j.title_quality < TitleQuality::Real);
        if !improves {
            return;
        }
        if let Some((title, thumbnail)) =
            store.apply_metadata(key, Some(title), TitleQuality::Real, None)
        {
            self.emit(JobEvent::Started {
                key: key.to_string(),
                title,
                thumbnail,
            });
        }
    }

    fn completed(&self, run: &ActiveRun, filename: Option<String>) {
        let Some(job) = self.shared.store.complete(run, filename) else {
            tracing::debug!(key = %run.key, "completion for inactive run ignored");
            return;
        };
        tracing::info!(key = %run.key, file = ?job.output_filename, "job complete");
        self.emit(JobEvent::Completed {
            key: job.key,
            output_dir: job.output_dir,
            filename: job.output_filename,
        });
        self.pump();
    }

    fn failed(&self, run: &ActiveRun, failure: JobFailure) {
        if self.shared.store.fail(run, &failure).is_none() {
            tracing::debug!(key = %run.key, "failure for inactive run ignored");
            return;
        }
        self.emit(JobEvent::Failed {
            key: run.key.clone(),
            message: failure.message,
        });
        self.pump();
    }
}
