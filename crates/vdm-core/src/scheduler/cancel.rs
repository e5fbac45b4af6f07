//! Cancel, dismiss, and list hygiene.

use tokio::task::JoinSet;

use crate::control::{stop_worker, StopOutcome, WorkerHandle};
use crate::events::JobEvent;
use crate::store::{ActiveRun, CleanupTarget, Removed};
use crate::worker::cleanup::cleanup_partial_artifacts;

use super::Scheduler;

impl Scheduler {
    /// Removes a job in any state. An active job's worker is asked to stop,
    /// aborted after the grace period, and its partial files are deleted
    /// before this returns. False if the key is unknown (including a second
    /// cancel of the same job).
    ///
    /// A job cancelled between admission and worker attach returns at once;
    /// its worker is stopped in the background and keeps its slot until then.
    pub async fn cancel(&self, key: &str) -> bool {
        match self.shared.store.take_for_cancel(key) {
            Removed::NotFound => return false,
            Removed::Pending => tracing::info!(key, "pending job cancelled"),
            Removed::Finished(status) => tracing::info!(key, %status, "finished job removed"),
            Removed::Active {
                handle: Some(handle),
                target,
            } => {
                tracing::info!(key, "cancelling active job");
                self.finish_cancel(key, handle, target).await;
            }
            Removed::Active { handle: None, .. } => {
                tracing::info!(key, "cancelling job that is still starting");
                self.emit(JobEvent::QueueChanged);
                return true;
            }
        }
        self.emit(JobEvent::QueueChanged);
        self.pump();
        true
    }

    /// Cancels every pending and active job; returns how many were removed.
    pub async fn cancel_all(&self) -> usize {
        let mut removed = 0;
        // Pending first so nothing is admitted into the slots being freed.
        for key in self.shared.store.pending_keys() {
            if self.cancel(&key).await {
                removed += 1;
            }
        }
        let mut set = JoinSet::new();
        for key in self.shared.store.active_keys() {
            let this = self.clone();
            set.spawn(async move { this.cancel(&key).await });
        }
        while let Some(res) = set.join_next().await {
            match res {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("cancel task failed: {}", e),
            }
        }
        removed
    }

    /// Removes a failed job. False for any other state.
    pub fn dismiss(&self, key: &str) -> bool {
        if !self.shared.store.dismiss(key) {
            return false;
        }
        tracing::debug!(key, "failed job dismissed");
        self.emit(JobEvent::QueueChanged);
        true
    }

    /// Removes every completed job; returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        let n = self.shared.store.clear_completed();
        if n > 0 {
            self.emit(JobEvent::QueueChanged);
        }
        n
    }

    /// Stops a worker whose job was cancelled before the handle was attached,
    /// then frees its slot.
    pub(super) fn stop_orphan(&self, run: ActiveRun, handle: WorkerHandle, target: CleanupTarget) {
        tracing::debug!(key = %run.key, "cancelled before its worker was attached");
        let this = self.clone();
        tokio::spawn(async move {
            this.finish_cancel(&run.key, handle, target).await;
            this.shared.store.release_stopped(&run);
            this.emit(JobEvent::QueueChanged);
            this.pump();
        });
    }

    /// Stops the worker (cooperatively, then by abort) and deletes the job's
    /// partial files.
    pub(super) async fn finish_cancel(&self, key: &str, handle: WorkerHandle, target: CleanupTarget) {
        let outcome = stop_worker(handle, self.shared.config.cancel_grace).await;
        if outcome == StopOutcome::Forced {
            tracing::warn!(key, "worker did not stop within grace period, aborted");
        }
        match tokio::task::spawn_blocking(move || cleanup_partial_artifacts(&target)).await {
            Ok(removed) => tracing::debug!(key, files = removed.len(), "partial files cleaned"),
            Err(e) => tracing::warn!(key, "cleanup task failed: {}", e),
        }
    }
}
