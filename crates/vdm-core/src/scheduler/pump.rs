//! Admission of pending jobs and the metadata prefetch task.

use std::sync::Arc;

use crate::events::JobEvent;
use crate::job::JobKey;
use crate::prefetch::MetadataPrefetcher;
use crate::store::{Attach, INITIALIZING_TEXT};
use crate::worker::{JobReporter, Worker};

use super::Scheduler;

impl Scheduler {
    /// Fills free slots from the front of the pending queue and starts a
    /// worker for each admitted job.
    pub fn pump(&self) {
        let admitted = self.shared.store.admit();
        for admission in admitted {
            let key = admission.run.key.clone();
            tracing::debug!(%key, run = admission.run.id, "admitted");
            self.emit(JobEvent::Progress {
                key,
                percent: 0.0,
                text: INITIALIZING_TEXT.to_string(),
            });

            let reporter: Arc<dyn JobReporter> = Arc::new(self.clone());
            let worker = Worker::new(
                &admission,
                self.shared.engine.clone(),
                reporter,
                self.shared.config.worker,
            );
            let task = tokio::spawn(async move {
                let outcome = worker.run().await;
                tracing::debug!(?outcome, "worker finished");
            });

            match self.shared.store.attach_worker(&admission.run, task) {
                Attach::Attached | Attach::Finished => {}
                Attach::Orphaned { handle, target } => {
                    self.stop_orphan(admission.run.clone(), handle, target);
                }
            }
        }
    }

    /// Resolves display metadata off the download path and announces it.
    pub(super) fn spawn_prefetch(&self, key: JobKey) {
        let this = self.clone();
        let prefetcher = MetadataPrefetcher::new(
            self.shared.sites.clone(),
            self.shared.config.metadata_retry,
        );
        tokio::spawn(async move {
            let meta = prefetcher.resolve(&key).await;
            let applied = this.shared.store.apply_metadata(
                &key,
                Some(&meta.title),
                meta.quality,
                meta.thumbnail,
            );
            match applied {
                Some((title, thumbnail)) => this.emit(JobEvent::Started {
                    key,
                    title,
                    thumbnail,
                }),
                None => tracing::debug!(%key, "job gone before metadata arrived"),
            }
        });
    }
}
