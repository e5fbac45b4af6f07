//! Outward notifications for the presentation layer.
//!
//! Subscribers get an unbounded channel each. The scheduler never emits while
//! holding the store lock, so a subscriber may call straight back into it.

use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::job::{JobKey, Thumbnail};

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Membership of the queue changed (submit, cancel, dismiss, clear).
    QueueChanged,
    /// Display metadata for a job is available.
    Started {
        key: JobKey,
        title: String,
        thumbnail: Option<Thumbnail>,
    },
    Progress {
        key: JobKey,
        percent: f32,
        text: String,
    },
    Completed {
        key: JobKey,
        output_dir: PathBuf,
        filename: Option<String>,
    },
    Failed {
        key: JobKey,
        message: String,
    },
}

impl JobEvent {
    pub fn key(&self) -> Option<&str> {
        match self {
            JobEvent::QueueChanged => None,
            JobEvent::Started { key, .. }
            | JobEvent::Progress { key, .. }
            | JobEvent::Completed { key, .. }
            | JobEvent::Failed { key, .. } => Some(key),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<JobEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn emit(&self, event: JobEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
