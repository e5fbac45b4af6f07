//! Scripted engine and resolver for scheduler scenarios.
//!
//! Each key gets a queue of download outcomes; a key with no script blocks on
//! its gate until released. The engine records which keys it was asked to
//! download and the peak number of concurrent downloads.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use vdm_core::engine::{
    DownloadEngine, DownloadReport, EngineError, EngineProgress, MediaInfo, ProgressCallback,
};
use vdm_core::events::JobEvent;
use vdm_core::job::FormatOptions;
use vdm_core::retry::RetryPolicy;
use vdm_core::scheduler::SchedulerConfig;
use vdm_core::site::{SiteId, SiteResolver, VideoMetadata};
use vdm_core::worker::WorkerConfig;

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Write the file and succeed without reporting a name.
    Write(&'static str),
    Fail(&'static str),
    /// Report progress until the gate for this key is released, then write
    /// `<last path segment>.mp4` and report it.
    Gate,
    /// Write a partial file, announce it, and keep reporting progress until aborted.
    Partial(&'static str),
    /// Write a partial file and then ignore the callback entirely.
    Stubborn(&'static str),
}

#[derive(Default)]
pub struct FakeEngine {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

struct Running<'a>(&'a FakeEngine);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, key: &str, outcomes: Vec<Outcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), outcomes.into());
    }

    fn gate(&self, key: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Lets a gated download for `key` finish (now or whenever it starts).
    pub fn release(&self, key: &str) {
        self.gate(key).notify_one();
    }

    pub fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    /// Downloads currently inside the engine. Aborted tasks drop out too.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Running<'_> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Running(self)
    }
}

fn tail(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or("out")
}

#[async_trait]
impl DownloadEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn extract_info(&self, url: &str, _o: &FormatOptions) -> Result<MediaInfo, EngineError> {
        Ok(MediaInfo {
            id: Some(tail(url).to_string()),
            ..MediaInfo::default()
        })
    }

    async fn download(
        &self,
        url: &str,
        _o: &FormatOptions,
        dir: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<DownloadReport, EngineError> {
        self.calls.lock().unwrap().push(url.to_string());
        let _running = self.enter();
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or(Outcome::Gate);
        match next {
            Outcome::Write(name) => {
                progress(&EngineProgress::downloading(512, Some(1024)))?;
                std::fs::write(dir.join(name), vec![7u8; 1024]).unwrap();
                Ok(DownloadReport::default())
            }
            Outcome::Fail(msg) => Err(EngineError::Failed(msg.to_string())),
            Outcome::Gate => {
                let gate = self.gate(url);
                loop {
                    progress(&EngineProgress::downloading(1, Some(100)))?;
                    tokio::select! {
                        _ = gate.notified() => break,
                        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                    }
                }
                let name = format!("{}.mp4", tail(url));
                std::fs::write(dir.join(&name), b"done").unwrap();
                Ok(DownloadReport {
                    filename: Some(name),
                })
            }
            Outcome::Partial(name) => {
                std::fs::write(dir.join(name), b"partial").unwrap();
                progress(&EngineProgress {
                    filename: Some(name.to_string()),
                    ..EngineProgress::downloading(7, None)
                })?;
                loop {
                    progress(&EngineProgress::downloading(7, None))?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            Outcome::Stubborn(name) => {
                std::fs::write(dir.join(name), b"partial").unwrap();
                progress(&EngineProgress {
                    filename: Some(name.to_string()),
                    ..EngineProgress::downloading(7, None)
                })?;
                std::future::pending::<Result<DownloadReport, EngineError>>().await
            }
        }
    }
}

/// Resolver that knows every URL by its last path segment.
pub struct FakeSites;

#[async_trait]
impl SiteResolver for FakeSites {
    fn detect_site(&self, _url: &str) -> SiteId {
        SiteId::Unknown
    }

    fn clean_url(&self, url: &str) -> String {
        url.trim().trim_end_matches('/').to_string()
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        Some(tail(url).to_string())
    }

    async fn get_metadata(&self, url: &str) -> anyhow::Result<VideoMetadata> {
        Ok(VideoMetadata {
            title: Some(format!("Video {}", tail(url))),
            thumbnail: Some(vec![0x89, 0x50, 0x4e, 0x47]),
        })
    }
}

pub fn fast_config(max_concurrent: usize) -> SchedulerConfig {
    let fast = RetryPolicy::new(3, Duration::from_millis(5));
    SchedulerConfig {
        max_concurrent,
        cancel_grace: Duration::from_millis(300),
        worker: WorkerConfig {
            download_retry: fast,
            extract_retry: fast,
        },
        metadata_retry: fast,
    }
}

/// Waits for the first event matching `pred`, failing the test after 5s.
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<JobEvent>,
    pred: impl Fn(&JobEvent) -> bool,
) -> JobEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = rx.recv().await.expect("event bus closed");
            if pred(&ev) {
                return ev;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

pub fn is_completed(key: &str) -> impl Fn(&JobEvent) -> bool + '_ {
    move |e| matches!(e, JobEvent::Completed { key: k, .. } if k == key)
}

pub fn is_failed(key: &str) -> impl Fn(&JobEvent) -> bool + '_ {
    move |e| matches!(e, JobEvent::Failed { key: k, .. } if k == key)
}

/// A progress event showing the engine is transferring for `key`.
pub fn is_downloading(key: &str) -> impl Fn(&JobEvent) -> bool + '_ {
    move |e| matches!(e, JobEvent::Progress { key: k, text, .. } if k == key && text.starts_with("Downloading"))
}
