use super::*;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::Notify;

use crate::config::RetryConfig;
use crate::engine::{DownloadReport, EngineError, MediaInfo, ProgressCallback};
use crate::site::{SiteId, VideoMetadata};

/// Downloads block until released, then write `<key tail>.mp4`.
struct GatedEngine {
    release: Notify,
    fail_with: Option<&'static str>,
}

impl GatedEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            release: Notify::new(),
            fail_with: None,
        })
    }

    fn failing(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            release: Notify::new(),
            fail_with: Some(msg),
        })
    }
}

#[async_trait]
impl DownloadEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    async fn extract_info(&self, _url: &str, _o: &FormatOptions) -> Result<MediaInfo, EngineError> {
        Ok(MediaInfo::default())
    }

    async fn download(
        &self,
        url: &str,
        _o: &FormatOptions,
        dir: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<DownloadReport, EngineError> {
        if let Some(msg) = self.fail_with {
            return Err(EngineError::Failed(msg.into()));
        }
        progress(&crate::engine::EngineProgress::downloading(1, Some(2)))?;
        self.release.notified().await;
        let name = format!("{}.mp4", url.rsplit('/').next().unwrap_or("out"));
        std::fs::write(dir.join(&name), b"ok").unwrap();
        Ok(DownloadReport { filename: Some(name) })
    }
}

struct StaticSites;

#[async_trait]
impl SiteResolver for StaticSites {
    fn detect_site(&self, _url: &str) -> SiteId {
        SiteId::Unknown
    }
    fn clean_url(&self, url: &str) -> String {
        url.trim().trim_end_matches('/').to_string()
    }
    fn extract_id(&self, _url: &str) -> Option<String> {
        None
    }
    async fn get_metadata(&self, url: &str) -> anyhow::Result<VideoMetadata> {
        Ok(VideoMetadata {
            title: Some(format!("Title of {}", url)),
            thumbnail: None,
        })
    }
}

fn config(max: usize) -> SchedulerConfig {
    let fast = RetryConfig {
        max_attempts: 3,
        delay_ms: 1,
    };
    SchedulerConfig {
        max_concurrent: max,
        cancel_grace: Duration::from_millis(200),
        worker: WorkerConfig {
            download_retry: fast.into(),
            extract_retry: fast.into(),
        },
        metadata_retry: fast.into(),
    }
}

async fn next_matching(
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

#[test]
fn config_from_file_values() {
    let cfg = VdmConfig {
        max_concurrent: 4,
        cancel_grace_ms: 1500,
        extract_retry: Some(RetryConfig {
            max_attempts: 5,
            delay_ms: 10,
        }),
        ..VdmConfig::default()
    };
    let sc = SchedulerConfig::from(&cfg);
    assert_eq!(sc.max_concurrent, 4);
    assert_eq!(sc.cancel_grace, Duration::from_millis(1500));
    assert_eq!(sc.worker.extract_retry.max_attempts, 5);
    assert_eq!(sc.worker.download_retry, RetryPolicy::from(RetryConfig::DOWNLOAD));
}

#[tokio::test]
async fn submit_url_normalizes_and_rejects_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    assert!(s
        .submit_url("https://example.com/a/", FormatOptions::default(), dir.path())
        .unwrap());
    assert!(!s
        .submit_url(" https://example.com/a ", FormatOptions::default(), dir.path())
        .unwrap());
    assert_eq!(s.keys(), vec!["https://example.com/a".to_string()]);
}

#[tokio::test]
async fn submit_url_validates_options() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    let mut bad = FormatOptions::default();
    bad.extra_args = vec!["--output=/tmp/x".into()];
    assert!(s.submit_url("https://example.com/a", bad, dir.path()).is_err());
    assert!(s.submit_url("   ", FormatOptions::default(), dir.path()).is_err());
    assert!(s.keys().is_empty());
}

#[tokio::test]
async fn audio_link_forces_audio_only() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    s.submit_url(
        "youtubemaster://audio/https://example.com/song",
        FormatOptions::default(),
        dir.path(),
    )
    .unwrap();
    let job = s.snapshot("https://example.com/song").unwrap();
    assert!(job.format_options.audio_only);
}

#[tokio::test]
async fn prefetched_title_is_announced() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    let mut rx = s.subscribe();
    s.submit("https://example.com/t", FormatOptions::default(), dir.path());
    let ev = next_matching(&mut rx, |e| matches!(e, JobEvent::Started { .. })).await;
    assert_eq!(
        ev,
        JobEvent::Started {
            key: "https://example.com/t".into(),
            title: "Title of https://example.com/t".into(),
            thumbnail: None,
        }
    );
    assert_eq!(
        s.title("https://example.com/t").as_deref(),
        Some("Title of https://example.com/t")
    );
}

#[tokio::test]
async fn completion_frees_slot_and_reports_output() {
    let dir = tempfile::tempdir().unwrap();
    let engine = GatedEngine::new();
    let s = Scheduler::new(engine.clone(), Arc::new(StaticSites), config(1));
    let mut rx = s.subscribe();
    s.submit("https://example.com/one", FormatOptions::default(), dir.path());
    s.submit("https://example.com/two", FormatOptions::default(), dir.path());
    assert_eq!(s.counts().active, 1);
    assert_eq!(s.counts().pending, 1);

    next_matching(&mut rx, |e| {
        matches!(e, JobEvent::Progress { key, text, .. } if key.ends_with("one") && text.starts_with("Downloading"))
    })
    .await;
    engine.release.notify_one();
    let done = next_matching(&mut rx, |e| matches!(e, JobEvent::Completed { .. })).await;
    assert_eq!(
        done,
        JobEvent::Completed {
            key: "https://example.com/one".into(),
            output_dir: dir.path().to_path_buf(),
            filename: Some("one.mp4".into()),
        }
    );
    assert_eq!(
        s.output_path("https://example.com/one"),
        Some(dir.path().join("one.mp4"))
    );
    assert!(s
        .status("https://example.com/two")
        .is_some_and(JobStatus::is_active));
    assert_eq!(s.counts().active, 1);
    assert_eq!(s.counts().pending, 0);
    assert_eq!(s.clear_finished(), 1);
    assert!(s.status("https://example.com/one").is_none());
}

#[tokio::test]
async fn failed_job_stays_until_dismissed() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(
        GatedEngine::failing("ERROR: [youtube] x: Private video. Sign in if you've been granted access"),
        Arc::new(StaticSites),
        config(2),
    );
    let mut rx = s.subscribe();
    s.submit("https://example.com/p", FormatOptions::default(), dir.path());
    let ev = next_matching(&mut rx, |e| matches!(e, JobEvent::Failed { .. })).await;
    let JobEvent::Failed { message, .. } = ev else {
        unreachable!()
    };
    assert!(!message.is_empty());
    assert_eq!(s.status("https://example.com/p"), Some(JobStatus::Error));
    assert!(!s.dismiss("https://example.com/unknown"));
    assert!(s.dismiss("https://example.com/p"));
    assert!(s.status("https://example.com/p").is_none());
    assert!(s.is_idle());
}

#[tokio::test]
async fn raising_the_limit_admits_more() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    for k in ["a", "b", "c"] {
        s.submit(format!("https://example.com/{k}"), FormatOptions::default(), dir.path());
    }
    assert_eq!(s.counts().active, 1);
    assert_eq!(s.set_max_concurrent(9), 5);
    assert_eq!(s.counts().active, 3);
    assert_eq!(s.set_max_concurrent(0), 1);
    assert_eq!(s.counts().active, 3);
    assert_eq!(s.cancel_all().await, 3);
    assert!(s.keys().is_empty());
}

#[tokio::test]
async fn cancel_while_starting_keeps_the_slot_until_the_worker_stops() {
    let dir = tempfile::tempdir().unwrap();
    let s = Scheduler::new(GatedEngine::new(), Arc::new(StaticSites), config(1));
    let (a, b) = ("https://example.com/a", "https://example.com/b");
    let store = &s.shared.store;
    for k in [a, b] {
        store.insert_pending(Job::new(k, FormatOptions::default(), dir.path().to_path_buf()));
    }
    let adm = store.admit().remove(0);

    assert!(s.cancel(a).await);
    assert!(!s.cancel(a).await);
    assert_eq!(s.status(b), Some(JobStatus::Queued));

    let mut rx = s.subscribe();
    // Ignores its token, so it is only stopped by the abort after the grace period.
    let task = tokio::spawn(std::future::pending::<()>());
    match store.attach_worker(&adm.run, task) {
        crate::store::Attach::Orphaned { handle, target } => {
            s.stop_orphan(adm.run.clone(), handle, target)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s.status(b), Some(JobStatus::Queued));

    next_matching(&mut rx, |e| matches!(e, JobEvent::Progress { key, .. } if key == b)).await;
    assert!(s.status(b).is_some_and(JobStatus::is_active));
    s.cancel_all().await;
}
