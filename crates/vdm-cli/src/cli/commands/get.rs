//! `vdm get` – queue URLs and run them to completion.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vdm_core::config::VdmConfig;
use vdm_core::events::JobEvent;
use vdm_core::job::FormatOptions;
use vdm_core::naming::truncate_for_display;
use vdm_core::scheduler::{Scheduler, SchedulerConfig};
use vdm_core::site::BuiltinSites;
use vdm_core::YtDlpEngine;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const TITLE_WIDTH: usize = 40;

pub async fn run_get(
    cfg: &VdmConfig,
    urls: &[String],
    options: FormatOptions,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let engine = Arc::new(YtDlpEngine::new(cfg.ytdlp_program()));
    let scheduler = Scheduler::new(engine, Arc::new(BuiltinSites::new()), SchedulerConfig::from(cfg));
    let mut events = scheduler.subscribe();

    let mut queued = 0usize;
    for url in urls {
        if scheduler.submit_url(url, options.clone(), output_dir)? {
            queued += 1;
        } else {
            println!("skipping duplicate: {}", url);
        }
    }
    if queued == 0 {
        return Ok(());
    }
    println!(
        "queued {} download(s) into {} ({} at a time)",
        queued,
        output_dir.display(),
        scheduler.max_concurrent()
    );

    let mut titles: HashMap<String, String> = HashMap::new();
    let mut last_print: HashMap<String, Instant> = HashMap::new();
    let mut failures = 0usize;
    let mut finished = 0usize;

    // Every queued job ends in exactly one Completed or Failed event.
    while finished < queued {
        tokio::select! {
            ev = events.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    JobEvent::Started { key, title, .. } => {
                        println!("[{}] {}", truncate_for_display(&title, TITLE_WIDTH), key);
                        titles.insert(key, title);
                    }
                    JobEvent::Progress { key, text, .. } => {
                        let now = Instant::now();
                        let due = last_print
                            .get(&key)
                            .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
                        if due {
                            println!("  {}  {}", label(&titles, &key), text);
                            last_print.insert(key, now);
                        }
                    }
                    JobEvent::Completed { key, output_dir, filename } => {
                        let path = match filename {
                            Some(f) => output_dir.join(f).display().to_string(),
                            None => output_dir.display().to_string(),
                        };
                        finished += 1;
                        println!("done: {} -> {}", label(&titles, &key), path);
                    }
                    JobEvent::Failed { key, message } => {
                        failures += 1;
                        finished += 1;
                        println!("failed: {}: {}", label(&titles, &key), message);
                    }
                    JobEvent::QueueChanged => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("cancelling...");
                let n = scheduler.cancel_all().await;
                tracing::info!(cancelled = n, "interrupted by user");
                bail!("interrupted; cancelled {} download(s)", n);
            }
        }
    }

    let counts = scheduler.counts();
    println!("{} completed, {} failed", counts.completed, counts.failed);
    if failures > 0 {
        bail!("{} download(s) failed", failures);
    }
    Ok(())
}

fn label<'a>(titles: &'a HashMap<String, String>, key: &'a str) -> &'a str {
    titles.get(key).map(String::as_str).unwrap_or(key)
}
