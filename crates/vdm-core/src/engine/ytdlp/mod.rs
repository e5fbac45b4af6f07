//! yt-dlp as an external process.
//!
//! Progress comes from a `--progress-template` line per update (`--newline`),
//! read concurrently from stdout and stderr. The child is spawned with
//! `kill_on_drop`, so aborting the worker task kills the process too.

pub mod args;
mod progress_line;

pub use progress_line::{parse_line, OutputLine};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{
    DownloadEngine, DownloadReport, EngineError, EngineProgress, MediaInfo, ProgressCallback,
    ProgressStatus,
};
use crate::job::FormatOptions;

/// Stderr lines kept for the failure message when no ERROR line was printed.
const STDERR_TAIL: usize = 8;

#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
    /// Arguments placed before ours, e.g. `-m yt_dlp` when `program` is python.
    leading_args: Vec<OsString>,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[derive(Debug, Default)]
struct RunState {
    destination: Option<String>,
    final_file: Option<String>,
    errors: Vec<String>,
    stderr_tail: VecDeque<String>,
}

impl RunState {
    fn failure_text(&self, status: std::process::ExitStatus) -> String {
        if !self.errors.is_empty() {
            return self.errors.join("\n");
        }
        if !self.stderr_tail.is_empty() {
            return self.stderr_tail.iter().cloned().collect::<Vec<_>>().join("\n");
        }
        format!("yt-dlp exited with {}", status)
    }

    fn report(self) -> DownloadReport {
        DownloadReport {
            filename: self
                .final_file
                .or(self.destination)
                .map(|f| file_name_of(&f)),
        }
    }
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }

    fn handle_line(
        line: &str,
        from_stderr: bool,
        state: &mut RunState,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<(), EngineError> {
        match parse_line(line) {
            OutputLine::Progress(mut p) => {
                p.filename = p.filename.map(|f| file_name_of(&f));
                progress(&p)?;
            }
            OutputLine::Destination(f) => {
                tracing::debug!(file = %f, "yt-dlp destination");
                let name = file_name_of(&f);
                state.destination = Some(f);
                progress(&EngineProgress {
                    filename: Some(name),
                    ..EngineProgress::empty(ProgressStatus::Downloading)
                })?;
            }
            OutputLine::Final(f) | OutputLine::AlreadyDownloaded(f) => {
                tracing::debug!(file = %f, "yt-dlp final file");
                state.final_file = Some(f);
            }
            OutputLine::Error(e) => {
                progress(&EngineProgress::error(e.clone()))?;
                state.errors.push(e);
            }
            OutputLine::Other => {
                if from_stderr && !line.trim().is_empty() {
                    if state.stderr_tail.len() == STDERR_TAIL {
                        state.stderr_tail.pop_front();
                    }
                    state.stderr_tail.push_back(line.to_string());
                }
            }
        }
        Ok(())
    }
}

fn str_field(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Picks the fields we use out of yt-dlp's info JSON.
pub fn parse_info_json(raw: &str) -> Result<MediaInfo, EngineError> {
    let v: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| EngineError::Output(format!("info json: {}", e)))?;
    if !v.is_object() {
        return Err(EngineError::Output("info json is not an object".into()));
    }
    Ok(MediaInfo {
        id: str_field(&v, "id"),
        title: str_field(&v, "title"),
        thumbnail_url: str_field(&v, "thumbnail"),
        duration_secs: v.get("duration").and_then(|d| d.as_f64()),
        extractor: str_field(&v, "extractor_key").or_else(|| str_field(&v, "extractor")),
    })
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract_info(
        &self,
        url: &str,
        options: &FormatOptions,
    ) -> Result<MediaInfo, EngineError> {
        let argv = args::info_args(url, options);
        tracing::debug!(cmd = %args::redact(&self.program, &argv), "extracting info");
        let output = self
            .command(&argv)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let errors: Vec<&str> = stderr.lines().filter(|l| l.starts_with("ERROR:")).collect();
            let text = if errors.is_empty() {
                stderr.trim().to_string()
            } else {
                errors.join("\n")
            };
            return Err(EngineError::Failed(if text.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                text
            }));
        }
        parse_info_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(
        &self,
        url: &str,
        options: &FormatOptions,
        output_dir: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<DownloadReport, EngineError> {
        let argv = args::download_args(url, options, output_dir);
        tracing::info!(cmd = %args::redact(&self.program, &argv), "starting yt-dlp");

        let mut child = self.command(&argv).spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Output("yt-dlp stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Output("yt-dlp stderr unavailable".into()))?;
        let mut out_reader = BufReader::new(stdout).lines();
        let mut err_reader = BufReader::new(stderr).lines();

        let mut state = RunState::default();
        let mut stdout_done = false;
        let mut stderr_done = false;

        let status = loop {
            let handled = tokio::select! {
                res = out_reader.next_line(), if !stdout_done => match res {
                    Ok(Some(line)) => Self::handle_line(&line, false, &mut state, progress),
                    Ok(None) => { stdout_done = true; Ok(()) }
                    Err(e) => {
                        tracing::warn!("reading yt-dlp stdout: {}", e);
                        stdout_done = true;
                        Ok(())
                    }
                },
                res = err_reader.next_line(), if !stderr_done => match res {
                    Ok(Some(line)) => Self::handle_line(&line, true, &mut state, progress),
                    Ok(None) => { stderr_done = true; Ok(()) }
                    Err(e) => {
                        tracing::warn!("reading yt-dlp stderr: {}", e);
                        stderr_done = true;
                        Ok(())
                    }
                },
                res = child.wait(), if stdout_done && stderr_done => {
                    break res.map_err(|e| EngineError::Output(format!("waiting for yt-dlp: {}", e)))?
                }
            };
            if let Err(e) = handled {
                if matches!(e, EngineError::Aborted) {
                    tracing::info!("stopping yt-dlp (cancelled)");
                    if let Err(kill_err) = child.start_kill() {
                        tracing::warn!("failed to kill yt-dlp: {}", kill_err);
                    }
                    let _ = child.wait().await;
                }
                return Err(e);
            }
        };

        if !status.success() {
            return Err(EngineError::Failed(state.failure_text(status)));
        }
        Ok(state.report())
    }
}
