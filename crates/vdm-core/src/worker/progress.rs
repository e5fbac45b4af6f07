//! Turn engine progress events into (percent, status text) for the job.

use crate::engine::{EngineProgress, ProgressStatus};

/// Percent reported while the total size is unknown, so the job shows activity.
pub const UNKNOWN_TOTAL_PERCENT: f32 = 1.0;

/// What a job displays after a progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f32,
    pub text: String,
}

/// Human-readable transfer rate, e.g. "1.50 MiB/s".
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(r) if r >= 1_048_576.0 => format!("{:.2} MiB/s", r / 1_048_576.0),
        Some(r) if r > 0.0 => format!("{:.1} KiB/s", r / 1024.0),
        _ => "N/A".to_string(),
    }
}

/// "mm:ss" or "h:mm:ss".
pub fn format_eta(secs: Option<u64>) -> String {
    match secs {
        Some(s) if s >= 3600 => format!("{}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60),
        Some(s) => format!("{:02}:{:02}", s / 60, s % 60),
        None => "N/A".to_string(),
    }
}

/// None for events that carry no byte counts (file announcements, finish, error).
pub fn describe(event: &EngineProgress) -> Option<ProgressUpdate> {
    if event.status != ProgressStatus::Downloading {
        return None;
    }
    let downloaded = event.downloaded_bytes?;
    let rate = format_rate(event.speed);
    Some(match event.total() {
        Some(total) => {
            let percent = ((downloaded as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32;
            ProgressUpdate {
                percent,
                text: format!(
                    "Downloading: {:.1}% at {}, ETA: {}",
                    percent,
                    rate,
                    format_eta(event.eta)
                ),
            }
        }
        None => ProgressUpdate {
            percent: UNKNOWN_TOTAL_PERCENT,
            text: format!("Downloading: {:.1} KB at {}", downloaded as f64 / 1024.0, rate),
        },
    })
}
