use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry parameters for one kind of operation (optional sections in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl RetryConfig {
    pub const DOWNLOAD: Self = Self {
        max_attempts: 3,
        delay_ms: 5_000,
    };
    pub const EXTRACT: Self = Self {
        max_attempts: 3,
        delay_ms: 2_000,
    };
    pub const METADATA: Self = Self {
        max_attempts: 3,
        delay_ms: 1_000,
    };
}

/// Global configuration loaded from `~/.config/vdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdmConfig {
    /// Number of downloads allowed to run at once (clamped to 1..=5).
    pub max_concurrent: usize,
    /// How long a cancelled download may take to stop on its own before it is aborted.
    pub cancel_grace_ms: u64,
    /// Default output directory (None = current working directory).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Path or name of the yt-dlp executable (None = "yt-dlp" from PATH).
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
    /// Retry policy for transient download failures.
    #[serde(default)]
    pub download_retry: Option<RetryConfig>,
    /// Retry policy for the engine's metadata extraction step.
    #[serde(default)]
    pub extract_retry: Option<RetryConfig>,
    /// Retry policy for quick title/thumbnail lookups.
    #[serde(default)]
    pub metadata_retry: Option<RetryConfig>,
}

impl Default for VdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            cancel_grace_ms: 3_000,
            output_dir: None,
            ytdlp_path: None,
            download_retry: None,
            extract_retry: None,
            metadata_retry: None,
        }
    }
}

impl VdmConfig {
    pub fn download_retry(&self) -> RetryConfig {
        self.download_retry.unwrap_or(RetryConfig::DOWNLOAD)
    }

    pub fn extract_retry(&self) -> RetryConfig {
        self.extract_retry.unwrap_or(RetryConfig::EXTRACT)
    }

    pub fn metadata_retry(&self) -> RetryConfig {
        self.metadata_retry.unwrap_or(RetryConfig::METADATA)
    }

    /// The yt-dlp program to launch.
    pub fn ytdlp_program(&self) -> PathBuf {
        self.ytdlp_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("yt-dlp"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VdmConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] but for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<VdmConfig> {
    if !path.exists() {
        let default_cfg = VdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: VdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VdmConfig::default();
        assert_eq!(cfg.max_concurrent, 2);
        assert_eq!(cfg.cancel_grace_ms, 3_000);
        assert_eq!(cfg.download_retry(), RetryConfig::DOWNLOAD);
        assert_eq!(cfg.ytdlp_program(), PathBuf::from("yt-dlp"));
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent = 4
            cancel_grace_ms = 500
            ytdlp_path = "/opt/yt-dlp/yt-dlp"

            [download_retry]
            max_attempts = 10
            delay_ms = 2000
        "#;
        let cfg: VdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent, 4);
        assert_eq!(cfg.cancel_grace_ms, 500);
        assert_eq!(cfg.ytdlp_program(), PathBuf::from("/opt/yt-dlp/yt-dlp"));
        assert_eq!(
            cfg.download_retry(),
            RetryConfig {
                max_attempts: 10,
                delay_ms: 2000
            }
        );
        assert!(cfg.extract_retry.is_none());
        assert_eq!(cfg.metadata_retry(), RetryConfig::METADATA);
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.max_concurrent, 2);

        fs::write(&path, "max_concurrent = 5\ncancel_grace_ms = 100\n").unwrap();
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg.max_concurrent, 5);
        assert_eq!(cfg.cancel_grace_ms, 100);
    }
}
