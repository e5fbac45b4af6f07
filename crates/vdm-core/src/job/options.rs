//! Format options handed to the download engine.
//!
//! The scheduler only looks at `embeds_subtitles()`; everything else is passed
//! through to the engine. `validate` runs once at submission.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the engine should take login cookies from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    #[default]
    None,
    /// Netscape-format cookie jar on disk.
    CookieFile(PathBuf),
    /// Browser profile to read cookies from (e.g. "firefox").
    Browser(String),
}

/// Subtitle download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleSpec {
    pub languages: Vec<String>,
    #[serde(default)]
    pub include_automatic: bool,
    #[serde(default)]
    pub format: Option<String>,
    /// Embed into the media container; standalone subtitle files are removed afterwards.
    #[serde(default)]
    pub embed: bool,
}

/// Typed engine options with a passthrough bag for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Explicit format selector. When set, the generated selector is not used.
    pub format: Option<String>,
    /// Resolution cap for generated video selectors.
    pub max_height: Option<u32>,
    pub audio_only: bool,
    pub prefer_https: bool,
    /// Prefer mp4 video / m4a audio streams and merge into mp4 (or m4a).
    pub prefer_mp4: bool,
    pub format_sort: Vec<String>,
    /// Merge container; overrides the one implied by `prefer_mp4`.
    pub container: Option<String>,
    pub subtitles: Option<SubtitleSpec>,
    pub credentials: CredentialSource,
    pub extra_args: Vec<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            format: None,
            max_height: None,
            audio_only: false,
            prefer_https: true,
            prefer_mp4: true,
            format_sort: Vec::new(),
            container: None,
            subtitles: None,
            credentials: CredentialSource::None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("format selector must not be empty or contain whitespace")]
    BadFormat,
    #[error("max height must be between 1 and 8640, got {0}")]
    BadHeight(u32),
    #[error("invalid container {0:?}")]
    BadContainer(String),
    #[error("invalid subtitle language {0:?}")]
    BadLanguage(String),
    #[error("subtitles requested without any language")]
    NoLanguages,
    #[error("cookie file not found: {0}")]
    MissingCookieFile(PathBuf),
    #[error("browser name must not be empty")]
    EmptyBrowser,
    #[error("extra argument {0:?} conflicts with options managed by vdm")]
    ReservedArgument(String),
}

/// Flags the engine wrapper sets itself; extra args may not override them.
const RESERVED_ARGS: &[&str] = &[
    "-o",
    "--output",
    "-P",
    "--paths",
    "--progress-template",
    "--newline",
    "-J",
    "--dump-single-json",
];

fn is_token(s: &str, extra: &[char]) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || extra.contains(&c))
}

impl FormatOptions {
    /// Best video up to `max_height` plus best audio.
    pub fn video(max_height: Option<u32>) -> Self {
        Self {
            max_height,
            ..Self::default()
        }
    }

    pub fn audio() -> Self {
        Self {
            audio_only: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(f) = &self.format {
            if f.trim().is_empty() || f.chars().any(char::is_whitespace) {
                return Err(OptionsError::BadFormat);
            }
        }
        if let Some(h) = self.max_height {
            if h == 0 || h > 8640 {
                return Err(OptionsError::BadHeight(h));
            }
        }
        if let Some(c) = &self.container {
            if !is_token(c, &[]) || c.len() > 5 {
                return Err(OptionsError::BadContainer(c.clone()));
            }
        }
        if let Some(subs) = &self.subtitles {
            if subs.languages.is_empty() {
                return Err(OptionsError::NoLanguages);
            }
            for lang in &subs.languages {
                if !is_token(lang, &['-', '_', '.', '*', '!']) {
                    return Err(OptionsError::BadLanguage(lang.clone()));
                }
            }
        }
        match &self.credentials {
            CredentialSource::None => {}
            CredentialSource::CookieFile(p) => {
                if !p.is_file() {
                    return Err(OptionsError::MissingCookieFile(p.clone()));
                }
            }
            CredentialSource::Browser(b) => {
                if b.trim().is_empty() {
                    return Err(OptionsError::EmptyBrowser);
                }
            }
        }
        for arg in &self.extra_args {
            let flag = arg.split('=').next().unwrap_or(arg);
            if RESERVED_ARGS.contains(&flag) {
                return Err(OptionsError::ReservedArgument(arg.clone()));
            }
        }
        Ok(())
    }

    pub fn embeds_subtitles(&self) -> bool {
        self.subtitles.as_ref().is_some_and(|s| s.embed)
    }

    /// The selector string passed to `--format`.
    pub fn format_selector(&self) -> String {
        if let Some(f) = &self.format {
            return f.clone();
        }
        let https = if self.prefer_https { "[protocol=https]" } else { "" };
        if self.audio_only {
            return if self.prefer_mp4 {
                format!("bestaudio{}[ext=m4a]/bestaudio/best", https)
            } else {
                format!("bestaudio{}/best", https)
            };
        }
        let (v_ext, a_ext) = if self.prefer_mp4 {
            ("[ext=mp4]", "[ext=m4a]")
        } else {
            ("", "")
        };
        match self.max_height {
            Some(h) => format!(
                "bestvideo[height<={h}]{https}{v_ext}+bestaudio{https}{a_ext}/best[height<={h}]{https}{v_ext}/best"
            ),
            None => format!("bestvideo{https}{v_ext}+bestaudio{https}{a_ext}/best"),
        }
    }

    /// Container for `--merge-output-format`, if any.
    pub fn merge_container(&self) -> Option<String> {
        if let Some(c) = &self.container {
            return Some(c.clone());
        }
        if self.format.is_some() || !self.prefer_mp4 {
            return None;
        }
        Some(if self.audio_only { "m4a" } else { "mp4" }.to_string())
    }
}
