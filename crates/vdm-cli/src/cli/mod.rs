//! CLI for the VDM media download queue.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vdm_core::config;
use vdm_core::job::{CredentialSource, FormatOptions, SubtitleSpec};

use commands::{run_get, run_info, run_sites};

/// Top-level CLI for VDM.
#[derive(Debug, Parser)]
#[command(name = "vdm")]
#[command(about = "VDM: queue and download videos with yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more videos, running the queue until every job finishes.
    Get {
        /// Video URLs or bare video ids.
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        format: FormatArgs,

        /// Directory to save into (default: config `output_dir`, else the current directory).
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Downloads allowed at once (1-5; default from config).
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,

        /// yt-dlp executable to run.
        #[arg(long, value_name = "PATH")]
        ytdlp: Option<PathBuf>,
    },

    /// Show the site, id, canonical URL and title of a URL without downloading.
    Info {
        url: String,
    },

    /// List the sites with built-in URL handling.
    Sites,
}

/// Options that end up in `FormatOptions`.
#[derive(Debug, Clone, Default, Args)]
pub struct FormatArgs {
    /// Audio only.
    #[arg(long)]
    pub audio: bool,

    /// Highest video resolution to pick, e.g. 1080.
    #[arg(long, value_name = "PX")]
    pub max_height: Option<u32>,

    /// Explicit yt-dlp format selector (overrides --audio/--max-height).
    #[arg(short = 'f', long, value_name = "SELECTOR")]
    pub format: Option<String>,

    /// Do not prefer mp4/m4a streams or merge into mp4.
    #[arg(long)]
    pub no_mp4: bool,

    /// Subtitle languages to fetch, comma separated (e.g. "en,ja").
    #[arg(long, value_name = "LANGS", value_delimiter = ',')]
    pub subs: Vec<String>,

    /// Embed fetched subtitles into the video and drop the sidecar files.
    #[arg(long, requires = "subs")]
    pub embed_subs: bool,

    /// Netscape cookie file for sites that need a login.
    #[arg(long, value_name = "FILE", conflicts_with = "cookies_from_browser")]
    pub cookies: Option<PathBuf>,

    /// Browser to read cookies from (e.g. firefox).
    #[arg(long, value_name = "BROWSER")]
    pub cookies_from_browser: Option<String>,
}

impl FormatArgs {
    pub fn to_options(&self) -> FormatOptions {
        let mut opts = if self.audio {
            FormatOptions::audio()
        } else {
            FormatOptions::video(self.max_height)
        };
        opts.format = self.format.clone();
        if self.no_mp4 {
            opts.prefer_mp4 = false;
        }
        if !self.subs.is_empty() {
            opts.subtitles = Some(SubtitleSpec {
                languages: self.subs.clone(),
                include_automatic: false,
                format: None,
                embed: self.embed_subs,
            });
        }
        opts.credentials = match (&self.cookies, &self.cookies_from_browser) {
            (Some(file), _) => CredentialSource::CookieFile(file.clone()),
            (None, Some(browser)) => CredentialSource::Browser(browser.clone()),
            (None, None) => CredentialSource::None,
        };
        opts
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                urls,
                format,
                output_dir,
                jobs,
                ytdlp,
            } => {
                let mut cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                if let Some(n) = jobs {
                    cfg.max_concurrent = n;
                }
                if ytdlp.is_some() {
                    cfg.ytdlp_path = ytdlp;
                }
                let dir = match output_dir.or_else(|| cfg.output_dir.clone()) {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                run_get(&cfg, &urls, format.to_options(), &dir).await?;
            }
            CliCommand::Info { url } => run_info(&url).await?,
            CliCommand::Sites => run_sites(),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
