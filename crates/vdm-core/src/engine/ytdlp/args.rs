//! yt-dlp command-line construction.

use std::ffi::OsString;
use std::path::Path;

use crate::job::{CredentialSource, FormatOptions};

/// Marker that starts every machine-readable progress line.
pub const PROGRESS_MARKER: &str = "[vdm] ";

/// Fields are `|`-separated in this order; see `progress_line::parse_line`.
pub const PROGRESS_TEMPLATE: &str = "download:[vdm] %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s|%(progress.filename)s";

pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const NETWORK_ARGS: &[&str] = &[
    "--socket-timeout",
    "120",
    "--retries",
    "10",
    "--fragment-retries",
    "10",
    "--extractor-retries",
    "5",
    "--file-access-retries",
    "5",
    "--skip-unavailable-fragments",
];

fn push(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

fn credential_args(args: &mut Vec<OsString>, creds: &CredentialSource) {
    match creds {
        CredentialSource::None => {}
        CredentialSource::CookieFile(path) => {
            args.push("--cookies".into());
            args.push(path.into());
        }
        CredentialSource::Browser(browser) => {
            args.push("--cookies-from-browser".into());
            args.push(browser.into());
        }
    }
}

/// Arguments for a real download into `output_dir`.
pub fn download_args(url: &str, opts: &FormatOptions, output_dir: &Path) -> Vec<OsString> {
    let mut args = Vec::new();
    push(
        &mut args,
        &["--newline", "--progress", "--progress-template", PROGRESS_TEMPLATE],
    );
    push(&mut args, &["--no-playlist", "--format"]);
    args.push(opts.format_selector().into());
    if !opts.format_sort.is_empty() {
        args.push("--format-sort".into());
        args.push(opts.format_sort.join(",").into());
    }
    if let Some(container) = opts.merge_container() {
        args.push("--merge-output-format".into());
        args.push(container.into());
    }
    if let Some(subs) = &opts.subtitles {
        args.push("--write-subs".into());
        if subs.include_automatic {
            args.push("--write-auto-subs".into());
        }
        args.push("--sub-langs".into());
        args.push(subs.languages.join(",").into());
        if let Some(fmt) = &subs.format {
            args.push("--sub-format".into());
            args.push(fmt.into());
        }
        if subs.embed {
            args.push("--embed-subs".into());
        }
    }
    credential_args(&mut args, &opts.credentials);
    push(&mut args, NETWORK_ARGS);
    args.push("--no-mtime".into());
    args.push("--paths".into());
    args.push(output_dir.into());
    push(&mut args, &["--output", OUTPUT_TEMPLATE]);
    args.extend(opts.extra_args.iter().map(OsString::from));
    args.push("--".into());
    args.push(url.into());
    args
}

/// Arguments for info extraction only (single JSON document on stdout).
pub fn info_args(url: &str, opts: &FormatOptions) -> Vec<OsString> {
    let mut args = Vec::new();
    push(
        &mut args,
        &["--dump-single-json", "--no-playlist", "--no-warnings", "--socket-timeout", "120"],
    );
    credential_args(&mut args, &opts.credentials);
    args.push("--".into());
    args.push(url.into());
    args
}

/// Printable command line with cookie sources hidden.
pub fn redact(program: &Path, args: &[OsString]) -> String {
    let mut out = vec![program.display().to_string()];
    let mut hide_next = false;
    for a in args {
        let s = a.to_string_lossy();
        if hide_next {
            out.push("[REDACTED]".to_string());
            hide_next = false;
            continue;
        }
        hide_next = s == "--cookies" || s == "--cookies-from-browser";
        out.push(s.into_owned());
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SubtitleSpec;
    use std::path::PathBuf;

    fn strs(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn download_args_cover_options() {
        let opts = FormatOptions {
            max_height: Some(1080),
            format_sort: vec!["res".into(), "ext".into()],
            subtitles: Some(SubtitleSpec {
                languages: vec!["en".into(), "ja".into()],
                include_automatic: true,
                format: Some("srt".into()),
                embed: true,
            }),
            credentials: CredentialSource::Browser("firefox".into()),
            extra_args: vec!["--limit-rate".into(), "2M".into()],
            ..FormatOptions::default()
        };
        let args = strs(&download_args(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            &opts,
            &PathBuf::from("/media/videos"),
        ));
        assert!(has_pair(&args, "--format-sort", "res,ext"));
        assert!(has_pair(&args, "--merge-output-format", "mp4"));
        assert!(has_pair(&args, "--sub-langs", "en,ja"));
        assert!(has_pair(&args, "--sub-format", "srt"));
        assert!(args.contains(&"--embed-subs".to_string()));
        assert!(args.contains(&"--write-auto-subs".to_string()));
        assert!(has_pair(&args, "--cookies-from-browser", "firefox"));
        assert!(has_pair(&args, "--socket-timeout", "120"));
        assert!(has_pair(&args, "--paths", "/media/videos"));
        assert!(has_pair(&args, "--limit-rate", "2M"));
        assert!(args.contains(&"--no-mtime".to_string()));
        assert_eq!(
            &args[args.len() - 2..],
            &["--", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"]
        );
    }

    #[test]
    fn info_args_dump_json() {
        let args = strs(&info_args("https://x", &FormatOptions::default()));
        assert_eq!(args[0], "--dump-single-json");
        assert_eq!(args.last().map(String::as_str), Some("https://x"));
    }

    #[test]
    fn redact_hides_cookie_sources() {
        let opts = FormatOptions {
            credentials: CredentialSource::CookieFile(PathBuf::from("/home/me/cookies.txt")),
            ..FormatOptions::default()
        };
        let line = redact(Path::new("yt-dlp"), &info_args("https://x", &opts));
        assert!(line.starts_with("yt-dlp --dump-single-json"));
        assert!(line.contains("--cookies [REDACTED]"));
        assert!(!line.contains("cookies.txt"));
    }
}
