//! Best-effort removal of partial download artifacts after a cancel.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::naming::file_matches_title;
use crate::store::CleanupTarget;

fn format_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.f\d+(-[0-9a-z]+)?\.(mp4|m4a|webm|mkv|mp3|opus)$").expect("valid regex")
    })
}

fn frag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.part-Frag\d+(\.part)?$").expect("valid regex"))
}

/// In-progress file shapes the engine leaves behind.
pub fn is_partial_artifact(name: &str) -> bool {
    name.ends_with(".part")
        || name.ends_with(".ytdl")
        || name.contains(".temp.")
        || frag_re().is_match(name)
        || format_fragment_re().is_match(name)
}

/// "Title.f137.mp4.part" -> "Title"
fn stem_of(reported: &str) -> &str {
    let base = reported.trim_end_matches(".part").trim_end_matches(".ytdl");
    if let Some(m) = format_fragment_re().find(base) {
        return &base[..m.start()];
    }
    base.rsplit_once('.').map(|(s, _)| s).unwrap_or(base)
}

fn belongs_to(name: &str, target: &CleanupTarget) -> bool {
    if let Some(title) = &target.title {
        if file_matches_title(name, title) {
            return true;
        }
    }
    target.reported_files.iter().any(|r| {
        let stem = stem_of(r);
        !stem.is_empty()
            && name
                .strip_prefix(stem)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

/// Deletes partial artifacts in the target directory that belong to the
/// cancelled job. Individual failures are logged and skipped.
pub fn cleanup_partial_artifacts(target: &CleanupTarget) -> Vec<PathBuf> {
    let dir: &Path = &target.output_dir;
    if target.title.is_none() && target.reported_files.is_empty() {
        tracing::debug!("no title or file names for cleanup in {}", dir.display());
        return Vec::new();
    }
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("cleanup: cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_partial_artifact(&name) || !belongs_to(&name, target) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("removed partial file {}", path.display());
                removed.push(path);
            }
            Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn partial_shapes() {
        assert!(is_partial_artifact("T.mp4.part"));
        assert!(is_partial_artifact("T.f137.mp4"));
        assert!(is_partial_artifact("T.f251.webm.ytdl"));
        assert!(is_partial_artifact("T.mp4.part-Frag12"));
        assert!(is_partial_artifact("T.temp.mp4"));
        assert!(!is_partial_artifact("T.mp4"));
        assert!(!is_partial_artifact("T.en.vtt"));
    }

    #[test]
    fn removes_only_matching_partials() {
        let dir = tempfile::tempdir().unwrap();
        for n in [
            "My Video.f137.mp4.part",
            "My Video.f251.webm",
            "My Video.mp4.ytdl",
            "My Video.mp4",
            "Other.f137.mp4.part",
        ] {
            touch(dir.path(), n);
        }
        let target = CleanupTarget {
            output_dir: dir.path().to_path_buf(),
            title: Some("My Video!".into()),
            reported_files: vec![],
        };
        let removed = cleanup_partial_artifacts(&target);
        assert_eq!(removed.len(), 3);
        assert!(dir.path().join("My Video.mp4").exists());
        assert!(dir.path().join("Other.f137.mp4.part").exists());
    }

    #[test]
    fn reported_files_match_without_title() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Weird ⧸ Name.f137.mp4.part");
        touch(dir.path(), "Weird ⧸ Name.f140.m4a");
        let target = CleanupTarget {
            output_dir: dir.path().to_path_buf(),
            title: None,
            reported_files: vec!["Weird ⧸ Name.f137.mp4.part".into()],
        };
        assert_eq!(cleanup_partial_artifacts(&target).len(), 2);
    }

    #[test]
    fn longer_title_in_same_dir_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Video.f137.mp4.part");
        touch(dir.path(), "Video Extended.f137.mp4.part");
        touch(dir.path(), "Video Extended.mp4.ytdl");
        let target = CleanupTarget {
            output_dir: dir.path().to_path_buf(),
            title: Some("Video".into()),
            reported_files: vec!["Video.f137.mp4.part".into()],
        };
        let removed = cleanup_partial_artifacts(&target);
        assert_eq!(removed, vec![dir.path().join("Video.f137.mp4.part")]);
        assert!(dir.path().join("Video Extended.f137.mp4.part").exists());
        assert!(dir.path().join("Video Extended.mp4.ytdl").exists());
    }

    #[test]
    fn nothing_to_match_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.part");
        let target = CleanupTarget {
            output_dir: dir.path().to_path_buf(),
            title: None,
            reported_files: vec![],
        };
        assert!(cleanup_partial_artifacts(&target).is_empty());
        assert!(dir.path().join("a.part").exists());
    }
}
