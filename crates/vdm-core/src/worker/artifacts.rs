//! Output identification after a successful download.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mp3", "m4a", "opus"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &["vtt", "srt", "ttml", "sbv", "ass", "ssa"];

fn has_extension(name: &str, exts: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

pub fn is_media_file(name: &str) -> bool {
    has_extension(name, MEDIA_EXTENSIONS)
}

pub fn is_subtitle_file(name: &str) -> bool {
    has_extension(name, SUBTITLE_EXTENSIONS)
}

/// Names of regular files directly inside `dir`. A missing directory is empty.
pub fn snapshot_dir(dir: &Path) -> io::Result<HashSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Files present now that were not in `before`, sorted by name.
pub fn new_files(dir: &Path, before: &HashSet<String>) -> io::Result<Vec<String>> {
    let mut added: Vec<String> = snapshot_dir(dir)?
        .into_iter()
        .filter(|n| !before.contains(n))
        .collect();
    added.sort();
    Ok(added)
}

fn file_len(dir: &Path, name: &str) -> u64 {
    fs::metadata(dir.join(name)).map(|m| m.len()).unwrap_or(0)
}

/// Picks the output file.
///
/// A reported name wins if it exists on disk. Otherwise: the single new file;
/// else the single new media file; else the largest new media file (or the
/// largest new file if none has a media extension).
pub fn identify_output(dir: &Path, reported: Option<&str>, new: &[String]) -> Option<String> {
    if let Some(name) = reported {
        if dir.join(name).is_file() {
            return Some(name.to_string());
        }
    }
    match new {
        [] => return reported.map(String::from),
        [only] => return Some(only.clone()),
        _ => {}
    }
    let media: Vec<&String> = new.iter().filter(|n| is_media_file(n)).collect();
    let candidates: Vec<&String> = match media.len() {
        1 => return Some(media[0].clone()),
        0 => new.iter().collect(),
        _ => media,
    };
    candidates
        .into_iter()
        .max_by_key(|n| (file_len(dir, n), std::cmp::Reverse((*n).clone())))
        .cloned()
}

/// Deletes standalone subtitle files among `new` (except `keep`). Returns the removed names.
pub fn remove_standalone_subtitles(dir: &Path, new: &[String], keep: Option<&str>) -> Vec<String> {
    let mut removed = Vec::new();
    for name in new {
        if Some(name.as_str()) == keep || !is_subtitle_file(name) {
            continue;
        }
        match fs::remove_file(dir.join(name)) {
            Ok(()) => {
                tracing::debug!("removed embedded subtitle file {}", name);
                removed.push(name.clone());
            }
            Err(e) => tracing::warn!("failed to remove subtitle file {}: {}", name, e),
        }
    }
    removed
}

/// Sets atime and mtime of each file to now; failures are logged.
pub fn touch_all(dir: &Path, names: &[String]) {
    let now = filetime::FileTime::now();
    for name in names {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        if let Err(e) = filetime::set_file_times(&path, now, now) {
            tracing::warn!("failed to update timestamp of {}: {}", path.display(), e);
        }
    }
}
