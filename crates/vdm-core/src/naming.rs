//! Display truncation and title-to-filename matching.

/// Shortens `text` to at most `max_chars` characters, ending with "..." when cut.
///
/// Only the first line is kept; full text stays in the job's error detail and logs.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    let line = text.trim().lines().next().unwrap_or("").trim_end();
    let cut = line.chars().count() > max_chars || text.trim().lines().nth(1).is_some();
    if !cut {
        return line.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = line.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Strips everything but word characters, whitespace and '-' from a title.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Comparison key: lowercase alphanumerics only.
///
/// The engine rewrites some characters when it builds filenames (slashes,
/// quotes, colons), so prefix matching is done on this reduced form.
pub fn match_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// True if `file_name` looks like it was produced for `title`.
///
/// The whole title must match and end where the name's title part ends, so
/// "Video" does not claim "Video Extended.mp4.part".
pub fn file_matches_title(file_name: &str, title: &str) -> bool {
    let key = match_key(&safe_title(title));
    if key.is_empty() {
        return false;
    }
    let mut want = key.chars().peekable();
    let mut end = None;
    for (i, c) in file_name.char_indices() {
        if !c.is_alphanumeric() {
            continue;
        }
        for lc in c.to_lowercase() {
            if want.next() != Some(lc) {
                return false;
            }
        }
        if want.peek().is_none() {
            end = Some(i + c.len_utf8());
            break;
        }
    }
    let Some(end) = end else {
        return false;
    };
    let rest = file_name[end..].split('.').next().unwrap_or("");
    !rest.chars().any(char::is_alphanumeric)
}
