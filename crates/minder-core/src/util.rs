//! Small text utilities shared by the kernel and handlers.

/// Cap applied to summaries and errors before they reach state or
/// the webhook payload.
pub const SUMMARY_CAP: usize = 400;

/// Truncate to `max_len` characters with a visible ellipsis.
/// Operates on characters, not bytes, so multi-byte text stays valid.
pub fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Word count for article metadata. Chinese text counts code points
/// in the CJK Unified Ideographs block; everything else counts
/// whitespace-delimited tokens.
pub fn word_count(text: &str, language: &str) -> usize {
    if language.starts_with("zh") {
        text.chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count()
    } else {
        text.split_whitespace().count()
    }
}

/// URL-safe lowercase kebab slug, capped at `max_len` characters.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.chars().count() >= max_len {
            break;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Short unique run identifier, e.g. `run-18f2c9a3b41`.
pub fn run_id() -> String {
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("run-{:x}{:x}", t.as_secs(), t.subsec_millis())
}
