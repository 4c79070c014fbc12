use sha2::{Digest, Sha256};

/// Truncate `input` to at most `max_chars` Unicode characters, stripping
/// control characters. When truncation happens the last kept character is
/// replaced by `…`, so the result never exceeds `max_chars`.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() <= max_chars {
        return clean;
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut s: String = clean.chars().take(max_chars - 1).collect();
    s.push('…');
    s
}

/// Collapse every whitespace run (newlines included) into a single space.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn slugify(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_sep = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            out.push('-');
            prev_sep = true;
        }
        if out.len() >= max_chars {
            break;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "conversation".to_string()
    } else {
        trimmed.to_string()
    }
}

/// First `len` hex characters of the SHA-256 of `input`.
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{digest:x}");
    hex.chars().take(len).collect()
}
