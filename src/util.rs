/// Marker appended when text is cut before being embedded in a prompt.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Borrow at most `max_chars` characters of `s` (Unicode-safe).
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Keep the first `max_chars` characters and append [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    let head = truncate_str(s, max_chars);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{}{}", head, TRUNCATION_MARKER)
    }
}
