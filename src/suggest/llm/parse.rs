//! Pulling a JSON object out of free-form model output

use serde_json::Value;

/// A parsed object together with the slice of input it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedJson<'a> {
    pub raw: &'a str,
    pub value: Value,
}

/// Find the first balanced `{ ... }` span in `text` that parses as JSON.
///
/// Scanning starts at the first `{` and tracks brace depth, skipping over
/// string literals (backslash escapes included) so braces inside values do
/// not count. Every `}` that brings the depth back to zero closes a
/// candidate; a candidate that fails to parse is extended to the next such
/// `}` rather than abandoned. The start never moves past the first `{`, so a
/// valid object that begins later in the text is not found once an earlier
/// `{` has opened an invalid span.
///
/// Never panics; returns `None` when there is no `{` or no candidate parses.
pub fn extract_first_json(text: &str) -> Option<ExtractedJson<'_>> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    // Structural characters are ASCII, so byte offsets of `{` and `}` are
    // always char boundaries.
    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let candidate = &text[start..=i];
                    match serde_json::from_str::<Value>(candidate) {
                        Ok(value) => {
                            return Some(ExtractedJson {
                                raw: candidate,
                                value,
                            })
                        }
                        Err(err) => {
                            tracing::trace!(end = i, error = %err, "balanced span is not valid JSON")
                        }
                    }
                }
            }
            _ => {}
        }
    }

    None
}
