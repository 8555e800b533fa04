//! Helpers for keeping user-supplied filenames safe in span attributes and
//! on disk.

/// Returns only the final component of a client-supplied name.
///
/// Safe for span fields: browsers and some clients send full local paths.
pub fn redact_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    if last.is_empty() {
        "<unknown>".to_string()
    } else {
        last.to_string()
    }
}

/// Makes a client-supplied name usable as a single path component.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = redact_filename(name)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
