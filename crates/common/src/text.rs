/// Replaces characters that would break a flat delimited row (line breaks
/// and commas) with single spaces. Length in characters is preserved.
pub fn sanitize_title(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\n' | '\r' | ',' => ' ',
            other => other,
        })
        .collect()
}

/// Character count, not byte length, so multi-byte bodies measure the same
/// regardless of encoding.
pub fn char_length(input: Option<&str>) -> u64 {
    input.map(|s| s.chars().count() as u64).unwrap_or(0)
}

/// Quotes a cell for a comma-delimited file when it contains the delimiter,
/// a quote, or a line break.
pub fn quote_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
