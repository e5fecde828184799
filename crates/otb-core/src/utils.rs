use chrono::Utc;

/// RFC3339 timestamp in UTC (stored in pending requests and history docs).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Truncate to at most `max_len` characters, appending `...` when cut.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
