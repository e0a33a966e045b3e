/// Char-safe preview of a string for log lines. Truncates to `max_chars`
/// characters (never mid-codepoint) and appends "..." when shortened.
#[inline]
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
