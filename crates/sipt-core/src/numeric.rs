//! Numeric header parsing rules shared by the structured accessors
//! (spec.md §4.1: "positive decimal, no leading `+`, no sign, no hex").

/// Parses a Content-Length style value. Returns `None` if the text is not
/// a bare run of decimal digits; returns `Some(-1)` as the overflow
/// sentinel when the value exceeds `i64::MAX`.
pub fn parse_content_length(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => Some(-1),
    }
}

/// Parses an Expires/Min-Expires style value, saturating to `u32::MAX` on
/// overflow rather than failing.
pub fn parse_saturating_u32(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.parse::<u32>() {
        Ok(v) => Some(v),
        Err(_) => Some(u32::MAX),
    }
}
