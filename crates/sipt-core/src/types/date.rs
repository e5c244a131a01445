use std::fmt;

const WEEKDAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: &[&str] = &[
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A parsed RFC-1123 date header value (`Date`, `Retry-After`-adjacent
/// usages), with a GMT default timezone (spec.md §4.1
/// `get_time_valued_header`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDate {
    pub weekday: String,
    pub day: u8,
    pub month: String,
    pub year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub tz: String,
}

impl HttpDate {
    /// Parses `"Mon, 01 Jan 2024 00:00:00 GMT"`. The timezone token
    /// defaults to `GMT` when absent.
    pub fn parse(s: &str) -> Option<HttpDate> {
        let s = s.trim();
        let (weekday_part, rest) = s.split_once(',')?;
        let weekday = weekday_part.trim().to_string();
        if !WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(&weekday)) {
            return None;
        }
        let mut fields = rest.split_whitespace();
        let day: u8 = fields.next()?.parse().ok()?;
        let month = fields.next()?.to_string();
        if !MONTHS.iter().any(|m| m.eq_ignore_ascii_case(&month)) {
            return None;
        }
        let year: u16 = fields.next()?.parse().ok()?;
        let time = fields.next()?;
        let mut time_parts = time.splitn(3, ':');
        let hour: u8 = time_parts.next()?.parse().ok()?;
        let minute: u8 = time_parts.next()?.parse().ok()?;
        let second: u8 = time_parts.next()?.parse().ok()?;
        let tz = fields.next().unwrap_or("GMT").to_string();
        Some(HttpDate {
            weekday,
            day,
            month,
            year,
            hour,
            minute,
            second,
            tz,
        })
    }
}

impl fmt::Display for HttpDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {:02} {} {} {:02}:{:02}:{:02} {}",
            self.weekday, self.day, self.month, self.year, self.hour, self.minute, self.second, self.tz
        )
    }
}
