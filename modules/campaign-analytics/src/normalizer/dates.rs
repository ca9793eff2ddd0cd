use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Layouts tried, in order, for naive (zone-less) timestamps.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y", "%b %d, %Y", "%B %d, %Y"];

/// Layouts carrying an explicit offset.
const ZONED_FORMATS: &[&str] = &[
    // Twitter classic: "Wed Oct 10 20:19:24 +0000 2018"
    "%a %b %d %H:%M:%S %z %Y",
    // Graph API: "2024-03-05T14:30:00+0000"
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

// Unix timestamps above this are milliseconds.
const MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Best-effort timestamp parse; `None` when nothing matches.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).and_then(from_unix),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub(crate) fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.chars().all(|c| c.is_ascii_digit()) && s.len() >= 9 {
        return s.parse::<i64>().ok().and_then(from_unix);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let without_z = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_z, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    if ts <= 0 {
        return None;
    }
    if ts >= MILLIS_CUTOFF {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn hour_of(raw: &str) -> Option<u32> {
        parse_timestamp_str(raw).map(|dt| dt.hour())
    }

    #[test]
    fn parses_common_layouts() {
        assert_eq!(hour_of("2024-03-05T14:30:00Z"), Some(14));
        assert_eq!(hour_of("2024-03-05T14:30:00+0000"), Some(14));
        assert_eq!(hour_of("2024-03-05 09:15:00"), Some(9));
        assert_eq!(hour_of("Wed Oct 10 20:19:24 +0000 2018"), Some(20));
        assert_eq!(hour_of("Tue, 05 Mar 2024 18:00:00 +0000"), Some(18));
        assert_eq!(hour_of("03/05/2024 07:45"), Some(7));
        assert_eq!(hour_of("2024-03-05"), Some(0));
    }

    #[test]
    fn offsets_convert_to_utc() {
        assert_eq!(hour_of("2024-03-05T14:30:00+02:00"), Some(12));
    }

    #[test]
    fn unix_seconds_and_millis() {
        let secs = parse_timestamp(&json!(1709649000)).unwrap();
        let millis = parse_timestamp(&json!(1709649000000i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.year(), 2024);
        assert_eq!(parse_timestamp_str("1709649000"), Some(secs));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp_str("last tuesday"), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!(0)), None);
    }
}
