use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::SystemTime;

pub const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Normalise a date literal to `YYYY-MM-DDTHH:MM:SS`.
///
/// Accepts RFC 3339 timestamps, plain ISO dates and date-times, and the
/// `YYYY-MM-DD_HH-MM-SS[-...]` stamps some thesaurus exports put into
/// `dc:date`. Returns `None` when nothing matches.
pub fn normalize_date(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local().format(OUTPUT_DATE_FORMAT).to_string());
    }

    if let Some(dt) = parse_underscore_stamp(value) {
        return Some(dt.format(OUTPUT_DATE_FORMAT).to_string());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.format(OUTPUT_DATE_FORMAT).to_string());
        }
    }

    // xsd:date may carry a timezone suffix ("2017-05-01Z")
    let date_part = value.trim_end_matches('Z');
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(OUTPUT_DATE_FORMAT).to_string())
}

fn parse_underscore_stamp(value: &str) -> Option<NaiveDateTime> {
    let (date, time) = value.split_once('_')?;
    let time_parts: Vec<&str> = time.split('-').take(3).collect();
    if time_parts.len() < 2 {
        return None;
    }
    let candidate = format!("{}T{}", date, time_parts.join(":"));
    NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(OUTPUT_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_plain_date() {
        assert_eq!(normalize_date("2017-05-01").as_deref(), Some("2017-05-01T00:00:00"));
        assert_eq!(normalize_date("2017-05-01Z").as_deref(), Some("2017-05-01T00:00:00"));
    }

    #[test]
    fn test_rfc3339_keeps_wall_time() {
        assert_eq!(
            normalize_date("2017-05-01T10:20:30+02:00").as_deref(),
            Some("2017-05-01T10:20:30")
        );
    }

    #[test]
    fn test_underscore_stamp() {
        assert_eq!(
            normalize_date("2016-11-28_10-15-42-123").as_deref(),
            Some("2016-11-28T10:15:42")
        );
    }

    #[test]
    fn test_fractional_seconds_dropped() {
        assert_eq!(
            normalize_date(" 2016-11-28T10:15:42.250 ").as_deref(),
            Some("2016-11-28T10:15:42")
        );
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(normalize_date("last spring"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_format_system_time() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        assert_eq!(format_system_time(t), "1970-01-02T00:00:00");
    }
}
