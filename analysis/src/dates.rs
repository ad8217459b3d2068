use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of a timestamp cell.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, RFC 3339 and plain `YYYY-MM-DD`. Other
/// text after the first ten characters (such as a trailing timezone
/// offset) is ignored as long as those characters form a date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT) {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok())
}

/// UTC date of a `created_utc` epoch-seconds cell.
pub fn date_from_epoch(value: &str) -> Option<NaiveDate> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds.trunc() as i64, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-05 23:59:59"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:00:00Z"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 10:00:00-04:00"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_date_from_epoch() {
        assert_eq!(date_from_epoch("1704067200.0"), Some(ymd(2024, 1, 1)));
        assert_eq!(date_from_epoch("1704153599"), Some(ymd(2024, 1, 1)));
        assert_eq!(date_from_epoch("NaN"), None);
        assert_eq!(date_from_epoch("soon"), None);
    }
}
