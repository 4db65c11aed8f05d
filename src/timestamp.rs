//! Epoch-millisecond conversions
//!
//! Kline timestamps arrive as epoch milliseconds and are rendered in the
//! machine's local time zone. Command-line dates use the `YYYY_MM_DD` form and
//! are read as local midnight.

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::config::ConfigError;

/// Format used for the `date` and `close_time` fields of exported records
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format accepted for `--start-time` / `--end-time`
pub const DATE_ARG_FORMAT: &str = "%Y_%m_%d";

/// Render epoch milliseconds as local time using a strftime pattern.
///
/// Returns `None` when the timestamp is outside chrono's representable range.
pub fn format_millis(millis: i64, format: &str) -> Option<String> {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&Local).format(format).to_string())
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS` local time
pub fn format_datetime(millis: i64) -> Option<String> {
    format_millis(millis, DATETIME_FORMAT)
}

/// Parse a `YYYY_MM_DD` argument into epoch milliseconds at local midnight
pub fn parse_date_arg(value: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidDate(value.to_string());

    let date = NaiveDate::parse_from_str(value.trim(), DATE_ARG_FORMAT).map_err(|_| invalid())?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;

    // In a DST fold take the earlier instant; a midnight skipped by a gap is rejected
    let local = midnight.and_local_timezone(Local).earliest().ok_or_else(invalid)?;
    Ok(local.timestamp_millis())
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_datetime_uses_local_time() {
        let millis = 1_514_764_800_000; // 2018-01-01T00:00:00Z
        let expected = Local
            .timestamp_millis_opt(millis)
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        assert_eq!(format_datetime(millis).unwrap(), expected);
    }

    #[test]
    fn test_format_out_of_range() {
        assert!(format_datetime(i64::MAX).is_none());
    }

    #[test]
    fn test_parse_date_arg_round_trips_through_format() {
        let millis = parse_date_arg("2018_01_15").unwrap();
        assert_eq!(format_millis(millis, DATE_ARG_FORMAT).unwrap(), "2018_01_15");
        assert_eq!(
            format_datetime(millis).unwrap(),
            "2018-01-15 00:00:00"
        );
    }

    #[test]
    fn test_parse_date_arg_rejects_other_layouts() {
        assert!(matches!(
            parse_date_arg("2018-01-15"),
            Err(ConfigError::InvalidDate(_))
        ));
        assert!(parse_date_arg("2018_13_01").is_err());
        assert!(parse_date_arg("").is_err());
    }
}
