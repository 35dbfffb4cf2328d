//! Timestamp helpers.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision, so lexical order matches chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a timestamp for storage.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time, formatted for storage.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Last instant that still formats as a four-digit year.
const LATEST_STORABLE_SECS: i64 = 253_402_300_799;

/// `at` shifted by `delta`, clamped to the range the storage format sorts
/// correctly: the Unix epoch through the end of year 9999.
pub fn offset_by(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    let earliest = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let latest = DateTime::<Utc>::from_timestamp(LATEST_STORABLE_SECS, 999_000_000).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let shifted = at
        .checked_add_signed(delta)
        .unwrap_or(if delta < Duration::zero() { earliest } else { latest });
    shifted.clamp(earliest, latest)
}

/// `at` shifted by a number of days, formatted for storage.
pub fn days_from(at: DateTime<Utc>, days: i64) -> String {
    let delta = Duration::try_days(days).unwrap_or(if days < 0 { Duration::MIN } else { Duration::MAX });
    format_timestamp(offset_by(at, delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_sortable() {
        let earlier = Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();

        assert_eq!(format_timestamp(earlier), "2026-02-20T10:00:00.000Z");
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn test_days_from() {
        let at = Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap();
        assert_eq!(days_from(at, 90), "2026-05-21T10:00:00.000Z");
        assert_eq!(days_from(at, -30), "2026-01-21T10:00:00.000Z");
    }

    #[test]
    fn test_days_from_saturates() {
        let at = Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap();
        assert_eq!(days_from(at, i64::MAX), "9999-12-31T23:59:59.999Z");
        assert_eq!(days_from(at, 5_000_000), "9999-12-31T23:59:59.999Z");
        assert_eq!(days_from(at, i64::MIN), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_offset_by_overflow() {
        let at = Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap();
        assert_eq!(format_timestamp(offset_by(at, Duration::MAX)), "9999-12-31T23:59:59.999Z");
        assert_eq!(offset_by(at, Duration::hours(1)), Utc.with_ymd_and_hms(2026, 2, 20, 11, 0, 0).unwrap());
    }
}
