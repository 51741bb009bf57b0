//! Conversion of storefront wall-clock timestamps into UTC instants.
//!
//! The storefront writes timestamps as naive civil time in a single fixed
//! zone. Each value is resolved with the zone offset in force at that exact
//! wall time, so two dates on either side of a DST change get different
//! offsets.
//!
//! Transition rules:
//! - ambiguous wall time (autumn fall-back): the earlier instant is used;
//! - non-existent wall time (spring-forward gap): the offset in force before
//!   the gap is applied, which lands the instant just after the transition.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// IANA name of the zone used when none is configured.
pub const DEFAULT_SOURCE_TIMEZONE: &str = "Europe/Paris";

/// Values the storefront emits for "no date".
const ZERO_SENTINELS: &[&str] = &["0", "0000-00-00", "0000-00-00 00:00:00"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Converts a storefront timestamp into a UTC instant.
///
/// Returns `None` for absent, empty, zero-sentinel, or unparsable input.
/// Strings that already carry an offset (RFC 3339) and bare epoch seconds
/// (used for paid/completed dates) are absolute and converted directly;
/// everything else is treated as civil time in `zone`.
#[must_use]
pub fn to_utc(local: Option<&str>, zone: Tz) -> Option<DateTime<Utc>> {
    let raw = local?.trim();
    if raw.is_empty() || ZERO_SENTINELS.contains(&raw) {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
    }

    let Some(naive) = parse_naive(raw) else {
        tracing::debug!(value = raw, "unparsable source timestamp");
        return None;
    };

    Some(resolve_local(naive, zone))
}

/// Resolves a naive wall time in `zone` to a UTC instant.
#[must_use]
pub fn resolve_local(naive: NaiveDateTime, zone: Tz) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // A gap never spans a full day, so the offset a day earlier is the
            // one in force before the transition.
            let before_gap = naive - TimeDelta::days(1);
            let offset = zone
                .offset_from_local_datetime(&before_gap)
                .earliest()
                .map_or(0, |o| o.fix().local_minus_utc());
            (naive - TimeDelta::seconds(i64::from(offset))).and_utc()
        }
    }
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Paris;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_and_sentinel_inputs_are_none() {
        assert!(to_utc(None, Paris).is_none());
        assert!(to_utc(Some(""), Paris).is_none());
        assert!(to_utc(Some("   "), Paris).is_none());
        assert!(to_utc(Some("0"), Paris).is_none());
        assert!(to_utc(Some("0000-00-00 00:00:00"), Paris).is_none());
    }

    #[test]
    fn garbage_is_none() {
        assert!(to_utc(Some("yesterday"), Paris).is_none());
    }

    #[test]
    fn winter_time_uses_plus_one() {
        let got = to_utc(Some("2024-01-15 10:00:00"), Paris).unwrap();
        assert_eq!(got, utc("2024-01-15T09:00:00Z"));
    }

    #[test]
    fn summer_time_uses_plus_two() {
        let got = to_utc(Some("2024-07-15 10:00:00"), Paris).unwrap();
        assert_eq!(got, utc("2024-07-15T08:00:00Z"));
    }

    #[test]
    fn dst_transition_dates_get_distinct_offsets() {
        // 02:30 on 31 March falls in the spring-forward gap.
        let spring = to_utc(Some("2024-03-31 02:30:00"), Paris).unwrap();
        // 02:30 on 27 October occurs twice; the first (summer) one wins.
        let autumn = to_utc(Some("2024-10-27 02:30:00"), Paris).unwrap();

        assert_eq!(spring, utc("2024-03-31T01:30:00Z"));
        assert_eq!(autumn, utc("2024-10-27T00:30:00Z"));

        let spring_offset = NaiveDateTime::parse_from_str("2024-03-31 02:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
            - spring;
        let autumn_offset = NaiveDateTime::parse_from_str("2024-10-27 02:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
            - autumn;
        assert_ne!(spring_offset, autumn_offset);
    }

    #[test]
    fn times_straddling_spring_transition() {
        let before = to_utc(Some("2024-03-31 01:59:00"), Paris).unwrap();
        let after = to_utc(Some("2024-03-31 03:01:00"), Paris).unwrap();
        assert_eq!(before, utc("2024-03-31T00:59:00Z"));
        assert_eq!(after, utc("2024-03-31T01:01:00Z"));
    }

    #[test]
    fn rfc3339_input_keeps_its_own_offset() {
        let got = to_utc(Some("2024-07-15T10:00:00+00:00"), Paris).unwrap();
        assert_eq!(got, utc("2024-07-15T10:00:00Z"));
    }

    #[test]
    fn epoch_seconds_are_absolute() {
        let got = to_utc(Some("1704067200"), Paris).unwrap();
        assert_eq!(got, utc("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn t_separator_and_date_only_formats() {
        let t = to_utc(Some("2024-01-15T10:00:00"), Paris).unwrap();
        assert_eq!(t, utc("2024-01-15T09:00:00Z"));

        let d = to_utc(Some("2024-01-15"), Paris).unwrap();
        assert_eq!(d, utc("2024-01-14T23:00:00Z"));
    }
}
