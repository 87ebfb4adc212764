//! Delivery instant computation in the fixed reference timezone
//!
//! A deadline stored as a bare date means "any time during that calendar
//! day" in the reference zone, never a literal midnight-UTC instant. All
//! computation therefore goes through the zone before converting back to
//! UTC for storage.

use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::warn;

use crate::constants::{
    FALLBACK_LEAD_HOURS, GRACE_BUFFER_MINUTES, REFERENCE_ZONE, SCHEDULE_GUARD_MINUTES,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Delivery instant is not representable")]
    Unrepresentable,
}

/// Parses a `HH:MM` wall-clock time.
fn parse_time_of_day(time_of_day: &str) -> Result<NaiveTime, ClockError> {
    let invalid = || ClockError::InvalidTimeFormat(time_of_day.to_string());

    let (hh, mm) = time_of_day.split_once(':').ok_or_else(invalid)?;
    // u32 parsing alone would accept signs and whitespace
    for group in [hh, mm] {
        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    let hour: u32 = hh.parse().map_err(|_| invalid())?;
    let minute: u32 = mm.parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Computes the UTC instant at which a reminder should be delivered.
///
/// Takes the start of the deadline's calendar day in the reference zone,
/// steps back `offset_days` days, and applies `time_of_day` as wall-clock
/// time in that same zone.
pub fn compute_delivery_instant(
    deadline: DateTime<Utc>,
    offset_days: u32,
    time_of_day: &str,
) -> Result<DateTime<Utc>, ClockError> {
    let time = parse_time_of_day(time_of_day)?;

    let deadline_day = deadline.with_timezone(&REFERENCE_ZONE).date_naive();
    let delivery_day = deadline_day
        .checked_sub_days(Days::new(u64::from(offset_days)))
        .ok_or(ClockError::Unrepresentable)?;

    REFERENCE_ZONE
        .from_local_datetime(&delivery_day.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or(ClockError::Unrepresentable)
}

/// True when `instant` falls within the grace buffer of now.
///
/// Such instants are treated as "fire now" rather than rejected.
#[must_use]
pub fn is_effectively_past(instant: DateTime<Utc>) -> bool {
    instant < Utc::now() + Duration::minutes(GRACE_BUFFER_MINUTES)
}

/// True when the computed delivery instant is far enough in the future
/// to accept a new scheduling request.
///
/// The guard buffer is deliberately larger than the grace buffer because
/// multi-recipient fan-out takes processing time. A timezone computation
/// failure degrades to the coarse day-level check instead of blocking the
/// feature.
#[must_use]
pub fn can_schedule(deadline: DateTime<Utc>, offset_days: u32, time_of_day: &str) -> bool {
    match compute_delivery_instant(deadline, offset_days, time_of_day) {
        Ok(instant) => instant > Utc::now() + Duration::minutes(SCHEDULE_GUARD_MINUTES),
        Err(ClockError::InvalidTimeFormat(_)) => false,
        Err(e) => {
            warn!("Delivery instant computation failed ({e}), using day-level fallback");
            fallback_can_schedule(deadline, offset_days)
        }
    }
}

/// Approximate-but-safe day-level schedule check used when the exact
/// computation fails.
fn fallback_can_schedule(deadline: DateTime<Utc>, offset_days: u32) -> bool {
    let days = Duration::days(i64::from(offset_days));
    deadline
        .checked_sub_signed(days)
        .is_some_and(|approx| approx > Utc::now() + Duration::hours(FALLBACK_LEAD_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_reference_zone_is_utc_plus_seven() {
        // Bangkok has no DST; offset is fixed
        let at = REFERENCE_ZONE
            .with_ymd_and_hms(2024, 7, 1, 9, 0, 0)
            .unwrap();
        assert_eq!(at.with_timezone(&Utc), utc(2024, 7, 1, 2, 0));
    }

    #[test]
    fn test_three_days_before_at_nine() {
        // Deadline on the 2024-07-01 reference-zone calendar day,
        // 3 days before at 09:00 => 2024-06-28 09:00 +07 = 02:00 UTC
        let deadline = utc(2024, 6, 30, 17, 0); // 2024-07-01 00:00 in the reference zone
        let instant = compute_delivery_instant(deadline, 3, "09:00").unwrap();
        assert_eq!(instant, utc(2024, 6, 28, 2, 0));
    }

    #[test]
    fn test_midnight_utc_deadline_does_not_drift() {
        // A midnight-UTC deadline is already 07:00 the same day in the
        // reference zone; the calendar day must not shift backwards.
        let deadline = utc(2024, 7, 1, 0, 0);
        let instant = compute_delivery_instant(deadline, 0, "09:00").unwrap();
        assert_eq!(instant, utc(2024, 7, 1, 2, 0));
    }

    #[test]
    fn test_late_evening_utc_rolls_into_next_reference_day() {
        // 2024-06-30 18:30 UTC is 2024-07-01 01:30 in the reference zone
        let deadline = utc(2024, 6, 30, 18, 30);
        let instant = compute_delivery_instant(deadline, 1, "08:15").unwrap();
        assert_eq!(instant, utc(2024, 6, 30, 1, 15));
    }

    #[test]
    fn test_round_trip_yields_requested_wall_clock() {
        let deadline = utc(2025, 3, 14, 11, 45);
        for (offset, tod) in [(0u32, "00:00"), (2, "23:59"), (30, "12:30"), (365, "06:05")] {
            let instant = compute_delivery_instant(deadline, offset, tod).unwrap();
            let local = instant.with_timezone(&REFERENCE_ZONE);

            let expected_day = deadline
                .with_timezone(&REFERENCE_ZONE)
                .date_naive()
                .checked_sub_days(Days::new(u64::from(offset)))
                .unwrap();
            assert_eq!(local.date_naive(), expected_day);
            assert_eq!(local.format("%H:%M").to_string(), tod);
        }
    }

    #[test]
    fn test_invalid_time_formats_rejected() {
        let deadline = utc(2024, 7, 1, 0, 0);
        for bad in [
            "", "09", "0900", "24:00", "09:60", "ab:cd", "09:00:00", ":30", "12:", "+9:+5",
            "-1:30", " 9:05", "9: 5",
        ] {
            let err = compute_delivery_instant(deadline, 0, bad).unwrap_err();
            assert_eq!(err, ClockError::InvalidTimeFormat(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn test_single_digit_groups_accepted() {
        let deadline = utc(2024, 7, 1, 0, 0);
        let instant = compute_delivery_instant(deadline, 0, "9:5").unwrap();
        assert_eq!(instant, utc(2024, 7, 1, 2, 5));
    }

    #[test]
    fn test_is_effectively_past_boundaries() {
        assert!(is_effectively_past(Utc::now() - Duration::hours(1)));
        assert!(is_effectively_past(Utc::now() + Duration::minutes(4)));
        assert!(!is_effectively_past(Utc::now() + Duration::minutes(6)));
    }

    #[test]
    fn test_can_schedule_respects_guard_buffer() {
        // Deadline far in the future: well beyond the 10 minute guard
        let deadline = Utc::now() + Duration::days(30);
        assert!(can_schedule(deadline, 1, "09:00"));

        // Deadline long past: computed instant is behind now
        let deadline = Utc::now() - Duration::days(30);
        assert!(!can_schedule(deadline, 1, "09:00"));
    }

    #[test]
    fn test_can_schedule_false_for_bad_format() {
        let deadline = Utc::now() + Duration::days(30);
        assert!(!can_schedule(deadline, 1, "25:00"));
    }

    #[test]
    fn test_can_schedule_falls_back_on_computation_error() {
        // An offset that underflows the calendar forces the degraded path,
        // which compares deadline-minus-days against now-plus-one-hour.
        let deadline = Utc::now() + Duration::days(5);
        assert!(compute_delivery_instant(deadline, u32::MAX, "09:00").is_err());
        assert!(!can_schedule(deadline, u32::MAX, "09:00"));
    }

    #[test]
    fn test_fallback_day_level_comparison() {
        assert!(fallback_can_schedule(Utc::now() + Duration::days(3), 1));
        assert!(!fallback_can_schedule(Utc::now() + Duration::days(1), 1));
        assert!(!fallback_can_schedule(Utc::now() + Duration::minutes(30), 0));
        assert!(fallback_can_schedule(Utc::now() + Duration::hours(2), 0));
    }
}
