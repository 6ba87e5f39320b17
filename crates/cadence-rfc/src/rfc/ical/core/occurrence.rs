//! A single expanded instance of a recurring event.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One concrete point in time at which an event takes place.
///
/// Keeps the UTC offset the recurrence engine produced it in so the
/// wall-clock fields match what a calendar would display. Ordering and
/// equality compare the instant, not the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Occurrence(DateTime<FixedOffset>);

impl Occurrence {
    #[must_use]
    pub const fn new(datetime: DateTime<FixedOffset>) -> Self {
        Self(datetime)
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    #[must_use]
    pub fn second(&self) -> u32 {
        self.0.second()
    }

    /// Returns the occurrence with its original offset.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.to_utc()
    }

    /// Shifts the occurrence by `delta`, keeping its offset.
    ///
    /// Returns `None` if the result is out of range.
    #[must_use]
    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }

    /// Formats the occurrence as an iCalendar UTC `DATE-TIME` (`20120101T090000Z`).
    #[must_use]
    pub fn to_ical_utc(&self) -> String {
        self.to_utc().format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub(crate) fn to_rrule(self) -> DateTime<rrule::Tz> {
        self.0.with_timezone(&rrule::Tz::UTC)
    }
}

impl From<DateTime<FixedOffset>> for Occurrence {
    fn from(datetime: DateTime<FixedOffset>) -> Self {
        Self(datetime)
    }
}

impl From<DateTime<Utc>> for Occurrence {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self(datetime.fixed_offset())
    }
}

impl From<DateTime<rrule::Tz>> for Occurrence {
    fn from(datetime: DateTime<rrule::Tz>) -> Self {
        Self(datetime.fixed_offset())
    }
}

impl From<Occurrence> for DateTime<Utc> {
    fn from(occurrence: Occurrence) -> Self {
        occurrence.to_utc()
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> Occurrence {
        Occurrence::from(
            Utc.with_ymd_and_hms(2012, 1, 1, hour, 0, 0)
                .single()
                .expect("valid datetime"),
        )
    }

    #[test]
    fn test_component_fields_follow_offset() {
        let offset = FixedOffset::west_opt(5 * 3600).expect("valid offset");
        let local = offset
            .with_ymd_and_hms(2021, 3, 13, 9, 30, 15)
            .single()
            .expect("valid datetime");
        let occurrence = Occurrence::from(local);

        assert_eq!(occurrence.year(), 2021);
        assert_eq!(occurrence.month(), 3);
        assert_eq!(occurrence.day(), 13);
        assert_eq!(occurrence.hour(), 9);
        assert_eq!(occurrence.minute(), 30);
        assert_eq!(occurrence.second(), 15);
        assert_eq!(occurrence.to_ical_utc(), "20210313T143015Z");
    }

    #[test]
    fn test_order_compares_instants_across_offsets() {
        let utc = at(14);
        let new_york = Occurrence::from(
            utc.to_utc()
                .with_timezone(&FixedOffset::west_opt(5 * 3600).expect("valid offset")),
        );
        assert_eq!(utc, new_york);
        assert!(at(13) < new_york);
        assert!(at(15) > new_york);
    }

    #[test]
    fn test_checked_add_and_serde() {
        let occurrence = at(9);
        let earlier = occurrence
            .checked_add(TimeDelta::seconds(-1))
            .expect("in range");
        assert!(earlier < occurrence);
        assert_eq!(earlier.second(), 59);

        let json = serde_json::to_value(occurrence).expect("serializes");
        assert!(json.is_string());
        let back: Occurrence = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back, occurrence);
    }
}
