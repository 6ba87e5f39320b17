//! iCalendar DATE and DATE-TIME value parsing (RFC 5545 §3.3.4, §3.3.5).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{RfcError, RfcResult};

/// ## Summary
/// Parses a DATE or DATE-TIME value into an offset-aware instant.
///
/// Handles the three DATE-TIME forms:
/// - UTC (`19980119T070000Z`)
/// - zoned, via the `TZID` parameter (resolved with `chrono-tz`)
/// - floating (no `Z`, no `TZID`), interpreted as UTC
///
/// DATE values (`19980118`) are taken as midnight in the same zone.
///
/// ## Errors
/// Returns `RfcError::ParseError` if the value is malformed, the `TZID` is
/// unknown, or the local time does not exist in that zone.
pub fn parse_date_time(value: &str, tzid: Option<&str>) -> RfcResult<DateTime<FixedOffset>> {
    let value = value.trim();

    let (naive, is_utc) = if let Some(utc_value) = value.strip_suffix(['Z', 'z']) {
        (parse_naive(utc_value)?, true)
    } else {
        (parse_naive(value)?, false)
    };

    if is_utc {
        return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
    }

    let Some(tzid) = tzid else {
        // Floating time: interpret as UTC
        return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
    };

    let tz: chrono_tz::Tz = tzid
        .parse()
        .map_err(|err| RfcError::ParseError(format!("unknown TZID {tzid:?}: {err}")))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| {
            RfcError::ParseError(format!("local time {naive} does not exist in {tzid}"))
        })
}

fn parse_naive(value: &str) -> RfcResult<NaiveDateTime> {
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|err| RfcError::ParseError(format!("invalid DATE {value:?}: {err}")))?;
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map_err(|err| RfcError::ParseError(format!("invalid DATE-TIME {value:?}: {err}")))
}
