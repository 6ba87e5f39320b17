//! iCalendar DURATION value parsing (RFC 5545 §3.3.6).

use chrono::TimeDelta;

use crate::error::{RfcError, RfcResult};

/// ## Summary
/// Parses a DURATION value such as `PT1H30M`, `-P1D` or `P2W` into a `TimeDelta`.
///
/// ## Errors
/// Returns `RfcError::ParseError` if the value does not follow the
/// `[+-]P[nW][nD][T[nH][nM][nS]]` grammar.
pub fn parse_duration(value: &str) -> RfcResult<TimeDelta> {
    let invalid = || RfcError::ParseError(format!("invalid DURATION {value:?}"));

    let trimmed = value.trim();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let rest = rest.strip_prefix(['P', 'p']).ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = c.to_ascii_uppercase();
        if unit == 'T' {
            if in_time || !digits.is_empty() {
                return Err(invalid());
            }
            in_time = true;
            continue;
        }

        let amount: i64 = digits
            .parse()
            .map_err(|err| RfcError::ParseError(format!("invalid DURATION {value:?}: {err}")))?;
        digits.clear();

        let delta = match (unit, in_time) {
            ('W', false) => TimeDelta::try_weeks(amount),
            ('D', false) => TimeDelta::try_days(amount),
            ('H', true) => TimeDelta::try_hours(amount),
            ('M', true) => TimeDelta::try_minutes(amount),
            ('S', true) => TimeDelta::try_seconds(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;

        total = total.checked_add(&delta).ok_or_else(invalid)?;
        saw_component = true;
    }

    if !digits.is_empty() || !saw_component {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_components() {
        assert_eq!(
            parse_duration("PT1H30M").expect("valid"),
            TimeDelta::minutes(90)
        );
        assert_eq!(parse_duration("PT45S").expect("valid"), TimeDelta::seconds(45));
    }

    #[test]
    fn test_parse_date_components() {
        assert_eq!(parse_duration("P2W").expect("valid"), TimeDelta::weeks(2));
        assert_eq!(
            parse_duration("P1DT2H").expect("valid"),
            TimeDelta::hours(26)
        );
    }

    #[test]
    fn test_parse_sign() {
        assert_eq!(parse_duration("-P1D").expect("valid"), TimeDelta::days(-1));
        assert_eq!(parse_duration("+PT5M").expect("valid"), TimeDelta::minutes(5));
    }

    #[test]
    fn test_parse_invalid() {
        for value in ["", "P", "PT", "1H", "P1H", "PT1D", "PT1H2", "P1DTT1H", "PXD"] {
            assert!(parse_duration(value).is_err(), "{value:?} should be rejected");
        }
    }
}
