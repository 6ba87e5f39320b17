//! Display reminders attached to an event (VALARM, RFC 5545 §3.6.6).

use chrono::TimeDelta;
use serde::Serialize;

use super::datetime::parse_date_time;
use super::duration::parse_duration;
use super::occurrence::Occurrence;
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::parse::ContentLine;

const DISPLAY_ACTION: &str = "DISPLAY";

/// A reminder shown to the user, relative to the start of its occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayAlarm {
    pub action: String,
    /// Seconds from the occurrence start; negative means before it.
    pub trigger: i64,
}

/// ## Summary
/// Collects one [`DisplayAlarm`] per `TRIGGER` of every `ACTION:DISPLAY`
/// VALARM in `alarms`.
///
/// Absolute (`VALUE=DATE-TIME`) triggers are converted to an offset from
/// `start`. Relative triggers with `RELATED=END` are shifted by `duration`.
/// Triggers that do not parse are skipped.
pub(crate) fn display_alarms(
    alarms: &[Vec<ContentLine>],
    start: Occurrence,
    duration: TimeDelta,
) -> Vec<DisplayAlarm> {
    alarms
        .iter()
        .filter(|lines| {
            lines.iter().any(|line| {
                line.name == "ACTION" && line.value.trim().eq_ignore_ascii_case(DISPLAY_ACTION)
            })
        })
        .flat_map(|lines| lines.iter().filter(|line| line.name == "TRIGGER"))
        .filter_map(|trigger| match trigger_offset(trigger, start, duration) {
            Ok(seconds) => Some(DisplayAlarm {
                action: DISPLAY_ACTION.to_string(),
                trigger: seconds,
            }),
            Err(err) => {
                tracing::warn!(line = trigger.line, error = %err, "Skipping unusable alarm trigger");
                None
            }
        })
        .collect()
}

fn trigger_offset(trigger: &ContentLine, start: Occurrence, duration: TimeDelta) -> RfcResult<i64> {
    let absolute = trigger
        .param("VALUE")
        .is_some_and(|value| value.eq_ignore_ascii_case("DATE-TIME"));
    if absolute {
        let at = parse_date_time(&trigger.value, None)?;
        return Ok(at.signed_duration_since(*start.as_datetime()).num_seconds());
    }

    let offset = parse_duration(&trigger.value)?;
    let related_to_end = trigger
        .param("RELATED")
        .is_some_and(|related| related.eq_ignore_ascii_case("END"));
    if related_to_end {
        return offset
            .checked_add(&duration)
            .map(|shifted| shifted.num_seconds())
            .ok_or_else(|| RfcError::ValidationError("alarm trigger out of range".to_string()));
    }
    Ok(offset.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::parse::parse_content_lines;

    fn valarm(body: &str) -> Vec<ContentLine> {
        parse_content_lines(body).expect("valid lines")
    }

    fn start() -> Occurrence {
        Occurrence::from(parse_date_time("20120301T120000Z", None).expect("valid"))
    }

    #[test]
    fn test_relative_and_absolute_triggers() {
        let alarms = [valarm(
            "ACTION:DISPLAY\nTRIGGER:-PT30M\nTRIGGER;VALUE=DATE-TIME:20120302T000000Z",
        )];
        let found = display_alarms(&alarms, start(), TimeDelta::hours(1));
        let triggers: Vec<i64> = found.iter().map(|alarm| alarm.trigger).collect();
        assert_eq!(triggers, vec![-1800, 12 * 3600]);
        assert!(found.iter().all(|alarm| alarm.action == "DISPLAY"));
    }

    #[test]
    fn test_related_end_adds_duration() {
        let alarms = [valarm("ACTION:display\nTRIGGER;RELATED=END:-PT5M")];
        let found = display_alarms(&alarms, start(), TimeDelta::hours(1));
        assert_eq!(found[0].trigger, 55 * 60);
    }

    #[test]
    fn test_other_actions_and_bad_triggers_are_skipped() {
        let alarms = [
            valarm("ACTION:EMAIL\nTRIGGER:-PT5M"),
            valarm("ACTION:AUDIO\nTRIGGER:-PT1M"),
            valarm("ACTION:DISPLAY\nTRIGGER:soon\nTRIGGER:PT0S"),
            valarm("TRIGGER:-PT10M"),
        ];
        let found = display_alarms(&alarms, start(), TimeDelta::zero());
        assert_eq!(
            found,
            vec![DisplayAlarm {
                action: "DISPLAY".to_string(),
                trigger: 0,
            }]
        );
    }
}
