//! Recurring VEVENT model consumed by the expansion driver.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use rrule::RRuleSet;
use serde::Serialize;

use super::alarm::{DisplayAlarm, display_alarms};
use super::datetime::parse_date_time;
use super::duration::parse_duration;
use super::occurrence::Occurrence;
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::expand::{OccurrenceIterator, parse_rule_set};
use crate::rfc::ical::parse::{ContentLine, parse_content_lines};

/// Properties handed to the recurrence engine, DTSTART first.
const RECURRENCE_PROPERTIES: [&str; 4] = ["RRULE", "EXRULE", "RDATE", "EXDATE"];

/// Rule appended to events without RRULE or RDATE so they still expand to DTSTART.
const SINGLE_INSTANCE_RULE: &str = "RRULE:FREQ=DAILY;COUNT=1";

/// An overridden instance (a VEVENT carrying `RECURRENCE-ID`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventException {
    pub start: Occurrence,
    pub end: Occurrence,
    pub summary: Option<String>,
    /// Display alarms of the exception's own VEVENT.
    pub alarms: Vec<DisplayAlarm>,
}

/// Display details for one occurrence, with any exception applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceDetails {
    pub uid: Option<String>,
    /// The unmodified occurrence time produced by the recurrence rule.
    pub recurrence_id: Occurrence,
    pub start: Occurrence,
    pub end: Occurrence,
    pub summary: Option<String>,
    pub is_exception: bool,
    pub alarms: Vec<DisplayAlarm>,
}

/// Property lines of one VEVENT and of each VALARM nested directly in it.
#[derive(Debug, Default)]
struct EventBlock {
    properties: Vec<ContentLine>,
    alarms: Vec<Vec<ContentLine>>,
}

/// ## Summary
/// A parsed event and its recurrence definition.
///
/// The recurrence lines of the master VEVENT are kept as canonical text so
/// iterator state can be compared against, and rebuilt from, the same
/// definition.
#[derive(Debug, Clone)]
pub struct RecurringEvent {
    uid: Option<String>,
    summary: Option<String>,
    start: Occurrence,
    duration: TimeDelta,
    ruleset: String,
    rule_set: RRuleSet,
    recurring: bool,
    alarms: Vec<DisplayAlarm>,
    exceptions: BTreeMap<Occurrence, EventException>,
}

impl RecurringEvent {
    /// ## Summary
    /// Parses an event from a `VCALENDAR`, a bare `VEVENT`, or plain
    /// recurrence lines (`DTSTART`/`RRULE`/`RDATE`/`EXDATE`).
    ///
    /// The first VEVENT without `RECURRENCE-ID` is the master. Every other
    /// VEVENT is related to it as an exception.
    ///
    /// ## Errors
    /// Returns an error if the content lines are malformed, no master VEVENT
    /// exists, DTSTART is missing or invalid, the recurrence rule is rejected
    /// by the recurrence engine, or an exception belongs to another UID.
    pub fn parse(input: &str) -> RfcResult<Self> {
        let lines = parse_content_lines(input)?;
        let blocks = collect_event_blocks(lines)?;

        let (masters, overrides): (Vec<_>, Vec<_>) = blocks
            .into_iter()
            .partition(|block| first(&block.properties, "RECURRENCE-ID").is_none());

        let master = masters
            .into_iter()
            .next()
            .ok_or_else(|| RfcError::ParseError("no VEVENT without RECURRENCE-ID".to_string()))?;

        let mut event = Self::from_master(&master)?;
        for block in &overrides {
            event.relate_exception(block)?;
        }

        tracing::trace!(
            uid = ?event.uid,
            recurring = event.recurring,
            exceptions = event.exceptions.len(),
            "Parsed recurring event"
        );

        Ok(event)
    }

    fn from_master(block: &EventBlock) -> RfcResult<Self> {
        let lines = block.properties.as_slice();
        let dtstart = first(lines, "DTSTART")
            .ok_or_else(|| RfcError::ParseError("VEVENT is missing DTSTART".to_string()))?;
        let start = Occurrence::from(parse_date_time(&dtstart.value, dtstart.param("TZID"))?);
        let duration = event_duration(lines, start)?;

        let recurring = lines
            .iter()
            .any(|line| line.name == "RRULE" || line.name == "RDATE");

        // Floating and DATE starts are pinned to UTC so the engine agrees with `start`
        let dtstart_line = if dtstart.param("TZID").is_some() {
            dtstart.to_canonical()
        } else {
            format!("DTSTART:{}", start.to_ical_utc())
        };

        let mut rule_lines = vec![dtstart_line];
        rule_lines.extend(
            lines
                .iter()
                .filter(|line| RECURRENCE_PROPERTIES.contains(&line.name.as_str()))
                .map(ContentLine::to_canonical),
        );
        if !recurring {
            rule_lines.push(SINGLE_INSTANCE_RULE.to_string());
        } else if first(lines, "RRULE").is_none() {
            // DTSTART is always the first instance (RFC 5545 §3.8.5.2)
            let start_rdate = format!("RDATE:{}", start.to_ical_utc());
            if !rule_lines.contains(&start_rdate) {
                rule_lines.push(start_rdate);
            }
        }

        let ruleset = rule_lines.join("\n");
        let rule_set = parse_rule_set(&ruleset)?;

        Ok(Self {
            uid: first(lines, "UID").map(|line| line.value.clone()),
            summary: first(lines, "SUMMARY").map(|line| line.value.clone()),
            start,
            duration,
            ruleset,
            rule_set,
            recurring,
            alarms: display_alarms(&block.alarms, start, duration),
            exceptions: BTreeMap::new(),
        })
    }

    fn relate_exception(&mut self, block: &EventBlock) -> RfcResult<()> {
        let lines = block.properties.as_slice();
        let uid = first(lines, "UID").map(|line| line.value.as_str());
        if uid != self.uid.as_deref() {
            return Err(RfcError::ValidationError(format!(
                "exception UID {uid:?} does not match event UID {:?}",
                self.uid
            )));
        }

        let Some(recurrence_id_line) = first(lines, "RECURRENCE-ID") else {
            return Err(RfcError::ParseError(
                "exception is missing RECURRENCE-ID".to_string(),
            ));
        };
        let recurrence_id = Occurrence::from(parse_date_time(
            &recurrence_id_line.value,
            recurrence_id_line.param("TZID"),
        )?);

        let start = match first(lines, "DTSTART") {
            Some(line) => Occurrence::from(parse_date_time(&line.value, line.param("TZID"))?),
            None => recurrence_id,
        };

        let has_own_end = first(lines, "DTEND").is_some() || first(lines, "DURATION").is_some();
        let duration = if has_own_end {
            event_duration(lines, start)?
        } else {
            self.duration
        };
        let end = start
            .checked_add(duration)
            .ok_or_else(|| RfcError::ValidationError("exception end out of range".to_string()))?;

        self.exceptions.insert(
            recurrence_id,
            EventException {
                start,
                end,
                summary: first(lines, "SUMMARY")
                    .map(|line| line.value.clone())
                    .or_else(|| self.summary.clone()),
                alarms: display_alarms(&block.alarms, start, duration),
            },
        );
        Ok(())
    }

    /// Returns a fresh iterator positioned before the first occurrence.
    #[must_use]
    pub fn iterator(&self) -> OccurrenceIterator {
        OccurrenceIterator::new(&self.rule_set, self.ruleset.clone(), self.start)
    }

    /// ## Summary
    /// Resolves start and end for an occurrence produced by this event's
    /// iterator, applying a matching exception if one exists.
    #[must_use]
    pub fn occurrence_details(&self, occurrence: &Occurrence) -> OccurrenceDetails {
        if let Some(exception) = self.exceptions.get(occurrence) {
            return OccurrenceDetails {
                uid: self.uid.clone(),
                recurrence_id: *occurrence,
                start: exception.start,
                end: exception.end,
                summary: exception.summary.clone(),
                is_exception: true,
                alarms: exception.alarms.clone(),
            };
        }

        OccurrenceDetails {
            uid: self.uid.clone(),
            recurrence_id: *occurrence,
            start: *occurrence,
            end: occurrence.checked_add(self.duration).unwrap_or(*occurrence),
            summary: self.summary.clone(),
            is_exception: false,
            alarms: self.alarms.clone(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[must_use]
    pub const fn start(&self) -> Occurrence {
        self.start
    }

    #[must_use]
    pub const fn duration(&self) -> TimeDelta {
        self.duration
    }

    /// Canonical recurrence definition handed to the recurrence engine.
    #[must_use]
    pub fn ruleset(&self) -> &str {
        &self.ruleset
    }

    /// Whether the master VEVENT carries RRULE or RDATE.
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.recurring
    }

    /// Display alarms of the master VEVENT, as offsets from each occurrence.
    #[must_use]
    pub fn alarms(&self) -> &[DisplayAlarm] {
        &self.alarms
    }

    #[must_use]
    pub const fn exceptions(&self) -> &BTreeMap<Occurrence, EventException> {
        &self.exceptions
    }
}

fn first<'a>(lines: &'a [ContentLine], name: &str) -> Option<&'a ContentLine> {
    lines.iter().find(|line| line.name == name)
}

/// DTEND minus DTSTART, else DURATION, else zero (RFC 5545 §3.6.1).
fn event_duration(lines: &[ContentLine], start: Occurrence) -> RfcResult<TimeDelta> {
    if let Some(dtend) = first(lines, "DTEND") {
        let end = parse_date_time(&dtend.value, dtend.param("TZID"))?;
        let duration = end.signed_duration_since(*start.as_datetime());
        if duration < TimeDelta::zero() {
            return Err(RfcError::ValidationError(format!(
                "DTEND {} is before DTSTART {start}",
                end.to_rfc3339()
            )));
        }
        Ok(duration)
    } else if let Some(line) = first(lines, "DURATION") {
        let duration = parse_duration(&line.value)?;
        if duration < TimeDelta::zero() {
            return Err(RfcError::ValidationError(format!(
                "negative event DURATION {:?}",
                line.value
            )));
        }
        Ok(duration)
    } else {
        Ok(TimeDelta::zero())
    }
}

/// ## Summary
/// Groups property lines by VEVENT, keeping the VALARMs nested directly in
/// each one and ignoring any other nested component.
///
/// Input without any `BEGIN` line is treated as the body of a single VEVENT.
fn collect_event_blocks(lines: Vec<ContentLine>) -> RfcResult<Vec<EventBlock>> {
    let mut blocks = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EventBlock> = None;
    let mut loose = Vec::new();
    let mut saw_component = false;

    for line in lines {
        match line.name.as_str() {
            "BEGIN" => {
                let kind = line.value.trim().to_ascii_uppercase();
                saw_component = true;
                if kind == "VEVENT" && current.is_none() {
                    current = Some(EventBlock::default());
                } else if kind == "VALARM" && stack.last().is_some_and(|open| open == "VEVENT") {
                    if let Some(block) = current.as_mut() {
                        block.alarms.push(Vec::new());
                    }
                }
                stack.push(kind);
            }
            "END" => {
                let kind = line.value.trim().to_ascii_uppercase();
                if stack.pop().as_deref() != Some(kind.as_str()) {
                    return Err(RfcError::ParseError(format!(
                        "line {}: unexpected END:{kind}",
                        line.line
                    )));
                }
                if kind == "VEVENT" {
                    if let Some(block) = current.take() {
                        blocks.push(block);
                    }
                }
            }
            _ => match (stack.as_slice(), current.as_mut()) {
                ([.., open], Some(block)) if open == "VEVENT" => block.properties.push(line),
                ([.., parent, open], Some(block)) if parent == "VEVENT" && open == "VALARM" => {
                    if let Some(alarm) = block.alarms.last_mut() {
                        alarm.push(line);
                    }
                }
                ([], _) => loose.push(line),
                _ => {}
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(RfcError::ParseError(format!("unterminated component {open}")));
    }

    if !saw_component {
        blocks.push(EventBlock {
            properties: loose,
            alarms: Vec::new(),
        });
    }

    Ok(blocks)
}
