//! Expansion of stored calendar objects.
//!
//! Parses iCalendar text, runs it through [`RecurExpansion`], resolves
//! exceptions for each occurrence, and returns the state a caller persists to
//! continue later.

use cadence_rfc::rfc::ical::core::{Occurrence, OccurrenceDetails, RecurringEvent};
use cadence_rfc::rfc::ical::expand::IteratorState;
use serde::{Deserialize, Serialize};

use super::expansion::{ExpansionWindow, PriorIterator, RecurExpansion};
use crate::error::ServiceResult;

/// Options for a single [`expand_recurring_event`] call.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// State returned by an earlier call, as stored.
    pub iterator: Option<serde_json::Value>,
    /// Exclusive lower bound.
    pub min_date: Option<Occurrence>,
    /// Inclusive upper bound.
    pub max_date: Option<Occurrence>,
}

/// Outcome of one expansion pass over an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedEvent {
    pub uid: Option<String>,
    /// State to hand back through [`ExpandOptions::iterator`].
    pub iterator: IteratorState,
    /// The last occurrence delivered to the callback in this call.
    pub last_recurrence_id: Option<Occurrence>,
    pub complete: bool,
}

/// A calendar object as persisted between sync passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredComponent {
    pub event_id: String,
    pub ical: String,
    #[serde(default)]
    pub iterator: Option<serde_json::Value>,
    #[serde(default)]
    pub last_recurrence_id: Option<Occurrence>,
    #[serde(default)]
    pub complete: bool,
}

impl StoredComponent {
    #[must_use]
    pub fn new(event_id: impl Into<String>, ical: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            ical: ical.into(),
            iterator: None,
            last_recurrence_id: None,
            complete: false,
        }
    }
}

/// ## Summary
/// Parses `ical` and delivers the details of every occurrence inside the
/// window to `on_occurrence`.
///
/// Bad saved iterator state is not an error; expansion restarts from the
/// first occurrence and `min_date` keeps already-seen occurrences out.
///
/// ## Errors
/// Returns `ServiceError::RfcError` if the iCalendar text cannot be parsed.
pub fn expand_recurring_event<F>(
    ical: &str,
    options: &ExpandOptions,
    expansion: &RecurExpansion,
    mut on_occurrence: F,
) -> ServiceResult<ExpandedEvent>
where
    F: FnMut(OccurrenceDetails),
{
    let event = RecurringEvent::parse(ical)?;

    let window = ExpansionWindow {
        min_date: options.min_date,
        max_date: options.max_date,
    };
    let prior = PriorIterator::from(options.iterator.clone());

    let mut last_emitted = None;
    let iterator = expansion.for_each(
        &event,
        prior,
        |occurrence| {
            last_emitted = Some(*occurrence);
            on_occurrence(event.occurrence_details(occurrence));
        },
        &window,
    );

    Ok(ExpandedEvent {
        uid: event.uid().map(str::to_string),
        iterator: iterator.to_state(),
        last_recurrence_id: last_emitted,
        complete: iterator.is_complete(),
    })
}

/// ## Summary
/// Continues expansion of stored components up to `max_date`.
///
/// Each component resumes from its saved iterator, with its
/// `last_recurrence_id` as the exclusive lower bound. Completed components
/// are returned unchanged. One component failing does not stop the others;
/// results are returned in input order.
pub fn expand_components<F>(
    components: &[StoredComponent],
    max_date: Occurrence,
    expansion: &RecurExpansion,
    mut on_occurrence: F,
) -> Vec<ServiceResult<StoredComponent>>
where
    F: FnMut(&str, OccurrenceDetails),
{
    components
        .iter()
        .map(|component| {
            if component.complete {
                tracing::trace!(event_id = %component.event_id, "Component already fully expanded");
                return Ok(component.clone());
            }

            let options = ExpandOptions {
                iterator: component.iterator.clone(),
                min_date: component.last_recurrence_id,
                max_date: Some(max_date),
            };

            let expanded = expand_recurring_event(&component.ical, &options, expansion, |details| {
                on_occurrence(&component.event_id, details);
            })
            .inspect_err(|err| {
                tracing::warn!(
                    event_id = %component.event_id,
                    error = %err,
                    "Failed to expand stored component"
                );
            })?;

            Ok(StoredComponent {
                event_id: component.event_id.clone(),
                ical: component.ical.clone(),
                iterator: Some(serde_json::to_value(&expanded.iterator)?),
                last_recurrence_id: expanded
                    .last_recurrence_id
                    .or(component.last_recurrence_id),
                complete: expanded.complete,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKLY_WITH_EXCEPTION: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
SUMMARY:Standup\r\n\
DTSTART:20120102T090000Z\r\n\
DURATION:PT15M\r\n\
RRULE:FREQ=WEEKLY;COUNT=4\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
RECURRENCE-ID:20120109T090000Z\r\n\
DTSTART:20120109T100000Z\r\n\
DTEND:20120109T103000Z\r\n\
SUMMARY:Standup (moved)\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn expand_all(ical: &str, options: &ExpandOptions) -> (Vec<OccurrenceDetails>, ExpandedEvent) {
        let mut details = Vec::new();
        let expanded = expand_recurring_event(ical, options, &RecurExpansion::default(), |d| {
            details.push(d);
        })
        .expect("expands");
        (details, expanded)
    }

    #[test_log::test]
    fn test_exception_details_are_applied() {
        let (details, expanded) = expand_all(WEEKLY_WITH_EXCEPTION, &ExpandOptions::default());

        assert_eq!(details.len(), 4);
        assert!(expanded.complete);
        assert_eq!(expanded.uid.as_deref(), Some("standup"));

        let moved = &details[1];
        assert!(moved.is_exception);
        assert_eq!(moved.recurrence_id.to_ical_utc(), "20120109T090000Z");
        assert_eq!(moved.start.to_ical_utc(), "20120109T100000Z");
        assert_eq!(moved.end.to_ical_utc(), "20120109T103000Z");
        assert_eq!(moved.summary.as_deref(), Some("Standup (moved)"));

        let regular = &details[2];
        assert!(!regular.is_exception);
        assert_eq!(regular.end.to_ical_utc(), "20120116T091500Z");
        assert_eq!(regular.summary.as_deref(), Some("Standup"));
    }

    #[test_log::test]
    fn test_saved_iterator_resumes() {
        let first_options = ExpandOptions {
            max_date: Some(
                RecurringEvent::parse(WEEKLY_WITH_EXCEPTION)
                    .expect("parses")
                    .start()
                    .checked_add(chrono::TimeDelta::weeks(1))
                    .expect("in range"),
            ),
            ..ExpandOptions::default()
        };
        let (first, expanded) = expand_all(WEEKLY_WITH_EXCEPTION, &first_options);
        assert_eq!(first.len(), 2);
        assert!(!expanded.complete);

        let resume = ExpandOptions {
            iterator: Some(serde_json::to_value(&expanded.iterator).expect("serializes")),
            ..ExpandOptions::default()
        };
        let (rest, expanded) = expand_all(WEEKLY_WITH_EXCEPTION, &resume);
        let ids: Vec<String> = rest.iter().map(|d| d.recurrence_id.to_ical_utc()).collect();
        assert_eq!(ids, vec!["20120116T090000Z", "20120123T090000Z"]);
        assert!(expanded.complete);
    }

    #[test_log::test]
    fn test_last_recurrence_id_is_last_delivered_occurrence() {
        const DAILY: &str = "DTSTART:20120101T090000Z\nRRULE:FREQ=DAILY";
        let capped = RecurExpansion::new(3);

        // The cap is spent on occurrences below min_date; none are delivered
        let skipping = ExpandOptions {
            min_date: Some(
                RecurringEvent::parse(DAILY)
                    .expect("parses")
                    .start()
                    .checked_add(chrono::TimeDelta::days(9))
                    .expect("in range"),
            ),
            ..ExpandOptions::default()
        };
        let mut delivered = Vec::new();
        let expanded = expand_recurring_event(DAILY, &skipping, &capped, |d| delivered.push(d))
            .expect("expands");
        assert!(delivered.is_empty());
        assert_eq!(
            expanded.iterator.last.map(|o| o.to_ical_utc()).as_deref(),
            Some("20120103T090000Z")
        );
        assert!(expanded.last_recurrence_id.is_none());

        let expanded =
            expand_recurring_event(DAILY, &ExpandOptions::default(), &capped, |d| delivered.push(d))
                .expect("expands");
        assert_eq!(delivered.len(), 3);
        assert_eq!(
            expanded.last_recurrence_id,
            delivered.last().map(|d| d.recurrence_id)
        );
    }

    #[test]
    fn test_unparsable_ical_is_an_error() {
        let result = expand_recurring_event(
            "BEGIN:VEVENT\nSUMMARY:no start\nEND:VEVENT",
            &ExpandOptions::default(),
            &RecurExpansion::default(),
            |_| {},
        );
        assert!(result.is_err());
    }

    #[test_log::test]
    fn test_expand_components_continues_each_component() {
        let daily = StoredComponent::new(
            "daily",
            "BEGIN:VEVENT\nUID:daily\nDTSTART:20120101T080000Z\nRRULE:FREQ=DAILY\nEND:VEVENT",
        );
        let broken = StoredComponent::new("broken", "BEGIN:VEVENT\nUID:x\nEND:VEVENT");
        let weekly = StoredComponent::new("weekly", WEEKLY_WITH_EXCEPTION);

        let expansion = RecurExpansion::default();
        let first_max = Occurrence::from(
            chrono::DateTime::parse_from_rfc3339("2012-01-03T08:00:00Z").expect("valid"),
        );

        let mut seen: Vec<(String, String)> = Vec::new();
        let results = expand_components(
            &[daily, broken, weekly],
            first_max,
            &expansion,
            |event_id, details| seen.push((event_id.to_string(), details.recurrence_id.to_ical_utc())),
        );

        assert_eq!(results.len(), 3);
        assert!(results[1].is_err());
        assert_eq!(seen.iter().filter(|(id, _)| id == "daily").count(), 3);
        assert_eq!(seen.iter().filter(|(id, _)| id == "weekly").count(), 1);

        let daily = results[0].as_ref().expect("daily expands").clone();
        assert_eq!(
            daily.last_recurrence_id.map(|o| o.to_ical_utc()).as_deref(),
            Some("20120103T080000Z")
        );
        assert!(!daily.complete);

        let second_max = Occurrence::from(
            chrono::DateTime::parse_from_rfc3339("2012-01-05T08:00:00Z").expect("valid"),
        );
        seen.clear();
        let results = expand_components(&[daily], second_max, &expansion, |event_id, details| {
            seen.push((event_id.to_string(), details.recurrence_id.to_ical_utc()));
        });
        assert!(results[0].is_ok());
        let ids: Vec<&str> = seen.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, vec!["20120104T080000Z", "20120105T080000Z"]);
    }

    #[test]
    fn test_complete_component_is_left_alone() {
        let mut component = StoredComponent::new("done", "not even ical");
        component.complete = true;

        let results = expand_components(
            std::slice::from_ref(&component),
            Occurrence::from(chrono::Utc::now()),
            &RecurExpansion::default(),
            |_, _| panic!("no occurrences expected"),
        );
        assert_eq!(results[0].as_ref().expect("unchanged"), &component);
    }

    #[test]
    fn test_stored_component_reads_minimal_json() {
        let component: StoredComponent = serde_json::from_value(serde_json::json!({
            "event_id": "a",
            "ical": "DTSTART:20120101T000000Z"
        }))
        .expect("deserializes");
        assert!(component.iterator.is_none());
        assert!(component.last_recurrence_id.is_none());
        assert!(!component.complete);
    }
}
