//! Resumable cursor over the occurrences of one recurrence set.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use cadence_core::constants::FETCH_BATCH_SIZE;
use rrule::{RRuleSet, RRuleSetIter};
use serde::{Deserialize, Serialize};

use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::core::{Occurrence, RecurringEvent};

/// ## Summary
/// Plain, self-contained snapshot of an [`OccurrenceIterator`].
///
/// Holds the canonical recurrence definition and the cursor position, never
/// live engine state, so it can be stored as JSON and handed back later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorState {
    /// Canonical `DTSTART`/`RRULE`/`RDATE`/`EXDATE` lines.
    pub ruleset: String,
    pub dtstart: Occurrence,
    /// Most recently produced occurrence.
    pub last: Option<Occurrence>,
    pub complete: bool,
}

/// ## Summary
/// Cursor over the (possibly infinite) occurrence sequence of one event.
///
/// Occurrences are pulled in batches from a live `rrule` iterator that
/// persists across refills, so each refill costs only the batch it produces.
/// The batch buffer and the live source are a cache: rebuilding from
/// [`IteratorState`] replays the rule from DTSTART once, skipping everything
/// up to [`last_occurrence`](Self::last_occurrence), and yields the same
/// sequence.
#[derive(Debug, Clone)]
pub struct OccurrenceIterator {
    source: RRuleSetIter,
    ruleset: String,
    dtstart: Occurrence,
    last: Option<Occurrence>,
    complete: bool,
    pending: VecDeque<Occurrence>,
}

impl OccurrenceIterator {
    pub(crate) fn new(rule_set: &RRuleSet, ruleset: String, dtstart: Occurrence) -> Self {
        Self {
            source: rule_set.into_iter(),
            ruleset,
            dtstart,
            last: None,
            complete: false,
            pending: VecDeque::new(),
        }
    }

    /// True once the recurrence set has been fully consumed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// The most recently produced occurrence.
    #[must_use]
    pub const fn last_occurrence(&self) -> Option<&Occurrence> {
        self.last.as_ref()
    }

    #[must_use]
    pub const fn dtstart(&self) -> Occurrence {
        self.dtstart
    }

    #[must_use]
    pub fn ruleset(&self) -> &str {
        &self.ruleset
    }

    /// ## Summary
    /// Returns the upcoming occurrence without advancing the cursor.
    ///
    /// `last` is left untouched; discovering that nothing remains marks the
    /// iterator complete.
    pub fn peek(&mut self) -> Option<&Occurrence> {
        if self.complete {
            return None;
        }

        if self.pending.is_empty() {
            self.refill();
        }

        if self.pending.is_empty() {
            tracing::trace!(last = ?self.last, "Recurrence set exhausted");
            self.complete = true;
        }

        self.pending.front()
    }

    fn refill(&mut self) {
        let floor = self.last;
        let mut previous = floor;
        let mut skipped = 0_usize;

        while self.pending.len() < FETCH_BATCH_SIZE {
            let Some(date) = self.source.next() else {
                break;
            };
            let occurrence = Occurrence::from(date);

            // Only a rebuilt source replays dates up to `last`; a coinciding
            // RDATE and RRULE instance shows up as an equal neighbour
            if previous.is_some_and(|prev| occurrence <= prev) {
                skipped += 1;
                continue;
            }
            previous = Some(occurrence);
            self.pending.push_back(occurrence);
        }

        tracing::trace!(
            fetched = self.pending.len(),
            skipped,
            after = ?floor,
            "Refilled occurrence buffer"
        );
    }

    /// Captures the cursor position as a plain value.
    #[must_use]
    pub fn to_state(&self) -> IteratorState {
        IteratorState {
            ruleset: self.ruleset.clone(),
            dtstart: self.dtstart,
            last: self.last,
            complete: self.complete,
        }
    }

    /// ## Summary
    /// Captures the cursor position as JSON.
    ///
    /// ## Errors
    /// Returns `RfcError::Json` if serialization fails.
    pub fn to_value(&self) -> RfcResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_state())?)
    }

    /// ## Summary
    /// Rebuilds an iterator that continues right after `state.last`.
    ///
    /// The rule is replayed from DTSTART up to `last` on the first refill.
    ///
    /// ## Errors
    /// Returns an error if the ruleset does not parse or is not in canonical
    /// form, `dtstart` disagrees with the ruleset, or `last` precedes
    /// `dtstart`.
    pub fn from_state(state: IteratorState) -> RfcResult<Self> {
        let event = RecurringEvent::parse(&state.ruleset)?;

        if event.ruleset() != state.ruleset {
            return Err(RfcError::InvalidState(
                "ruleset is not in canonical form".to_string(),
            ));
        }
        if event.start() != state.dtstart {
            return Err(RfcError::InvalidState(format!(
                "dtstart {} does not match ruleset DTSTART {}",
                state.dtstart,
                event.start()
            )));
        }
        if state.last.is_some_and(|last| last < state.dtstart) {
            return Err(RfcError::InvalidState(
                "last occurrence precedes dtstart".to_string(),
            ));
        }

        let mut iterator = event.iterator();
        iterator.last = state.last;
        iterator.complete = state.complete;
        Ok(iterator)
    }

    /// ## Summary
    /// Rebuilds an iterator from a stored JSON value.
    ///
    /// ## Errors
    /// Returns `RfcError::Json` if the value does not have the
    /// [`IteratorState`] shape, or any error of [`Self::from_state`].
    pub fn from_value(value: serde_json::Value) -> RfcResult<Self> {
        Self::from_state(serde_json::from_value(value)?)
    }
}

impl Iterator for OccurrenceIterator {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        self.peek()?;
        let occurrence = self.pending.pop_front()?;
        self.last = Some(occurrence);
        Some(occurrence)
    }
}

impl FusedIterator for OccurrenceIterator {}

/// ## Summary
/// Parses canonical recurrence lines with the `rrule` crate.
///
/// ## Errors
/// Returns `RfcError::RRuleError` if the engine rejects the definition.
pub(crate) fn parse_rule_set(ruleset: &str) -> RfcResult<RRuleSet> {
    ruleset
        .parse::<RRuleSet>()
        .map_err(|err| RfcError::RRuleError(err.to_string()))
}
