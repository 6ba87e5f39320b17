//! Windowed, resumable and bounded expansion of recurring events.

use cadence_core::config::ExpansionConfig;
use cadence_core::constants::DEFAULT_FOR_EACH_LIMIT;
use cadence_rfc::rfc::ical::core::{Occurrence, RecurringEvent};
use cadence_rfc::rfc::ical::expand::{IteratorState, OccurrenceIterator};


/// ## Summary
/// Bounds applied to emitted occurrences.
///
/// `min_date` is exclusive and `max_date` is inclusive. Either may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionWindow {
    pub min_date: Option<Occurrence>,
    pub max_date: Option<Occurrence>,
}

impl ExpansionWindow {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            min_date: None,
            max_date: None,
        }
    }

    #[must_use]
    pub fn with_min_date(mut self, min_date: Occurrence) -> Self {
        self.min_date = Some(min_date);
        self
    }

    #[must_use]
    pub fn with_max_date(mut self, max_date: Occurrence) -> Self {
        self.max_date = Some(max_date);
        self
    }

    fn is_after_min(&self, occurrence: Occurrence) -> bool {
        self.min_date.is_none_or(|min| occurrence > min)
    }

    fn is_beyond_max(&self, occurrence: Occurrence) -> bool {
        self.max_date.is_some_and(|max| occurrence > max)
    }

    fn reaches_max(&self, occurrence: Occurrence) -> bool {
        self.max_date.is_some_and(|max| occurrence >= max)
    }
}

/// Where a `for_each` call picks up from.
#[derive(Debug, Clone, Default)]
pub enum PriorIterator {
    /// Start before the first occurrence.
    #[default]
    Fresh,
    /// Continue an iterator returned by an earlier call.
    Live(Box<OccurrenceIterator>),
    /// Rebuild from a captured state.
    Snapshot(IteratorState),
    /// Rebuild from state loaded out of storage.
    Stored(serde_json::Value),
}

impl From<OccurrenceIterator> for PriorIterator {
    fn from(iterator: OccurrenceIterator) -> Self {
        Self::Live(Box::new(iterator))
    }
}

impl From<IteratorState> for PriorIterator {
    fn from(state: IteratorState) -> Self {
        Self::Snapshot(state)
    }
}

impl From<serde_json::Value> for PriorIterator {
    fn from(value: serde_json::Value) -> Self {
        Self::Stored(value)
    }
}

impl From<Option<serde_json::Value>> for PriorIterator {
    fn from(value: Option<serde_json::Value>) -> Self {
        value.map_or(Self::Fresh, Self::Stored)
    }
}

impl PriorIterator {
    /// ## Summary
    /// Produces the iterator to drive for `event`.
    ///
    /// Saved state that cannot be rebuilt, or that was captured from a
    /// different recurrence definition, is dropped in favour of a fresh
    /// iterator.
    fn resolve(self, event: &RecurringEvent) -> OccurrenceIterator {
        let restored = match self {
            Self::Fresh => return event.iterator(),
            Self::Live(iterator) => return *iterator,
            Self::Snapshot(state) => OccurrenceIterator::from_state(state),
            Self::Stored(value) => OccurrenceIterator::from_value(value),
        };

        match restored {
            Ok(iterator) if iterator.ruleset() == event.ruleset() => iterator,
            Ok(iterator) => {
                tracing::warn!(
                    uid = ?event.uid(),
                    saved = %iterator.ruleset(),
                    current = %event.ruleset(),
                    "Saved iterator belongs to another recurrence, starting over"
                );
                event.iterator()
            }
            Err(err) => {
                tracing::debug!(
                    uid = ?event.uid(),
                    error = %err,
                    "Discarding unusable iterator state"
                );
                event.iterator()
            }
        }
    }
}

/// ## Summary
/// Drives occurrence iterators through a window with a per-call step cap.
///
/// The cap is the number of `next()` calls one [`for_each`](Self::for_each)
/// may make, whether or not the occurrence ends up emitted. It keeps rules
/// without an end from doing unbounded work in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurExpansion {
    limit: usize,
}

impl Default for RecurExpansion {
    fn default() -> Self {
        Self::new(DEFAULT_FOR_EACH_LIMIT)
    }
}

impl RecurExpansion {
    /// Creates a driver with the given cap. A cap of zero is raised to one.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit: clamp_limit(limit),
        }
    }

    #[must_use]
    pub const fn from_config(config: &ExpansionConfig) -> Self {
        Self::new(config.for_each_limit)
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub const fn set_limit(&mut self, limit: usize) {
        self.limit = clamp_limit(limit);
    }

    /// Restores the built-in default cap.
    pub const fn reset_limit(&mut self) {
        self.limit = DEFAULT_FOR_EACH_LIMIT;
    }

    /// ## Summary
    /// Emits the occurrences of `event` that fall inside `window`, in
    /// increasing order, starting from `prior`.
    ///
    /// Stops when the recurrence is exhausted, the next occurrence lies past
    /// `max_date`, an occurrence equal to `max_date` has been emitted, or the
    /// step cap is reached. An occurrence past `max_date` is left unconsumed
    /// so the returned iterator resumes exactly there.
    ///
    /// The returned iterator is complete only if the recurrence is exhausted.
    pub fn for_each<F>(
        &self,
        event: &RecurringEvent,
        prior: impl Into<PriorIterator>,
        mut on_occurrence: F,
        window: &ExpansionWindow,
    ) -> OccurrenceIterator
    where
        F: FnMut(&Occurrence),
    {
        let limit = self.limit;
        let mut iterator = prior.into().resolve(event);
        let mut steps = 0_usize;
        let mut emitted = 0_usize;

        while steps < limit {
            let Some(&upcoming) = iterator.peek() else {
                break;
            };
            if window.is_beyond_max(upcoming) {
                tracing::trace!(next = %upcoming, "Next occurrence is past max_date");
                break;
            }

            let Some(occurrence) = iterator.next() else {
                break;
            };
            steps += 1;

            if !window.is_after_min(occurrence) {
                continue;
            }

            on_occurrence(&occurrence);
            emitted += 1;

            if window.reaches_max(occurrence) {
                break;
            }
        }

        tracing::debug!(
            uid = ?event.uid(),
            steps,
            emitted,
            limit,
            complete = iterator.is_complete(),
            last = ?iterator.last_occurrence().map(ToString::to_string),
            "Expansion pass finished"
        );

        iterator
    }
}

const fn clamp_limit(limit: usize) -> usize {
    if limit == 0 { 1 } else { limit }
}
