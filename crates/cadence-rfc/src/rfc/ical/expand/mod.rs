//! Recurrence expansion for iCalendar components.
//!
//! Wraps the `rrule` crate's rule sets in a cursor that can be paused,
//! serialized, and resumed without repeating or skipping occurrences.

mod iterator;

pub use iterator::{IteratorState, OccurrenceIterator};
pub(crate) use iterator::parse_rule_set;
