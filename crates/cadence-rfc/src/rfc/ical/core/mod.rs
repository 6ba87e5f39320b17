//! iCalendar core models (RFC 5545).
//!
//! Value parsing for DATE, DATE-TIME and DURATION, the [`Occurrence`] type
//! produced by expansion, and the [`RecurringEvent`] it is expanded from.

mod alarm;
mod datetime;
mod duration;
mod event;
mod occurrence;

pub use alarm::DisplayAlarm;
pub use datetime::parse_date_time;
pub use duration::parse_duration;
pub use event::{EventException, OccurrenceDetails, RecurringEvent};
pub use occurrence::Occurrence;
