//! iCalendar (RFC 5545) support for recurring events.
//!
//! - [`parse`]: content line unfolding and tokenization
//! - [`core`]: occurrences, date-time and duration values, events
//! - [`expand`]: the resumable occurrence iterator

pub mod core;
pub mod expand;
pub mod parse;
