pub mod expansion;
pub mod recurrence;
