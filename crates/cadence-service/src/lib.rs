pub mod caldav;
pub mod error;
