/// Default number of cursor steps a single expansion call may take.
pub const DEFAULT_FOR_EACH_LIMIT: usize = 1000;

/// Number of occurrences pulled from the recurrence engine per refill.
pub const FETCH_BATCH_SIZE: usize = 64;

/// Log filter used until configuration has been loaded.
pub const DEFAULT_LOG_LEVEL: &str = "debug";
