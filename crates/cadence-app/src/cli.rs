//! Command line arguments for the `cadence` binary.

use std::path::PathBuf;

use cadence_rfc::rfc::ical::core::Occurrence;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about = "Expand recurring iCalendar events", long_about = None)]
pub struct Cli {
    /// iCalendar file holding the event and its exceptions
    #[arg(required = true)]
    pub ics: PathBuf,

    /// Only emit occurrences strictly after this RFC 3339 time
    #[arg(long, value_parser = parse_occurrence)]
    pub min: Option<Occurrence>,

    /// Stop after the last occurrence at or before this RFC 3339 time
    #[arg(long, value_parser = parse_occurrence)]
    pub max: Option<Occurrence>,

    /// JSON file the iterator state is resumed from and saved to
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Override the configured step cap for this run
    #[arg(short, long)]
    pub limit: Option<usize>,
}

fn parse_occurrence(value: &str) -> Result<Occurrence, String> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(Occurrence::from)
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_window_and_state() {
        let cli = Cli::try_parse_from([
            "cadence",
            "event.ics",
            "--min",
            "2012-01-05T09:00:00Z",
            "--max",
            "2012-01-10T09:00:00+00:00",
            "--state",
            "state.json",
            "--limit",
            "50",
        ])
        .expect("valid arguments");

        assert_eq!(cli.ics, PathBuf::from("event.ics"));
        assert_eq!(
            cli.min.map(|o| o.to_ical_utc()).as_deref(),
            Some("20120105T090000Z")
        );
        assert!(cli.max > cli.min);
        assert_eq!(cli.state, Some(PathBuf::from("state.json")));
        assert_eq!(cli.limit, Some(50));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        assert!(Cli::try_parse_from(["cadence", "event.ics", "--max", "tomorrow"]).is_err());
        assert!(Cli::try_parse_from(["cadence"]).is_err());
    }
}
