use std::fs;
use std::path::Path;

use anyhow::Context;
use cadence_core::config::load_config;
use cadence_core::constants::DEFAULT_LOG_LEVEL;
use cadence_service::caldav::expansion::RecurExpansion;
use cadence_service::caldav::recurrence::{ExpandOptions, expand_recurring_event};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

mod cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config()?;

    tracing::debug!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let mut expansion = RecurExpansion::from_config(&config.expansion);
    if let Some(limit) = cli.limit {
        expansion.set_limit(limit);
    }

    let ical = fs::read_to_string(&cli.ics)
        .with_context(|| format!("failed to read {}", cli.ics.display()))?;

    let options = ExpandOptions {
        iterator: cli.state.as_deref().and_then(read_state),
        min_date: cli.min,
        max_date: cli.max,
    };

    let mut occurrences = Vec::new();
    let expanded = expand_recurring_event(&ical, &options, &expansion, |details| {
        occurrences.push(details);
    })?;

    for details in &occurrences {
        println!("{}", serde_json::to_string(details)?);
    }
    println!("{}", serde_json::to_string(&expanded)?);

    tracing::info!(
        emitted = occurrences.len(),
        complete = expanded.complete,
        "Expansion finished"
    );

    if let Some(path) = &cli.state {
        fs::write(path, serde_json::to_string_pretty(&expanded.iterator)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}

/// Loads saved iterator state. A missing or unreadable file means a fresh start.
fn read_state(path: &Path) -> Option<serde_json::Value> {
    if !path.exists() {
        return None;
    }

    fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
        .inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "Ignoring unreadable iterator state");
        })
        .ok()
}
