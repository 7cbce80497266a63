//! Shared utilities for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use roster_core::{MemberNumber, PartitionKey, RescueAvailability, StormAvailability, TimeRange, UnitCode};

/// Builds a window, rejecting `start >= end` with a readable message.
pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeRange> {
    TimeRange::new(start, end).context("invalid time window")
}

pub fn partition_key(member: MemberNumber, unit: Option<UnitCode>) -> PartitionKey {
    unit.map_or_else(
        || PartitionKey::member(member),
        |unit| PartitionKey::scoped(member, unit),
    )
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn format_range(range: &TimeRange) -> String {
    format!("{} .. {}", format_instant(range.start()), format_instant(range.end()))
}

/// `storm=AVAILABLE rescue=-` style summary of an interval's values.
pub fn format_values(storm: Option<StormAvailability>, rescue: Option<RescueAvailability>) -> String {
    format!(
        "storm={} rescue={}",
        storm.map_or("-", |s| s.as_str()),
        rescue.map_or("-", |r| r.as_str())
    )
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
