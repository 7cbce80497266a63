//! Per-member availability, loaded through the batching loader.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use roster_core::{AvailabilityInterval, AvailabilityLoader, MemberNumber, TimeRange};
use roster_db::Store;

use super::util::{format_range, format_values};

#[derive(Debug, Serialize)]
struct MemberAvailability {
    member: MemberNumber,
    availabilities: Vec<AvailabilityInterval>,
}

/// Loads every requested member concurrently; requests for the same window
/// are answered by one batched query.
pub fn run<W: Write>(
    writer: &mut W,
    store: Store,
    members: &[MemberNumber],
    range: TimeRange,
    json: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let loader = AvailabilityLoader::new(store);
    let results = runtime.block_on(loader.load_many(members, range));

    let mut rows = Vec::with_capacity(members.len());
    for (member, result) in members.iter().zip(results) {
        let availabilities =
            result.with_context(|| format!("failed to load availability for member {member}"))?;
        rows.push(MemberAvailability {
            member: *member,
            availabilities,
        });
    }

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    writeln!(writer, "Window: {}", format_range(&range))?;
    for row in rows {
        writeln!(writer, "Member {}", row.member)?;
        if row.availabilities.is_empty() {
            writeln!(writer, "  no availability recorded")?;
        }
        for record in &row.availabilities {
            let unit = record
                .unit
                .as_ref()
                .map(|unit| format!(" [{unit}]"))
                .unwrap_or_default();
            writeln!(
                writer,
                "  {}{unit}  {}",
                format_range(&record.range),
                format_values(record.storm, record.rescue)
            )?;
        }
    }
    Ok(())
}
