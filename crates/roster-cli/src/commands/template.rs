//! Default availability template commands.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use roster_core::{
    Availability, DefaultTemplate, MemberNumber, PartitionKey, TemplateEntry, TimeRange, UnitCode,
};
use roster_db::Database;

use super::util::{format_instant, format_range, format_values, partition_key, read_json, window};

/// Template file: absolute intervals around a reference `origin`.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    member: MemberNumber,
    #[serde(default)]
    unit: Option<UnitCode>,
    origin: DateTime<Utc>,
    availabilities: Vec<Availability>,
}

pub fn set<W: Write>(writer: &mut W, db: &mut Database, path: &Path) -> Result<()> {
    let file: TemplateFile = read_json(path)?;
    let key = partition_key(file.member, file.unit);
    let entries = file
        .availabilities
        .iter()
        .map(|availability| TemplateEntry::from_absolute(file.origin, availability))
        .collect();
    let template = DefaultTemplate::new(&key, file.origin, entries)
        .with_context(|| format!("invalid template for {key}"))?;

    db.set_default_availabilities(&template)?;
    writeln!(
        writer,
        "Stored template for {key} with {} entries",
        template.entries.len()
    )?;
    Ok(())
}

pub fn show<W: Write>(writer: &mut W, db: &Database, key: &PartitionKey) -> Result<()> {
    let Some(template) = db.fetch_default_availabilities(key)? else {
        writeln!(writer, "No template for {key}")?;
        return Ok(());
    };

    writeln!(
        writer,
        "Template for {key} (origin {})",
        format_instant(template.origin)
    )?;
    for entry in &template.entries {
        writeln!(
            writer,
            "  {} .. {}  {}",
            format_offset(entry.offset_start),
            format_offset(entry.offset_end),
            format_values(entry.storm, entry.rescue)
        )?;
    }
    Ok(())
}

/// Applies the key's template to `[start, end)`, with `end` defaulting to
/// `apply_days` after `start`.
pub fn apply<W: Write>(
    writer: &mut W,
    db: &mut Database,
    key: &PartitionKey,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    apply_days: u32,
) -> Result<()> {
    let target = match end {
        Some(end) => window(start, end)?,
        None => TimeRange::starting_at(start, Duration::days(i64::from(apply_days)))
            .context("invalid template window")?,
    };

    if db
        .apply_default_availability(key, target)
        .with_context(|| format!("failed to apply template for {key}"))?
    {
        writeln!(writer, "Applied template for {key} to {}", format_range(&target))?;
    } else {
        writeln!(writer, "No template for {key}")?;
    }
    Ok(())
}

/// `+1d08:30` style offset from the template origin.
fn format_offset(offset: Duration) -> String {
    let sign = if offset < Duration::zero() { '-' } else { '+' };
    let total = offset.num_minutes().abs();
    let days = total / (24 * 60);
    let hours = (total / 60) % 24;
    let minutes = total % 60;
    format!("{sign}{days}d{hours:02}:{minutes:02}")
}
