//! Window replacement from a JSON document.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use roster_core::{Availability, MemberNumber, UnitCode};
use roster_db::Database;

use super::util::{format_range, partition_key, read_json, window};

/// `{member, unit?, start, end, availabilities: [...]}`
#[derive(Debug, Deserialize)]
struct ReplaceRequest {
    member: MemberNumber,
    #[serde(default)]
    unit: Option<UnitCode>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    availabilities: Vec<Availability>,
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, path: &Path) -> Result<()> {
    let request: ReplaceRequest = read_json(path)?;
    let range = window(request.start, request.end)?;
    let key = partition_key(request.member, request.unit);

    let summary = db
        .replace_availabilities(&key, range, &request.availabilities)
        .with_context(|| format!("failed to replace availability for {key}"))?;

    writeln!(writer, "Replaced {key} {}", format_range(&range))?;
    writeln!(
        writer,
        "  deleted {} / updated {} / inserted {}",
        summary.deleted, summary.updated, summary.inserted
    )?;
    Ok(())
}
