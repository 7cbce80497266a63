//! Single-interval availability write.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use roster_core::{Availability, MemberNumber, RescueAvailability, StormAvailability, UnitCode};
use roster_db::Database;

use super::util::{format_range, format_values, partition_key, window};

/// Arguments for [`run`].
#[derive(Debug, Clone)]
pub struct SetArgs {
    pub member: MemberNumber,
    pub unit: Option<UnitCode>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub storm: Option<StormAvailability>,
    pub rescue: Option<RescueAvailability>,
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, args: SetArgs) -> Result<()> {
    let range = window(args.start, args.end)?;
    let key = partition_key(args.member, args.unit);
    let availability = Availability::new(range, args.storm, args.rescue);

    let summary = db
        .set_availabilities(&key, &[availability])
        .with_context(|| format!("failed to store availability for {key}"))?;

    writeln!(
        writer,
        "Set {key} {} {}",
        format_range(&range),
        format_values(args.storm, args.rescue)
    )?;
    writeln!(
        writer,
        "  deleted {} / updated {} / inserted {}",
        summary.deleted, summary.updated, summary.inserted
    )?;
    Ok(())
}
