//! Members available at an instant.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use roster_core::{
    AvailabilityInterval, MemberDirectory, MemberFilter, MemberNumber, Qualification, UnitCode,
};
use roster_db::Database;

use super::util::{format_instant, format_values};

#[derive(Debug, Serialize)]
struct AvailableMember {
    member: MemberNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    record: AvailabilityInterval,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    at: DateTime<Utc>,
    unit: Option<UnitCode>,
    qualifications: Vec<Qualification>,
    json: bool,
) -> Result<()> {
    let filter = MemberFilter {
        units_any: unit.into_iter().collect(),
        qualifications_any: qualifications,
    };

    // Without a filter every member with a record counts, listed or not.
    let scope: Option<Vec<MemberNumber>> = if filter == MemberFilter::default() {
        None
    } else {
        Some(
            db.fetch_all_members(&filter)?
                .into_iter()
                .map(|member| member.number)
                .collect(),
        )
    };

    let records = db.fetch_available_at(at, scope.as_deref())?;
    let mut numbers: Vec<MemberNumber> = records.iter().map(|r| r.member).collect();
    numbers.dedup();
    let names: HashMap<MemberNumber, String> = db
        .fetch_members(&numbers)?
        .into_iter()
        .flatten()
        .map(|member| (member.number, member.full_name))
        .collect();

    let rows: Vec<AvailableMember> = records
        .into_iter()
        .map(|record| AvailableMember {
            member: record.member,
            full_name: names.get(&record.member).cloned(),
            record,
        })
        .collect();

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    writeln!(writer, "Available at {}", format_instant(at))?;
    if rows.is_empty() {
        writeln!(writer, "No members available.")?;
    }
    for row in rows {
        let name = row.full_name.as_deref().unwrap_or("(not in directory)");
        writeln!(
            writer,
            "{}  {name}  {}  until {}",
            row.member,
            format_values(row.record.storm, row.record.rescue),
            format_instant(row.record.range.end())
        )?;
    }
    Ok(())
}
