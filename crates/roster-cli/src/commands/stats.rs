//! Availability statistics over a window.

use std::io::Write;

use anyhow::Result;

use roster_core::statistics::RescueCounts;
use roster_core::{TimeRange, UnitCode};
use roster_db::Database;

use super::util::{format_instant, format_range};

fn counts(counts: RescueCounts) -> String {
    format!("{}/{}", counts.immediate, counts.support)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "display-only rounding of window durations"
)]
fn hours(secs: i64) -> String {
    format!("{:.1}h", secs as f64 / 3600.0)
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    range: TimeRange,
    unit: Option<UnitCode>,
    json: bool,
) -> Result<()> {
    let stats = db.fetch_statistics(range, unit.as_ref(), db)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
        return Ok(());
    }

    writeln!(writer, "Window: {}", format_range(&stats.window))?;
    if let Some(unit) = &unit {
        writeln!(writer, "Unit: {unit}")?;
    }

    writeln!(writer, "Buckets (rescue counts are immediate/support):")?;
    for bucket in &stats.buckets {
        writeln!(
            writer,
            "  {} .. {}  storm={} vr={} frl3={} frl2={} frl1={}",
            format_instant(bucket.start),
            format_instant(bucket.end),
            bucket.storm,
            counts(bucket.vertical_rescue),
            counts(bucket.flood_in_water),
            counts(bucket.flood_on_water),
            counts(bucket.flood_on_land),
        )?;
    }

    writeln!(writer, "Members:")?;
    if stats.members.is_empty() {
        writeln!(writer, "  none")?;
    }
    for summary in &stats.members {
        writeln!(
            writer,
            "  {}  storm={} immediate={} support={} unavailable={}",
            summary.member,
            hours(summary.storm_available_secs),
            hours(summary.rescue_immediate_secs),
            hours(summary.rescue_support_secs),
            hours(summary.rescue_unavailable_secs),
        )?;
    }

    writeln!(writer, "Teams:")?;
    if stats.teams.is_empty() {
        writeln!(writer, "  none")?;
    }
    for team in &stats.teams {
        writeln!(
            writer,
            "  {}/{}  members={} entered_storm={}",
            team.unit, team.team, team.members, team.entered_storm
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use roster_core::{
        Availability, Member, MemberNumber, PartitionKey, Qualification, RescueAvailability,
        StormAvailability, UnitMembership,
    };

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn range(start: u32, end: u32) -> TimeRange {
        TimeRange::new(at(start), at(end)).unwrap()
    }

    #[test]
    fn stats_render_buckets_and_summaries() {
        let mut db = Database::open_in_memory().unwrap();
        let wol = UnitCode::new("WOL").unwrap();
        db.upsert_members(&[
            Member {
                number: MemberNumber::new(1).unwrap(),
                full_name: "Ada".to_string(),
                qualifications: vec![Qualification::FloodRescueL3, Qualification::FloodRescueL2],
                units: vec![UnitMembership {
                    unit: wol.clone(),
                    team: Some("Alpha".to_string()),
                }],
            },
            Member {
                number: MemberNumber::new(2).unwrap(),
                full_name: "Grace".to_string(),
                qualifications: Vec::new(),
                units: vec![UnitMembership {
                    unit: wol.clone(),
                    team: Some("Alpha".to_string()),
                }],
            },
        ])
        .unwrap();
        db.set_availabilities(
            &PartitionKey::member(MemberNumber::new(1).unwrap()),
            &[Availability::new(
                range(0, 10),
                Some(StormAvailability::Available),
                Some(RescueAvailability::Immediate),
            )],
        )
        .unwrap();
        db.set_availabilities(
            &PartitionKey::member(MemberNumber::new(2).unwrap()),
            &[Availability::new(range(5, 10), Some(StormAvailability::Available), None)],
        )
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, range(0, 10), Some(wol), false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Window: 2025-03-01T00:00:00Z .. 2025-03-01T10:00:00Z
        Unit: WOL
        Buckets (rescue counts are immediate/support):
          2025-03-01T00:00:00Z .. 2025-03-01T05:00:00Z  storm=1 vr=0/0 frl3=1/0 frl2=0/0 frl1=0/0
          2025-03-01T05:00:00Z .. 2025-03-01T10:00:00Z  storm=2 vr=0/0 frl3=1/0 frl2=0/0 frl1=0/0
        Members:
          1  storm=10.0h immediate=10.0h support=0.0h unavailable=0.0h
          2  storm=5.0h immediate=0.0h support=0.0h unavailable=0.0h
        Teams:
          WOL/Alpha  members=2 entered_storm=2
        ");
    }
}
