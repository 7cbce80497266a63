//! Status command showing store location and contents.

use std::io::Write;

use anyhow::Result;

use roster_db::Database;

use super::util::format_instant;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let counts = db.availability_counts()?;

    writeln!(writer, "Roster status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "Intervals: {} ({} members)",
        counts.intervals, counts.members_with_availability
    )?;
    writeln!(writer, "Templates: {}", counts.templates)?;
    writeln!(writer, "Directory members: {}", counts.directory_members)?;

    if let Some(latest) = db.latest_availability_start()? {
        writeln!(writer, "Latest interval starts: {}", format_instant(latest))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use roster_core::{Availability, MemberNumber, PartitionKey, StormAvailability, TimeRange};

    #[test]
    fn status_reports_counts() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("roster.db");
        let mut db = Database::open(&db_path).unwrap();
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 17, 0, 0).unwrap(),
        )
        .unwrap();
        db.set_availabilities(
            &PartitionKey::member(MemberNumber::new(7).unwrap()),
            &[Availability::new(range, Some(StormAvailability::Available), None)],
        )
        .unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &db, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/roster.db");
        assert_snapshot!(output, @r"
        Roster status
        Database: [TEMP]/roster.db
        Intervals: 1 (1 members)
        Templates: 0
        Directory members: 0
        Latest interval starts: 2025-03-01T08:00:00Z
        ");
    }
}
