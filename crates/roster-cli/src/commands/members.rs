//! Member directory import and listing.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use roster_core::{Member, MemberDirectory, MemberFilter, UnitCode};
use roster_db::Database;

use super::util::read_json;

/// Upserts the JSON array of members in `path`.
pub fn import<W: Write>(writer: &mut W, db: &mut Database, path: &Path) -> Result<()> {
    let members: Vec<Member> = read_json(path)?;
    let count = db
        .upsert_members(&members)
        .context("failed to store members")?;
    writeln!(writer, "Imported {count} members")?;
    Ok(())
}

pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    unit: Option<UnitCode>,
    json: bool,
) -> Result<()> {
    let filter = unit.map(MemberFilter::unit).unwrap_or_default();
    let members = db.fetch_all_members(&filter)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&members)?)?;
        return Ok(());
    }

    if members.is_empty() {
        writeln!(writer, "No members.")?;
        return Ok(());
    }

    for member in members {
        let units: Vec<String> = member
            .units
            .iter()
            .map(|membership| match &membership.team {
                Some(team) => format!("{}/{team}", membership.unit),
                None => membership.unit.to_string(),
            })
            .collect();
        let qualifications: Vec<&str> = member.qualifications.iter().map(|q| q.as_str()).collect();
        let line = format!(
            "{}  {}  [{}]  {}",
            member.number,
            member.full_name,
            units.join(", "),
            qualifications.join(" ")
        );
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

pub fn teams<W: Write>(writer: &mut W, db: &Database, unit: Option<&UnitCode>) -> Result<()> {
    let teams = db.fetch_teams(unit)?;
    if teams.is_empty() {
        writeln!(writer, "No teams.")?;
    }
    for team in teams {
        writeln!(writer, "{team}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    const MEMBERS: &str = r#"[
        {"number": 12, "full_name": "Ada Lovelace", "qualifications": ["VR-ACC", "FRL3-ACC"],
         "units": [{"unit": "WOL", "team": "Alpha"}]},
        {"number": 7, "full_name": "Grace Hopper", "units": [{"unit": "KMA"}]}
    ]"#;

    #[test]
    fn import_then_list() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("members.json");
        std::fs::write(&file, MEMBERS).unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let mut output = Vec::new();
        import(&mut output, &mut db, &file).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Imported 2 members\n");

        let mut output = Vec::new();
        list(&mut output, &db, None, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        7  Grace Hopper  [KMA]
        12  Ada Lovelace  [WOL/Alpha]  FRL3-ACC VR-ACC
        ");

        let mut output = Vec::new();
        teams(&mut output, &db, None).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Alpha\n");
    }

    #[test]
    fn import_rejects_invalid_numbers() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("members.json");
        std::fs::write(&file, r#"[{"number": 0, "full_name": "Nobody"}]"#).unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let mut output = Vec::new();
        assert!(import(&mut output, &mut db, &file).is_err());
    }
}
