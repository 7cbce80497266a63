//! Member directory persistence.

use std::collections::HashMap;

use rusqlite::{Connection, params};

use roster_core::{
    Member, MemberDirectory, MemberFilter, MemberNumber, Qualification, UnitCode, UnitMembership,
};

use crate::{Database, DbError};

impl Database {
    /// Inserts or replaces directory entries.
    ///
    /// A member's units and qualifications are replaced wholesale, matching
    /// a sync from the upstream directory.
    pub fn upsert_members(&mut self, members: &[Member]) -> Result<usize, DbError> {
        self.write_with_retry("upsert_members", |tx| {
            let mut upsert = tx.prepare(
                "INSERT INTO members (number, full_name) VALUES (?1, ?2)
                 ON CONFLICT(number) DO UPDATE SET full_name = excluded.full_name",
            )?;
            let mut clear_units = tx.prepare("DELETE FROM member_units WHERE member = ?1")?;
            let mut clear_qualifications =
                tx.prepare("DELETE FROM member_qualifications WHERE member = ?1")?;
            let mut insert_unit = tx.prepare(
                "INSERT OR REPLACE INTO member_units (member, unit, team) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_qualification = tx.prepare(
                "INSERT OR IGNORE INTO member_qualifications (member, qualification) VALUES (?1, ?2)",
            )?;

            for member in members {
                let number = i64::from(member.number.get());
                upsert.execute(params![number, member.full_name])?;
                clear_units.execute([number])?;
                clear_qualifications.execute([number])?;
                for membership in &member.units {
                    insert_unit.execute(params![
                        number,
                        membership.unit.as_str(),
                        membership.team
                    ])?;
                }
                for qualification in &member.qualifications {
                    insert_qualification.execute(params![number, qualification.as_str()])?;
                }
            }
            Ok(())
        })?;
        tracing::debug!(count = members.len(), "upserted members");
        Ok(members.len())
    }

    /// Distinct team names within `unit`, or across all units.
    pub fn fetch_teams(&self, unit: Option<&UnitCode>) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT team FROM member_units
             WHERE team IS NOT NULL AND (?1 IS NULL OR unit = ?1)
             ORDER BY team",
        )?;
        let teams = stmt
            .query_map([unit.map(UnitCode::as_str)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(teams)
    }
}

impl MemberDirectory for Database {
    type Error = DbError;

    fn fetch_all_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, DbError> {
        let members = load_members(&self.conn, None)?;
        Ok(members
            .into_iter()
            .filter(|member| filter.matches(member))
            .collect())
    }

    fn fetch_members(&self, numbers: &[MemberNumber]) -> Result<Vec<Option<Member>>, DbError> {
        if numbers.is_empty() {
            return Ok(Vec::new());
        }
        let by_number: HashMap<MemberNumber, Member> = load_members(&self.conn, Some(numbers))?
            .into_iter()
            .map(|member| (member.number, member))
            .collect();
        // Duplicated numbers each get a copy.
        Ok(numbers
            .iter()
            .map(|number| by_number.get(number).cloned())
            .collect())
    }
}

/// Loads members ordered by number, optionally restricted to `numbers`.
fn load_members(
    conn: &Connection,
    numbers: Option<&[MemberNumber]>,
) -> Result<Vec<Member>, DbError> {
    let restrict = numbers.map(|numbers| {
        let placeholders = vec!["?"; numbers.len()].join(", ");
        let values: Vec<i64> = numbers.iter().map(|n| i64::from(n.get())).collect();
        (placeholders, values)
    });
    let clause = |column: &str| {
        restrict
            .as_ref()
            .map(|(placeholders, _)| format!("WHERE {column} IN ({placeholders})"))
            .unwrap_or_default()
    };
    let values: &[i64] = restrict.as_ref().map_or(&[], |(_, values)| values.as_slice());

    let mut members: Vec<Member> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT number, full_name FROM members {} ORDER BY number",
            clause("number")
        ))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (number, full_name) in rows {
            let parsed = MemberNumber::new(number).map_err(|err| DbError::InvalidRecord {
                table: "members",
                id: number,
                message: err.to_string(),
            })?;
            index.insert(number, members.len());
            members.push(Member {
                number: parsed,
                full_name,
                qualifications: Vec::new(),
                units: Vec::new(),
            });
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT member, unit, team FROM member_units {} ORDER BY member, unit",
            clause("member")
        ))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (number, unit, team) in rows {
            let Some(&position) = index.get(&number) else {
                continue;
            };
            let unit = UnitCode::new(unit).map_err(|err| DbError::InvalidRecord {
                table: "member_units",
                id: number,
                message: err.to_string(),
            })?;
            members[position].units.push(UnitMembership { unit, team });
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT member, qualification FROM member_qualifications {} ORDER BY member, qualification",
            clause("member")
        ))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (number, code) in rows {
            let Some(&position) = index.get(&number) else {
                continue;
            };
            match code.parse::<Qualification>() {
                Ok(qualification) => members[position].qualifications.push(qualification),
                Err(_) => {
                    tracing::warn!(member = number, code = %code, "ignoring unknown qualification code");
                }
            }
        }
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(number: i64, units: &[(&str, Option<&str>)], qualifications: &[Qualification]) -> Member {
        Member {
            number: MemberNumber::new(number).unwrap(),
            full_name: format!("Member {number}"),
            qualifications: qualifications.to_vec(),
            units: units
                .iter()
                .map(|(unit, team)| UnitMembership {
                    unit: UnitCode::new(*unit).unwrap(),
                    team: team.map(str::to_string),
                })
                .collect(),
        }
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().expect("open db");
        db.upsert_members(&[
            member(1, &[("WOL", Some("Alpha"))], &[Qualification::VerticalRescue]),
            member(2, &[("WOL", Some("Bravo")), ("KMA", None)], &[Qualification::FloodRescueL2]),
            member(3, &[("KMA", Some("Alpha"))], &[]),
        ])
        .unwrap();
        db
    }

    #[test]
    fn import_retries_busy_database_like_other_writes() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("roster.db");
        let mut db = Database::open_with(
            &path,
            crate::DatabaseOptions {
                busy_timeout: std::time::Duration::ZERO,
                retry: crate::RetryPolicy {
                    max_attempts: 3,
                    initial_backoff: std::time::Duration::from_millis(1),
                    max_backoff: std::time::Duration::from_millis(2),
                },
            },
        )
        .unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let err = db.upsert_members(&[member(1, &[("WOL", None)], &[])]).unwrap_err();
        assert!(matches!(err, DbError::Transaction { attempts: 3, .. }));
        assert!(err.is_retryable());

        blocker.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(db.upsert_members(&[member(1, &[("WOL", None)], &[])]).unwrap(), 1);
    }

    #[test]
    fn fetch_members_preserves_order_and_marks_unknown() {
        let db = seeded();
        let numbers: Vec<MemberNumber> = [3, 99, 1]
            .into_iter()
            .map(|n| MemberNumber::new(n).unwrap())
            .collect();

        let found = db.fetch_members(&numbers).unwrap();
        let names: Vec<Option<&str>> = found
            .iter()
            .map(|m| m.as_ref().map(|m| m.full_name.as_str()))
            .collect();
        assert_eq!(names, vec![Some("Member 3"), None, Some("Member 1")]);
        assert_eq!(found[2].as_ref().unwrap().qualifications, vec![Qualification::VerticalRescue]);
    }

    #[test]
    fn fetch_all_members_applies_filter() {
        let db = seeded();
        let in_wol = db
            .fetch_all_members(&MemberFilter::unit(UnitCode::new("WOL").unwrap()))
            .unwrap();
        let numbers: Vec<u32> = in_wol.iter().map(|m| m.number.get()).collect();
        assert_eq!(numbers, vec![1, 2]);

        let flood = db
            .fetch_all_members(&MemberFilter {
                units_any: Vec::new(),
                qualifications_any: vec![Qualification::FloodRescueL2],
            })
            .unwrap();
        assert_eq!(flood.len(), 1);
        assert_eq!(flood[0].units.len(), 2);
    }

    #[test]
    fn upsert_replaces_units_and_qualifications() {
        let mut db = seeded();
        db.upsert_members(&[member(1, &[("KMA", Some("Charlie"))], &[])])
            .unwrap();

        let updated = db
            .fetch_members(&[MemberNumber::new(1).unwrap()])
            .unwrap()
            .remove(0)
            .unwrap();
        assert!(updated.qualifications.is_empty());
        assert_eq!(updated.units.len(), 1);
        assert_eq!(updated.units[0].unit.as_str(), "KMA");
    }

    #[test]
    fn unknown_qualification_codes_are_skipped() {
        let db = seeded();
        db.conn
            .execute(
                "INSERT INTO member_qualifications (member, qualification) VALUES (3, 'XYZ-ACC')",
                [],
            )
            .unwrap();
        let found = db.fetch_members(&[MemberNumber::new(3).unwrap()]).unwrap();
        assert!(found[0].as_ref().unwrap().qualifications.is_empty());
    }

    #[test]
    fn teams_are_distinct_and_unit_scoped() {
        let db = seeded();
        assert_eq!(db.fetch_teams(None).unwrap(), vec!["Alpha", "Bravo"]);
        assert_eq!(
            db.fetch_teams(Some(&UnitCode::new("KMA").unwrap())).unwrap(),
            vec!["Alpha"]
        );
    }
}
