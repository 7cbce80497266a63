//! Availability interval reads and transactional writes.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use serde::Serialize;

use roster_core::resolve::{find_overlap, span};
use roster_core::{
    Availability, AvailabilityInterval, MemberDirectory, MemberFilter, MemberNumber,
    PartitionKey, RescueAvailability, Statistics, StatisticsInput, StormAvailability,
    StoredAvailability, TimeRange, Timeline, UnitCode, ValidationError, WritePlan,
    compute_statistics,
};

use crate::{Database, DbError, format_timestamp, parse_timestamp};

const TABLE: &str = "availability_intervals";

const SELECT_COLUMNS: &str = "SELECT id, member, unit, start_at, end_at, storm, rescue
     FROM availability_intervals";

/// Row counts touched by one write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub deleted: usize,
    pub updated: usize,
    pub inserted: usize,
}

/// Table sizes, as reported by `roster status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub intervals: u64,
    pub members_with_availability: u64,
    pub templates: u64,
    pub directory_members: u64,
}

/// Raw column values; converted outside the rusqlite row closure so
/// conversion failures carry the row id.
struct IntervalRow {
    id: i64,
    member: i64,
    unit: Option<String>,
    start: String,
    end: String,
    storm: Option<String>,
    rescue: Option<String>,
}

impl IntervalRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            member: row.get(1)?,
            unit: row.get(2)?,
            start: row.get(3)?,
            end: row.get(4)?,
            storm: row.get(5)?,
            rescue: row.get(6)?,
        })
    }

    fn into_interval(self) -> Result<(i64, AvailabilityInterval), DbError> {
        let id = self.id;
        let invalid = |err: ValidationError| DbError::InvalidRecord {
            table: TABLE,
            id,
            message: err.to_string(),
        };

        let member = MemberNumber::new(self.member).map_err(invalid)?;
        let unit = self.unit.map(UnitCode::new).transpose().map_err(invalid)?;
        let range = TimeRange::new(
            parse_timestamp(&self.start, TABLE, id)?,
            parse_timestamp(&self.end, TABLE, id)?,
        )
        .map_err(invalid)?;
        let storm = self
            .storm
            .as_deref()
            .map(str::parse::<StormAvailability>)
            .transpose()
            .map_err(invalid)?;
        let rescue = self
            .rescue
            .as_deref()
            .map(str::parse::<RescueAvailability>)
            .transpose()
            .map_err(invalid)?;

        Ok((
            id,
            AvailabilityInterval {
                member,
                unit,
                range,
                storm,
                rescue,
            },
        ))
    }
}

fn query_intervals<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<AvailabilityInterval>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, IntervalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|row| row.into_interval().map(|(_, interval)| interval))
        .collect()
}

fn member_param(member: MemberNumber) -> i64 {
    i64::from(member.get())
}

impl Database {
    /// Overwrites the given ranges of one partition key.
    ///
    /// Each availability clears whatever the key previously held over its
    /// range, splitting or trimming neighbours, then is inserted. Intervals
    /// in the batch must not overlap one another.
    pub fn set_availabilities(
        &mut self,
        key: &PartitionKey,
        availabilities: &[Availability],
    ) -> Result<WriteSummary, DbError> {
        let ranges: Vec<TimeRange> = availabilities.iter().map(|a| a.range).collect();
        if let Some((first, second)) = find_overlap(&ranges) {
            return Err(DbError::Conflict { first, second });
        }
        let Some(touched) = span(&ranges) else {
            return Ok(WriteSummary::default());
        };

        let summary = self.write_with_retry("set_availabilities", |tx| {
            let mut timeline = Timeline::new(load_partition(tx, key, touched)?);
            for availability in availabilities {
                timeline.set(*availability);
            }
            apply_plan(tx, key, timeline.into_plan())
        })?;
        tracing::debug!(%key, ?summary, "set availabilities");
        Ok(summary)
    }

    /// Replaces everything the key holds inside `window` with `availabilities`.
    ///
    /// Unlike [`Database::set_availabilities`], gaps in the new list inside
    /// the window end up empty. Every availability must lie within `window`.
    pub fn replace_availabilities(
        &mut self,
        key: &PartitionKey,
        window: TimeRange,
        availabilities: &[Availability],
    ) -> Result<WriteSummary, DbError> {
        for availability in availabilities {
            if !window.encloses(&availability.range) {
                return Err(ValidationError::OutsideWindow {
                    start: availability.range.start(),
                    end: availability.range.end(),
                    window_start: window.start(),
                    window_end: window.end(),
                }
                .into());
            }
        }
        let ranges: Vec<TimeRange> = availabilities.iter().map(|a| a.range).collect();
        if let Some((first, second)) = find_overlap(&ranges) {
            return Err(DbError::Conflict { first, second });
        }

        let summary = self.write_with_retry("replace_availabilities", |tx| {
            replace_in_tx(tx, key, window, availabilities)
        })?;
        tracing::debug!(%key, ?summary, "replaced availabilities");
        Ok(summary)
    }

    /// Intervals for one member overlapping `range`, across all units, ordered by start.
    pub fn fetch_member_availabilities(
        &self,
        member: MemberNumber,
        range: TimeRange,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        query_intervals(
            &self.conn,
            &format!(
                "{SELECT_COLUMNS}
                 WHERE member = ?1 AND start_at < ?2 AND end_at > ?3
                 ORDER BY start_at, unit"
            ),
            params![
                member_param(member),
                format_timestamp(range.end()),
                format_timestamp(range.start())
            ],
        )
    }

    /// Intervals for any of `members` overlapping `range`, ordered by member then start.
    pub fn fetch_members_availabilities(
        &self,
        members: &[MemberNumber],
        range: TimeRange,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; members.len()].join(", ");
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE start_at < ? AND end_at > ? AND member IN ({placeholders})
             ORDER BY member, start_at, unit"
        );
        let mut values: Vec<rusqlite::types::Value> = vec![
            format_timestamp(range.end()).into(),
            format_timestamp(range.start()).into(),
        ];
        values.extend(members.iter().map(|m| member_param(*m).into()));
        query_intervals(&self.conn, &sql, params_from_iter(values))
    }

    /// Intervals covering `instant` that mark the member available for
    /// storm work or for any rescue response.
    ///
    /// When `members` is given, only those members are considered.
    pub fn fetch_available_at(
        &self,
        instant: DateTime<Utc>,
        members: Option<&[MemberNumber]>,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        let mut sql = format!(
            "{SELECT_COLUMNS}
             WHERE start_at <= ? AND end_at > ?
               AND (storm = 'AVAILABLE' OR rescue IN ('IMMEDIATE', 'SUPPORT'))"
        );
        let stamp = format_timestamp(instant);
        let mut values: Vec<rusqlite::types::Value> = vec![stamp.clone().into(), stamp.into()];
        if let Some(members) = members {
            if members.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; members.len()].join(", ");
            sql.push_str(&format!(" AND member IN ({placeholders})"));
            values.extend(members.iter().map(|m| member_param(*m).into()));
        }
        sql.push_str(" ORDER BY member, start_at");
        query_intervals(&self.conn, &sql, params_from_iter(values))
    }

    /// Aggregates availability over `window` for members in scope.
    ///
    /// Member details come from `directory`; records whose member the
    /// directory no longer knows are skipped.
    pub fn fetch_statistics<D>(
        &self,
        window: TimeRange,
        unit: Option<&UnitCode>,
        directory: &D,
    ) -> Result<Statistics, DbError>
    where
        D: MemberDirectory,
        D::Error: Into<DbError>,
    {
        let records = query_intervals(
            &self.conn,
            &format!(
                "{SELECT_COLUMNS}
                 WHERE start_at < ?1 AND end_at > ?2
                   AND (storm IS NOT NULL OR rescue IS NOT NULL)
                 ORDER BY start_at"
            ),
            params![format_timestamp(window.end()), format_timestamp(window.start())],
        )?;

        let mut numbers: Vec<MemberNumber> = records.iter().map(|r| r.member).collect();
        numbers.sort_unstable();
        numbers.dedup();
        let members: Vec<_> = directory
            .fetch_members(&numbers)
            .map_err(Into::into)?
            .into_iter()
            .flatten()
            .collect();
        let filter = unit.cloned().map(MemberFilter::unit).unwrap_or_default();
        let roster = directory.fetch_all_members(&filter).map_err(Into::into)?;

        tracing::debug!(
            records = records.len(),
            members = members.len(),
            roster = roster.len(),
            "computing statistics"
        );
        Ok(compute_statistics(&StatisticsInput {
            window,
            unit,
            records: &records,
            members: &members,
            roster: &roster,
        }))
    }

    /// Table sizes for diagnostics.
    pub fn availability_counts(&self) -> Result<StoreCounts, DbError> {
        let count = |sql: &str| -> Result<u64, DbError> {
            let value: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(u64::try_from(value).unwrap_or_default())
        };
        Ok(StoreCounts {
            intervals: count("SELECT COUNT(*) FROM availability_intervals")?,
            members_with_availability: count(
                "SELECT COUNT(DISTINCT member) FROM availability_intervals",
            )?,
            templates: count("SELECT COUNT(*) FROM default_availabilities")?,
            directory_members: count("SELECT COUNT(*) FROM members")?,
        })
    }

    /// Start of the latest stored interval, if any.
    pub fn latest_availability_start(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let latest: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, start_at FROM availability_intervals ORDER BY start_at DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        latest
            .map(|(id, start)| parse_timestamp(&start, TABLE, id))
            .transpose()
    }
}

/// Clears `window` for the key and inserts the given availabilities.
///
/// Shared by replace and template application so both run in the caller's
/// transaction.
pub(crate) fn replace_in_tx(
    tx: &Transaction<'_>,
    key: &PartitionKey,
    window: TimeRange,
    availabilities: &[Availability],
) -> Result<WriteSummary, DbError> {
    let mut timeline = Timeline::new(load_partition(tx, key, window)?);
    timeline.clear(window);
    for availability in availabilities {
        timeline.set(*availability);
    }
    apply_plan(tx, key, timeline.into_plan())
}

/// Loads the key's rows overlapping `range`.
fn load_partition(
    tx: &Transaction<'_>,
    key: &PartitionKey,
    range: TimeRange,
) -> Result<Vec<StoredAvailability<i64>>, DbError> {
    let mut stmt = tx.prepare(&format!(
        "{SELECT_COLUMNS}
         WHERE member = ?1 AND unit IS ?2 AND start_at < ?3 AND end_at > ?4
         ORDER BY start_at"
    ))?;
    let rows = stmt
        .query_map(
            params![
                member_param(key.member),
                key.unit.as_ref().map(UnitCode::as_str),
                format_timestamp(range.end()),
                format_timestamp(range.start())
            ],
            IntervalRow::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| {
            row.into_interval().map(|(id, interval)| StoredAvailability {
                id,
                availability: interval.availability(),
            })
        })
        .collect()
}

fn apply_plan(
    tx: &Transaction<'_>,
    key: &PartitionKey,
    plan: WritePlan<i64>,
) -> Result<WriteSummary, DbError> {
    if plan.is_empty() {
        return Ok(WriteSummary::default());
    }
    {
        let mut delete = tx.prepare("DELETE FROM availability_intervals WHERE id = ?1")?;
        for id in &plan.deletes {
            delete.execute([id])?;
        }
    }
    {
        let mut update = tx.prepare(
            "UPDATE availability_intervals SET start_at = ?1, end_at = ?2 WHERE id = ?3",
        )?;
        for (id, range) in &plan.updates {
            update.execute(params![
                format_timestamp(range.start()),
                format_timestamp(range.end()),
                id
            ])?;
        }
    }
    {
        let mut insert = tx.prepare(
            "INSERT INTO availability_intervals (member, unit, start_at, end_at, storm, rescue)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for availability in &plan.inserts {
            insert.execute(params![
                member_param(key.member),
                key.unit.as_ref().map(UnitCode::as_str),
                format_timestamp(availability.range.start()),
                format_timestamp(availability.range.end()),
                availability.storm.map(|s| s.as_str()),
                availability.rescue.map(|r| r.as_str()),
            ])?;
        }
    }
    Ok(WriteSummary {
        deleted: plan.deletes.len(),
        updated: plan.updates.len(),
        inserted: plan.inserts.len(),
    })
}
