//! Default availability templates.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use roster_core::{DefaultTemplate, PartitionKey, TemplateEntry, TimeRange, UnitCode};

use crate::{Database, DbError, format_timestamp, parse_timestamp};

const TABLE: &str = "default_availabilities";

/// The templates table uses an empty unit for member-only keys.
fn unit_column(key: &PartitionKey) -> &str {
    key.unit.as_ref().map_or("", UnitCode::as_str)
}

fn load_template(conn: &Connection, key: &PartitionKey) -> Result<Option<DefaultTemplate>, DbError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT origin, entries FROM default_availabilities WHERE member = ?1 AND unit = ?2",
            params![i64::from(key.member), unit_column(key)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((origin, entries)) = row else {
        return Ok(None);
    };

    let id = i64::from(key.member);
    let origin = parse_timestamp(&origin, TABLE, id)?;
    let entries: Vec<TemplateEntry> = serde_json::from_str(&entries)?;
    let template = DefaultTemplate::new(key, origin, entries).map_err(|err| DbError::InvalidRecord {
        table: TABLE,
        id,
        message: err.to_string(),
    })?;
    Ok(Some(template))
}

impl Database {
    /// The stored template for `key`, if any.
    pub fn fetch_default_availabilities(
        &self,
        key: &PartitionKey,
    ) -> Result<Option<DefaultTemplate>, DbError> {
        load_template(&self.conn, key)
    }

    /// Stores `template`, replacing any previous template for its key.
    pub fn set_default_availabilities(&mut self, template: &DefaultTemplate) -> Result<(), DbError> {
        let key = template.key();
        let entries = serde_json::to_string(&template.entries)?;
        self.conn.execute(
            "INSERT INTO default_availabilities (member, unit, origin, entries, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(member, unit) DO UPDATE SET
                origin = excluded.origin,
                entries = excluded.entries,
                updated_at = excluded.updated_at",
            params![
                i64::from(key.member),
                unit_column(&key),
                format_timestamp(template.origin),
                entries,
                format_timestamp(Utc::now()),
            ],
        )?;
        tracing::debug!(%key, entries = template.entries.len(), "stored default template");
        Ok(())
    }

    /// Projects the key's template onto `target` and replaces the target window with it.
    ///
    /// Returns `false`, leaving storage untouched, when the key has no template.
    pub fn apply_default_availability(
        &mut self,
        key: &PartitionKey,
        target: TimeRange,
    ) -> Result<bool, DbError> {
        let applied = self.write_with_retry("apply_default_availability", |tx| {
            let Some(template) = load_template(tx, key)? else {
                return Ok(None);
            };
            let projected = template.project(target);
            crate::availability::replace_in_tx(tx, key, target, &projected).map(Some)
        })?;

        match applied {
            Some(summary) => {
                tracing::info!(%key, ?summary, start = %target.start(), "applied default template");
                Ok(true)
            }
            None => {
                tracing::debug!(%key, "no default template to apply");
                Ok(false)
            }
        }
    }
}
