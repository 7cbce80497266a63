//! Default availability templates.
//!
//! A template is a pattern of availability expressed as offsets from a
//! reference `origin`. Applying it to a target window shifts every entry so
//! that `origin` lands on the window start, then clips to the window.
//!
//! Origins and offsets are normalized to milliseconds, like every
//! [`TimeRange`] bound, and offsets are serialized as integer milliseconds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::Availability;
use crate::interval::{TimeRange, offset_instant, truncate_instant};
use crate::resolve::find_overlap;
use crate::types::{
    MemberNumber, PartitionKey, RescueAvailability, StormAvailability, UnitCode, ValidationError,
};

/// One entry of a template, relative to the template origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(with = "duration_millis")]
    pub offset_start: Duration,
    #[serde(with = "duration_millis")]
    pub offset_end: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storm: Option<StormAvailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescue: Option<RescueAvailability>,
}

impl TemplateEntry {
    /// Converts an absolute availability into offsets from `origin`.
    #[must_use]
    pub fn from_absolute(origin: DateTime<Utc>, availability: &Availability) -> Self {
        let origin = truncate_instant(origin);
        Self {
            offset_start: availability.range.start() - origin,
            offset_end: availability.range.end() - origin,
            storm: availability.storm,
            rescue: availability.rescue,
        }
    }

    /// The absolute range this entry covers when anchored at `origin`.
    pub fn range_at(&self, origin: DateTime<Utc>) -> Result<TimeRange, ValidationError> {
        TimeRange::new(
            offset_instant(origin, self.offset_start)?,
            offset_instant(origin, self.offset_end)?,
        )
    }
}

/// A member's reusable availability pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTemplate {
    pub member: MemberNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitCode>,
    pub origin: DateTime<Utc>,
    pub entries: Vec<TemplateEntry>,
}

impl DefaultTemplate {
    /// Builds a template, rejecting empty or mutually overlapping entries.
    ///
    /// Entries are re-derived from their millisecond ranges, so a template
    /// read back from storage validates exactly as it did when written.
    pub fn new(
        key: &PartitionKey,
        origin: DateTime<Utc>,
        entries: Vec<TemplateEntry>,
    ) -> Result<Self, ValidationError> {
        let origin = truncate_instant(origin);
        let ranges = entries
            .iter()
            .map(|entry| entry.range_at(origin))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some((first, second)) = find_overlap(&ranges) {
            return Err(ValidationError::OverlappingTemplateEntries {
                first_start: (first.start() - origin).num_seconds(),
                second_start: (second.start() - origin).num_seconds(),
            });
        }
        let entries = entries
            .iter()
            .zip(&ranges)
            .map(|(entry, range)| TemplateEntry {
                offset_start: range.start() - origin,
                offset_end: range.end() - origin,
                ..*entry
            })
            .collect();
        Ok(Self {
            member: key.member,
            unit: key.unit.clone(),
            origin,
            entries,
        })
    }

    #[must_use]
    pub fn key(&self) -> PartitionKey {
        PartitionKey {
            member: self.member,
            unit: self.unit.clone(),
        }
    }

    /// Re-projects the template onto `target`.
    ///
    /// Entries are shifted by `target.start() - origin` and clipped to the
    /// target window; entries falling fully outside it are dropped.
    #[must_use]
    pub fn project(&self, target: TimeRange) -> Vec<Availability> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let anchored = entry.range_at(self.origin).ok()?;
                let shifted = anchored.shift(self.origin, target.start()).ok()?;
                let clipped = shifted.intersection(&target)?;
                Some(Availability::new(clipped, entry.storm, entry.rescue))
            })
            .collect()
    }
}

mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(millis)
            .ok_or_else(|| serde::de::Error::custom("offset out of range"))
    }
}
