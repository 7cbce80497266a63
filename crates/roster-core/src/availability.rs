//! Availability records.

use serde::{Deserialize, Serialize};

use crate::interval::TimeRange;
use crate::types::{MemberNumber, PartitionKey, RescueAvailability, StormAvailability, UnitCode};

/// Availability over a range, independent of who it belongs to.
///
/// Used for write batches and template projection, where the partition key
/// is supplied separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub range: TimeRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storm: Option<StormAvailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescue: Option<RescueAvailability>,
}

impl Availability {
    #[must_use]
    pub const fn new(
        range: TimeRange,
        storm: Option<StormAvailability>,
        rescue: Option<RescueAvailability>,
    ) -> Self {
        Self {
            range,
            storm,
            rescue,
        }
    }

    /// Available for storm duty or for immediate/support rescue.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.storm == Some(StormAvailability::Available)
            || self.rescue.is_some_and(RescueAvailability::is_available)
    }

    /// Returns a copy covering a different range.
    #[must_use]
    pub const fn with_range(self, range: TimeRange) -> Self {
        Self { range, ..self }
    }
}

/// A stored availability interval for one partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityInterval {
    pub member: MemberNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitCode>,
    pub range: TimeRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storm: Option<StormAvailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescue: Option<RescueAvailability>,
}

impl AvailabilityInterval {
    #[must_use]
    pub fn new(key: &PartitionKey, availability: Availability) -> Self {
        Self {
            member: key.member,
            unit: key.unit.clone(),
            range: availability.range,
            storm: availability.storm,
            rescue: availability.rescue,
        }
    }

    #[must_use]
    pub fn key(&self) -> PartitionKey {
        PartitionKey {
            member: self.member,
            unit: self.unit.clone(),
        }
    }

    #[must_use]
    pub const fn availability(&self) -> Availability {
        Availability {
            range: self.range,
            storm: self.storm,
            rescue: self.rescue,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.availability().is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn range(start: i64, end: i64) -> TimeRange {
        TimeRange::new(
            Utc.timestamp_opt(start, 0).unwrap(),
            Utc.timestamp_opt(end, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn availability_requires_storm_available_or_rescue_response() {
        let r = range(0, 10);
        assert!(Availability::new(r, Some(StormAvailability::Available), None).is_available());
        assert!(Availability::new(r, None, Some(RescueAvailability::Support)).is_available());
        assert!(
            Availability::new(
                r,
                Some(StormAvailability::Unavailable),
                Some(RescueAvailability::Immediate)
            )
            .is_available()
        );
        assert!(
            !Availability::new(r, None, Some(RescueAvailability::Unavailable)).is_available()
        );
        assert!(!Availability::new(r, None, None).is_available());
    }

    #[test]
    fn interval_serializes_without_unset_fields() {
        let key = PartitionKey::member(MemberNumber::new(7).unwrap());
        let interval = AvailabilityInterval::new(
            &key,
            Availability::new(range(0, 3600), Some(StormAvailability::Available), None),
        );
        let json = serde_json::to_string(&interval).unwrap();
        assert_eq!(
            json,
            r#"{"member":7,"range":{"start":"1970-01-01T00:00:00Z","end":"1970-01-01T01:00:00Z"},"storm":"AVAILABLE"}"#
        );
        let parsed: AvailabilityInterval = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, interval);
        assert_eq!(parsed.key(), key);
    }
}
