//! Half-open time range algebra.
//!
//! Every range is `[start, end)` with `start < end`. Operations that would
//! produce a zero-length range return `None` instead.
//!
//! Bounds are kept at millisecond precision, the precision of the store, so
//! a range always survives a write and read back unchanged.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A non-empty half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawRange> for TimeRange {
    type Error = ValidationError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// Truncates `instant` to the millisecond precision ranges are kept at.
#[must_use]
pub fn truncate_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

/// `instant + offset`, or a validation error when the result is unrepresentable.
pub fn offset_instant(
    instant: DateTime<Utc>,
    offset: Duration,
) -> Result<DateTime<Utc>, ValidationError> {
    instant
        .checked_add_signed(offset)
        .ok_or(ValidationError::TimeOverflow { instant, offset })
}

impl TimeRange {
    /// Creates a range, truncating both bounds to milliseconds and rejecting
    /// `start >= end` afterwards.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        let (start, end) = (truncate_instant(start), truncate_instant(end));
        if start >= end {
            return Err(ValidationError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a range of the given length starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> Result<Self, ValidationError> {
        Self::new(start, offset_instant(start, length)?)
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `instant` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether `other` lies entirely within this range.
    #[must_use]
    pub fn encloses(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one instant.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The common part of two ranges, or `None` when they do not overlap.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Self::new(start, end).ok()
    }

    /// Translates the range by the distance from `origin` to `new_start`,
    /// preserving its length.
    pub fn shift(
        &self,
        origin: DateTime<Utc>,
        new_start: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let delta = new_start - origin;
        Self::new(
            offset_instant(self.start, delta)?,
            offset_instant(self.end, delta)?,
        )
    }

    /// Returns the range with a new end, or `None` if it would be empty.
    #[must_use]
    pub fn with_end(&self, end: DateTime<Utc>) -> Option<Self> {
        Self::new(self.start, end).ok()
    }

    /// Returns the range with a new start, or `None` if it would be empty.
    #[must_use]
    pub fn with_start(&self, start: DateTime<Utc>) -> Option<Self> {
        Self::new(start, self.end).ok()
    }
}
