//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A time range did not satisfy `start < end`.
    #[error("invalid time range: start {start} is not before end {end}")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Member numbers must be positive.
    #[error("invalid member number: {value}")]
    InvalidMemberNumber { value: i64 },

    /// Member number text was not an integer.
    #[error("malformed member number: {value}")]
    MalformedMemberNumber { value: String },

    /// Invalid storm availability value.
    #[error("invalid storm availability: {value}")]
    InvalidStorm { value: String },

    /// Invalid rescue availability value.
    #[error("invalid rescue availability: {value}")]
    InvalidRescue { value: String },

    /// Qualification code not known to the directory.
    #[error("unknown qualification: {value}")]
    UnknownQualification { value: String },

    /// Two template entries cover the same offset.
    #[error("template entries overlap at offsets {first_start}s and {second_start}s")]
    OverlappingTemplateEntries { first_start: i64, second_start: i64 },

    /// Offsetting an instant left the representable time range.
    #[error("{instant} offset by {offset} is out of range")]
    TimeOverflow {
        instant: DateTime<Utc>,
        offset: Duration,
    },

    /// An availability falls outside the window being replaced.
    #[error("availability {start}..{end} is not inside the window {window_start}..{window_end}")]
    OutsideWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    },
}

/// A roster member's number as issued by the member directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MemberNumber(u32);

impl MemberNumber {
    /// Creates a member number, rejecting zero and negative values.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match u32::try_from(value) {
            Ok(number) if number > 0 => Ok(Self(number)),
            _ => Err(ValidationError::InvalidMemberNumber { value }),
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for MemberNumber {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MemberNumber> for i64 {
    fn from(number: MemberNumber) -> Self {
        Self::from(number.0)
    }
}

impl fmt::Display for MemberNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemberNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::MalformedMemberNumber {
                value: s.to_string(),
            })?;
        Self::new(value)
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_string_id!(
    /// A validated organisational unit code (e.g. `WOL`).
    ///
    /// Unit codes scope availability when a member belongs to several units.
    UnitCode, "unit code"
);

/// The independent timeline a write or read applies to.
///
/// Without a unit the member alone is the key; with a unit the member and
/// unit pair is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub member: MemberNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitCode>,
}

impl PartitionKey {
    #[must_use]
    pub const fn member(member: MemberNumber) -> Self {
        Self { member, unit: None }
    }

    #[must_use]
    pub const fn scoped(member: MemberNumber, unit: UnitCode) -> Self {
        Self {
            member,
            unit: Some(unit),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}@{unit}", self.member),
            None => write!(f, "{}", self.member),
        }
    }
}

/// Storm and flood-damage duty availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StormAvailability {
    Available,
    Unavailable,
}

impl StormAvailability {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for StormAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StormAvailability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(Self::Available),
            "UNAVAILABLE" => Ok(Self::Unavailable),
            _ => Err(ValidationError::InvalidStorm {
                value: s.to_string(),
            }),
        }
    }
}

/// Rescue duty availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RescueAvailability {
    /// Can respond straight away.
    Immediate,
    /// Can respond in a support capacity.
    Support,
    Unavailable,
}

impl RescueAvailability {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "IMMEDIATE",
            Self::Support => "SUPPORT",
            Self::Unavailable => "UNAVAILABLE",
        }
    }

    /// Whether this value counts the member as available for rescue.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Immediate | Self::Support)
    }
}

impl fmt::Display for RescueAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RescueAvailability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IMMEDIATE" => Ok(Self::Immediate),
            "SUPPORT" => Ok(Self::Support),
            "UNAVAILABLE" => Ok(Self::Unavailable),
            _ => Err(ValidationError::InvalidRescue {
                value: s.to_string(),
            }),
        }
    }
}
