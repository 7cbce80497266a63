//! Member directory model.
//!
//! Members are synchronised from an external directory; this crate only
//! reads them to scope queries and attribute statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MemberNumber, UnitCode, ValidationError};

/// Qualifications recognised by the directory, keyed by their directory code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Qualification {
    VerticalRescue,
    FloodRescueL1,
    FloodRescueL2,
    FloodRescueL3,
    ChainsawCrossCut,
    ChainsawTreeFelling,
    StormWaterDamage,
    LandSearch,
    DriverL1,
    DriverL2,
    DriverL3,
}

impl Qualification {
    pub const ALL: [Self; 11] = [
        Self::VerticalRescue,
        Self::FloodRescueL1,
        Self::FloodRescueL2,
        Self::FloodRescueL3,
        Self::ChainsawCrossCut,
        Self::ChainsawTreeFelling,
        Self::StormWaterDamage,
        Self::LandSearch,
        Self::DriverL1,
        Self::DriverL2,
        Self::DriverL3,
    ];

    /// Directory code for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VerticalRescue => "VR-ACC",
            Self::FloodRescueL1 => "FRL1-ACC",
            Self::FloodRescueL2 => "FRL2-ARCC",
            Self::FloodRescueL3 => "FRL3-ACC",
            Self::ChainsawCrossCut => "CL1-ACC",
            Self::ChainsawTreeFelling => "CL2-ACC",
            Self::StormWaterDamage => "SWDG-ACC",
            Self::LandSearch => "SAR1-ACC",
            Self::DriverL1 => "DRL1-ACC",
            Self::DriverL2 => "DRL2-ACC",
            Self::DriverL3 => "DRL3-ACC",
        }
    }
}

impl fmt::Display for Qualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Qualification {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|qualification| qualification.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownQualification {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Qualification {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Qualification> for String {
    fn from(qualification: Qualification) -> Self {
        qualification.as_str().to_string()
    }
}

/// A member's place in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMembership {
    pub unit: UnitCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

/// A roster member as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub number: MemberNumber,
    pub full_name: String,
    #[serde(default)]
    pub qualifications: Vec<Qualification>,
    #[serde(default)]
    pub units: Vec<UnitMembership>,
}

impl Member {
    #[must_use]
    pub fn has_qualification(&self, qualification: Qualification) -> bool {
        self.qualifications.contains(&qualification)
    }

    #[must_use]
    pub fn belongs_to(&self, unit: &UnitCode) -> bool {
        self.units.iter().any(|membership| &membership.unit == unit)
    }

    /// Whether the member falls within an optional unit scope.
    #[must_use]
    pub fn in_scope(&self, scope: Option<&UnitCode>) -> bool {
        scope.is_none_or(|unit| self.belongs_to(unit))
    }

    /// Memberships within an optional unit scope.
    pub fn memberships<'a>(
        &'a self,
        scope: Option<&'a UnitCode>,
    ) -> impl Iterator<Item = &'a UnitMembership> + 'a {
        self.units
            .iter()
            .filter(move |membership| scope.is_none_or(|unit| &membership.unit == unit))
    }
}

/// Filter for listing directory members. Empty lists do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    #[serde(default)]
    pub units_any: Vec<UnitCode>,
    #[serde(default)]
    pub qualifications_any: Vec<Qualification>,
}

impl MemberFilter {
    #[must_use]
    pub fn unit(unit: UnitCode) -> Self {
        Self {
            units_any: vec![unit],
            qualifications_any: Vec::new(),
        }
    }

    #[must_use]
    pub fn matches(&self, member: &Member) -> bool {
        let unit_ok =
            self.units_any.is_empty() || self.units_any.iter().any(|unit| member.belongs_to(unit));
        let qualification_ok = self.qualifications_any.is_empty()
            || self
                .qualifications_any
                .iter()
                .any(|qualification| member.has_qualification(*qualification));
        unit_ok && qualification_ok
    }
}

/// Read access to the member directory.
pub trait MemberDirectory {
    type Error;

    /// Lists all members matching the filter.
    fn fetch_all_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, Self::Error>;

    /// Looks up members by number, preserving input order.
    ///
    /// Unknown numbers (e.g. resigned members) yield `None` at their position.
    fn fetch_members(&self, numbers: &[MemberNumber]) -> Result<Vec<Option<Member>>, Self::Error>;
}
