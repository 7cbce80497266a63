//! Core domain logic for roster availability.
//!
//! This crate contains the fundamental types and logic for:
//! - Interval algebra over half-open time ranges
//! - Overlap resolution for the availability write path
//! - Sweep-line availability statistics
//! - Default availability templates
//! - Coalescing concurrent per-member reads into batched queries

mod availability;
mod interval;
pub mod loader;
pub mod member;
pub mod resolve;
pub mod statistics;
pub mod template;
mod types;

pub use availability::{Availability, AvailabilityInterval};
pub use interval::{TimeRange, offset_instant, truncate_instant};
pub use loader::{AvailabilityLoader, BatchFetch, LoadError};
pub use member::{Member, MemberDirectory, MemberFilter, Qualification, UnitMembership};
pub use resolve::{StoredAvailability, Timeline, WritePlan};
pub use statistics::{Statistics, StatisticsInput, compute_statistics};
pub use template::{DefaultTemplate, TemplateEntry};
pub use types::{
    MemberNumber, PartitionKey, RescueAvailability, StormAvailability, UnitCode, ValidationError,
};
