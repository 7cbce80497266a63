//! Sweep-line availability statistics.
//!
//! # Algorithm Summary
//!
//! 1. Collect every record boundary inside the window plus the window's own
//!    bounds as inflection points, sorted and deduplicated.
//! 2. Each consecutive pair of inflection points is a bucket. A record is
//!    active in a bucket when it covers the bucket's start instant.
//! 3. Tally storm availability (unit scoped) and rescue availability broken
//!    down by qualification: vertical rescue counts independently, flood
//!    rescue counts only the member's highest tier (L3 > L2 > L1).
//! 4. Separately, sum each member's covered seconds per category across the
//!    whole window, and count team members who set any storm value.
//!
//! Records for members missing from the directory (resigned) are skipped.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::availability::AvailabilityInterval;
use crate::interval::TimeRange;
use crate::member::{Member, Qualification};
use crate::types::{MemberNumber, RescueAvailability, StormAvailability, UnitCode};

/// Immediate/support split of a rescue count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RescueCounts {
    pub immediate: u32,
    pub support: u32,
}

impl RescueCounts {
    fn record(&mut self, rescue: RescueAvailability) {
        match rescue {
            RescueAvailability::Immediate => self.immediate += 1,
            RescueAvailability::Support => self.support += 1,
            RescueAvailability::Unavailable => {}
        }
    }
}

/// Counts of available members over one inflection sub-interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub storm: u32,
    pub vertical_rescue: RescueCounts,
    /// Flood rescue L3.
    pub flood_in_water: RescueCounts,
    /// Flood rescue L2.
    pub flood_on_water: RescueCounts,
    /// Flood rescue L1.
    pub flood_on_land: RescueCounts,
}

impl StatisticsBucket {
    fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            storm: 0,
            vertical_rescue: RescueCounts::default(),
            flood_in_water: RescueCounts::default(),
            flood_on_water: RescueCounts::default(),
            flood_on_land: RescueCounts::default(),
        }
    }
}

/// Seconds a member spent in each availability category within the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub member: MemberNumber,
    pub storm_available_secs: i64,
    pub rescue_immediate_secs: i64,
    pub rescue_support_secs: i64,
    pub rescue_unavailable_secs: i64,
}

/// Team headcount and how many members entered any storm value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub unit: UnitCode,
    pub team: String,
    pub members: u32,
    pub entered_storm: u32,
}

/// Result of a statistics request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub window: TimeRange,
    pub buckets: Vec<StatisticsBucket>,
    pub members: Vec<MemberSummary>,
    pub teams: Vec<TeamSummary>,
}

/// Everything the engine needs for one window.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsInput<'a> {
    pub window: TimeRange,
    pub unit: Option<&'a UnitCode>,
    /// Records overlapping the window with a storm or rescue value.
    pub records: &'a [AvailabilityInterval],
    /// Directory entries for the members appearing in `records`.
    pub members: &'a [Member],
    /// Directory entries used for team headcounts, already unit filtered.
    pub roster: &'a [Member],
}

/// Computes bucketed counts and window summaries.
pub fn compute_statistics(input: &StatisticsInput<'_>) -> Statistics {
    let directory: HashMap<MemberNumber, &Member> = input
        .members
        .iter()
        .map(|member| (member.number, member))
        .collect();

    let records: Vec<(&AvailabilityInterval, &Member)> = input
        .records
        .iter()
        .filter(|record| record.range.intersects(&input.window))
        .filter_map(|record| {
            let Some(member) = directory.get(&record.member) else {
                tracing::warn!(member = %record.member, "skipping record for unknown member");
                return None;
            };
            Some((record, *member))
        })
        .collect();

    let buckets = inflection_points(input.window, &records)
        .windows(2)
        .map(|pair| tally_bucket(pair[0], pair[1], input.unit, &records))
        .collect();

    Statistics {
        window: input.window,
        buckets,
        members: member_summaries(input.window, input.unit, &records),
        teams: team_summaries(input.unit, &records, input.roster),
    }
}

fn inflection_points(
    window: TimeRange,
    records: &[(&AvailabilityInterval, &Member)],
) -> Vec<DateTime<Utc>> {
    let mut points: Vec<DateTime<Utc>> = records
        .iter()
        .flat_map(|(record, _)| [record.range.start(), record.range.end()])
        .filter(|point| window.contains(*point))
        .chain([window.start(), window.end()])
        .collect();
    points.sort();
    points.dedup();
    points
}

fn record_in_scope(record: &AvailabilityInterval, member: &Member, unit: Option<&UnitCode>) -> bool {
    let record_unit_ok = match (&record.unit, unit) {
        (Some(record_unit), Some(scope)) => record_unit == scope,
        _ => true,
    };
    record_unit_ok && member.in_scope(unit)
}

fn tally_bucket(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    unit: Option<&UnitCode>,
    records: &[(&AvailabilityInterval, &Member)],
) -> StatisticsBucket {
    let mut bucket = StatisticsBucket::empty(start, end);

    let active = records
        .iter()
        .filter(|(record, _)| record.range.start() <= start && record.range.end() > start);

    for (record, member) in active {
        if record.storm == Some(StormAvailability::Available) && record_in_scope(record, member, unit)
        {
            bucket.storm += 1;
        }

        let Some(rescue) = record.rescue.filter(|rescue| rescue.is_available()) else {
            continue;
        };

        if member.has_qualification(Qualification::VerticalRescue) {
            bucket.vertical_rescue.record(rescue);
        }

        if member.has_qualification(Qualification::FloodRescueL3) {
            bucket.flood_in_water.record(rescue);
        } else if member.has_qualification(Qualification::FloodRescueL2) {
            bucket.flood_on_water.record(rescue);
        } else if member.has_qualification(Qualification::FloodRescueL1) {
            bucket.flood_on_land.record(rescue);
        }
    }

    bucket
}

fn member_summaries(
    window: TimeRange,
    unit: Option<&UnitCode>,
    records: &[(&AvailabilityInterval, &Member)],
) -> Vec<MemberSummary> {
    let mut by_member: BTreeMap<MemberNumber, Vec<&AvailabilityInterval>> = BTreeMap::new();
    for (record, member) in records {
        if record_in_scope(record, member, unit) {
            by_member.entry(member.number).or_default().push(record);
        }
    }

    let grouped: Vec<(MemberNumber, Vec<&AvailabilityInterval>)> = by_member.into_iter().collect();
    grouped
        .par_iter()
        .map(|(member, records)| {
            let mut summary = MemberSummary {
                member: *member,
                storm_available_secs: 0,
                rescue_immediate_secs: 0,
                rescue_support_secs: 0,
                rescue_unavailable_secs: 0,
            };
            for record in records {
                let Some(covered) = record.range.intersection(&window) else {
                    continue;
                };
                let secs = covered.duration().num_seconds();
                if record.storm == Some(StormAvailability::Available) {
                    summary.storm_available_secs += secs;
                }
                match record.rescue {
                    Some(RescueAvailability::Immediate) => summary.rescue_immediate_secs += secs,
                    Some(RescueAvailability::Support) => summary.rescue_support_secs += secs,
                    Some(RescueAvailability::Unavailable) => summary.rescue_unavailable_secs += secs,
                    None => {}
                }
            }
            summary
        })
        .collect()
}

fn team_summaries(
    unit: Option<&UnitCode>,
    records: &[(&AvailabilityInterval, &Member)],
    roster: &[Member],
) -> Vec<TeamSummary> {
    let entered_storm: HashSet<MemberNumber> = records
        .iter()
        .filter(|(record, member)| record.storm.is_some() && record_in_scope(record, member, unit))
        .map(|(record, _)| record.member)
        .collect();

    let mut teams: BTreeMap<(UnitCode, String), TeamSummary> = BTreeMap::new();
    for member in roster {
        for membership in member.memberships(unit) {
            let Some(team) = membership.team.as_ref() else {
                continue;
            };
            let summary = teams
                .entry((membership.unit.clone(), team.clone()))
                .or_insert_with(|| TeamSummary {
                    unit: membership.unit.clone(),
                    team: team.clone(),
                    members: 0,
                    entered_storm: 0,
                });
            summary.members += 1;
            if entered_storm.contains(&member.number) {
                summary.entered_storm += 1;
            }
        }
    }

    teams.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::Availability;
    use crate::member::UnitMembership;
    use crate::types::PartitionKey;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn range(start: i64, end: i64) -> TimeRange {
        TimeRange::new(at(start), at(end)).unwrap()
    }

    fn number(n: i64) -> MemberNumber {
        MemberNumber::new(n).unwrap()
    }

    fn member(n: i64, qualifications: &[Qualification], unit: &str, team: &str) -> Member {
        Member {
            number: number(n),
            full_name: format!("Member {n}"),
            qualifications: qualifications.to_vec(),
            units: vec![UnitMembership {
                unit: UnitCode::new(unit).unwrap(),
                team: Some(team.to_string()),
            }],
        }
    }

    fn record(
        n: i64,
        start: i64,
        end: i64,
        storm: Option<StormAvailability>,
        rescue: Option<RescueAvailability>,
    ) -> AvailabilityInterval {
        AvailabilityInterval::new(
            &PartitionKey::member(number(n)),
            Availability::new(range(start, end), storm, rescue),
        )
    }

    fn run(
        window: TimeRange,
        unit: Option<&UnitCode>,
        records: &[AvailabilityInterval],
        members: &[Member],
    ) -> Statistics {
        compute_statistics(&StatisticsInput {
            window,
            unit,
            records,
            members,
            roster: members,
        })
    }

    #[test]
    fn buckets_split_at_record_boundaries() {
        let members = [member(1, &[], "WOL", "Alpha"), member(2, &[], "WOL", "Alpha")];
        let records = [
            record(1, 0, 10, Some(StormAvailability::Available), None),
            record(2, 5, 10, Some(StormAvailability::Available), None),
        ];
        let stats = run(range(0, 10), None, &records, &members);

        assert_eq!(stats.buckets.len(), 2);
        assert_eq!((stats.buckets[0].start, stats.buckets[0].end), (at(0), at(5)));
        assert_eq!(stats.buckets[0].storm, 1);
        assert_eq!((stats.buckets[1].start, stats.buckets[1].end), (at(5), at(10)));
        assert_eq!(stats.buckets[1].storm, 2);
    }

    #[test]
    fn window_without_records_yields_single_zero_bucket() {
        let stats = run(range(0, 100), None, &[], &[]);
        assert_eq!(stats.buckets, vec![StatisticsBucket::empty(at(0), at(100))]);
        assert!(stats.members.is_empty());
        assert!(stats.teams.is_empty());
    }

    #[test]
    fn gaps_between_records_are_emitted_as_zero_buckets() {
        let members = [member(1, &[], "WOL", "Alpha")];
        let records = [
            record(1, 0, 10, Some(StormAvailability::Available), None),
            record(1, 20, 30, Some(StormAvailability::Available), None),
        ];
        let stats = run(range(0, 30), None, &records, &members);
        let storms: Vec<u32> = stats.buckets.iter().map(|b| b.storm).collect();
        assert_eq!(storms, vec![1, 0, 1]);
    }

    #[test]
    fn records_extending_past_window_are_clipped() {
        let members = [member(1, &[], "WOL", "Alpha")];
        let records = [record(1, -50, 500, Some(StormAvailability::Available), None)];
        let stats = run(range(0, 100), None, &records, &members);
        assert_eq!(stats.buckets.len(), 1);
        assert_eq!(stats.buckets[0].storm, 1);
        assert_eq!(stats.members[0].storm_available_secs, 100);
    }

    #[test]
    fn flood_tiers_count_highest_only_and_vertical_independently() {
        let members = [
            member(
                1,
                &[
                    Qualification::FloodRescueL1,
                    Qualification::FloodRescueL2,
                    Qualification::FloodRescueL3,
                    Qualification::VerticalRescue,
                ],
                "WOL",
                "Alpha",
            ),
            member(2, &[Qualification::FloodRescueL1, Qualification::FloodRescueL2], "WOL", "Alpha"),
            member(3, &[Qualification::FloodRescueL1], "WOL", "Bravo"),
            member(4, &[Qualification::VerticalRescue], "WOL", "Bravo"),
        ];
        let records = [
            record(1, 0, 10, None, Some(RescueAvailability::Immediate)),
            record(2, 0, 10, None, Some(RescueAvailability::Support)),
            record(3, 0, 10, None, Some(RescueAvailability::Immediate)),
            record(4, 0, 10, None, Some(RescueAvailability::Unavailable)),
        ];
        let stats = run(range(0, 10), None, &records, &members);
        let bucket = &stats.buckets[0];

        assert_eq!(bucket.vertical_rescue, RescueCounts { immediate: 1, support: 0 });
        assert_eq!(bucket.flood_in_water, RescueCounts { immediate: 1, support: 0 });
        assert_eq!(bucket.flood_on_water, RescueCounts { immediate: 0, support: 1 });
        assert_eq!(bucket.flood_on_land, RescueCounts { immediate: 1, support: 0 });
        assert_eq!(bucket.storm, 0);
    }

    #[test]
    fn resigned_members_are_skipped() {
        let members = [member(1, &[], "WOL", "Alpha")];
        let records = [
            record(1, 0, 10, Some(StormAvailability::Available), None),
            record(99, 0, 10, Some(StormAvailability::Available), None),
        ];
        let stats = run(range(0, 10), None, &records, &members);
        assert_eq!(stats.buckets[0].storm, 1);
        assert_eq!(stats.members.len(), 1);
    }

    #[test]
    fn storm_counts_respect_unit_scope() {
        let wol = UnitCode::new("WOL").unwrap();
        let members = [member(1, &[], "WOL", "Alpha"), member(2, &[], "KIA", "Alpha")];
        let records = [
            record(1, 0, 10, Some(StormAvailability::Available), None),
            record(2, 0, 10, Some(StormAvailability::Available), None),
        ];
        let stats = run(range(0, 10), Some(&wol), &records, &members);
        assert_eq!(stats.buckets[0].storm, 1);
        assert_eq!(stats.members.len(), 1);
        assert_eq!(stats.members[0].member, number(1));
    }

    #[test]
    fn member_summary_weights_by_duration() {
        let members = [member(1, &[], "WOL", "Alpha")];
        let records = [
            record(1, 0, 30, Some(StormAvailability::Available), Some(RescueAvailability::Immediate)),
            record(1, 30, 40, Some(StormAvailability::Unavailable), Some(RescueAvailability::Support)),
            record(1, 40, 100, None, Some(RescueAvailability::Unavailable)),
        ];
        let stats = run(range(0, 100), None, &records, &members);
        assert_eq!(
            stats.members,
            vec![MemberSummary {
                member: number(1),
                storm_available_secs: 30,
                rescue_immediate_secs: 30,
                rescue_support_secs: 10,
                rescue_unavailable_secs: 60,
            }]
        );
    }

    #[test]
    fn teams_count_members_who_entered_storm() {
        let members = [
            member(1, &[], "WOL", "Alpha"),
            member(2, &[], "WOL", "Alpha"),
            member(3, &[], "WOL", "Bravo"),
        ];
        let records = [
            record(1, 0, 10, Some(StormAvailability::Unavailable), None),
            record(3, 0, 10, None, Some(RescueAvailability::Immediate)),
        ];
        let stats = run(range(0, 10), None, &records, &members);
        assert_eq!(
            stats.teams,
            vec![
                TeamSummary {
                    unit: UnitCode::new("WOL").unwrap(),
                    team: "Alpha".to_string(),
                    members: 2,
                    entered_storm: 1,
                },
                TeamSummary {
                    unit: UnitCode::new("WOL").unwrap(),
                    team: "Bravo".to_string(),
                    members: 1,
                    entered_storm: 0,
                },
            ]
        );
    }
}
