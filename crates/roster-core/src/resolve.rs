//! Overlap resolution for the availability write path.
//!
//! A [`Timeline`] is a working copy of one partition key's stored intervals.
//! Writes clear a range first and then insert, so the timeline never holds
//! two overlapping intervals. Clearing a range applies these rules to every
//! stored interval it touches:
//!
//! 1. Intervals fully inside the range are deleted.
//! 2. An interval strictly engulfing the range is truncated to end at the
//!    range start, and a copy covering `[range.end, old_end)` is added.
//! 3. An interval whose end falls in `(range.start, range.end]` is trimmed
//!    to end at the range start.
//! 4. An interval whose start falls in `[range.start, range.end)` is trimmed
//!    to start at the range end.
//!
//! [`Timeline::into_plan`] turns the final state into the minimal set of
//! deletes, updates and inserts to apply against the backing store.

use crate::availability::Availability;
use crate::interval::TimeRange;

/// An interval loaded from the backing store, tagged with its row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredAvailability<Id> {
    pub id: Id,
    pub availability: Availability,
}

/// Changes required to bring the backing store in line with a [`Timeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan<Id> {
    pub deletes: Vec<Id>,
    /// Stored rows that keep their identity but cover a new range.
    pub updates: Vec<(Id, TimeRange)>,
    pub inserts: Vec<Availability>,
}

impl<Id> WritePlan<Id> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Slot<Id> {
    origin: Option<StoredAvailability<Id>>,
    availability: Availability,
}

/// Working copy of a single partition key's intervals.
#[derive(Debug, Clone)]
pub struct Timeline<Id> {
    slots: Vec<Slot<Id>>,
    loaded: Vec<StoredAvailability<Id>>,
}

impl<Id: Copy + PartialEq> Timeline<Id> {
    /// Starts from the intervals currently stored for the key.
    #[must_use]
    pub fn new(existing: Vec<StoredAvailability<Id>>) -> Self {
        let slots = existing
            .iter()
            .map(|stored| Slot {
                origin: Some(*stored),
                availability: stored.availability,
            })
            .collect();
        Self {
            slots,
            loaded: existing,
        }
    }

    /// Removes all coverage of `range`, splitting and trimming neighbours.
    pub fn clear(&mut self, range: TimeRange) {
        let mut next = Vec::with_capacity(self.slots.len() + 1);
        for slot in self.slots.drain(..) {
            let current = slot.availability.range;
            if !current.intersects(&range) {
                next.push(slot);
            } else if range.encloses(&current) {
                // Fully superseded.
            } else if current.start() < range.start() && current.end() > range.end() {
                let head = current.with_end(range.start());
                let tail = current.with_start(range.end());
                if let (Some(head), Some(tail)) = (head, tail) {
                    next.push(Slot {
                        origin: None,
                        availability: slot.availability.with_range(tail),
                    });
                    next.push(Slot {
                        origin: slot.origin,
                        availability: slot.availability.with_range(head),
                    });
                }
            } else if current.end() <= range.end() {
                if let Some(head) = current.with_end(range.start()) {
                    next.push(Slot {
                        origin: slot.origin,
                        availability: slot.availability.with_range(head),
                    });
                }
            } else if let Some(tail) = current.with_start(range.end()) {
                next.push(Slot {
                    origin: slot.origin,
                    availability: slot.availability.with_range(tail),
                });
            }
        }
        self.slots = next;
    }

    /// Clears the availability's range and inserts it.
    pub fn set(&mut self, availability: Availability) {
        self.clear(availability.range);
        self.slots.push(Slot {
            origin: None,
            availability,
        });
    }

    /// Current intervals ordered by start.
    #[must_use]
    pub fn availabilities(&self) -> Vec<Availability> {
        let mut result: Vec<Availability> =
            self.slots.iter().map(|slot| slot.availability).collect();
        result.sort_by_key(|availability| availability.range);
        result
    }

    /// Diffs the working copy against what was loaded.
    #[must_use]
    pub fn into_plan(self) -> WritePlan<Id> {
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        let mut kept: Vec<Id> = Vec::new();

        for slot in self.slots {
            match slot.origin {
                Some(origin) => {
                    kept.push(origin.id);
                    if origin.availability.range != slot.availability.range {
                        updates.push((origin.id, slot.availability.range));
                    }
                }
                None => inserts.push(slot.availability),
            }
        }

        let deletes = self
            .loaded
            .iter()
            .map(|stored| stored.id)
            .filter(|id| !kept.contains(id))
            .collect();

        inserts.sort_by_key(|availability| availability.range);
        WritePlan {
            deletes,
            updates,
            inserts,
        }
    }
}

/// Returns the first pair of mutually overlapping ranges, if any.
#[must_use]
pub fn find_overlap(ranges: &[TimeRange]) -> Option<(TimeRange, TimeRange)> {
    let mut sorted = ranges.to_vec();
    sorted.sort();
    sorted
        .windows(2)
        .find(|pair| pair[0].intersects(&pair[1]))
        .map(|pair| (pair[0], pair[1]))
}

/// Smallest range covering every input range.
#[must_use]
pub fn span(ranges: &[TimeRange]) -> Option<TimeRange> {
    let start = ranges.iter().map(TimeRange::start).min()?;
    let end = ranges.iter().map(TimeRange::end).max()?;
    TimeRange::new(start, end).ok()
}
