//! Run-scoped aggregation table.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::subject::Subject;
use super::window::Window;
use crate::model::GateCount;

/// Identity of a bucket within one run: the raw description plus the
/// truncated bucket start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub subject: String,
    pub begin: DateTime<Utc>,
}

/// Accumulates gate counts across every page fetched during a run.
#[derive(Debug, Default)]
pub struct AggregationTable {
    buckets: HashMap<BucketKey, GateCount>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one event towards `key`, creating the bucket on first sight.
    ///
    /// `coordinates` is the pair as received from the broker; it is stored
    /// swapped. Only the first event of a bucket sets its coordinates.
    pub fn record(
        &mut self,
        key: BucketKey,
        subject: Subject,
        coordinates: [f64; 2],
        window: &Window,
    ) -> &GateCount {
        let gate_count = match self.buckets.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let begin = entry.key().begin;
                entry.insert(GateCount {
                    parking: subject.parking,
                    gate: subject.gate,
                    coordinate1: coordinates[1],
                    coordinate2: coordinates[0],
                    begin_observation: begin,
                    end_observation: window.bucket_end(begin),
                    count: 0,
                })
            }
        };
        gate_count.count += 1;
        gate_count
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &BucketKey) -> Option<&GateCount> {
        self.buckets.get(key)
    }

    /// Consumes the table and returns the buckets that are closed at `now`,
    /// ordered by begin, parking, gate and finally the raw description, so
    /// two descriptions naming the same gate always come out in the same
    /// order. The second value is the number of open buckets withheld.
    pub fn into_closed(self, window: &Window, now: DateTime<Utc>) -> (Vec<GateCount>, usize) {
        let total = self.buckets.len();
        let mut closed: Vec<(BucketKey, GateCount)> = self
            .buckets
            .into_iter()
            .filter(|(_, gc)| window.is_closed(gc.begin_observation, now))
            .collect();

        closed.sort_by(|(ka, a), (kb, b)| {
            a.begin_observation
                .cmp(&b.begin_observation)
                .then_with(|| a.parking.cmp(&b.parking))
                .then_with(|| a.gate.cmp(&b.gate))
                .then_with(|| ka.subject.cmp(&kb.subject))
        });

        let withheld = total - closed.len();
        (closed.into_iter().map(|(_, gc)| gc).collect(), withheld)
    }
}
