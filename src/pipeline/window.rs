//! Bucket arithmetic for the aggregation interval.
//!
//! Every place that needs to know where a bucket starts, where it ends, or
//! whether it is still open goes through [`Window`], so the fetch guard and
//! the finalization filter always agree on the cutoff.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Smallest time step of the pipeline. Bucket ends are inclusive, one step
/// before the next bucket begins.
pub const TIME_UNIT: TimeDelta = TimeDelta::seconds(1);

/// Number of intervals looked back when the datastore holds no bucket yet.
const BOOTSTRAP_INTERVALS: i32 = 2;

/// Widest accepted bucket: one week.
pub const MAX_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    interval: TimeDelta,
}

impl Window {
    /// Returns `None` unless `minutes` is in `1..=MAX_INTERVAL_MINUTES`.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        if !(1..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            return None;
        }
        TimeDelta::try_minutes(minutes).map(|interval| Self { interval })
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Floors `ts` to the start of its bucket (multiples of the interval since
    /// the Unix epoch). Returns `None` only for timestamps chrono can't
    /// represent in nanoseconds.
    pub fn truncate(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        ts.duration_trunc(self.interval).ok()
    }

    /// Inclusive end of the bucket starting at `begin`.
    pub fn bucket_end(&self, begin: DateTime<Utc>) -> DateTime<Utc> {
        begin + self.interval - TIME_UNIT
    }

    /// Buckets starting at or after this instant may still receive events.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.interval
    }

    /// A bucket is final once its start is strictly older than the cutoff.
    pub fn is_closed(&self, begin: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        begin < self.cutoff(now)
    }

    /// Whether a run starting at `begin` can produce any closed bucket.
    pub fn has_closed_window(&self, begin: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        begin <= self.cutoff(now)
    }

    /// Watermark to start from when nothing has been persisted yet: the end
    /// of the bucket preceding the one that started two intervals ago, so the
    /// first run reads every bucket it finalizes from its very start.
    pub fn bootstrap_watermark(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let lookback = now - self.interval * BOOTSTRAP_INTERVALS;
        self.truncate(lookback).unwrap_or(lookback) - TIME_UNIT
    }
}
