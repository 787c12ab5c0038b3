//! Incremental windowed aggregation of vehicle events into gate counts.
//!
//! A run reads the watermark, pages through every event observed since,
//! buckets them per gate and interval in an [`AggregationTable`], and writes
//! the buckets that can no longer change.

mod engine;
mod subject;
mod table;
mod window;

pub use engine::{AggregationEngine, RunSummary};
pub use subject::{GateDescriptionParser, Subject, SubjectParser};
pub use table::{AggregationTable, BucketKey};
pub use window::{MAX_INTERVAL_MINUTES, TIME_UNIT, Window};
