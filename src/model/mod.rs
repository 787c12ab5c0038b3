//! Wire and domain types for vehicle events and gate occupancy records.

pub mod ckan;
pub mod gate_count;
pub mod vehicle;

pub use gate_count::{GateCount, TIMESTAMP_FORMAT, parse_timestamp};
pub use vehicle::{RawEvent, VehicleEntity};
