use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Textual timestamp layout used by the datastore (no offset, always UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a datastore timestamp. A trailing fractional second is tolerated.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
}

/// Vehicle count for one parking gate over one aggregation bucket.
///
/// This is the row stored in the datastore. `coordinate1` / `coordinate2`
/// hold the source pair in swapped order: the broker publishes these gates
/// with longitude and latitude inverted and the datastore keeps that quirk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCount {
    pub parking: String,
    pub gate: String,
    pub coordinate1: f64,
    pub coordinate2: f64,
    #[serde(rename = "beginObservation", with = "datastore_timestamp")]
    pub begin_observation: DateTime<Utc>,
    #[serde(rename = "endObservation", with = "datastore_timestamp")]
    pub end_observation: DateTime<Utc>,
    pub count: u64,
}

impl GateCount {
    /// Identity of the row in the datastore: repeated writes with the same
    /// key replace each other.
    pub fn natural_key(&self) -> (String, String, DateTime<Utc>) {
        (
            self.parking.clone(),
            self.gate.clone(),
            self.begin_observation,
        )
    }
}

mod datastore_timestamp {
    use super::{TIMESTAMP_FORMAT, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(de::Error::custom)
    }
}
