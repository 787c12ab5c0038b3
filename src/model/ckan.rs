//! Request and response bodies for the CKAN DataStore action API.

use serde::{Deserialize, Serialize};

use super::GateCount;

/// Body of `datastore_search` used to read the newest stored bucket.
#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub resource_id: &'a str,
    pub limit: u32,
    pub sort: &'a str,
}

/// Body of `datastore_upsert`.
#[derive(Debug, Serialize)]
pub struct UpsertRequest<'a> {
    pub resource_id: &'a str,
    pub force: bool,
    pub method: &'a str,
    pub records: &'a [GateCount],
}

#[derive(Debug, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub records: Vec<StoredBucket>,
}

/// The only column read back from the datastore.
#[derive(Debug, Deserialize)]
pub struct StoredBucket {
    #[serde(rename = "endObservation")]
    pub end_observation: String,
}
