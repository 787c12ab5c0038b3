use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ConnectorError;
use crate::model::GateCount;

/// Reports how far aggregation has progressed.
#[async_trait]
pub trait WatermarkSource: Send + Sync {
    /// End of the newest persisted bucket, or a bootstrap instant a couple of
    /// intervals in the past when nothing has been persisted yet.
    async fn last_update(&self) -> Result<DateTime<Utc>, ConnectorError>;
}

/// Destination for finalized gate counts.
///
/// Implementations must treat `(parking, gate, begin_observation)` as the
/// record identity so a bucket written twice is stored once.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write_data(&self, records: &[GateCount]) -> Result<(), ConnectorError>;
}

#[async_trait]
impl<T: WatermarkSource + ?Sized> WatermarkSource for &T {
    async fn last_update(&self) -> Result<DateTime<Utc>, ConnectorError> {
        (**self).last_update().await
    }
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for &T {
    async fn write_data(&self, records: &[GateCount]) -> Result<(), ConnectorError> {
        (**self).write_data(records).await
    }
}
