use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ConnectorError;
use crate::model::RawEvent;

/// Number of events requested per page. A shorter page is the last one.
pub const PAGE_SIZE: usize = 1000;

/// Source of raw vehicle events.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    /// Returns at most [`PAGE_SIZE`] events observed at or after `begin`,
    /// skipping the first `offset` matches.
    async fn fetch_data(
        &self,
        begin: DateTime<Utc>,
        offset: usize,
    ) -> Result<Vec<RawEvent>, ConnectorError>;
}

#[async_trait]
impl<T: EventFetcher + ?Sized> EventFetcher for &T {
    async fn fetch_data(
        &self,
        begin: DateTime<Utc>,
        offset: usize,
    ) -> Result<Vec<RawEvent>, ConnectorError> {
        (**self).fetch_data(begin, offset).await
    }
}
