//! Traits for the collaborators the aggregation pipeline talks to.
//!
//! [`EventFetcher`] reads raw vehicle events page by page.
//! [`WatermarkSource`] tells where the previous run stopped.
//! [`RecordSink`] persists finished gate counts, idempotently per bucket.

mod datastore;
mod event_fetcher;

pub use datastore::{RecordSink, WatermarkSource};
pub use event_fetcher::{EventFetcher, PAGE_SIZE};
