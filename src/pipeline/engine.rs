//! The watermark-driven fetch, aggregate and write loop.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::subject::{GateDescriptionParser, SubjectParser};
use super::table::{AggregationTable, BucketKey};
use super::window::{TIME_UNIT, Window};
use crate::error::PipelineError;
use crate::model::RawEvent;
use crate::services::{EventFetcher, PAGE_SIZE, RecordSink, WatermarkSource};

/// What a single run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Lower bound used for the event query (`watermark + 1s`).
    pub begin: DateTime<Utc>,
    pub pages: usize,
    pub fetched: usize,
    /// Events that couldn't be attributed to a gate bucket.
    pub skipped: usize,
    pub written: usize,
    /// Buckets still inside the trailing window, left for a later run.
    pub withheld: usize,
}

/// Turns the vehicle events observed since the last watermark into
/// finalized per-gate counts and hands them to the sink.
pub struct AggregationEngine<W, F, S, P = GateDescriptionParser> {
    watermark: W,
    fetcher: F,
    sink: S,
    parser: P,
    window: Window,
}

impl<W, F, S> AggregationEngine<W, F, S> {
    pub fn new(watermark: W, fetcher: F, sink: S, window: Window) -> Self {
        Self {
            watermark,
            fetcher,
            sink,
            parser: GateDescriptionParser,
            window,
        }
    }
}

impl<W, F, S, P> AggregationEngine<W, F, S, P> {
    /// Replaces the description parser.
    pub fn with_parser<Q>(self, parser: Q) -> AggregationEngine<W, F, S, Q> {
        AggregationEngine {
            watermark: self.watermark,
            fetcher: self.fetcher,
            sink: self.sink,
            parser,
            window: self.window,
        }
    }
}

impl<W, F, S, P> AggregationEngine<W, F, S, P>
where
    W: WatermarkSource,
    F: EventFetcher,
    S: RecordSink,
    P: SubjectParser,
{
    /// Runs the pipeline once against the current wall clock.
    pub async fn execute(&self) -> Result<RunSummary, PipelineError> {
        self.execute_at(Utc::now()).await
    }

    /// Runs the pipeline once, treating `now` as the current instant.
    ///
    /// Nothing is written unless every page was fetched successfully.
    #[tracing::instrument(
        name = "aggregation_run",
        skip(self),
        fields(interval_minutes = self.window.interval().num_minutes())
    )]
    pub async fn execute_at(&self, now: DateTime<Utc>) -> Result<RunSummary, PipelineError> {
        let last_update = self
            .watermark
            .last_update()
            .await
            .map_err(PipelineError::LastUpdate)?;
        info!(last_update = %last_update, "last update");

        let begin = last_update + TIME_UNIT;
        let mut summary = RunSummary {
            begin,
            pages: 0,
            fetched: 0,
            skipped: 0,
            written: 0,
            withheld: 0,
        };

        if !self.window.has_closed_window(begin, now) {
            info!(begin = %begin, "no new data");
            return Ok(summary);
        }

        let mut table = AggregationTable::new();
        let mut offset = 0;

        loop {
            let page = self
                .fetcher
                .fetch_data(begin, offset)
                .await
                .map_err(|source| PipelineError::Fetch { offset, source })?;

            let page_len = page.len();
            summary.pages += 1;
            summary.fetched += page_len;
            info!(begin = %begin, count = page_len, offset, "fetched data");

            summary.skipped += self.fold(&mut table, page);

            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(buckets = table.len(), "aggregation table complete");
        let (records, withheld) = table.into_closed(&self.window, now);
        summary.withheld = withheld;

        // Sorted output keeps same-key records adjacent.
        let shared_keys = records
            .windows(2)
            .filter(|pair| pair[0].natural_key() == pair[1].natural_key())
            .count();
        if shared_keys > 0 {
            warn!(
                shared_keys,
                "different descriptions resolved to the same gate bucket"
            );
        }

        self.sink
            .write_data(&records)
            .await
            .map_err(|source| PipelineError::Write {
                records: records.len(),
                source,
            })?;
        summary.written = records.len();

        info!(
            count = summary.written,
            withheld = summary.withheld,
            skipped = summary.skipped,
            "aggregate data written"
        );
        Ok(summary)
    }

    /// Folds one page into the table, returning how many events were skipped.
    fn fold(&self, table: &mut AggregationTable, events: Vec<RawEvent>) -> usize {
        let mut skipped = 0;

        for event in events {
            let Some(begin) = self.window.truncate(event.observed_at) else {
                warn!(event_id = %event.id, observed_at = %event.observed_at, "can't truncate observation time. Skipped");
                skipped += 1;
                continue;
            };

            let Some(subject) = self.parser.parse(&event.description) else {
                warn!(event_id = %event.id, description = %event.description, "can't parse description. Skipped");
                skipped += 1;
                continue;
            };

            let Some(coordinates) = event.coordinates else {
                warn!(event_id = %event.id, "missing coordinate pair. Skipped");
                skipped += 1;
                continue;
            };

            let key = BucketKey {
                subject: event.description,
                begin,
            };
            table.record(key, subject, coordinates, &self.window);
        }

        skipped
    }
}
