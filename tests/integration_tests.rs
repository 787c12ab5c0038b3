use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use gate_occupancy::error::ConnectorError;
use gate_occupancy::model::{GateCount, RawEvent};
use gate_occupancy::output::CsvStore;
use gate_occupancy::pipeline::{AggregationEngine, Window};
use gate_occupancy::services::{EventFetcher, PAGE_SIZE, WatermarkSource};

/// Broker stand-in that honours the `observedAt >= begin` filter and paging.
struct InMemoryBroker {
    events: Vec<RawEvent>,
}

#[async_trait]
impl EventFetcher for InMemoryBroker {
    async fn fetch_data(
        &self,
        begin: DateTime<Utc>,
        offset: usize,
    ) -> Result<Vec<RawEvent>, ConnectorError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.observed_at >= begin)
            .skip(offset)
            .take(PAGE_SIZE)
            .cloned()
            .collect())
    }
}

struct PinnedWatermark(DateTime<Utc>);

#[async_trait]
impl WatermarkSource for PinnedWatermark {
    async fn last_update(&self) -> Result<DateTime<Utc>, ConnectorError> {
        Ok(self.0)
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 14, 59).unwrap()
}

fn vehicle(n: u32, description: &str, observed_at: DateTime<Utc>) -> RawEvent {
    RawEvent {
        id: format!("urn:ngsi-ld:Vehicle:{n}"),
        description: description.to_string(),
        coordinates: Some([10.0, 45.0]),
        observed_at,
    }
}

fn broker() -> InMemoryBroker {
    InMemoryBroker {
        events: vec![
            vehicle(0, "Parking: A, Gate: 1", t0() - TimeDelta::minutes(3)),
            vehicle(1, "Parking: A, Gate: 1", t0() + TimeDelta::seconds(1)),
            vehicle(2, "Parking: A, Gate: 1", t0() + TimeDelta::minutes(2)),
            vehicle(3, "Gate 1 (unknown parking)", t0() + TimeDelta::minutes(3)),
            vehicle(4, "Parking: A, Gate: 1", t0() + TimeDelta::minutes(16)),
        ],
    }
}

fn seeded_store(dir: &tempfile::TempDir, window: Window) -> CsvStore {
    let store = CsvStore::new(dir.path().join("gate_counts.csv"), window);
    let begin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    store
        .upsert(&[GateCount {
            parking: "A".into(),
            gate: "1".into(),
            coordinate1: 45.0,
            coordinate2: 10.0,
            begin_observation: begin,
            end_observation: window.bucket_end(begin),
            count: 9,
        }])
        .unwrap();
    store
}

#[tokio::test]
async fn test_runs_advance_the_watermark() {
    let window = Window::from_minutes(15).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, window);
    let engine = AggregationEngine::new(&store, broker(), &store, window);

    // first run: only the 10:15 bucket is closed
    let summary = engine
        .execute_at(t0() + TimeDelta::minutes(20))
        .await
        .unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.withheld, 1);
    assert_eq!(summary.skipped, 1);

    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 2);
    let new_row = rows
        .iter()
        .find(|gc| gc.begin_observation == Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap())
        .unwrap();
    assert_eq!(new_row.count, 2);
    assert_eq!((new_row.coordinate1, new_row.coordinate2), (45.0, 10.0));
    assert_eq!(store.last_update().await.unwrap(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 29, 59).unwrap());

    // same instant again: the watermark moved, nothing is closed yet
    let summary = engine
        .execute_at(t0() + TimeDelta::minutes(20))
        .await
        .unwrap();
    assert_eq!(summary.pages, 0);
    assert_eq!(store.load().unwrap().len(), 2);

    // later run picks up the bucket that was withheld
    let summary = engine
        .execute_at(t0() + TimeDelta::minutes(40))
        .await
        .unwrap();
    assert_eq!(summary.written, 1);

    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 3);
    let late_row = rows
        .iter()
        .find(|gc| gc.begin_observation == Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap())
        .unwrap();
    assert_eq!(late_row.count, 1);
}

#[tokio::test]
async fn test_rerun_from_same_watermark_leaves_store_unchanged() {
    let window = Window::from_minutes(15).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, window);
    let engine = AggregationEngine::new(PinnedWatermark(t0()), broker(), &store, window);
    let now = t0() + TimeDelta::minutes(20);

    engine.execute_at(now).await.unwrap();
    let first = std::fs::read_to_string(store.path()).unwrap();

    engine.execute_at(now).await.unwrap();
    let second = std::fs::read_to_string(store.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.load().unwrap().len(), 2);
}

#[tokio::test]
async fn test_descriptions_naming_same_gate_are_summed_in_store() {
    let window = Window::from_minutes(15).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("gate_counts.csv"), window);
    let broker = InMemoryBroker {
        events: vec![
            vehicle(0, "Parking: A, Gate: 1", t0() + TimeDelta::minutes(1)),
            vehicle(1, "Parking: A, Gate: 1 (north)", t0() + TimeDelta::minutes(2)),
            vehicle(2, "Parking: A, Gate: 1", t0() + TimeDelta::minutes(3)),
        ],
    };
    let engine = AggregationEngine::new(PinnedWatermark(t0()), broker, &store, window);
    let now = t0() + TimeDelta::minutes(20);

    let summary = engine.execute_at(now).await.unwrap();
    assert_eq!(summary.written, 2);

    engine.execute_at(now).await.unwrap();
    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 3);
}
