//! Local CSV store for gate counts.
//!
//! Used by the `export` command in place of CKAN: the file is both the
//! watermark source and the record sink, with one row per bucket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::model::GateCount;
use crate::pipeline::Window;
use crate::services::{RecordSink, WatermarkSource};

pub struct CsvStore {
    path: PathBuf,
    window: Window,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, window: Window) -> Self {
        Self {
            path: path.into(),
            window,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored row. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<GateCount>, ConnectorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let record: GateCount = result?;
            rows.push(record);
        }
        Ok(rows)
    }

    /// End of the newest stored bucket.
    pub fn newest_end(&self) -> Result<Option<DateTime<Utc>>, ConnectorError> {
        Ok(self.load()?.iter().map(|gc| gc.end_observation).max())
    }

    /// Merges `records` into the file, replacing rows with the same natural
    /// key. Records of one batch that share a key are summed first, so two
    /// descriptions resolving to the same gate both count. Returns the number
    /// of rows stored afterwards.
    pub fn upsert(&self, records: &[GateCount]) -> Result<usize, ConnectorError> {
        let mut batch: BTreeMap<_, GateCount> = BTreeMap::new();
        for record in records {
            batch
                .entry(record.natural_key())
                .and_modify(|gc| gc.count += record.count)
                .or_insert_with(|| record.clone());
        }

        let mut rows: BTreeMap<_, GateCount> = self
            .load()?
            .into_iter()
            .map(|gc| (gc.natural_key(), gc))
            .collect();
        rows.extend(batch);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Rewrite through a sibling file so a failed write leaves the old rows intact.
        let staging = self.path.with_extension("csv.tmp");
        let mut writer = WriterBuilder::new().has_headers(true).from_path(&staging)?;
        for row in rows.values() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&staging, &self.path)?;

        debug!(path = %self.path.display(), rows = rows.len(), "CSV store rewritten");
        Ok(rows.len())
    }
}

#[async_trait]
impl WatermarkSource for CsvStore {
    async fn last_update(&self) -> Result<DateTime<Utc>, ConnectorError> {
        match self.newest_end()? {
            Some(end) => Ok(end),
            None => {
                let bootstrap = self.window.bootstrap_watermark(Utc::now());
                info!(path = %self.path.display(), bootstrap = %bootstrap, "no record found in CSV store, bootstrapping");
                Ok(bootstrap)
            }
        }
    }
}

#[async_trait]
impl RecordSink for CsvStore {
    async fn write_data(&self, records: &[GateCount]) -> Result<(), ConnectorError> {
        if records.is_empty() {
            return Ok(());
        }
        let stored = self.upsert(records)?;
        info!(path = %self.path.display(), written = records.len(), stored, "CSV store updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn window() -> Window {
        Window::from_minutes(15).unwrap()
    }

    fn record(gate: &str, minute: u32, count: u64) -> GateCount {
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap();
        GateCount {
            parking: "A".into(),
            gate: gate.into(),
            coordinate1: 45.0,
            coordinate2: 10.0,
            begin_observation: begin,
            end_observation: window().bucket_end(begin),
            count,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());

        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.newest_end().unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_same_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());

        store.upsert(&[record("1", 0, 2), record("2", 0, 5)]).unwrap();
        let stored = store.upsert(&[record("1", 0, 3)]).unwrap();

        assert_eq!(stored, 2);
        let rows = store.load().unwrap();
        let gate1 = rows.iter().find(|gc| gc.gate == "1").unwrap();
        assert_eq!(gate1.count, 3);
    }

    #[test]
    fn test_batch_duplicates_are_summed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());
        let batch = [record("1", 0, 2), record("1", 0, 1), record("2", 0, 4)];

        store.upsert(&batch).unwrap();
        // rewriting the same batch replaces rather than accumulates
        let stored = store.upsert(&batch).unwrap();

        assert_eq!(stored, 2);
        let rows = store.load().unwrap();
        let gate1 = rows.iter().find(|gc| gc.gate == "1").unwrap();
        assert_eq!(gate1.count, 3);
    }

    #[test]
    fn test_rewriting_same_records_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        let store = CsvStore::new(&path, window());
        let records = [record("1", 0, 2), record("1", 15, 4)];

        store.upsert(&records).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        store.upsert(&records).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        // header + two rows
        assert_eq!(second.lines().count(), 3);
        assert!(second.starts_with("parking,gate,coordinate1,coordinate2,beginObservation,endObservation,count"));
    }

    #[test]
    fn test_upsert_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("nested/out/counts.csv"), window());

        store.upsert(&[record("1", 0, 1)]).unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_last_update_is_newest_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());
        store.upsert(&[record("1", 30, 1), record("2", 0, 1)]).unwrap();

        let last = store.last_update().await.unwrap();
        assert_eq!(last, Utc.with_ymd_and_hms(2024, 3, 1, 10, 44, 59).unwrap());
    }

    #[tokio::test]
    async fn test_last_update_bootstraps_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());

        let before = Utc::now();
        let last = store.last_update().await.unwrap();
        let after = Utc::now();

        assert!(last < after - TimeDelta::minutes(30));
        assert!(last >= before - TimeDelta::minutes(46));
        let begin = last + TimeDelta::seconds(1);
        assert_eq!(window().truncate(begin), Some(begin));
    }

    #[tokio::test]
    async fn test_empty_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("counts.csv"), window());

        store.write_data(&[]).await.unwrap();
        assert!(!store.path().exists());
    }
}
