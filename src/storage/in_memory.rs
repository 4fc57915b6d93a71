use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::{AnnotationStore, RawStore, RunStore, SnapshotStore, ValidatedStore};
use crate::domain::{
    InsightAnnotation, PipelineRun, RawRecord, ReportingSnapshot, ValidatedRecord,
};
use crate::error::{PipelineError, Result};

/// In-memory storage implementation for development/testing.
///
/// One struct backs all stage stores; each collection is its own map so the
/// stage boundaries stay as separate as they would be across warehouse
/// tables.
pub struct InMemoryStorage {
    raw_records: Arc<Mutex<Vec<RawRecord>>>,
    validated: Arc<Mutex<Vec<ValidatedRecord>>>,
    snapshots: Arc<Mutex<HashMap<NaiveDate, ReportingSnapshot>>>,
    annotations: Arc<Mutex<HashMap<NaiveDate, InsightAnnotation>>>,
    runs: Arc<Mutex<HashMap<Uuid, PipelineRun>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            raw_records: Arc::new(Mutex::new(Vec::new())),
            validated: Arc::new(Mutex::new(Vec::new())),
            snapshots: Arc::new(Mutex::new(HashMap::new())),
            annotations: Arc::new(Mutex::new(HashMap::new())),
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl RawStore for InMemoryStorage {
    async fn append(&self, record: &mut RawRecord) -> Result<()> {
        let id = Uuid::new_v4();
        record.id = Some(id);

        let mut raw_records = self.raw_records.lock().unwrap();
        raw_records.push(record.clone());

        debug!(
            "Landed raw record: {} ({}) with id {}",
            record.observation.indicator_name, record.observation.observed_date, id
        );
        Ok(())
    }

    async fn contains_hash(&self, content_hash: &str) -> Result<bool> {
        let raw_records = self.raw_records.lock().unwrap();
        Ok(raw_records.iter().any(|r| r.content_hash == content_hash))
    }

    async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
        let raw_records = self.raw_records.lock().unwrap();
        Ok(raw_records.clone())
    }

    async fn count(&self) -> Result<usize> {
        let raw_records = self.raw_records.lock().unwrap();
        Ok(raw_records.len())
    }
}

#[async_trait]
impl ValidatedStore for InMemoryStorage {
    async fn replace_all(&self, records: Vec<ValidatedRecord>) -> Result<usize> {
        let mut validated = self.validated.lock().unwrap();
        validated.clear();
        for mut record in records {
            record.id = Some(Uuid::new_v4());
            validated.push(record);
        }

        debug!("Replaced validated set with {} records", validated.len());
        Ok(validated.len())
    }

    async fn fetch_all(&self) -> Result<Vec<ValidatedRecord>> {
        let validated = self.validated.lock().unwrap();
        Ok(validated.clone())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStorage {
    async fn upsert(&self, snapshot: &mut ReportingSnapshot) -> Result<()> {
        if snapshot.id.is_none() {
            snapshot.id = Some(Uuid::new_v4());
        }

        let mut snapshots = self.snapshots.lock().unwrap();
        let replaced = snapshots
            .insert(snapshot.snapshot_date, snapshot.clone())
            .is_some();

        debug!(
            "{} snapshot for {}",
            if replaced { "Replaced" } else { "Created" },
            snapshot.snapshot_date
        );
        Ok(())
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<ReportingSnapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots.get(&date).cloned())
    }

    async fn fetch_latest(&self) -> Result<Option<ReportingSnapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots
            .values()
            .max_by_key(|s| s.snapshot_date)
            .cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<ReportingSnapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        let mut all: Vec<ReportingSnapshot> = snapshots.values().cloned().collect();
        all.sort_by_key(|s| s.snapshot_date);
        Ok(all)
    }
}

#[async_trait]
impl AnnotationStore for InMemoryStorage {
    async fn put(&self, annotation: &InsightAnnotation) -> Result<()> {
        let mut annotations = self.annotations.lock().unwrap();
        annotations.insert(annotation.snapshot_date, annotation.clone());

        debug!(
            "Stored {} annotation for {}",
            annotation.provider, annotation.snapshot_date
        );
        Ok(())
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<InsightAnnotation>> {
        let annotations = self.annotations.lock().unwrap();
        Ok(annotations.get(&date).cloned())
    }
}

#[async_trait]
impl RunStore for InMemoryStorage {
    async fn create_run(&self, run: &mut PipelineRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let mut runs = self.runs.lock().unwrap();
        runs.insert(id, run.clone());

        debug!("Created pipeline run: {} with id {}", run.pipeline_name, id);
        Ok(())
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<()> {
        let run_id = run.id.ok_or_else(|| {
            PipelineError::StageIo("Cannot update pipeline run without ID".to_string())
        })?;

        let mut runs = self.runs.lock().unwrap();
        runs.insert(run_id, run.clone());

        debug!("Updated pipeline run: {} with id {}", run.pipeline_name, run_id);
        Ok(())
    }
}
