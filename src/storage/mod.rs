// Stage stores: one addressable collection per pipeline stage so any stage
// can be recomputed by replaying from the stage below it.

pub mod in_memory;

pub use in_memory::InMemoryStorage;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    InsightAnnotation, PipelineRun, RawRecord, ReportingSnapshot, ValidatedRecord,
};
use crate::error::Result;

/// Append-only landing store for raw observations.
///
/// There are deliberately no update or delete operations: the record count
/// only ever grows. Deduplication is the validator's job, not the store's.
#[async_trait]
pub trait RawStore: Send + Sync {
    async fn append(&self, record: &mut RawRecord) -> Result<()>;
    async fn contains_hash(&self, content_hash: &str) -> Result<bool>;
    async fn fetch_all(&self) -> Result<Vec<RawRecord>>;
    async fn count(&self) -> Result<usize>;
}

/// Canonical validated-record set, rebuilt wholesale each run.
#[async_trait]
pub trait ValidatedStore: Send + Sync {
    async fn replace_all(&self, records: Vec<ValidatedRecord>) -> Result<usize>;
    async fn fetch_all(&self) -> Result<Vec<ValidatedRecord>>;
}

/// Reporting snapshots keyed by snapshot date. A new snapshot replaces the
/// one for the same date; earlier dates are retained for history.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn upsert(&self, snapshot: &mut ReportingSnapshot) -> Result<()>;
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<ReportingSnapshot>>;
    async fn fetch_latest(&self) -> Result<Option<ReportingSnapshot>>;
    async fn fetch_all(&self) -> Result<Vec<ReportingSnapshot>>;
}

/// Insight annotations, stored apart from snapshots so annotator failures
/// never touch reporting output.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn put(&self, annotation: &InsightAnnotation) -> Result<()>;
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<InsightAnnotation>>;
}

/// Audit trail of pipeline runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &mut PipelineRun) -> Result<()>;
    async fn update_run(&self, run: &PipelineRun) -> Result<()>;
}
