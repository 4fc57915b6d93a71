use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single raw observation of an economic indicator as delivered by a source.
///
/// Observations are immutable once landed. Identity is the triple
/// `(indicator_name, observed_date, value)`; an exact re-delivery on that
/// triple is the same fact, not a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub indicator_name: String,
    pub category: String,
    /// Absent when the source delivered a row without a reading; such rows
    /// are rejected at landing as malformed.
    pub value: Option<f64>,
    pub unit: String,
    pub observed_date: NaiveDate,
    pub source: String,
}

/// A landed observation plus ingestion lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: Option<Uuid>,
    pub observation: Observation,
    pub ingestion_timestamp: DateTime<Utc>,
    pub source_tag: String,
    /// SHA-256 over the identity fields, used for idempotent re-ingestion
    /// detection. Duplicates are still appended; the raw store never drops.
    pub content_hash: String,
}

/// Direction of an indicator relative to its previous reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// One canonical, enriched record per distinct observation identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedRecord {
    pub id: Option<Uuid>,
    pub indicator_name: String,
    pub category: String,
    pub value: f64,
    pub unit: String,
    pub observed_date: NaiveDate,
    pub source: String,
    pub is_valid: bool,
    /// Reserved for source-quality weighting; 1.0 unless the configuration
    /// assigns a per-source weight.
    pub confidence: f64,
    /// Value at the immediately preceding observed date for the same
    /// indicator, or None for the earliest reading.
    pub previous_value: Option<f64>,
    pub absolute_change: Option<f64>,
    /// None when there is no previous value or the previous value is zero.
    pub percent_change: Option<f64>,
    /// Trailing average over the configured window, inclusive of this
    /// reading. Partial windows average whatever is available.
    pub rolling_average: Option<f64>,
    pub trend: Trend,
    /// Hash of the raw record this was derived from.
    pub source_row_hash: String,
}

/// Monetary policy stance derived from the policy-rate indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStance {
    Restrictive,
    Neutral,
    Accommodative,
}

/// Bucketed risk classification of the primary risk indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Latest reading of one indicator inside a reporting snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub value: f64,
    pub observed_date: NaiveDate,
    pub trend: Trend,
    pub source: String,
}

/// The single current-state reporting record for a run.
///
/// Keyed by the max observed date across all indicators in the run. A new
/// snapshot for the same date replaces the previous one; snapshots for
/// earlier dates are retained for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingSnapshot {
    pub id: Option<Uuid>,
    pub snapshot_date: NaiveDate,
    /// Wide view: latest reading per tracked indicator. Tracked indicators
    /// with no validated record are absent, never defaulted.
    pub indicators: BTreeMap<String, IndicatorReading>,
    pub policy_stance: Option<PolicyStance>,
    pub inflation_target_variance: Option<f64>,
    /// Composite health score clamped to [0, 100]; None when any of its
    /// input indicators is missing.
    pub health_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub created_at: DateTime<Utc>,
}

/// Free-text commentary attached to a reporting snapshot.
///
/// Stored separately from the snapshot so that annotator absence or failure
/// never blocks or corrupts the reporting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightAnnotation {
    pub snapshot_date: NaiveDate,
    pub narrative_text: String,
    pub provider: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Reason a record was rejected at landing or validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    MissingIndicatorName,
    MissingValue,
    NonFiniteValue,
    NegativeValue,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::MissingIndicatorName => "MISSING_INDICATOR_NAME",
            RejectionReason::MissingValue => "MISSING_VALUE",
            RejectionReason::NonFiniteValue => "NON_FINITE_VALUE",
            RejectionReason::NegativeValue => "NEGATIVE_VALUE",
        }
    }
}

/// A per-record landing rejection. Landing is best-effort; one malformed
/// observation never aborts the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandRejection {
    pub indicator_name: String,
    pub observed_date: NaiveDate,
    pub reason: RejectionReason,
}

/// Outcome of landing one batch of observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandResult {
    pub accepted: usize,
    /// Re-deliveries whose content hash was already present. Appended
    /// anyway; flagged for audit only.
    pub duplicates: usize,
    pub rejected: Vec<LandRejection>,
}

/// A record excluded by the validator, with the identity fields needed to
/// audit the exclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRejection {
    pub indicator_name: String,
    pub observed_date: NaiveDate,
    pub value: Option<f64>,
    pub reason: RejectionReason,
}

/// Output of the validate-and-enrich stage.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub records: Vec<ValidatedRecord>,
    pub rejections: Vec<ValidationRejection>,
}

/// Per-stage accept/reject counts surfaced to the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCounts {
    pub accepted: usize,
    pub rejected: usize,
    pub rejection_reasons: BTreeMap<String, usize>,
}

impl StageCounts {
    pub fn tally<'a, I>(accepted: usize, reasons: I) -> Self
    where
        I: IntoIterator<Item = &'a RejectionReason>,
    {
        let mut rejection_reasons: BTreeMap<String, usize> = BTreeMap::new();
        let mut rejected = 0;
        for reason in reasons {
            rejected += 1;
            *rejection_reasons
                .entry(reason.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self {
            accepted,
            rejected,
            rejection_reasons,
        }
    }
}

/// Summary of a complete pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub landing: Option<StageCounts>,
    pub landed_duplicates: usize,
    pub validation: Option<StageCounts>,
    pub snapshot_date: Option<NaiveDate>,
    pub annotated: bool,
}

/// Audit row for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Option<Uuid>,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<RunSummary>,
}

impl PipelineRun {
    /// Create a new pipeline run
    pub fn new(pipeline_name: String) -> Self {
        Self {
            id: None,
            pipeline_name,
            started_at: Utc::now(),
            finished_at: None,
            summary: None,
        }
    }

    /// Mark the run as finished
    pub fn finish(&mut self, summary: RunSummary) {
        self.finished_at = Some(Utc::now());
        self.summary = Some(summary);
    }
}
