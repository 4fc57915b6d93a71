use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::annotate::Annotator;
use crate::config::PipelineConfig;
use crate::domain::{PipelineRun, RunSummary, StageCounts};
use crate::error::Result;
use crate::ingest::Source;
use crate::pipeline::landing::LandingUseCase;
use crate::pipeline::projection::Projector;
use crate::pipeline::run_lock::RunLock;
use crate::pipeline::validation::Validator;
use crate::storage::{AnnotationStore, RawStore, RunStore, SnapshotStore, ValidatedStore};

/// Pipeline stages that can be skipped for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Validate,
    Project,
    Annotate,
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingest" => Ok(Stage::Ingest),
            "validate" => Ok(Stage::Validate),
            "project" => Ok(Stage::Project),
            "annotate" => Ok(Stage::Annotate),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// Per-run execution options. Replaces the upstream's global pause/resume
/// booleans: nothing here is shared across runs.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunConfig {
    pub skip_stages: HashSet<Stage>,
}

impl PipelineRunConfig {
    pub fn skipping<I: IntoIterator<Item = Stage>>(stages: I) -> Self {
        Self {
            skip_stages: stages.into_iter().collect(),
        }
    }

    fn runs(&self, stage: Stage) -> bool {
        !self.skip_stages.contains(&stage)
    }
}

/// Sequences one batch run: land, validate, project, annotate, persist.
///
/// Strictly sequential; the run lock serializes overlapping invocations per
/// pipeline name. Every stage is idempotent given the same raw store
/// contents, so the recovery strategy for a failed run is simply to re-run
/// the whole batch.
pub struct PipelineRunner {
    config: PipelineConfig,
    source: Arc<dyn Source>,
    annotator: Arc<dyn Annotator>,
    raw_store: Arc<dyn RawStore>,
    validated_store: Arc<dyn ValidatedStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
    annotation_store: Arc<dyn AnnotationStore>,
    run_store: Arc<dyn RunStore>,
}

impl PipelineRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn Source>,
        annotator: Arc<dyn Annotator>,
        raw_store: Arc<dyn RawStore>,
        validated_store: Arc<dyn ValidatedStore>,
        snapshot_store: Arc<dyn SnapshotStore>,
        annotation_store: Arc<dyn AnnotationStore>,
        run_store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            config,
            source,
            annotator,
            raw_store,
            validated_store,
            snapshot_store,
            annotation_store,
            run_store,
        }
    }

    /// Run the complete pipeline.
    #[instrument(skip(self, run_config), fields(pipeline = %self.config.pipeline_name))]
    pub async fn run(&self, run_config: &PipelineRunConfig) -> Result<RunSummary> {
        // At-most-one in-flight run per pipeline; released on drop
        let _lock = RunLock::acquire(&self.config.pipeline_name)?;

        info!("🚀 Starting pipeline run");
        println!("🚀 Starting pipeline run for {}", self.config.pipeline_name);
        counter!("sarb_pipeline_runs_total").increment(1);
        let t_run = std::time::Instant::now();

        let mut run = PipelineRun::new(self.config.pipeline_name.clone());
        self.run_store.create_run(&mut run).await?;

        let mut summary = RunSummary::default();

        // Stage 1: land raw observations (bronze)
        if run_config.runs(Stage::Ingest) {
            info!("📡 Fetching observations from {}", self.source.source_tag());
            println!("📡 Fetching observations from {}...", self.source.source_tag());
            let t_fetch = std::time::Instant::now();
            let observations = self.source.fetch().await?;
            histogram!("sarb_fetch_duration_seconds").record(t_fetch.elapsed().as_secs_f64());
            info!("✅ Fetched {} observations", observations.len());

            let landing = LandingUseCase::new(self.raw_store.clone());
            let land_result = landing
                .land(observations, self.source.source_tag())
                .await?;
            println!(
                "✅ Landed {} observations ({} duplicates, {} rejected)",
                land_result.accepted,
                land_result.duplicates,
                land_result.rejected.len()
            );
            summary.landed_duplicates = land_result.duplicates;
            summary.landing = Some(StageCounts::tally(
                land_result.accepted,
                land_result.rejected.iter().map(|r| &r.reason),
            ));

            let raw_records = self.raw_store.fetch_all().await?;
            persist_stage_json(&raw_records, "bronze_raw", &self.config.output_dir)?;
        } else {
            info!("⏭️ Skipping ingest stage");
        }

        // Stage 2: validate and enrich (silver). Reads only the raw store;
        // an unreadable store aborts here, before anything downstream is
        // touched.
        if run_config.runs(Stage::Validate) {
            let raw_records = self.raw_store.fetch_all().await?;
            info!("🔧 Validating {} raw records", raw_records.len());
            println!("🔧 Validating {} raw records...", raw_records.len());

            let validator = Validator::from_config(&self.config);
            let outcome = validator.validate_and_enrich(&raw_records);
            for rejection in &outcome.rejections {
                warn!(
                    "Excluded {} ({}) value {:?}: {}",
                    rejection.indicator_name,
                    rejection.observed_date,
                    rejection.value,
                    rejection.reason.as_str()
                );
            }
            summary.validation = Some(StageCounts::tally(
                outcome.records.len(),
                outcome.rejections.iter().map(|r| &r.reason),
            ));

            persist_stage_json(&outcome.records, "silver_indicators", &self.config.output_dir)?;
            let stored = self.validated_store.replace_all(outcome.records).await?;
            println!(
                "✅ Validated {} records ({} excluded)",
                stored,
                outcome.rejections.len()
            );
        } else {
            info!("⏭️ Skipping validate stage");
        }

        // Stage 3: project the reporting snapshot (gold)
        let mut snapshot = None;
        if run_config.runs(Stage::Project) {
            let validated = self.validated_store.fetch_all().await?;
            let projector = Projector::from_config(&self.config);
            match projector.project(&validated) {
                Some(mut s) => {
                    persist_stage_json(
                        &[s.clone()],
                        "gold_dashboard",
                        &self.config.output_dir,
                    )?;
                    self.snapshot_store.upsert(&mut s).await?;
                    info!("📊 Published snapshot for {}", s.snapshot_date);
                    println!("📊 Published snapshot for {}", s.snapshot_date);
                    summary.snapshot_date = Some(s.snapshot_date);
                    snapshot = Some(s);
                }
                None => {
                    warn!("No validated records to project; snapshot not produced");
                    println!("⚠️  No validated records to project");
                }
            }
        } else {
            info!("⏭️ Skipping project stage");
        }

        // Stage 4: annotation is additive, never blocking. Failures are
        // logged and swallowed; the snapshot above is already complete.
        if run_config.runs(Stage::Annotate) {
            if let Some(snapshot) = &snapshot {
                match self.annotator.annotate(snapshot).await {
                    Ok(Some(annotation)) => match self.annotation_store.put(&annotation).await {
                        Ok(()) => {
                            info!(
                                "💬 Stored {} annotation for {}",
                                annotation.provider, annotation.snapshot_date
                            );
                            summary.annotated = true;
                        }
                        Err(e) => warn!("Failed to store annotation: {}", e),
                    },
                    Ok(None) => debug!("Annotator produced no annotation"),
                    Err(e) => {
                        warn!("Annotator failed, continuing without commentary: {}", e);
                        counter!("sarb_annotator_failures_total").increment(1);
                    }
                }
            }
        } else {
            info!("⏭️ Skipping annotate stage");
        }

        run.finish(summary.clone());
        self.run_store.update_run(&run).await?;

        let total_secs = t_run.elapsed().as_secs_f64();
        histogram!("sarb_pipeline_duration_seconds").record(total_secs);
        info!("🎉 Pipeline run finished in {:.2}s", total_secs);

        push_pushgateway_metrics(&self.config.pipeline_name, &summary, total_secs).await;

        Ok(summary)
    }
}

/// Persist one stage's collection as a timestamped JSON file so the stage
/// above it can be replayed without re-running anything below.
pub fn persist_stage_json<T: Serialize>(
    records: &[T],
    stage: &str,
    output_dir: &str,
) -> Result<String> {
    fs::create_dir_all(output_dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{stage}_{timestamp}.json");
    let filepath = Path::new(output_dir).join(&filename);

    let json_content = serde_json::to_string_pretty(records)?;
    fs::write(&filepath, json_content)?;
    debug!("Wrote {} export to {}", stage, filepath.display());

    Ok(filepath.to_string_lossy().to_string())
}

/// Load the most recent JSON export for a stage. Filenames embed a sortable
/// timestamp, so the lexicographic maximum is the latest.
pub fn load_latest_stage_json<T: serde::de::DeserializeOwned>(
    stage: &str,
    output_dir: &str,
) -> Result<Option<Vec<T>>> {
    let dir = Path::new(output_dir);
    if !dir.exists() {
        return Ok(None);
    }

    let prefix = format!("{stage}_");
    let mut latest: Option<String> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.ends_with(".json") && latest.as_ref() < Some(&name) {
            latest = Some(name);
        }
    }

    match latest {
        Some(name) => {
            let content = fs::read_to_string(dir.join(&name))?;
            let records: Vec<T> = serde_json::from_str(&content)?;
            Ok(Some(records))
        }
        None => Ok(None),
    }
}

/// Push a minimal metrics snapshot to a Pushgateway if one is configured.
async fn push_pushgateway_metrics(pipeline: &str, summary: &RunSummary, duration_secs: f64) {
    let base = match std::env::var("SARB_PUSHGATEWAY_URL") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };
    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        base.trim_end_matches('/'),
        "sarb_pipeline",
        pipeline
    );

    let landed = summary.landing.as_ref().map(|c| c.accepted).unwrap_or(0);
    let validated = summary.validation.as_ref().map(|c| c.accepted).unwrap_or(0);
    let rejected = summary
        .landing
        .as_ref()
        .map(|c| c.rejected)
        .unwrap_or(0)
        + summary
            .validation
            .as_ref()
            .map(|c| c.rejected)
            .unwrap_or(0);
    let timestamp_secs = Utc::now().timestamp() as f64;

    let body = format!(
        "# TYPE sarb_pipeline_runs_total counter\n\
         sarb_pipeline_runs_total 1\n\
         # TYPE sarb_records_landed_total counter\n\
         sarb_records_landed_total {}\n\
         # TYPE sarb_records_validated_total counter\n\
         sarb_records_validated_total {}\n\
         # TYPE sarb_records_rejected_total counter\n\
         sarb_records_rejected_total {}\n\
         # TYPE sarb_pipeline_duration_seconds gauge\n\
         sarb_pipeline_duration_seconds {}\n\
         # TYPE sarb_pipeline_last_run_timestamp_seconds gauge\n\
         sarb_pipeline_last_run_timestamp_seconds {}\n",
        landed, validated, rejected, duration_secs, timestamp_secs
    );

    let client = reqwest::Client::new();
    let push_res = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match push_res {
        Ok(r) if r.status().is_success() => {
            info!("Pushed metrics to Pushgateway for pipeline={}", pipeline);
        }
        Ok(r) => {
            warn!(
                "Pushgateway push responded with status {} for pipeline={}",
                r.status().as_u16(),
                pipeline
            );
        }
        Err(e) => {
            warn!("Failed to push metrics to Pushgateway for pipeline={}: {}", pipeline, e);
        }
    }
}
