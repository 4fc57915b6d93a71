use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod annotate;
mod config;
mod domain;
mod error;
mod idempotency;
mod ingest;
mod logging;
mod pipeline;
mod storage;

use crate::annotate::{Annotator, GeminiAnnotator, NullAnnotator};
use crate::config::PipelineConfig;
use crate::domain::{RawRecord, StageCounts, ValidatedRecord};
use crate::ingest::{FixtureSource, SarbHttpSource, Source};
use crate::pipeline::runner::{load_latest_stage_json, persist_stage_json};
use crate::pipeline::{LandingUseCase, PipelineRunConfig, PipelineRunner, Projector, Stage, Validator};
use crate::storage::{InMemoryStorage, RawStore};

#[derive(Parser)]
#[command(name = "sarb_pipeline")]
#[command(about = "SARB economic indicators batch pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: land, validate, project, annotate
    Run {
        /// Observation source. Available: fixture, sarb
        #[arg(long, default_value = "fixture")]
        source: String,
        /// Stages to skip (comma-separated): ingest, validate, project, annotate
        #[arg(long)]
        skip: Option<String>,
    },
    /// Fetch observations and land them in the bronze store only
    Land {
        /// Observation source. Available: fixture, sarb
        #[arg(long, default_value = "fixture")]
        source: String,
    },
    /// Replay validation from the latest bronze export
    Validate,
    /// Replay projection from the latest silver export
    Project,
}

fn create_source(name: &str) -> Option<Arc<dyn Source>> {
    match name {
        "fixture" => Some(Arc::new(FixtureSource::new())),
        "sarb" => Some(Arc::new(SarbHttpSource::with_default_series())),
        _ => None,
    }
}

fn create_annotator() -> Arc<dyn Annotator> {
    match GeminiAnnotator::from_env() {
        Some(gemini) => {
            info!("Using Gemini annotator");
            Arc::new(gemini)
        }
        None => {
            info!("GEMINI_API_KEY not set; commentary disabled");
            Arc::new(NullAnnotator::new())
        }
    }
}

fn parse_skip_stages(skip: Option<String>) -> Result<Vec<Stage>, String> {
    match skip {
        Some(list) => list.split(',').map(|s| s.parse()).collect(),
        None => Ok(Vec::new()),
    }
}

fn print_stage_counts(stage: &str, counts: &StageCounts) {
    println!("   {stage}: {} accepted, {} rejected", counts.accepted, counts.rejected);
    for (reason, count) in &counts.rejection_reasons {
        println!("      - {reason}: {count}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    logging::init_logging();
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_ref())?;

    match cli.command {
        Commands::Run { source, skip } => {
            let source = match create_source(&source) {
                Some(s) => s,
                None => {
                    println!("⚠️  Unknown source: {}", source);
                    return Ok(());
                }
            };
            let skip_stages = parse_skip_stages(skip).map_err(error::PipelineError::Config)?;
            let run_config = PipelineRunConfig::skipping(skip_stages);

            let storage = Arc::new(InMemoryStorage::new());
            let runner = PipelineRunner::new(
                config,
                source,
                create_annotator(),
                storage.clone(),
                storage.clone(),
                storage.clone(),
                storage.clone(),
                storage,
            );

            match runner.run(&run_config).await {
                Ok(summary) => {
                    println!("\n📊 Run summary:");
                    if let Some(landing) = &summary.landing {
                        print_stage_counts("Landing", landing);
                        println!("      duplicates flagged: {}", summary.landed_duplicates);
                    }
                    if let Some(validation) = &summary.validation {
                        print_stage_counts("Validation", validation);
                    }
                    match summary.snapshot_date {
                        Some(date) => println!("   Snapshot: {date}"),
                        None => println!("   Snapshot: none produced"),
                    }
                    println!("   Annotated: {}", summary.annotated);
                }
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    println!("❌ Pipeline run failed: {}", e);
                }
            }
        }
        Commands::Land { source } => {
            let source = match create_source(&source) {
                Some(s) => s,
                None => {
                    println!("⚠️  Unknown source: {}", source);
                    return Ok(());
                }
            };

            println!("📡 Fetching observations from {}...", source.source_tag());
            let observations = source.fetch().await?;

            let storage: Arc<dyn RawStore> = Arc::new(InMemoryStorage::new());
            let landing = LandingUseCase::new(storage.clone());
            let result = landing.land(observations, source.source_tag()).await?;

            let raw_records = storage.fetch_all().await?;
            let output_file =
                persist_stage_json(&raw_records, "bronze_raw", &config.output_dir)?;

            println!(
                "✅ Landed {} observations ({} duplicates, {} rejected)",
                result.accepted,
                result.duplicates,
                result.rejected.len()
            );
            println!("💾 Saved bronze export to {output_file}");
        }
        Commands::Validate => {
            let raw_records: Vec<RawRecord> =
                match load_latest_stage_json("bronze_raw", &config.output_dir)? {
                    Some(records) => records,
                    None => {
                        println!("⚠️  No bronze export found in {}; run `land` first", config.output_dir);
                        return Ok(());
                    }
                };

            println!("🔧 Validating {} raw records...", raw_records.len());
            let validator = Validator::from_config(&config);
            let outcome = validator.validate_and_enrich(&raw_records);

            let output_file =
                persist_stage_json(&outcome.records, "silver_indicators", &config.output_dir)?;

            println!(
                "✅ Validated {} records ({} excluded)",
                outcome.records.len(),
                outcome.rejections.len()
            );
            for rejection in &outcome.rejections {
                println!(
                    "   - excluded {} ({}): {}",
                    rejection.indicator_name,
                    rejection.observed_date,
                    rejection.reason.as_str()
                );
            }
            println!("💾 Saved silver export to {output_file}");
        }
        Commands::Project => {
            let validated: Vec<ValidatedRecord> =
                match load_latest_stage_json("silver_indicators", &config.output_dir)? {
                    Some(records) => records,
                    None => {
                        println!(
                            "⚠️  No silver export found in {}; run `validate` first",
                            config.output_dir
                        );
                        return Ok(());
                    }
                };

            let projector = Projector::from_config(&config);
            match projector.project(&validated) {
                Some(snapshot) => {
                    let output_file = persist_stage_json(
                        &[snapshot.clone()],
                        "gold_dashboard",
                        &config.output_dir,
                    )?;

                    println!("📊 Snapshot for {}:", snapshot.snapshot_date);
                    for (name, reading) in &snapshot.indicators {
                        println!(
                            "   {}: {} ({:?}, observed {})",
                            name, reading.value, reading.trend, reading.observed_date
                        );
                    }
                    if let Some(stance) = snapshot.policy_stance {
                        println!("   Policy stance: {stance:?}");
                    }
                    if let Some(score) = snapshot.health_score {
                        println!("   Health score: {score:.1}/100");
                    }
                    if let Some(risk) = snapshot.risk_level {
                        println!("   Risk level: {risk:?}");
                    }
                    println!("💾 Saved gold export to {output_file}");
                }
                None => {
                    println!("⚠️  No validated records to project");
                }
            }
        }
    }
    Ok(())
}
