use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Tie-break applied when two raw records share an identity triple and an
/// ingestion timestamp. The upstream never defined this; it is a
/// configuration hook rather than a guessed behavior.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupeTieBreak {
    SmallestSourceTag,
    SmallestContentHash,
}

/// Which indicator series feed each composite field of the snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorRoles {
    pub policy_rate: String,
    pub inflation: String,
    pub growth: String,
    pub unemployment: String,
    /// Indicator the risk-level buckets are computed against.
    pub primary_risk: String,
    /// Indicators pivoted into the wide snapshot columns.
    pub tracked: Vec<String>,
}

impl Default for IndicatorRoles {
    fn default() -> Self {
        Self {
            policy_rate: "Prime_Interest_Rate".to_string(),
            inflation: "Inflation_Rate".to_string(),
            growth: "GDP_Growth_Rate".to_string(),
            unemployment: "Unemployment_Rate".to_string(),
            primary_risk: "Inflation_Rate".to_string(),
            tracked: vec![
                "GDP_Growth_Rate".to_string(),
                "Inflation_Rate".to_string(),
                "Prime_Interest_Rate".to_string(),
                "Unemployment_Rate".to_string(),
                "USD_ZAR_Exchange_Rate".to_string(),
            ],
        }
    }
}

/// Policy-stance and risk thresholds. SARB inflation target midpoint is
/// 4.5%; the stance bands follow the repo rate cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringThresholds {
    pub restrictive_above: f64,
    pub neutral_above: f64,
    pub inflation_target: f64,
    pub risk_high_above: f64,
    pub risk_medium_above: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            restrictive_above: 10.0,
            neutral_above: 7.0,
            inflation_target: 4.5,
            risk_high_above: 6.0,
            risk_medium_above: 4.5,
        }
    }
}

/// Weights of the composite health score:
/// `base + growth*growth_weight - |inflation - target|*inflation_weight
///  - (unemployment - unemployment_baseline)*unemployment_weight`,
/// clamped to [0, 100].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthScoreWeights {
    pub base: f64,
    pub growth_weight: f64,
    pub inflation_weight: f64,
    pub unemployment_weight: f64,
    pub unemployment_baseline: f64,
}

impl Default for HealthScoreWeights {
    fn default() -> Self {
        Self {
            base: 50.0,
            growth_weight: 10.0,
            inflation_weight: 5.0,
            unemployment_weight: 0.5,
            unemployment_baseline: 25.0,
        }
    }
}

/// Pipeline configuration. Thresholds, weights and the rolling window live
/// here so every stage consumes one definition instead of drifting copies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline_name: String,
    pub output_dir: String,
    /// Trailing window for rolling averages, inclusive of the current
    /// reading.
    pub rolling_window: usize,
    pub dedupe_tie_break: DedupeTieBreak,
    /// Per-source confidence weights; sources not listed score 1.0.
    pub source_confidence: BTreeMap<String, f64>,
    pub indicators: IndicatorRoles,
    pub thresholds: ScoringThresholds,
    pub weights: HealthScoreWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: "sarb_economic_indicators".to_string(),
            output_dir: "output".to_string(),
            rolling_window: 4,
            dedupe_tie_break: DedupeTieBreak::SmallestSourceTag,
            source_confidence: BTreeMap::new(),
            indicators: IndicatorRoles::default(),
            thresholds: ScoringThresholds::default(),
            weights: HealthScoreWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `config.toml` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from an explicit path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: PipelineConfig = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, else fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None if Path::new("config.toml").exists() => Self::load(),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(PipelineError::Config(
                "rolling_window must be at least 1".to_string(),
            ));
        }
        if self.thresholds.neutral_above > self.thresholds.restrictive_above {
            return Err(PipelineError::Config(
                "neutral_above cannot exceed restrictive_above".to_string(),
            ));
        }
        if self.thresholds.risk_medium_above > self.thresholds.risk_high_above {
            return Err(PipelineError::Config(
                "risk_medium_above cannot exceed risk_high_above".to_string(),
            ));
        }
        Ok(())
    }
}
