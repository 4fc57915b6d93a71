use chrono::Utc;
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{HealthScoreWeights, IndicatorRoles, PipelineConfig, ScoringThresholds};
use crate::domain::{
    IndicatorReading, PolicyStance, ReportingSnapshot, RiskLevel, ValidatedRecord,
};

/// Projects the validated set into the single current-state reporting
/// snapshot.
///
/// A pure function over validator output: the projector has no handle to the
/// raw store at all, so data-quality rules cannot leak in here. Composite
/// fields whose input indicator is absent come out as None; a missing series
/// is never papered over with a fabricated default.
pub struct Projector {
    roles: IndicatorRoles,
    thresholds: ScoringThresholds,
    weights: HealthScoreWeights,
}

impl Projector {
    pub fn new(
        roles: IndicatorRoles,
        thresholds: ScoringThresholds,
        weights: HealthScoreWeights,
    ) -> Self {
        Self {
            roles,
            thresholds,
            weights,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.indicators.clone(),
            config.thresholds.clone(),
            config.weights.clone(),
        )
    }

    /// Produce the snapshot for the latest known state, or None when there
    /// are no validated records to project.
    pub fn project(&self, validated: &[ValidatedRecord]) -> Option<ReportingSnapshot> {
        let mut indicators: BTreeMap<String, IndicatorReading> = BTreeMap::new();

        for name in &self.roles.tracked {
            match latest_for(validated, name) {
                Some(record) => {
                    indicators.insert(
                        name.clone(),
                        IndicatorReading {
                            value: record.value,
                            observed_date: record.observed_date,
                            trend: record.trend,
                            source: record.source.clone(),
                        },
                    );
                }
                None => {
                    warn!("No validated record for tracked indicator {}", name);
                }
            }
        }

        let snapshot_date = indicators.values().map(|r| r.observed_date).max()?;

        let policy_rate = indicators.get(&self.roles.policy_rate).map(|r| r.value);
        let inflation = indicators.get(&self.roles.inflation).map(|r| r.value);
        let growth = indicators.get(&self.roles.growth).map(|r| r.value);
        let unemployment = indicators.get(&self.roles.unemployment).map(|r| r.value);
        let primary_risk = indicators.get(&self.roles.primary_risk).map(|r| r.value);

        Some(ReportingSnapshot {
            id: None,
            snapshot_date,
            policy_stance: policy_rate.map(|rate| self.policy_stance(rate)),
            inflation_target_variance: inflation
                .map(|i| (i - self.thresholds.inflation_target).abs()),
            health_score: self.health_score(growth, inflation, unemployment),
            risk_level: primary_risk.map(|value| self.risk_level(value)),
            indicators,
            created_at: Utc::now(),
        })
    }

    fn policy_stance(&self, policy_rate: f64) -> PolicyStance {
        if policy_rate > self.thresholds.restrictive_above {
            PolicyStance::Restrictive
        } else if policy_rate > self.thresholds.neutral_above {
            PolicyStance::Neutral
        } else {
            PolicyStance::Accommodative
        }
    }

    /// Weighted linear combination clamped to [0, 100]. Requires all three
    /// inputs; any missing series makes the whole score None.
    fn health_score(
        &self,
        growth: Option<f64>,
        inflation: Option<f64>,
        unemployment: Option<f64>,
    ) -> Option<f64> {
        let (growth, inflation, unemployment) = (growth?, inflation?, unemployment?);
        let w = &self.weights;
        let raw = w.base + growth * w.growth_weight
            - (inflation - self.thresholds.inflation_target).abs() * w.inflation_weight
            - (unemployment - w.unemployment_baseline) * w.unemployment_weight;
        Some(raw.clamp(0.0, 100.0))
    }

    fn risk_level(&self, value: f64) -> RiskLevel {
        if value > self.thresholds.risk_high_above {
            RiskLevel::High
        } else if value > self.thresholds.risk_medium_above {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Latest validated record for one indicator. Tie-break on equal dates is
/// the lexicographically smallest source, then the row hash, so repeated
/// projections select the same record.
fn latest_for<'a>(validated: &'a [ValidatedRecord], name: &str) -> Option<&'a ValidatedRecord> {
    validated
        .iter()
        .filter(|r| r.indicator_name == name && r.is_valid)
        .max_by(|a, b| {
            a.observed_date
                .cmp(&b.observed_date)
                .then_with(|| b.source.cmp(&a.source))
                .then_with(|| b.source_row_hash.cmp(&a.source_row_hash))
        })
}
