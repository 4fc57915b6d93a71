use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::Annotator;
use crate::domain::{InsightAnnotation, ReportingSnapshot};
use crate::error::{PipelineError, Result};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Commentary via the Gemini generateContent API.
pub struct GeminiAnnotator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiAnnotator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Build from `GEMINI_API_KEY`; None when the key is absent so callers
    /// can fall back to the null provider explicitly.
    pub fn from_env() -> Option<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Some(Self::new(key)),
            _ => None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn build_prompt(snapshot: &ReportingSnapshot) -> String {
        let mut lines = vec![format!(
            "South African economic indicators as of {}:",
            snapshot.snapshot_date
        )];
        for (name, reading) in &snapshot.indicators {
            lines.push(format!(
                "- {}: {} (observed {}, trend {:?})",
                name, reading.value, reading.observed_date, reading.trend
            ));
        }
        if let Some(stance) = snapshot.policy_stance {
            lines.push(format!("Monetary policy stance: {stance:?}"));
        }
        if let Some(score) = snapshot.health_score {
            lines.push(format!("Composite health score: {score:.1}/100"));
        }
        if let Some(risk) = snapshot.risk_level {
            lines.push(format!("Inflation risk level: {risk:?}"));
        }
        lines.push(
            "Provide: executive summary (1 sentence), policy assessment (1 sentence), \
             3 key risks, 3 recommendations."
                .to_string(),
        );
        lines.join("\n")
    }
}

#[async_trait]
impl Annotator for GeminiAnnotator {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn annotate(&self, snapshot: &ReportingSnapshot) -> Result<Option<InsightAnnotation>> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let request_body = json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(snapshot) }]
            }]
        });

        debug!("Requesting commentary for snapshot {}", snapshot.snapshot_date);
        let response = self.client.post(&url).json(&request_body).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Annotator(format!(
                "generateContent answered {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let narrative_text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                PipelineError::Annotator("response carried no candidate text".to_string())
            })?
            .trim()
            .to_string();

        if narrative_text.is_empty() {
            return Ok(None);
        }

        Ok(Some(InsightAnnotation {
            snapshot_date: snapshot.snapshot_date,
            narrative_text,
            provider: self.provider_name().to_string(),
            confidence: 0.9,
            created_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndicatorReading, Trend};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    #[test]
    fn prompt_names_every_indicator() {
        let mut indicators = BTreeMap::new();
        indicators.insert(
            "Inflation_Rate".to_string(),
            IndicatorReading {
                value: 5.4,
                observed_date: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
                trend: Trend::Declining,
                source: "SARB".to_string(),
            },
        );
        let snapshot = ReportingSnapshot {
            id: None,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            indicators,
            policy_stance: None,
            inflation_target_variance: None,
            health_score: Some(62.5),
            risk_level: None,
            created_at: Utc::now(),
        };

        let prompt = GeminiAnnotator::build_prompt(&snapshot);
        assert!(prompt.contains("Inflation_Rate"));
        assert!(prompt.contains("62.5/100"));
    }

    #[test]
    fn from_env_without_key_is_none() {
        std::env::remove_var(API_KEY_VAR);
        assert!(GeminiAnnotator::from_env().is_none());
    }
}
