use async_trait::async_trait;
use tracing::debug;

use super::Annotator;
use crate::domain::{InsightAnnotation, ReportingSnapshot};
use crate::error::Result;

/// The explicit "no AI available" path. Annotates nothing, fails never.
pub struct NullAnnotator;

impl NullAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Annotator for NullAnnotator {
    fn provider_name(&self) -> &str {
        "null"
    }

    async fn annotate(&self, snapshot: &ReportingSnapshot) -> Result<Option<InsightAnnotation>> {
        debug!(
            "Null annotator: no commentary for snapshot {}",
            snapshot.snapshot_date
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[tokio::test]
    async fn null_annotator_returns_none() {
        let snapshot = ReportingSnapshot {
            id: None,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 10, 21).unwrap(),
            indicators: Default::default(),
            policy_stance: None,
            inflation_target_variance: None,
            health_score: None,
            risk_level: None,
            created_at: Utc::now(),
        };

        let annotator = NullAnnotator::new();
        let result = annotator.annotate(&snapshot).await.unwrap();
        assert!(result.is_none());
    }
}
