use chrono::Utc;
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{LandRejection, LandResult, Observation, RawRecord, RejectionReason};
use crate::error::Result;
use crate::idempotency;
use crate::storage::RawStore;

/// Use case for landing raw observations in the append-only bronze store.
pub struct LandingUseCase {
    raw_store: Arc<dyn RawStore>,
}

impl LandingUseCase {
    pub fn new(raw_store: Arc<dyn RawStore>) -> Self {
        Self { raw_store }
    }

    /// Land a batch of observations.
    ///
    /// Landing is best-effort and partial-success tolerant: a malformed
    /// observation is rejected per-record and collected in the result, never
    /// raised. Re-deliveries (content hash already in the store or earlier
    /// in this batch) are still appended, raw data is never deduplicated at
    /// landing time, but they are flagged for audit.
    pub async fn land(&self, observations: Vec<Observation>, source_tag: &str) -> Result<LandResult> {
        let mut result = LandResult::default();
        let mut seen_in_batch: HashSet<String> = HashSet::new();

        for observation in observations {
            if let Some(reason) = malformed_reason(&observation) {
                warn!(
                    "Rejecting malformed observation {} ({}): {}",
                    observation.indicator_name,
                    observation.observed_date,
                    reason.as_str()
                );
                counter!("sarb_landing_rejected_total", "reason" => reason.as_str())
                    .increment(1);
                result.rejected.push(LandRejection {
                    indicator_name: observation.indicator_name,
                    observed_date: observation.observed_date,
                    reason,
                });
                continue;
            }

            let content_hash = idempotency::content_hash(&observation);
            let duplicate = seen_in_batch.contains(&content_hash)
                || self.raw_store.contains_hash(&content_hash).await?;
            if duplicate {
                debug!(
                    "Re-delivery of {} ({}), hash {}",
                    observation.indicator_name, observation.observed_date, content_hash
                );
                result.duplicates += 1;
                counter!("sarb_landing_duplicates_total").increment(1);
            }
            seen_in_batch.insert(content_hash.clone());

            let mut record = RawRecord {
                id: None,
                observation,
                ingestion_timestamp: Utc::now(),
                source_tag: source_tag.to_string(),
                content_hash,
            };
            self.raw_store.append(&mut record).await?;
            result.accepted += 1;
            counter!("sarb_landing_accepted_total").increment(1);
        }

        Ok(result)
    }
}

/// Structural checks only. Data-quality rules (negative values and the
/// like) belong to the validator.
fn malformed_reason(observation: &Observation) -> Option<RejectionReason> {
    if observation.indicator_name.trim().is_empty() {
        return Some(RejectionReason::MissingIndicatorName);
    }
    match observation.value {
        None => Some(RejectionReason::MissingValue),
        Some(v) if !v.is_finite() => Some(RejectionReason::NonFiniteValue),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::NaiveDate;

    fn observation(name: &str, value: Option<f64>, date: NaiveDate) -> Observation {
        Observation {
            indicator_name: name.to_string(),
            category: "Economic Growth".to_string(),
            value,
            unit: "Percentage".to_string(),
            observed_date: date,
            source: "SARB".to_string(),
        }
    }

    #[tokio::test]
    async fn lands_well_formed_observations() {
        let storage = Arc::new(InMemoryStorage::new());
        let landing = LandingUseCase::new(storage.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        let result = landing
            .land(
                vec![
                    observation("GDP_Growth_Rate", Some(2.3), date),
                    observation("Inflation_Rate", Some(5.4), date),
                ],
                "sarb_api",
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, 2);
        assert_eq!(result.duplicates, 0);
        assert!(result.rejected.is_empty());
        assert_eq!(storage.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn malformed_records_are_rejected_without_aborting_the_batch() {
        let storage = Arc::new(InMemoryStorage::new());
        let landing = LandingUseCase::new(storage.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        let result = landing
            .land(
                vec![
                    observation("", Some(2.3), date),
                    observation("Inflation_Rate", None, date),
                    observation("GDP_Growth_Rate", Some(f64::NAN), date),
                    observation("Unemployment_Rate", Some(32.1), date),
                ],
                "sarb_api",
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, 1);
        assert_eq!(result.rejected.len(), 3);
        let reasons: Vec<RejectionReason> =
            result.rejected.iter().map(|r| r.reason).collect();
        assert!(reasons.contains(&RejectionReason::MissingIndicatorName));
        assert!(reasons.contains(&RejectionReason::MissingValue));
        assert!(reasons.contains(&RejectionReason::NonFiniteValue));
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn re_delivery_is_appended_and_flagged_duplicate() {
        let storage = Arc::new(InMemoryStorage::new());
        let landing = LandingUseCase::new(storage.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        let first = landing
            .land(vec![observation("GDP_Growth_Rate", Some(2.3), date)], "sarb_api")
            .await
            .unwrap();
        assert_eq!(first.duplicates, 0);

        let second = landing
            .land(vec![observation("GDP_Growth_Rate", Some(2.3), date)], "sarb_api")
            .await
            .unwrap();

        assert_eq!(second.accepted, 1);
        assert_eq!(second.duplicates, 1);
        // Append-only: both deliveries are in the store
        assert_eq!(storage.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_within_a_single_batch_is_flagged() {
        let storage = Arc::new(InMemoryStorage::new());
        let landing = LandingUseCase::new(storage.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        let result = landing
            .land(
                vec![
                    observation("GDP_Growth_Rate", Some(2.3), date),
                    observation("GDP_Growth_Rate", Some(2.3), date),
                ],
                "sarb_api",
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, 2);
        assert_eq!(result.duplicates, 1);
    }
}
