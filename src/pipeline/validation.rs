use metrics::counter;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::{DedupeTieBreak, PipelineConfig};
use crate::domain::{
    RawRecord, RejectionReason, Trend, ValidatedRecord, ValidationOutcome, ValidationRejection,
};

/// Identity triple key for raw-record deduplication. Values are compared by
/// bit pattern; non-finite values never reach the grouping step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdentityKey {
    indicator_name: String,
    observed_date: chrono::NaiveDate,
    value_bits: u64,
}

/// Turns the raw store's current contents into the canonical validated set.
///
/// This is a pure function of its input: the same raw records produce the
/// same validated records on every run. All wall-clock-dependent fields stay
/// behind in the raw store.
pub struct Validator {
    rolling_window: usize,
    tie_break: DedupeTieBreak,
    source_confidence: BTreeMap<String, f64>,
}

impl Validator {
    pub fn new(
        rolling_window: usize,
        tie_break: DedupeTieBreak,
        source_confidence: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            rolling_window,
            tie_break,
            source_confidence,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.rolling_window,
            config.dedupe_tie_break,
            config.source_confidence.clone(),
        )
    }

    /// Validate and enrich the full raw record set.
    ///
    /// Excluded records are returned as rejections with a reason code, never
    /// silently dropped.
    pub fn validate_and_enrich(&self, raw_records: &[RawRecord]) -> ValidationOutcome {
        let mut rejections = Vec::new();

        // Step 1: last-write-wins dedup on the identity triple
        let mut survivors: HashMap<IdentityKey, &RawRecord> = HashMap::new();
        for record in raw_records {
            let value = match record.observation.value {
                Some(v) if v.is_finite() => v,
                Some(_) => {
                    rejections.push(rejection(record, RejectionReason::NonFiniteValue));
                    continue;
                }
                None => {
                    rejections.push(rejection(record, RejectionReason::MissingValue));
                    continue;
                }
            };

            let key = IdentityKey {
                indicator_name: record.observation.indicator_name.clone(),
                observed_date: record.observation.observed_date,
                value_bits: value.to_bits(),
            };
            match survivors.get(&key) {
                Some(current) if self.wins(current, record) => {}
                _ => {
                    survivors.insert(key, record);
                }
            }
        }

        // Step 2: validity check on the surviving records
        let mut by_indicator: BTreeMap<String, Vec<&RawRecord>> = BTreeMap::new();
        for record in survivors.into_values() {
            let value = record.observation.value.unwrap_or_default();
            if value < 0.0 {
                rejections.push(rejection(record, RejectionReason::NegativeValue));
                counter!("sarb_validation_rejected_total", "reason" => "NEGATIVE_VALUE")
                    .increment(1);
                continue;
            }
            by_indicator
                .entry(record.observation.indicator_name.clone())
                .or_default()
                .push(record);
        }

        // Step 3: per-indicator enrichment in observed-date order
        let mut records = Vec::new();
        for (indicator_name, mut partition) in by_indicator {
            partition.sort_by(|a, b| order_within_indicator(a, b));
            debug!(
                "Enriching {} readings for {}",
                partition.len(),
                indicator_name
            );

            let values: Vec<f64> = partition
                .iter()
                .map(|r| r.observation.value.unwrap_or_default())
                .collect();

            for (idx, raw) in partition.iter().enumerate() {
                let value = values[idx];
                let previous_value = if idx > 0 { Some(values[idx - 1]) } else { None };
                let absolute_change = previous_value.map(|prev| value - prev);
                let percent_change = match previous_value {
                    Some(prev) if prev != 0.0 => Some((value - prev) / prev * 100.0),
                    _ => None,
                };
                let window_start = idx + 1 - self.rolling_window.min(idx + 1);
                let window = &values[window_start..=idx];
                let rolling_average = Some(window.iter().sum::<f64>() / window.len() as f64);
                let trend = match previous_value {
                    Some(prev) if value > prev => Trend::Improving,
                    Some(prev) if value < prev => Trend::Declining,
                    _ => Trend::Stable,
                };

                records.push(ValidatedRecord {
                    id: None,
                    indicator_name: indicator_name.clone(),
                    category: raw.observation.category.clone(),
                    value,
                    unit: raw.observation.unit.clone(),
                    observed_date: raw.observation.observed_date,
                    source: raw.observation.source.clone(),
                    is_valid: true,
                    confidence: self.confidence_for(&raw.observation.source),
                    previous_value,
                    absolute_change,
                    percent_change,
                    rolling_average,
                    trend,
                    source_row_hash: raw.content_hash.clone(),
                });
            }
        }

        rejections.sort_by(|a, b| {
            (&a.indicator_name, a.observed_date).cmp(&(&b.indicator_name, b.observed_date))
        });
        counter!("sarb_validation_accepted_total").increment(records.len() as u64);

        ValidationOutcome {
            records,
            rejections,
        }
    }

    /// Whether `current` beats `challenger` for the same identity triple.
    /// Latest ingestion timestamp wins; the configured tie-break resolves
    /// equal timestamps, with the content hash as the final disambiguator.
    fn wins(&self, current: &RawRecord, challenger: &RawRecord) -> bool {
        match current
            .ingestion_timestamp
            .cmp(&challenger.ingestion_timestamp)
        {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                let tie = match self.tie_break {
                    DedupeTieBreak::SmallestSourceTag => {
                        current.source_tag.cmp(&challenger.source_tag)
                    }
                    DedupeTieBreak::SmallestContentHash => {
                        current.content_hash.cmp(&challenger.content_hash)
                    }
                };
                match tie {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => current.content_hash <= challenger.content_hash,
                }
            }
        }
    }

    fn confidence_for(&self, source: &str) -> f64 {
        self.source_confidence.get(source).copied().unwrap_or(1.0)
    }
}

fn rejection(record: &RawRecord, reason: RejectionReason) -> ValidationRejection {
    ValidationRejection {
        indicator_name: record.observation.indicator_name.clone(),
        observed_date: record.observation.observed_date,
        value: record.observation.value,
        reason,
    }
}

/// Stable ordering within one indicator partition: observed date first, then
/// value bits and source tag so same-date readings enrich deterministically.
fn order_within_indicator(a: &RawRecord, b: &RawRecord) -> Ordering {
    a.observation
        .observed_date
        .cmp(&b.observation.observed_date)
        .then_with(|| {
            let a_bits = a.observation.value.unwrap_or_default().to_bits();
            let b_bits = b.observation.value.unwrap_or_default().to_bits();
            a_bits.cmp(&b_bits)
        })
        .then_with(|| a.source_tag.cmp(&b.source_tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn raw(
        name: &str,
        value: Option<f64>,
        date: NaiveDate,
        ingested_offset_secs: i64,
    ) -> RawRecord {
        let observation = Observation {
            indicator_name: name.to_string(),
            category: "Economic Growth".to_string(),
            value,
            unit: "Percentage".to_string(),
            observed_date: date,
            source: "SARB".to_string(),
        };
        let content_hash = crate::idempotency::content_hash(&observation);
        RawRecord {
            id: None,
            observation,
            ingestion_timestamp: Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
                + Duration::seconds(ingested_offset_secs),
            source_tag: "test".to_string(),
            content_hash,
        }
    }

    fn validator() -> Validator {
        Validator::new(4, DedupeTieBreak::SmallestSourceTag, BTreeMap::new())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn earliest_reading_has_null_deltas_and_stable_trend() {
        let outcome = validator()
            .validate_and_enrich(&[raw("GDP_Growth_Rate", Some(1.9), date(2024, 6, 30), 0)]);

        assert_eq!(outcome.records.len(), 1);
        let first = &outcome.records[0];
        assert_eq!(first.previous_value, None);
        assert_eq!(first.absolute_change, None);
        assert_eq!(first.percent_change, None);
        assert_eq!(first.trend, Trend::Stable);
        // One reading still yields a rolling average over itself
        assert_eq!(first.rolling_average, Some(1.9));
    }

    #[test]
    fn period_over_period_deltas_follow_date_order() {
        // Delivered out of order on purpose
        let outcome = validator().validate_and_enrich(&[
            raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0),
            raw("GDP_Growth_Rate", Some(1.9), date(2024, 6, 30), 1),
        ]);

        assert_eq!(outcome.records.len(), 2);
        let september = outcome
            .records
            .iter()
            .find(|r| r.observed_date == date(2024, 9, 30))
            .unwrap();
        assert_eq!(september.previous_value, Some(1.9));
        assert!((september.absolute_change.unwrap() - 0.4).abs() < 1e-9);
        assert!((september.percent_change.unwrap() - 21.052631578947366).abs() < 1e-9);
        assert_eq!(september.trend, Trend::Improving);
    }

    #[test]
    fn zero_previous_value_yields_null_percent_change() {
        let outcome = validator().validate_and_enrich(&[
            raw("GDP_Growth_Rate", Some(0.0), date(2024, 6, 30), 0),
            raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 1),
        ]);

        let september = outcome
            .records
            .iter()
            .find(|r| r.observed_date == date(2024, 9, 30))
            .unwrap();
        assert_eq!(september.previous_value, Some(0.0));
        assert_eq!(september.absolute_change, Some(2.3));
        assert_eq!(september.percent_change, None);
    }

    #[test]
    fn negative_values_are_rejected_with_reason() {
        let outcome = validator().validate_and_enrich(&[
            raw("Inflation_Rate", Some(-5.0), date(2024, 9, 30), 0),
            raw("Inflation_Rate", Some(5.4), date(2024, 8, 31), 1),
        ]);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].reason, RejectionReason::NegativeValue);
        assert_eq!(outcome.rejections[0].value, Some(-5.0));
    }

    #[test]
    fn exact_re_delivery_collapses_to_one_record() {
        let outcome = validator().validate_and_enrich(&[
            raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0),
            raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 60),
        ]);

        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.rejections.is_empty());
    }

    #[test]
    fn same_identity_keeps_latest_arriving_record() {
        let early = raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0);
        let mut late = raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 120);
        // Same identity triple, revised non-identity fields
        late.observation.source = "SARB_REVISED".to_string();

        let outcome = validator().validate_and_enrich(&[late, early]);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].source, "SARB_REVISED");
    }

    #[test]
    fn equal_timestamps_resolve_by_configured_tie_break() {
        let mut a = raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0);
        a.source_tag = "alpha".to_string();
        let mut b = raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0);
        b.source_tag = "beta".to_string();

        let outcome = validator().validate_and_enrich(&[b.clone(), a.clone()]);
        assert_eq!(outcome.records.len(), 1);

        // Run twice with reversed input order; the survivor must not change
        let again = validator().validate_and_enrich(&[a, b]);
        assert_eq!(outcome.records[0], again.records[0]);
    }

    #[test]
    fn rolling_average_uses_trailing_window() {
        let outcome = validator().validate_and_enrich(&[
            raw("Inflation_Rate", Some(6.1), date(2024, 4, 30), 0),
            raw("Inflation_Rate", Some(5.6), date(2024, 5, 31), 1),
            raw("Inflation_Rate", Some(5.2), date(2024, 6, 30), 2),
            raw("Inflation_Rate", Some(5.1), date(2024, 7, 31), 3),
            raw("Inflation_Rate", Some(4.8), date(2024, 8, 31), 4),
        ]);

        let august = outcome
            .records
            .iter()
            .find(|r| r.observed_date == date(2024, 8, 31))
            .unwrap();
        // Window of 4: May through August
        let expected = (5.6 + 5.2 + 5.1 + 4.8) / 4.0;
        assert!((august.rolling_average.unwrap() - expected).abs() < 1e-9);

        let may = outcome
            .records
            .iter()
            .find(|r| r.observed_date == date(2024, 5, 31))
            .unwrap();
        // Partial window: April and May only
        assert!((may.rolling_average.unwrap() - (6.1 + 5.6) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_deterministic_across_input_orderings() {
        let records = vec![
            raw("Inflation_Rate", Some(5.4), date(2024, 9, 30), 3),
            raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 1),
            raw("GDP_Growth_Rate", Some(1.9), date(2024, 6, 30), 2),
            raw("Unemployment_Rate", Some(32.1), date(2024, 6, 30), 0),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let a = validator().validate_and_enrich(&records);
        let b = validator().validate_and_enrich(&reversed);

        assert_eq!(a.records, b.records);
        assert_eq!(
            serde_json::to_string(&a.records).unwrap(),
            serde_json::to_string(&b.records).unwrap()
        );
    }

    #[test]
    fn configured_source_confidence_is_applied() {
        let mut confidence = BTreeMap::new();
        confidence.insert("StatsSA".to_string(), 0.8);
        let validator = Validator::new(4, DedupeTieBreak::SmallestSourceTag, confidence);

        let mut record = raw("Unemployment_Rate", Some(32.1), date(2024, 6, 30), 0);
        record.observation.source = "StatsSA".to_string();
        let outcome = validator.validate_and_enrich(&[record]);

        assert_eq!(outcome.records[0].confidence, 0.8);
    }

    #[test]
    fn unknown_source_defaults_to_full_confidence() {
        let outcome =
            validator().validate_and_enrich(&[raw("GDP_Growth_Rate", Some(2.3), date(2024, 9, 30), 0)]);
        assert_eq!(outcome.records[0].confidence, 1.0);
    }
}
