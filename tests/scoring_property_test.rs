use chrono::NaiveDate;
use rand::Rng;

use sarb_pipeline::config::PipelineConfig;
use sarb_pipeline::domain::{Trend, ValidatedRecord};
use sarb_pipeline::pipeline::Projector;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn validated(name: &str, value: f64) -> ValidatedRecord {
    ValidatedRecord {
        id: None,
        indicator_name: name.to_string(),
        category: "Test".to_string(),
        value,
        unit: "Percentage".to_string(),
        observed_date: date(2024, 9, 30),
        source: "SARB".to_string(),
        is_valid: true,
        confidence: 1.0,
        previous_value: None,
        absolute_change: None,
        percent_change: None,
        rolling_average: Some(value),
        trend: Trend::Stable,
        source_row_hash: format!("{name}-{value}"),
    }
}

// The projector consumes validated records and nothing else: these tests
// construct their input directly, with no raw store in existence anywhere.
#[test]
fn health_score_is_clamped_for_randomized_extreme_inputs() {
    let projector = Projector::from_config(&PipelineConfig::default());
    let mut rng = rand::thread_rng();

    for _ in 0..500 {
        let growth = rng.gen_range(-1000.0..1000.0);
        let inflation = rng.gen_range(-1000.0..1000.0);
        let unemployment = rng.gen_range(0.0..1000.0);

        let records = vec![
            validated("GDP_Growth_Rate", growth),
            validated("Inflation_Rate", inflation),
            validated("Unemployment_Rate", unemployment),
        ];
        let snapshot = projector.project(&records).unwrap();
        let score = snapshot
            .health_score
            .expect("all three inputs present, score must compute");

        assert!(
            (0.0..=100.0).contains(&score),
            "score {score} out of bounds for growth={growth} inflation={inflation} unemployment={unemployment}"
        );
    }
}

#[test]
fn composite_fields_are_omitted_when_their_inputs_are_missing() {
    let projector = Projector::from_config(&PipelineConfig::default());

    // Only the exchange rate is known: every composite must be None rather
    // than computed against fabricated defaults.
    let records = vec![validated("USD_ZAR_Exchange_Rate", 18.45)];
    let snapshot = projector.project(&records).unwrap();

    assert_eq!(snapshot.health_score, None);
    assert_eq!(snapshot.policy_stance, None);
    assert_eq!(snapshot.risk_level, None);
    assert_eq!(snapshot.inflation_target_variance, None);
    assert_eq!(snapshot.indicators.len(), 1);
}
