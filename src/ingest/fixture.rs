use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

use super::Source;
use crate::domain::Observation;
use crate::error::Result;

/// Bundled SARB/StatsSA sample series for demos and tests. Values mirror
/// published 2023-2024 releases.
pub struct FixtureSource;

impl FixtureSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for FixtureSource {
    fn source_tag(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self) -> Result<Vec<Observation>> {
        let observations = sample_observations();
        info!("Loaded {} fixture observations", observations.len());
        Ok(observations)
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid calendar date")
}

fn obs(
    name: &str,
    category: &str,
    value: f64,
    unit: &str,
    date: NaiveDate,
    source: &str,
) -> Observation {
    Observation {
        indicator_name: name.to_string(),
        category: category.to_string(),
        value: Some(value),
        unit: unit.to_string(),
        observed_date: date,
        source: source.to_string(),
    }
}

/// The full sample dataset, long format, deliberately unordered within each
/// series the way the download facility delivers it.
pub fn sample_observations() -> Vec<Observation> {
    let mut all = Vec::new();

    // GDP growth, quarterly
    for (value, date) in [
        (2.3, d(2024, 9, 30)),
        (1.9, d(2024, 6, 30)),
        (0.6, d(2024, 3, 31)),
        (1.2, d(2023, 12, 31)),
        (2.5, d(2023, 6, 30)),
    ] {
        all.push(obs(
            "GDP_Growth_Rate",
            "Economic Growth",
            value,
            "Percentage",
            date,
            "SARB",
        ));
    }

    // CPI inflation, monthly
    for (value, date) in [
        (5.4, d(2024, 9, 30)),
        (4.8, d(2024, 8, 31)),
        (5.1, d(2024, 7, 31)),
        (5.2, d(2024, 6, 30)),
        (5.6, d(2024, 5, 31)),
        (6.1, d(2024, 4, 30)),
    ] {
        all.push(obs(
            "Inflation_Rate",
            "Price Stability",
            value,
            "Percentage",
            date,
            "SARB",
        ));
    }

    // Prime rate, per MPC meeting
    for (value, date) in [
        (11.75, d(2024, 9, 19)),
        (11.75, d(2024, 7, 18)),
        (11.75, d(2024, 5, 30)),
        (11.75, d(2024, 3, 27)),
        (11.50, d(2024, 1, 25)),
    ] {
        all.push(obs(
            "Prime_Interest_Rate",
            "Monetary Policy",
            value,
            "Percentage",
            date,
            "SARB",
        ));
    }

    // Unemployment, quarterly (QLFS)
    for (value, date) in [
        (32.1, d(2024, 6, 30)),
        (32.9, d(2024, 3, 31)),
        (31.6, d(2023, 12, 31)),
        (32.4, d(2023, 9, 30)),
    ] {
        all.push(obs(
            "Unemployment_Rate",
            "Employment",
            value,
            "Percentage",
            date,
            "StatsSA",
        ));
    }

    // Rand/dollar, month-end closes
    for (value, date) in [
        (18.45, d(2024, 10, 21)),
        (17.89, d(2024, 9, 30)),
        (18.12, d(2024, 8, 31)),
        (17.95, d(2024, 7, 31)),
        (18.32, d(2024, 6, 30)),
    ] {
        all.push(obs(
            "USD_ZAR_Exchange_Rate",
            "Exchange Rates",
            value,
            "ZAR per USD",
            date,
            "SARB",
        ));
    }

    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_covers_all_tracked_indicators() {
        let source = FixtureSource::new();
        let observations = source.fetch().await.unwrap();

        for name in [
            "GDP_Growth_Rate",
            "Inflation_Rate",
            "Prime_Interest_Rate",
            "Unemployment_Rate",
            "USD_ZAR_Exchange_Rate",
        ] {
            assert!(
                observations.iter().any(|o| o.indicator_name == name),
                "missing series {name}"
            );
        }
        assert!(observations.iter().all(|o| o.value.is_some()));
    }
}
