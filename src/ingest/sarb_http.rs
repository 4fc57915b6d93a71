use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::Source;
use crate::domain::Observation;
use crate::error::{PipelineError, Result};

const DEFAULT_BASE_URL: &str = "https://www.resbank.co.za/webindicators";
const DEFAULT_START_DATE: &str = "2023-01-01";

/// One series available from the download facility, mapped to the
/// indicator vocabulary the pipeline tracks.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesSpec {
    pub series_code: String,
    pub indicator_name: String,
    pub category: String,
    pub unit: String,
}

/// Observations fetched from the SARB online download facility.
///
/// The facility answers CSV with `Date,Value` rows per requested series.
/// Rows that fail to parse are skipped with a warning; the fetch itself
/// only fails when a whole request does.
pub struct SarbHttpSource {
    client: reqwest::Client,
    base_url: String,
    start_date: String,
    series: Vec<SeriesSpec>,
}

impl SarbHttpSource {
    pub fn new(series: Vec<SeriesSpec>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            start_date: DEFAULT_START_DATE.to_string(),
            series,
        }
    }

    /// The indicator series the pipeline tracks by default.
    pub fn with_default_series() -> Self {
        Self::new(vec![
            spec("NRI6006L", "GDP_Growth_Rate", "Economic Growth", "Percentage"),
            spec("CPI1000A", "Inflation_Rate", "Price Stability", "Percentage"),
            spec("MMSD701A", "Prime_Interest_Rate", "Monetary Policy", "Percentage"),
            spec("LABT079L", "Unemployment_Rate", "Employment", "Percentage"),
            spec("EXCX135D", "USD_ZAR_Exchange_Rate", "Exchange Rates", "ZAR per USD"),
        ])
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_start_date(mut self, start_date: &str) -> Self {
        self.start_date = start_date.to_string();
        self
    }

    async fn fetch_series(&self, series: &SeriesSpec) -> Result<Vec<Observation>> {
        let url = format!(
            "{}/DataDownload?SeriesNames={}&startDate={}",
            self.base_url, series.series_code, self.start_date
        );
        debug!("Fetching {} from {}", series.indicator_name, url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::StageIo(format!(
                "SARB download facility answered {} for {}",
                response.status(),
                series.series_code
            )));
        }
        let body = response.text().await?;

        Ok(parse_series_csv(&body, series))
    }
}

#[async_trait]
impl Source for SarbHttpSource {
    fn source_tag(&self) -> &str {
        "sarb_api"
    }

    async fn fetch(&self) -> Result<Vec<Observation>> {
        let mut all = Vec::new();
        for series in &self.series {
            let observations = self.fetch_series(series).await?;
            debug!(
                "Fetched {} rows for {}",
                observations.len(),
                series.indicator_name
            );
            all.extend(observations);
        }
        Ok(all)
    }
}

fn spec(code: &str, name: &str, category: &str, unit: &str) -> SeriesSpec {
    SeriesSpec {
        series_code: code.to_string(),
        indicator_name: name.to_string(),
        category: category.to_string(),
        unit: unit.to_string(),
    }
}

/// Decode one series' CSV payload into observations. Unparseable rows are
/// skipped, not fatal; the validator audits whatever structure survives.
fn parse_series_csv(body: &str, series: &SeriesSpec) -> Vec<Observation> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable CSV row for {}: {}", series.series_code, e);
                continue;
            }
        };
        let (date_field, value_field) = match (record.get(0), record.get(1)) {
            (Some(d), Some(v)) => (d.trim(), v.trim()),
            _ => {
                warn!("Skipping short CSV row for {}", series.series_code);
                continue;
            }
        };

        let observed_date = match NaiveDate::parse_from_str(date_field, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                warn!(
                    "Skipping row with unparseable date '{}' for {}",
                    date_field, series.series_code
                );
                continue;
            }
        };
        // Empty values land as None; the landing stage rejects them with a
        // reason code instead of the adapter guessing a number.
        let value = if value_field.is_empty() {
            None
        } else {
            match value_field.parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(
                        "Skipping row with non-numeric value '{}' for {}",
                        value_field, series.series_code
                    );
                    continue;
                }
            }
        };

        observations.push(Observation {
            indicator_name: series.indicator_name.clone(),
            category: series.category.clone(),
            value,
            unit: series.unit.clone(),
            observed_date,
            source: "SARB".to_string(),
        });
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gdp_spec() -> SeriesSpec {
        spec("NRI6006L", "GDP_Growth_Rate", "Economic Growth", "Percentage")
    }

    #[test]
    fn parses_well_formed_csv() {
        let body = "Date,Value\n2024-06-30,1.9\n2024-09-30,2.3\n";
        let observations = parse_series_csv(body, &gdp_spec());

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].indicator_name, "GDP_Growth_Rate");
        assert_eq!(observations[0].value, Some(1.9));
        assert_eq!(
            observations[1].observed_date,
            NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
        );
    }

    #[test]
    fn skips_unparseable_rows_keeps_the_rest() {
        let body = "Date,Value\nnot-a-date,1.9\n2024-09-30,two point three\n2024-06-30,1.9\n";
        let observations = parse_series_csv(body, &gdp_spec());

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].value, Some(1.9));
    }

    #[test]
    fn empty_value_becomes_none_for_landing_to_reject() {
        let body = "Date,Value\n2024-09-30,\n";
        let observations = parse_series_csv(body, &gdp_spec());

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].value, None);
    }
}
