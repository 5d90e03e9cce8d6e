use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::retry::{describe_failure, RetryPolicy};
use crate::config::UpstreamConfig;
use crate::error::{PipelineError, Result};
use crate::models::{coerce_json_value, RawObservation, WeatherField, WeatherValues};
use crate::utils::constants::{UPSTREAM_COMMUNITY, UPSTREAM_DAILY_POINT_PATH, UPSTREAM_DATE_FORMAT};
use crate::utils::validate_coordinates;

/// Outcome of a single request attempt
enum Attempt {
    Parsed(Vec<RawObservation>),
    Malformed(&'static str),
}

/// NASA POWER daily point client
#[derive(Debug, Clone)]
pub struct PowerClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PowerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url, config.timeout())?.with_retry(RetryPolicy::from_config(config)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one region's daily records for `[start, end]`.
    ///
    /// Only records passing the validity gate are returned. Exhausted retries
    /// yield an empty vector; bad coordinates fail before any request.
    pub async fn fetch_region(
        &self,
        region: &str,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawObservation>> {
        validate_coordinates(latitude, longitude)?;
        if start > end {
            return Err(PipelineError::InputValidation(format!(
                "Fetch window for {} starts after it ends: {} > {}",
                region, start, end
            )));
        }

        for attempt in 1..=self.retry.max_attempts {
            match self.attempt(region, latitude, longitude, start, end).await {
                Ok(Attempt::Parsed(records)) => return Ok(records),
                Ok(Attempt::Malformed(reason)) => {
                    tracing::warn!(
                        region,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Malformed upstream response: {}",
                        reason
                    );
                }
                Err(PipelineError::Http(e)) => {
                    tracing::warn!(
                        region,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Upstream {} failure: {}",
                        describe_failure(&e),
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if self.retry.has_attempts_after(attempt) {
                tokio::time::sleep(self.retry.delay_before_retry(attempt)).await;
            }
        }

        tracing::warn!(
            region,
            "Giving up after {} attempts; region skipped this run",
            self.retry.max_attempts
        );
        Ok(Vec::new())
    }

    async fn attempt(
        &self,
        region: &str,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Attempt> {
        let parameters = WeatherField::ALL
            .iter()
            .map(|f| f.upstream_code())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}{}", self.base_url, UPSTREAM_DAILY_POINT_PATH);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("start", start.format(UPSTREAM_DATE_FORMAT).to_string()),
                ("end", end.format(UPSTREAM_DATE_FORMAT).to_string()),
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("community", UPSTREAM_COMMUNITY.to_string()),
                ("parameters", parameters),
                ("format", "JSON".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_decode() => return Ok(Attempt::Malformed("body is not JSON")),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_daily_point(region, latitude, longitude, &body))
    }
}

/// Turn `properties.parameter.<CODE>.<YYYYMMDD>` into records, keeping the
/// valid ones. Dates are driven by the temperature series.
fn parse_daily_point(region: &str, latitude: f64, longitude: f64, body: &Value) -> Attempt {
    let Some(parameters) = body.pointer("/properties/parameter").and_then(Value::as_object) else {
        return Attempt::Malformed("missing properties.parameter");
    };
    let temperatures = parameters
        .get(WeatherField::Temperature.upstream_code())
        .and_then(Value::as_object);
    let Some(temperatures) = temperatures.filter(|t| !t.is_empty()) else {
        return Attempt::Malformed("no temperature series");
    };

    let mut records = Vec::new();
    for date_key in temperatures.keys() {
        let Ok(date) = NaiveDate::parse_from_str(date_key, UPSTREAM_DATE_FORMAT) else {
            continue;
        };

        let mut values = WeatherValues::new();
        for field in WeatherField::ALL {
            let value = parameters
                .get(field.upstream_code())
                .and_then(|series| series.get(date_key))
                .and_then(coerce_json_value);
            values.set(field, value);
        }

        let record = RawObservation::new(region, date, latitude, longitude, values);
        if record.is_valid() {
            records.push(record);
        }
    }

    tracing::info!(
        region,
        "Fetched {} valid records (out of {} total)",
        records.len(),
        temperatures.len()
    );
    Attempt::Parsed(records)
}
