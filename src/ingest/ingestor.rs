use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::client::PowerClient;
use super::merge::merge_series;
use super::watermark::{find_resume_watermark, plan_fetch_window, FetchPlan, ResumePoint};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{GeoIndex, RawObservation, RegionLocation};
use crate::storage::{read_raw_series, write_raw_series, ArtifactStore};
use crate::utils::constants::{
    DEFAULT_QUORUM_THRESHOLD, DEFAULT_REQUEST_DELAY_MS, RAW_SERIES_ARTIFACT,
};
use crate::utils::ProgressReporter;

/// Summary of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub resume: ResumePoint,
    pub plan: FetchPlan,
    pub regions_attempted: usize,
    pub regions_with_data: usize,
    pub failed_regions: Vec<String>,
    pub fetched_records: usize,
    pub total_records: usize,
    pub valid_records: usize,
    /// Whether the raw series artifact was rewritten
    pub persisted: bool,
}

impl IngestReport {
    fn up_to_date(resume: ResumePoint, existing: &[RawObservation]) -> Self {
        Self {
            resume,
            plan: FetchPlan::UpToDate,
            regions_attempted: 0,
            regions_with_data: 0,
            failed_regions: Vec::new(),
            fetched_records: 0,
            total_records: existing.len(),
            valid_records: existing.iter().filter(|r| r.is_valid()).count(),
            persisted: false,
        }
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("Ingestion Summary\n");
        summary.push_str("=================\n");
        summary.push_str(&format!("Resume point: {}\n", self.resume));
        match self.plan {
            FetchPlan::UpToDate => summary.push_str("Fetch window: up to date\n"),
            FetchPlan::Window { start, end } => {
                summary.push_str(&format!("Fetch window: {} to {}\n", start, end))
            }
        }
        summary.push_str(&format!(
            "Regions: {} attempted, {} with data, {} failed\n",
            self.regions_attempted,
            self.regions_with_data,
            self.failed_regions.len()
        ));
        if !self.failed_regions.is_empty() {
            summary.push_str(&format!("Failed: {}\n", self.failed_regions.join(", ")));
        }
        summary.push_str(&format!("New valid records: {}\n", self.fetched_records));
        summary.push_str(&format!(
            "Series: {} valid of {} rows\n",
            self.valid_records, self.total_records
        ));
        summary
    }
}

/// Incremental fetch of every region in the geo index into the raw series.
pub struct Ingestor {
    client: Arc<PowerClient>,
    max_concurrent: usize,
    request_delay: Duration,
    quorum_threshold: f64,
    epoch: NaiveDate,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(client: PowerClient, epoch: NaiveDate) -> Self {
        Self {
            client: Arc::new(client),
            max_concurrent: 1,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            quorum_threshold: DEFAULT_QUORUM_THRESHOLD,
            epoch,
            show_progress: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = PowerClient::from_config(&config.upstream)?;
        Ok(Self::new(client, config.processing.epoch_start)
            .with_max_concurrent(config.upstream.max_concurrent_fetches)
            .with_request_delay(config.upstream.request_delay())
            .with_quorum_threshold(config.processing.quorum_threshold))
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_quorum_threshold(mut self, threshold: f64) -> Self {
        self.quorum_threshold = threshold;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Load the raw series, fetch the missing window and persist the merge.
    pub async fn run(
        &self,
        store: &dyn ArtifactStore,
        geo: &GeoIndex,
        today: NaiveDate,
    ) -> Result<IngestReport> {
        let existing = if store.exists(RAW_SERIES_ARTIFACT) {
            let series = read_raw_series(&store.read(RAW_SERIES_ARTIFACT)?)?;
            if series.skipped_rows > 0 {
                tracing::warn!("Dropped {} raw rows with unparseable dates", series.skipped_rows);
            }
            tracing::info!("Loaded {} existing records", series.records.len());
            series.records
        } else {
            tracing::info!("No existing raw series; starting from epoch {}", self.epoch);
            Vec::new()
        };

        let resume = find_resume_watermark(&existing, self.epoch, self.quorum_threshold);
        let plan = plan_fetch_window(&resume, today);
        let FetchPlan::Window { start, end } = plan else {
            tracing::info!("Data is up to date ({})", resume);
            return Ok(IngestReport::up_to_date(resume, &existing));
        };

        tracing::info!("Fetching {} to {} for {} regions", start, end, geo.len());
        let locations: Vec<RegionLocation> = geo.iter().cloned().collect();
        let outcome = self.fetch_all(&locations, start, end).await?;

        let mut report = IngestReport {
            resume,
            plan,
            regions_attempted: locations.len(),
            regions_with_data: outcome.regions_with_data,
            failed_regions: outcome.failed_regions,
            fetched_records: outcome.records.len(),
            total_records: existing.len(),
            valid_records: existing.iter().filter(|r| r.is_valid()).count(),
            persisted: false,
        };

        if outcome.records.is_empty() {
            tracing::info!("No new valid data to persist");
            return Ok(report);
        }

        let merged = merge_series(existing, outcome.records);
        report.total_records = merged.len();
        report.valid_records = merged.iter().filter(|r| r.is_valid()).count();

        store.write(RAW_SERIES_ARTIFACT, &write_raw_series(&merged)?)?;
        report.persisted = true;
        tracing::info!(
            "Raw series saved: {} valid records out of {} total",
            report.valid_records,
            report.total_records
        );

        Ok(report)
    }

    /// Fetch every location over `[start, end]`.
    ///
    /// At most `max_concurrent` requests are in flight and request starts are
    /// spaced by `request_delay`. Per-region failures are logged and skipped.
    pub async fn fetch_all(
        &self,
        locations: &[RegionLocation],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut pacer = if self.request_delay.is_zero() {
            None
        } else {
            let mut ticker = interval(self.request_delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        };

        let progress = ProgressReporter::new(
            locations.len() as u64,
            "Fetching regions",
            !self.show_progress,
        );

        let mut handles: Vec<(String, JoinHandle<Result<Vec<RawObservation>>>)> =
            Vec::with_capacity(locations.len());
        for location in locations {
            if let Some(ticker) = pacer.as_mut() {
                ticker.tick().await;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Upstream(format!("Fetch pool closed: {}", e)))?;

            let client = Arc::clone(&self.client);
            let location = location.clone();
            let region = location.region.clone();
            let handle = tokio::spawn(async move {
                let result = client
                    .fetch_region(
                        &location.region,
                        location.latitude,
                        location.longitude,
                        start,
                        end,
                    )
                    .await;
                drop(permit);
                result
            });
            handles.push((region, handle));
        }

        let mut outcome = FetchOutcome::default();
        for (region, handle) in handles {
            match handle.await? {
                Ok(records) if records.is_empty() => {
                    tracing::debug!(region = region.as_str(), "No valid records returned");
                }
                Ok(records) => {
                    outcome.regions_with_data += 1;
                    outcome.records.extend(records);
                }
                Err(e) if e.is_per_region() => {
                    tracing::warn!(region = region.as_str(), "Skipping region: {}", e);
                    outcome.failed_regions.push(region);
                }
                Err(e) => return Err(e),
            }
            progress.increment(1);
        }

        progress.finish_with_message(&format!(
            "Fetched {} records from {} regions",
            outcome.records.len(),
            outcome.regions_with_data
        ));
        Ok(outcome)
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawObservation>,
    pub regions_with_data: usize,
    pub failed_regions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RetryPolicy;
    use crate::models::WeatherField;
    use crate::storage::FsArtifactStore;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn body(temp: f64) -> serde_json::Value {
        json!({
            "properties": {"parameter": {
                "T2M": {"20240102": temp},
                "RH2M": {"20240102": 60.0},
                "PS": {"20240102": 85.0}
            }}
        })
    }

    fn ingestor(server: &MockServer) -> Ingestor {
        let client = PowerClient::new(&server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::immediate(2));
        Ingestor::new(client, date(2024, 1, 2))
            .with_request_delay(Duration::ZERO)
            .with_max_concurrent(2)
    }

    #[tokio::test]
    async fn test_run_fetches_and_persists_all_regions() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("latitude", "27.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(11.0)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("latitude", "28.5"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let store = FsArtifactStore::new(dir.path())?;
        let geo = GeoIndex::new(vec![
            RegionLocation::new("Alpha", 27.5, 85.0),
            RegionLocation::new("Beta", 28.5, 84.0),
        ])?;

        let report = ingestor(&server).run(&store, &geo, date(2024, 1, 3)).await?;
        assert_eq!(
            report.plan,
            FetchPlan::Window {
                start: date(2024, 1, 2),
                end: date(2024, 1, 2)
            }
        );
        assert_eq!(report.regions_with_data, 1);
        assert!(report.persisted);

        let series = read_raw_series(&store.read(RAW_SERIES_ARTIFACT)?)?;
        assert_eq!(series.records.len(), 1);
        assert_eq!(series.records[0].region, "Alpha");
        assert_eq!(series.records[0].values.get(WeatherField::Temperature), Some(11.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_is_noop_when_watermark_is_recent() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(1.0)))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new()?;
        let store = FsArtifactStore::new(dir.path())?;
        let existing = vec![RawObservation::new(
            "Alpha",
            date(2024, 1, 2),
            27.5,
            85.0,
            crate::models::WeatherValues::new()
                .with(WeatherField::Temperature, 10.0)
                .with(WeatherField::Pressure, 85.0),
        )];
        store.write(RAW_SERIES_ARTIFACT, &write_raw_series(&existing)?)?;

        let geo = GeoIndex::new(vec![RegionLocation::new("Alpha", 27.5, 85.0)])?;
        let report = ingestor(&server).run(&store, &geo, date(2024, 1, 3)).await?;
        assert_eq!(report.plan, FetchPlan::UpToDate);
        assert_eq!(report.resume, ResumePoint::Watermark(date(2024, 1, 2)));
        assert!(!report.persisted);
        Ok(())
    }
}
