use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;
use weatherwave_pipeline::config::PipelineConfig;
use weatherwave_pipeline::ingest::FetchPlan;
use weatherwave_pipeline::models::{GeoIndex, RawObservation, RegionLocation, WeatherField, WeatherValues};
use weatherwave_pipeline::pipeline::Pipeline;
use weatherwave_pipeline::storage::{write_raw_series, ArtifactStore, FsArtifactStore, ParquetCodec};
use weatherwave_pipeline::utils::constants::{INTERPOLATED_SERIES_ARTIFACT, RAW_SERIES_ARTIFACT};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REGIONS: [(&str, f64, f64); 2] = [("Ilam", 26.91, 87.93), ("Kaski", 28.21, 83.99)];

fn geo() -> GeoIndex {
    GeoIndex::new(
        REGIONS
            .iter()
            .map(|(name, lat, lon)| RegionLocation::new(*name, *lat, *lon))
            .collect(),
    )
    .unwrap()
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn pipeline(dir: &TempDir, mut config: PipelineConfig) -> Pipeline {
    config.store_dir = dir.path().to_path_buf();
    config.training.n_trees = 10;
    let store = FsArtifactStore::new(dir.path()).unwrap();
    Pipeline::new(config, Arc::new(store), geo())
}

fn temperature(region_idx: usize, day: i64) -> f64 {
    12.0 + region_idx as f64 * 6.0 + day as f64 * 0.8
}

/// Two regions over ten days with three sentinel readings
fn synthetic_raw_series() -> Vec<RawObservation> {
    let mut rows = Vec::new();
    for (r, (region, lat, lon)) in REGIONS.iter().enumerate() {
        for day in 0..10i64 {
            let temp = temperature(r, day);
            let mut values = WeatherField::ALL
                .iter()
                .fold(WeatherValues::new(), |v, f| v.with(*f, 2.5 + day as f64 * 0.1))
                .with(WeatherField::Temperature, temp)
                .with(WeatherField::MaxTemperature, temp + 6.0)
                .with(WeatherField::MinTemperature, temp - 6.0)
                .with(WeatherField::RelativeHumidity, 70.0 - day as f64)
                .with(WeatherField::Pressure, 80.0 + r as f64 * 5.0);

            match (*region, day) {
                ("Kaski", 3) => values.set(WeatherField::Temperature, Some(-999.0)),
                ("Kaski", 6) => values.set(WeatherField::RelativeHumidity, Some(-999.0)),
                ("Ilam", 4) => values.set(WeatherField::Pressure, Some(999.0)),
                _ => {}
            }

            rows.push(RawObservation::new(
                *region,
                start_date() + Duration::days(day),
                *lat,
                *lon,
                values,
            ));
        }
    }
    rows
}

#[test]
fn test_end_to_end_predictions() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let pipeline = pipeline(&dir, PipelineConfig::default());
    pipeline
        .store()
        .write(RAW_SERIES_ARTIFACT, &write_raw_series(&synthetic_raw_series()).unwrap())
        .unwrap();

    let processed = pipeline.process().unwrap();
    assert_eq!(processed.missing_before.total_missing(), 3);
    assert_eq!(processed.missing_after.total_missing(), 0);

    // The repaired Kaski temperature lies between its neighbors
    let series = ParquetCodec::new()
        .decode_observations(pipeline.store().read(INTERPOLATED_SERIES_ARTIFACT).unwrap())
        .unwrap();
    let kaski_day3 = series
        .iter()
        .find(|o| o.region == "Kaski" && o.date == start_date() + Duration::days(3))
        .and_then(|o| o.temperature())
        .unwrap();
    assert!(kaski_day3 > temperature(1, 2) && kaski_day3 < temperature(1, 4));

    let now = Utc.with_ymd_and_hms(2024, 1, 11, 6, 0, 0).unwrap();
    let trained = pipeline.train(now).unwrap();
    assert_eq!(trained.label.labeled_rows, 18);
    assert_eq!(trained.artifact.metrics.test_samples, 3);
    assert_eq!(trained.artifact.metrics.train_samples, 15);

    let context = pipeline.inference_context().unwrap();
    for (region, _, _) in REGIONS {
        let prediction = context.predict_by_name(region).unwrap();
        assert_eq!(prediction.region_used, region);
        assert_eq!(prediction.based_on, start_date() + Duration::days(9));
        assert!(prediction.predicted_value.is_finite());
    }

    let near_kaski = context.predict_by_coordinate(28.2, 84.0).unwrap();
    assert_eq!(near_kaski.region_used, "Kaski");
    assert!(near_kaski.predicted_value.is_finite());
    assert_eq!(near_kaski, context.predict_by_coordinate(28.2, 84.0).unwrap());
}

#[test]
fn test_context_shared_across_threads() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let pipeline = pipeline(&dir, PipelineConfig::default());
    pipeline
        .store()
        .write(RAW_SERIES_ARTIFACT, &write_raw_series(&synthetic_raw_series()).unwrap())
        .unwrap();
    pipeline.process().unwrap();
    pipeline.train(Utc::now()).unwrap();

    let context = Arc::new(pipeline.inference_context().unwrap());
    let expected = context.predict_by_name("Ilam").unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let context = Arc::clone(&context);
            std::thread::spawn(move || context.predict_by_name("Ilam").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

fn upstream_body(region_idx: usize, days: i64) -> Value {
    let mut parameters = Map::new();
    for field in WeatherField::ALL {
        let mut series = Map::new();
        for day in 0..days {
            let key = (start_date() + Duration::days(day)).format("%Y%m%d").to_string();
            let temp = temperature(region_idx, day);
            let value = match field {
                WeatherField::Temperature => temp,
                WeatherField::MaxTemperature => temp + 6.0,
                WeatherField::MinTemperature => temp - 6.0,
                WeatherField::RelativeHumidity => 65.0,
                WeatherField::Pressure => 84.0,
                _ => 3.0,
            };
            series.insert(key, json!(value));
        }
        parameters.insert(field.upstream_code().to_string(), Value::Object(series));
    }
    json!({ "properties": { "parameter": parameters } })
}

#[tokio::test]
async fn test_fetch_then_resume_from_watermark() {
    let server = MockServer::start().await;
    for (r, (_, lat, _)) in REGIONS.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/api/temporal/daily/point"))
            .and(query_param("latitude", lat.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body(r, 10)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut config = PipelineConfig::default();
    config.upstream.base_url = server.uri();
    config.upstream.max_attempts = 1;
    config.upstream.request_delay_ms = 0;
    config.processing.epoch_start = start_date();

    let dir = TempDir::new().expect("Failed to create temp directory");
    let pipeline = pipeline(&dir, config);
    let today = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();

    let first = pipeline.fetch(today).await.unwrap();
    assert_eq!(
        first.plan,
        FetchPlan::Window {
            start: start_date(),
            end: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        }
    );
    assert!(first.persisted);
    assert_eq!(first.total_records, 20);
    assert_eq!(first.regions_with_data, 2);

    // Every region is valid on the last fetched day, so nothing is left to fetch
    let second = pipeline.fetch(today).await.unwrap();
    assert_eq!(second.plan, FetchPlan::UpToDate);
    assert!(!second.persisted);

    let processed = pipeline.process().unwrap();
    assert_eq!(processed.clean.output_rows, 20);
}
