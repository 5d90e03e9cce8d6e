use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weatherwave_pipeline::models::{GeoIndex, Observation, RawObservation, WeatherField, WeatherValues};
use weatherwave_pipeline::processors::{clean, Interpolator};
use weatherwave_pipeline::training::{feature_matrix, FeatureSchema, ForestParams, TemperatureForest};

// Daily series for `region_count` regions with every fifth temperature missing
fn create_test_series(region_count: usize, days: usize) -> Vec<Observation> {
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut observations = Vec::with_capacity(region_count * days);

    for region in 0..region_count {
        for day in 0..days {
            let temp = 15.0 + (day as f64) * 0.1 + (region as f64) * 0.5;
            let mut values = WeatherField::ALL
                .iter()
                .fold(WeatherValues::new(), |v, f| v.with(*f, 3.0 + (day % 7) as f64))
                .with(WeatherField::Temperature, temp)
                .with(WeatherField::MaxTemperature, temp + 5.0)
                .with(WeatherField::MinTemperature, temp - 5.0);
            if day % 5 == 2 {
                values.set(WeatherField::Temperature, None);
            }

            observations.push(Observation {
                region: format!("Region {:02}", region),
                date: base_date + chrono::Duration::days(day as i64),
                latitude: 27.0 + region as f64 * 0.05,
                longitude: 84.0 + region as f64 * 0.05,
                values,
            });
        }
    }
    observations
}

fn create_training_set(series: &[Observation]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let schema = FeatureSchema::current();
    let (filled, _) = Interpolator::new().interpolate(series);
    filled
        .windows(2)
        .filter(|w| w[0].region == w[1].region)
        .filter_map(|w| {
            let code = w[0].region.trim_start_matches("Region ").parse().ok()?;
            let features = schema.assemble(&w[0], code).ok()?;
            Some((features, w[1].temperature()?))
        })
        .unzip()
}

fn benchmark_cleaning(c: &mut Criterion) {
    let raw: Vec<RawObservation> = create_test_series(20, 365).iter().map(RawObservation::from).collect();

    c.bench_function("clean_20_regions_1y", |b| {
        b.iter(|| {
            let (cleaned, report) = clean(black_box(&raw));
            black_box((cleaned.len(), report.output_rows))
        })
    });
}

fn benchmark_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");

    for &(regions, days) in &[(10usize, 365usize), (77, 365), (77, 3650)] {
        let series = create_test_series(regions, days);
        group.bench_with_input(
            BenchmarkId::new("parallel", format!("{}x{}", regions, days)),
            &series,
            |b, series| {
                b.iter(|| {
                    let (filled, report) = Interpolator::new().interpolate(black_box(series));
                    black_box((filled.len(), report.values_interpolated))
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("sequential", format!("{}x{}", regions, days)),
            &series,
            |b, series| {
                b.iter(|| {
                    let (filled, report) = Interpolator::new()
                        .with_parallel(false)
                        .interpolate(black_box(series));
                    black_box((filled.len(), report.values_interpolated))
                })
            },
        );
    }
    group.finish();
}

fn benchmark_forest_training(c: &mut Criterion) {
    let (rows, y) = create_training_set(&create_test_series(10, 200));
    let x = feature_matrix(&rows).unwrap();
    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);

    for &n_trees in &[10usize, 50] {
        let params = ForestParams {
            n_trees,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(n_trees), &params, |b, params| {
            b.iter(|| {
                let forest = TemperatureForest::fit(black_box(&x), black_box(&y), *params).unwrap();
                black_box(forest.n_features())
            })
        });
    }
    group.finish();
}

fn benchmark_prediction(c: &mut Criterion) {
    let (x, y) = create_training_set(&create_test_series(10, 200));
    let forest = TemperatureForest::fit_rows(&x, &y, ForestParams::default()).unwrap();

    c.bench_function("forest_predict_batch", |b| {
        b.iter(|| black_box(forest.predict_batch(black_box(&x)).unwrap().len()))
    });
}

criterion_group!(
    benches,
    benchmark_cleaning,
    benchmark_interpolation,
    benchmark_forest_training,
    benchmark_prediction
);
criterion_main!(benches);
