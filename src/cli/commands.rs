use chrono::{NaiveDate, Utc};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;

use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::Pipeline;
use crate::utils::progress::ProgressReporter;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let show_progress = cli.show_progress();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(store_dir) = cli.store_dir {
        config.store_dir = store_dir;
    }

    match cli.command {
        Commands::Fetch {
            max_concurrent,
            today,
        } => {
            if let Some(n) = max_concurrent {
                config.upstream.max_concurrent_fetches = n;
            }
            let today = match today {
                Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")?,
                None => Utc::now().date_naive(),
            };

            println!("Fetching district weather data...");
            println!("Artifact store: {}", config.store_dir.display());
            let pipeline = Pipeline::from_config(config)?.with_progress(show_progress);
            let report = pipeline.fetch(today).await?;
            println!("\n{}", report.generate_summary());
        }

        Commands::Process { max_workers } => {
            println!("Processing raw series...");
            let pipeline = Pipeline::from_config(config)?;

            let progress = ProgressReporter::new_spinner("Cleaning and interpolating...", !show_progress);
            let report = with_pool(max_workers, || pipeline.process())?;
            progress.finish_with_message("Processing complete");

            println!("\n{}", report.generate_summary());
        }

        Commands::Train { max_workers } => {
            println!("Training next-day temperature model...");
            let pipeline = Pipeline::from_config(config)?;

            let progress = ProgressReporter::new_spinner("Fitting random forest...", !show_progress);
            let report = with_pool(max_workers, || pipeline.train(Utc::now()))?;
            progress.finish_with_message("Training complete");

            println!("\n{}", report.generate_summary());
        }

        Commands::Predict { region, lat, lon } => {
            let pipeline = Pipeline::from_config(config)?;
            let context = pipeline.inference_context()?;

            let prediction = match (region, lat, lon) {
                (Some(region), _, _) => context.predict_by_name(&region)?,
                (None, Some(lat), Some(lon)) => context.predict_by_coordinate(lat, lon)?,
                _ => {
                    return Err(PipelineError::InputValidation(
                        "Provide --region or both --lat and --lon".to_string(),
                    ))
                }
            };

            println!("Region: {}", prediction.region_used);
            if let Some(distance) = prediction.distance {
                println!("Distance: {:.4} degrees", distance);
            }
            println!("Based on: {}", prediction.based_on);
            println!("Predicted temperature: {:.2}°C", prediction.predicted_value);
        }

        Commands::Sample { count, seed } => {
            let pipeline = Pipeline::from_config(config)?;
            let records = pipeline.sample(count, seed)?;

            println!("Sample Predictions (showing {} records):", records.len());
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{}. {} on {}: actual={}, predicted={:.2}°C",
                    i + 1,
                    record.region,
                    record.date,
                    record
                        .actual
                        .map_or_else(|| "n/a".to_string(), |a| format!("{:.2}°C", a)),
                    record.predicted
                );
            }
        }

        Commands::Run { max_workers } => {
            println!("Running full pipeline...");
            let pipeline = Pipeline::from_config(config)?.with_progress(show_progress);
            let now = Utc::now();

            let ingest = pipeline.fetch(now.date_naive()).await?;
            println!("\n{}", ingest.generate_summary());

            let (process, train) = with_pool(max_workers, || {
                let process = pipeline.process()?;
                let train = pipeline.train(now)?;
                Ok((process, train))
            })?;
            println!("{}", process.generate_summary());
            println!("{}", train.generate_summary());
            println!("Pipeline complete!");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| PipelineError::Config(format!("Cannot install logger: {}", e)))
}

/// Run CPU-bound stages on a pool of `max_workers` threads
fn with_pool<T, F>(max_workers: usize, stage: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .build()
        .map_err(|e| PipelineError::Config(e.to_string()))?;
    pool.install(stage)
}
