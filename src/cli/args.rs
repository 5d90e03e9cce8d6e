use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weatherwave")]
#[command(about = "District weather pipeline: fetch, repair, train and predict next-day temperature")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file (TOML or JSON) [default: weatherwave.toml if present]"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Artifact directory, overrides store_dir")]
    pub store_dir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Hide progress bars and spinners")]
    pub no_progress: bool,
}

impl Cli {
    pub fn show_progress(&self) -> bool {
        !self.no_progress
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch new daily records from the upstream source into the raw series
    Fetch {
        #[arg(long, help = "Concurrent upstream requests, overrides upstream.max_concurrent_fetches")]
        max_concurrent: Option<usize>,

        #[arg(long, help = "Treat this date as today (YYYY-MM-DD)")]
        today: Option<String>,
    },

    /// Clean and interpolate the raw series
    Process {
        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,
    },

    /// Label, encode and train the next-day temperature model
    Train {
        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,
    },

    /// Predict next-day temperature for a region name or a coordinate
    Predict {
        #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
        region: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Predict sampled historical rows and compare with the actual values
    Sample {
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Fetch, process and train in one go
    Run {
        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,
    },
}
