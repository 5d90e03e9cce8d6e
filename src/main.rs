use clap::Parser;
use weatherwave_pipeline::cli::{run, Cli};
use weatherwave_pipeline::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
