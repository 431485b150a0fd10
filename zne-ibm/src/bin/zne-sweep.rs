//! ZNE sweep runner

use clap::Parser;
use tracing::{error, info};
use zne_ibm::cli::{self, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli::log_filter(args.verbose))
        .init();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    let summary = match cli::run_experiment(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Experiment failed: {}", e);
            return Err(e.into());
        }
    };

    info!(
        backend = %summary.backend,
        completed = summary.completed,
        failed = summary.failed,
        output = %summary.output.display(),
        "done"
    );
    if let Some(value) = summary.zero_noise_value {
        println!("Zero-noise expectation value: {:.6}", value);
    }
    Ok(())
}
