//! Freight CLI entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use freight_core::{Bundler, DockerEngine};

/// Bundle a Docker Compose stack into a single offline-deployable archive.
#[derive(Parser)]
#[command(name = "freight", version, about)]
struct Cli {
    /// Path to the docker-compose.yml to bundle
    compose_file: PathBuf,

    /// Output archive path
    #[arg(default_value = "bundle.tar.gz")]
    output: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DockerEngine::connect()?;
    let mut bundler = Bundler::new(engine);

    bundler.bundle(&cli.compose_file, &cli.output).await?;

    println!("Successfully created bundle: {}", cli.output.display());
    Ok(())
}
