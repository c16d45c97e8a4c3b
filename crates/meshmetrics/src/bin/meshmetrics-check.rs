//! Reports which array engine this environment would select.
//!
//! The first line of the text output is the engine name (`cuda` or `cpu`).

use clap::Parser;
use meshmetrics::{diagnose, BackendPreference, BackendResolver, BrokenGpuPolicy, ResolverConfig};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "meshmetrics-check",
    about = "Report which array engine MeshMetrics would use",
    version
)]
struct Cli {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Override MESHMETRICS_BACKEND: auto, cpu, gpu
    #[arg(long)]
    backend: Option<BackendPreference>,

    /// Override MESHMETRICS_ON_BROKEN_GPU: fallback, fail
    #[arg(long)]
    on_broken_gpu: Option<BrokenGpuPolicy>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match ResolverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(preference) = cli.backend {
        config.preference = preference;
    }
    if let Some(policy) = cli.on_broken_gpu {
        config.on_broken_gpu = policy;
    }

    let diagnosis = diagnose(&BackendResolver::new(config));
    tracing::debug!(?diagnosis, "diagnosis complete");

    if cli.json {
        match serde_json::to_string_pretty(&diagnosis) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: failed to serialize diagnosis: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{diagnosis}");
    }

    if diagnosis.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
