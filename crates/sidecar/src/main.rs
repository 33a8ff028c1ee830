mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, LogFormat};
use sidecar_engine::EngineConfig;
use sidecar_events::EventEmitter;

fn init_tracing(cli: &Cli) {
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Plain => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.workers == 0 {
        anyhow::bail!("--workers must be >= 1");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), workers = cli.workers, "sidecar starting");

    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    let emitter = Arc::new(EventEmitter::stdout());
    let config = EngineConfig::new(cli.workers);

    sidecar_engine::run(reader, emitter, config).await?;
    Ok(())
}
