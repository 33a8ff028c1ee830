use clap::{Parser, ValueEnum};

/// Image-upload sidecar: reads newline-delimited Job objects from stdin,
/// writes newline-delimited Output Events to stdout (§6).
#[derive(Debug, Parser)]
#[command(name = "sidecar", version)]
pub struct Cli {
    /// Number of concurrent worker slots draining the job queue.
    #[arg(long, default_value_t = sidecar_engine::EngineConfig::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Diagnostic log format written to stderr. Never affects the stdout protocol.
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Increase diagnostic log verbosity (-v, -vv). Overridden by RUST_LOG if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}
