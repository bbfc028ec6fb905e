//! The `ringforge-hub` binary.

use std::path::PathBuf;

use clap::Parser;
use ringforge_telemetry::{setup_logging, LogConfig, LogFormat};

/// RingForge Hub - coordination plane for fleets of AI agents.
#[derive(Debug, Parser)]
#[command(name = "ringforge-hub", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "RINGFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address override.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = ringforge_config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let format = match config.logging.format {
        ringforge_config::LogFormatOption::Pretty => LogFormat::Pretty,
        ringforge_config::LogFormatOption::Compact => LogFormat::Compact,
        ringforge_config::LogFormatOption::Json => LogFormat::Json,
    };
    let mut log_config = LogConfig::new(config.logging.level.clone()).with_format(format);
    for directive in &config.logging.directives {
        log_config = log_config.with_directive(directive.clone());
    }
    setup_logging(&log_config)?;

    ringforge_hub::run(config).await
}
