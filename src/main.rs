//! insurance-cost: Medical insurance cost estimation
//!
//! Main entry point for the command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use insurance_cost::cli::{self, Cli};
use insurance_cost::config::AppConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env_or_default();

    // Initialize logging.
    //
    // Command output goes to stdout, so logs never do:
    // - file mode (or auto with INSURANCE_LOG_FILE set): append to the file
    // - otherwise: stderr, warnings only unless RUST_LOG says more
    let log_file = config.log_target_file();
    let default_filter = if log_file.is_some() { "info" } else { "warn" };

    let (writer, _guard) = match &log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                // Best-effort: the open below reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(log_file.is_none())
                .with_writer(writer),
        )
        .init();

    tracing::info!("Starting insurance-cost...");

    let stdout = std::io::stdout();
    cli::run(cli, &config, &mut stdout.lock())?;

    tracing::info!("insurance-cost finished.");
    Ok(())
}
