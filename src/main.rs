use std::io;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
use cli::{CliMode, USAGE, parse_cli_mode, print_calendars};

use chronos::{Config, SessionManager};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (mode, ignored) = parse_cli_mode(std::env::args().skip(1));

    if mode == CliMode::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _guard = setup_logging();
    if !ignored.is_empty() {
        tracing::warn!("Ignoring arguments: {}", ignored.join(" "));
    }
    run().await
}

async fn run() -> anyhow::Result<()> {
    let config = Config::beside_executable()
        .context("Failed to resolve chronos configuration")?;

    let mut session = SessionManager::connect(config)
        .await
        .context("Google authorization failed")?;

    let calendars = session.list_calendars().await;
    print_calendars(&mut io::stdout().lock(), &calendars)?;

    tracing::info!("chronos finished, {} calendars printed", calendars.len());
    Ok(())
}

fn setup_logging() -> WorkerGuard {
    let log_dir = dirs::config_dir()
        .map(|d| d.join("chronos"))
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "chronos.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    tracing::info!("chronos started");
    guard
}
