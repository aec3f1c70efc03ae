//! skyrelay CLI
//!
//! Polls a Bluesky author timeline and relays new posts to a webhook.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use skyrelay::{
    error::{AppError, Result},
    models::{Config, Watermark},
    pipeline,
    storage::{FileWatermarkStore, WatermarkStore},
};

/// skyrelay - Bluesky timeline relay
#[derive(Parser, Debug)]
#[command(
    name = "skyrelay",
    version,
    about = "Relays new posts from a Bluesky timeline to a chat webhook"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "skyrelay.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print posts instead of sending them (the watermark still advances)
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the timeline and relay new posts (default)
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Write the watermark so older posts are never relayed
    Seed {
        /// Unix seconds to record (default: now)
        #[arg(long)]
        at: Option<f64>,
    },

    /// Show the stored watermark and the configured target
    Info,

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dotenvy::dotenv() {
        log::debug!("No .env loaded: {}", e);
    }

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::load_or_default(&cli.config)
    };
    config.apply_env();
    log::debug!("Configuration: {:?}", config);

    let store = FileWatermarkStore::new(&config.storage.state_file);

    match cli.command.unwrap_or(Command::Run { once: false }) {
        Command::Run { once } => {
            config.validate(true)?;
            let mut poller = pipeline::build_poller(&config, cli.dry_run).await?;

            if once {
                let report = poller.run_cycle().await?;
                log::info!(
                    "Delivered {} of {} new post(s) over {} page(s) ({}); watermark {}",
                    report.delivered,
                    report.selected,
                    report.pages,
                    report.stop,
                    report.watermark_after
                );
            } else {
                poller.run_forever().await;
            }
        }

        Command::Seed { at } => {
            config.validate(false)?;
            let watermark = match at {
                Some(secs) => Watermark::from_secs_f64(secs).ok_or_else(|| {
                    AppError::validation(format!("--at must be non-negative seconds, got {secs}"))
                })?,
                None => Watermark::new(Utc::now()),
            };

            let previous = store.load().await?;
            if cli.dry_run {
                log::info!("Dry run: would move watermark {} -> {}", previous, watermark);
                return Ok(());
            }
            store.save(watermark).await?;
            log::info!(
                "Watermark {} -> {} in {}",
                previous,
                watermark,
                store.location()
            );
        }

        Command::Info => {
            let watermark = store.load().await?;
            log::info!("State file: {}", store.location());
            if watermark.is_epoch() {
                log::info!("Watermark: none (next run relays every retrievable post)");
            } else {
                log::info!("Watermark: {} ({:.6})", watermark, watermark.as_secs_f64());
            }
            log::info!(
                "Timeline: {}",
                config
                    .account
                    .actor
                    .as_deref()
                    .unwrap_or("<logged-in account>")
            );
            log::info!(
                "Target: {}",
                match (&config.delivery.webhook_url, cli.dry_run) {
                    (Some(_), false) => "webhook",
                    _ => "console",
                }
            );
            log::info!("Poll interval: {:?}", config.poll.interval());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate(true) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
