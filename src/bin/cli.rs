use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use radio_playlist_updater as lib;
use lib::config::Config;
use lib::models::CandidateSong;
use lib::pipeline::Updater;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "radio-playlist-updater", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the playlist once
    Run {
        /// JSON file with an array of {"name", "artist"} songs to add instead
        /// of querying the configured sources
        #[arg(long, value_name = "FILE")]
        songs: Option<PathBuf>,
    },
    /// Validate config file and exit
    ConfigValidate,
}

fn load_songs(path: &Path) -> Result<Vec<CandidateSong>> {
    let s = std::fs::read_to_string(path)?;
    let songs: Vec<CandidateSong> = serde_json::from_str(&s)?;
    Ok(songs)
}

/// Logs go to stdout and, when `log_dir` is set, to a daily-rotated file.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_logging(cfg: &Config) -> Result<Option<WorkerGuard>> {
    let _ = LogTracer::init();

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "radio-playlist-updater.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(fmt::layer().with_ansi(false).with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);
    tracing_subscriber_global::set_global_default(subscriber)
        .context("setting global tracing subscriber")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ConfigValidate => match Config::from_path(&cli.config) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
        Commands::Run { songs } => {
            let cfg = Config::from_path(&cli.config)
                .with_context(|| format!("loading config from {}", cli.config.display()))?;
            let _guard = init_logging(&cfg)?;

            let new_songs = match songs {
                Some(path) => match load_songs(&path) {
                    Ok(list) => Some(list),
                    Err(e) => {
                        // The run still counts as successful; nothing to add.
                        log::error!("Could not read songs from {}: {}", path.display(), e);
                        return Ok(());
                    }
                },
                None => None,
            };

            Updater::new(cfg).update_playlist(new_songs).await;
        }
    }
    Ok(())
}
