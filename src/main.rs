use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chandere::config::Config;
use chandere::crawler::{parse_targets, ScrapeSession, SessionOptions, KNOWN_CHANS};
use chandere::error::ChandereErrorTrait;
use chandere::models::Mode;

#[derive(Parser)]
#[command(
    name = "chandere",
    version,
    about = "Generalized scraper for Futaba-styled imageboards, such as 4chan",
    long_about = "Generalized scraper for Futaba-styled imageboards, such as 4chan.\n\
                  Capable of downloading images and archiving entire boards."
)]
struct Cli {
    /// Board and optional thread to scrape, e.g. "/g/51971506"
    #[arg(
        value_name = "BOARD[/THREAD]",
        required_unless_present_any = ["list_chans", "list_modes"]
    )]
    targets: Vec<String>,

    /// Mode of operation (tc, id, ar)
    #[arg(short, long, default_value = "tc")]
    mode: Mode,

    /// Imageboard alias or URL
    #[arg(short, long, default_value = "4chan")]
    chan: String,

    /// Directory for images, or file or directory for the archive
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Cache dump location (defaults to ~/.chandere)
    #[arg(long)]
    dump_file: Option<PathBuf>,

    /// Seconds between refreshes
    #[arg(short, long)]
    refresh: Option<u64>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Omit the network traffic warning in board mode
    #[arg(short, long)]
    force: bool,

    /// Visit a board's oldest pages first
    #[arg(long)]
    bottomfeed: bool,

    /// Use the cache but do not dump it at exit
    #[arg(long)]
    no_dump: bool,

    /// Ignore .webm files in image mode
    #[arg(long)]
    no_video: bool,

    /// Force https connections
    #[arg(long)]
    force_ssl: bool,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log format (text, json)
    #[arg(long)]
    log_format: Option<String>,

    /// List known imageboard aliases and exit
    #[arg(long)]
    list_chans: bool,

    /// List available modes and exit
    #[arg(long)]
    list_modes: bool,
}

impl Cli {
    /// Layer command-line flags over file or environment configuration
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::from_env()?,
        };

        if let Some(refresh) = self.refresh {
            config.scrape.refresh_secs = refresh;
        }
        if let Some(dump_file) = &self.dump_file {
            config.cache.dump_file = Some(dump_file.clone());
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if self.quiet {
            config.logging.level = "warn".to_string();
        }
        config.scrape.force_ssl |= self.force_ssl;
        config.scrape.no_video |= self.no_video;
        config.cache.dump &= !self.no_dump;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.list_chans || cli.list_modes {
        if cli.list_chans {
            let aliases: Vec<&str> = KNOWN_CHANS.iter().map(|(alias, _)| *alias).collect();
            println!("Available Imageboard Aliases: {}", aliases.join(", "));
        }
        if cli.list_modes {
            for mode in Mode::all() {
                println!("{:<4}{}", mode.as_str(), mode.description());
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = cli.load_config()?;
    setup_tracing(&config.logging.format, &config.logging.level)?;

    let targets = parse_targets(&cli.targets);
    if targets.is_empty() {
        tracing::error!("No valid board or thread given");
        return Ok(ExitCode::FAILURE);
    }

    tracing::info!(mode = %cli.mode, chan = %cli.chan, "Chandere starting");

    let options = SessionOptions {
        output: cli.output.clone(),
        bottomfeed: cli.bottomfeed,
        force: cli.force,
        ..SessionOptions::new(cli.mode, &cli.chan, targets)
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                shutdown_tx.closed().await;
            }
        }
    });

    match ScrapeSession::new(config, options).run(shutdown_rx).await {
        Ok(report) if report.connected => Ok(ExitCode::SUCCESS),
        Ok(_) => Ok(ExitCode::FAILURE),
        Err(e) => {
            tracing::error!(error = %e, category = e.category().as_str(), "Scrape failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn setup_tracing(format: &str, level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("chandere={level},warn"))
        .context("Invalid log level")?;

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
