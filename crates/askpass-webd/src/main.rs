//! askpass-webd - Main entry point.
//!
//! Serves the pending systemd password prompts found in the ask-password
//! directory as a web page, and writes submitted answers back to the
//! requesting process. Intended for unlocking encrypted disks of headless
//! machines from the initramfs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use askpass_web_core::{Config, ListenSpec};
use askpass_webd::{listener, Daemon};

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Web frontend for the systemd password-agent protocol.
#[derive(Parser)]
#[command(name = "askpass-webd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file [default: /etc/askpass-web/config.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// ADDR:PORT to bind to, or fd:<n> to use an inherited socket
    #[arg(short, long, value_name = "SPEC")]
    listen: Option<String>,

    /// Directory to watch for password prompts
    #[arg(long, value_name = "DIR")]
    askdir: Option<PathBuf>,

    /// Shut down after this many seconds without requests (0 = never)
    #[arg(long, value_name = "SECS")]
    idle: Option<u64>,

    /// Increase log verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if let Some(dir) = &self.askdir {
            config.ask.directory = dir.clone();
        }
        if let Some(idle) = self.idle {
            config.server.idle_timeout = idle;
        }
    }
}

fn setup_logging(level: &str) {
    // Use RUST_LOG=debug for verbose output, or CLI flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // JOURNAL_STREAM is set when stdout/stderr go to the journal
    if std::env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(journald_layer)
                .with(filter)
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration from specified path");
            Config::load_from(path).context("Failed to load configuration")?
        }
        None => {
            let path = Config::default_path();
            if path.exists() {
                info!(path = %path.display(), "Loaded configuration");
            } else {
                debug!("No config file found, using defaults");
            }
            Config::load().context("Failed to load configuration")?
        }
    };
    cli.apply(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    setup_logging(log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting askpass-webd");

    let config = load_config(&cli)?;

    let spec = ListenSpec::parse(&config.server.listen).context("Invalid --listen value")?;
    let daemon = Daemon::with_config(listener::resolve(&spec), config);

    if let Err(e) = daemon.run().await {
        error!(error = %e, "Daemon error");
        return Err(e);
    }

    info!("Exiting");
    Ok(())
}
