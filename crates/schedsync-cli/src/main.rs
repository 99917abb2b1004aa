//! schedsync - keep a published transit schedule in object storage
//!
//! Downloads the feed, fingerprints it, and replaces the stored copy only
//! when the fingerprint differs from the recorded one.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "schedsync")]
#[command(about = "Mirror a schedule feed into object storage when it changes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./schedsync.toml or ~/.config/schedsync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync: fetch, fingerprint, publish if changed
    Sync(cmd::sync::SyncArgs),
    /// Show what is currently stored
    Status(cmd::status::StatusArgs),
    /// Fingerprint a local file
    Digest(cmd::digest::DigestArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress: schedsync_core::SharedProgress = Arc::new(schedsync_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  - the progress bar shows activity
    //   non-TTY: info unless --debug          - logs are the only record of a run
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    schedsync_core::init_logging(schedsync_core::Verbosity::from_flags(quiet, cli.debug), multi)?;

    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    config.apply_env(|name| std::env::var(name).ok());
    if let Some(secs) = cli.read_timeout {
        config.source.read_timeout = secs;
    }

    match cli.command {
        Command::Sync(args) => cmd::sync::run(args, &config, &progress),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Digest(args) => cmd::digest::run(args, &config),
        Command::Config => cmd::config::run(&config),
    }
}
