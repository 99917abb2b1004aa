//! `schedsync digest` - fingerprint a local file the way a sync run would

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use schedsync_core::DigestAlgorithm;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// File to fingerprint
    pub file: PathBuf,

    /// Hash algorithm (default: from config, sha256)
    #[arg(long)]
    pub algorithm: Option<DigestAlgorithm>,
}

pub fn run(args: DigestArgs, config: &Config) -> Result<()> {
    let algorithm = args.algorithm.unwrap_or(config.artifact.algorithm);
    let digest = schedsync_core::fingerprint_file(algorithm, &args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    log::debug!("{algorithm} of {}", args.file.display());
    println!("{digest}  {}", args.file.display());
    Ok(())
}
