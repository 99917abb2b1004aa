//! `schedsync status` - inspect the stored artifact and digest record

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use schedsync_sync::{Consistency, StoreStatus};

use super::key_value_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Download the stored artifact and check it against the digest record
    #[arg(long)]
    pub verify: bool,

    /// Print as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    status: StoreStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistency: Option<Consistency>,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let sync_config = config.to_sync_config();
    sync_config.validate_store().context("Invalid configuration")?;

    let store = schedsync_store::open_store(&sync_config.backend, &sync_config.bucket)
        .with_context(|| format!("Failed to open {} store", sync_config.backend.name()))?;

    check_verify_mode(args.verify, sync_config.use_server_filename)?;

    let artifact_key = sync_config.artifact_key(None);
    let digest_key = sync_config.digest_key();
    if sync_config.use_server_filename {
        log::warn!("use_server_filename is set; inspecting the configured name {artifact_key}");
    }

    let status = schedsync_sync::status(store.as_ref(), &artifact_key, &digest_key)
        .context("Failed to read store")?;
    let consistency = if args.verify {
        Some(
            schedsync_sync::verify(store.as_ref(), &artifact_key, &digest_key, sync_config.algorithm)
                .context("Failed to verify store")?,
        )
    } else {
        None
    };

    let consistent = consistency.as_ref().is_none_or(Consistency::is_consistent);
    let report = Report { status, consistency };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    if !consistent {
        bail!("Stored artifact does not match its digest record");
    }
    Ok(())
}

/// The key a server-named publish wrote is not recorded anywhere, so a verify
/// against the configured name would report a false mismatch.
fn check_verify_mode(verify: bool, use_server_filename: bool) -> Result<()> {
    if verify && use_server_filename {
        bail!(
            "--verify is unavailable with use_server_filename: the published artifact key depends on the server's filename"
        );
    }
    Ok(())
}

fn print_table(report: &Report) {
    let status = &report.status;
    let mut table = key_value_table(["Item", "Value"]);

    table.add_row(vec!["Store", &status.location]);
    table.add_row(vec!["Digest record", &status.digest_key]);
    table.add_row(vec![
        "Recorded digest",
        status.recorded_digest.as_deref().unwrap_or("(none)"),
    ]);
    table.add_row(vec!["Artifact", &status.artifact_key]);
    match &status.artifact {
        Some(info) => {
            table.add_row(vec!["Size", &format!("{} bytes", info.size)]);
            table.add_row(vec![
                "Last modified",
                &info
                    .last_modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        None => {
            table.add_row(vec!["Size", "(missing)"]);
        }
    }
    if let Some(consistency) = &report.consistency {
        table.add_row(vec!["Verify", &describe(consistency)]);
    }

    eprintln!("\n{table}");
}

fn describe(consistency: &Consistency) -> String {
    match consistency {
        Consistency::Consistent { digest } => format!("OK ({})", digest.short()),
        Consistency::Mismatch { recorded, actual } => {
            format!("MISMATCH: recorded {recorded}, artifact {actual}")
        }
        Consistency::MissingRecord { actual } => format!("no digest record (artifact {actual})"),
        Consistency::MissingArtifact { recorded } => format!("artifact missing (recorded {recorded})"),
        Consistency::Empty => "nothing stored yet".to_string(),
    }
}
