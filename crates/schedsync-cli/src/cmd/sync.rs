//! `schedsync sync` - run the sync protocol once

use anyhow::{Context, Result};
use clap::Args;

use schedsync_core::ProgressContext;
use schedsync_sync::{RunSummary, SyncOutcome};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Fetch and compare, but never write to the store
    #[arg(long)]
    pub dry_run: bool,

    /// Source URL (overrides config and GTFS_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Bucket name (overrides config and S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long)]
    pub prefix: Option<String>,

    /// Make the digest-record write conditional on what this run read
    #[arg(long)]
    pub guard: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SyncArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let mut sync_config = config.to_sync_config();
    if let Some(url) = args.url {
        sync_config.source_url = url;
    }
    if let Some(bucket) = args.bucket {
        sync_config.bucket = bucket;
    }
    if let Some(prefix) = args.prefix {
        sync_config.prefix = prefix;
    }
    sync_config.guard_concurrent |= args.guard;
    sync_config.dry_run = args.dry_run;

    sync_config.validate().context("Invalid configuration")?;

    let store = schedsync_store::open_store(&sync_config.backend, &sync_config.bucket)
        .with_context(|| format!("Failed to open {} store", sync_config.backend.name()))?;

    let pb = progress.transfer_bar("download");
    let result = schedsync_sync::run(&sync_config, store.as_ref(), &pb);
    pb.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            if e.is_partial_publish() {
                log::error!("store is inconsistent until the next successful run: {e}");
            } else {
                log::error!("sync failed: {e}");
            }
            return Err(e).context("Sync failed");
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        progress.println(describe(&summary));
    }
    Ok(())
}

fn describe(summary: &RunSummary) -> String {
    let secs = summary.elapsed.as_secs_f64();
    match &summary.outcome {
        SyncOutcome::Skipped { digest } => {
            format!("Unchanged ({}), nothing written [{secs:.1}s]", digest.short())
        }
        SyncOutcome::Published {
            digest,
            previous,
            artifact_key,
        } => format!(
            "Published {artifact_key} ({} -> {}, {} bytes) [{secs:.1}s]",
            previous.as_deref().map(short).unwrap_or("none"),
            digest.short(),
            summary.source_bytes,
        ),
        SyncOutcome::WouldPublish {
            digest,
            previous,
            artifact_key,
        } => format!(
            "Dry run: would publish {artifact_key} ({} -> {})",
            previous.as_deref().map(short).unwrap_or("none"),
            digest.short(),
        ),
    }
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use schedsync_core::{DigestAlgorithm, fingerprint_bytes};

    use super::*;

    fn summary(outcome: SyncOutcome) -> RunSummary {
        RunSummary {
            outcome,
            source_bytes: 42,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn describe_skip() {
        let digest = fingerprint_bytes(DigestAlgorithm::Sha256, b"feed");
        let text = describe(&summary(SyncOutcome::Skipped {
            digest: digest.clone(),
        }));
        assert!(text.starts_with("Unchanged"));
        assert!(text.contains(digest.short()));
    }

    #[test]
    fn describe_first_publish() {
        let digest = fingerprint_bytes(DigestAlgorithm::Sha256, b"feed");
        let text = describe(&summary(SyncOutcome::Published {
            digest,
            previous: None,
            artifact_key: "gtfs/gtfs.zip".to_string(),
        }));
        assert!(text.contains("gtfs/gtfs.zip"));
        assert!(text.contains("none ->"));
        assert!(text.contains("42 bytes"));
    }

    #[test]
    fn short_handles_garbage_records() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("é"), "é");
    }
}
