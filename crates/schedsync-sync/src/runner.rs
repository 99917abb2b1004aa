//! One sync run: fetch → fingerprint → decide → publish.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use schedsync_core::{Fetcher, Fingerprint, fingerprint_file};
use schedsync_store::{ObjectStore, Precondition};
use serde::Serialize;

use crate::config::Config;
use crate::decide::{Decision, PublishPlan, PublishReason, decide, publish};
use crate::error::SyncError;
use crate::record::{guard_for, read_record};

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Fingerprints matched; nothing written
    Skipped { digest: Fingerprint },
    /// Artifact and digest record replaced
    Published {
        digest: Fingerprint,
        previous: Option<String>,
        artifact_key: String,
    },
    /// Dry run that would have published
    WouldPublish {
        digest: Fingerprint,
        previous: Option<String>,
        artifact_key: String,
    },
}

impl SyncOutcome {
    pub fn digest(&self) -> &Fingerprint {
        match self {
            Self::Skipped { digest } | Self::Published { digest, .. } | Self::WouldPublish { digest, .. } => digest,
        }
    }

    /// Number of store writes the run performed.
    pub fn writes(&self) -> usize {
        match self {
            Self::Published { .. } => 2,
            Self::Skipped { .. } | Self::WouldPublish { .. } => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Published { .. } => "published",
            Self::WouldPublish { .. } => "would publish",
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: SyncOutcome,
    pub source_bytes: u64,
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Run the sync protocol once against `store`.
///
/// The download lives in a temporary file that is deleted when this function
/// returns, whatever the outcome.
pub fn run(config: &Config, store: &dyn ObjectStore, pb: &ProgressBar) -> Result<RunSummary, SyncError> {
    let started_at = Utc::now();
    let start = Instant::now();
    config.validate()?;

    let fetcher = Fetcher::new(config.source_url.trim(), config.http)?;

    let mut download_file = create_download_file(config.work_dir.as_deref())?;
    log::debug!("Download file: {}", download_file.path().display());

    let download = fetcher.download_into(download_file.as_file_mut(), pb)?;
    pb.finish_and_clear();

    let candidate = fingerprint_file(config.algorithm, download_file.path()).map_err(|source| {
        SyncError::Digest {
            path: download_file.path().to_path_buf(),
            source,
        }
    })?;
    log::info!("Candidate {} digest: {candidate}", config.algorithm);

    let digest_key = config.digest_key();
    let recorded = read_record(store, &digest_key).map_err(|source| SyncError::StoreRead {
        key: digest_key.clone(),
        source,
    })?;
    match &recorded {
        Some(r) => log::info!("Recorded digest: {}", r.describe()),
        None => log::info!("No digest record at {digest_key}"),
    }

    let artifact_key = config.artifact_key(download.server_filename.as_deref());
    let outcome = match decide(&candidate, recorded.as_ref()) {
        Decision::Skip => {
            log::info!("Digest unchanged - skipping upload");
            SyncOutcome::Skipped { digest: candidate }
        }
        Decision::Publish(reason) => {
            let previous = match &reason {
                PublishReason::Changed { previous } => Some(previous.clone()),
                PublishReason::FirstRun | PublishReason::UnreadableRecord => None,
            };
            log::info!("Artifact changed ({reason:?}) - publishing");

            if config.dry_run {
                log::info!("Dry run: would write {artifact_key} and {digest_key}");
                SyncOutcome::WouldPublish {
                    digest: candidate,
                    previous,
                    artifact_key,
                }
            } else {
                let plan = PublishPlan {
                    artifact_key: artifact_key.clone(),
                    digest_key,
                    artifact_content_type: config.artifact_content_type.clone(),
                    guard: if config.guard_concurrent {
                        guard_for(recorded.as_ref())
                    } else {
                        Precondition::None
                    },
                };
                publish(store, &plan, download_file.path(), &candidate)?;
                SyncOutcome::Published {
                    digest: candidate,
                    previous,
                    artifact_key,
                }
            }
        }
    };

    // Error paths rely on drop; here the removal is explicit so it can be logged
    let download_path = download_file.path().to_path_buf();
    match download_file.close() {
        Ok(()) => log::debug!("Removed {}", download_path.display()),
        Err(e) => log::warn!("Could not remove {}: {e}", download_path.display()),
    }

    Ok(RunSummary {
        outcome,
        source_bytes: download.bytes,
        started_at,
        elapsed: start.elapsed(),
    })
}

pub(crate) fn create_download_file(work_dir: Option<&Path>) -> Result<tempfile::NamedTempFile, SyncError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("schedsync-").suffix(".download");
    let dir = work_dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
    builder
        .tempfile_in(&dir)
        .map_err(|source| SyncError::Workspace { path: dir, source })
}
