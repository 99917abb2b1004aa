//! Read-only inspection of what is in the store.

use schedsync_core::{DigestAlgorithm, Fingerprint, fingerprint_file};
use schedsync_store::{ObjectInfo, ObjectStore};
use serde::Serialize;

use crate::error::SyncError;
use crate::record::read_record;
use crate::runner::create_download_file;

/// Stored state without downloading the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub location: String,
    pub artifact_key: String,
    pub digest_key: String,
    pub recorded_digest: Option<String>,
    pub artifact: Option<ObjectInfo>,
}

pub fn status(store: &dyn ObjectStore, artifact_key: &str, digest_key: &str) -> Result<StoreStatus, SyncError> {
    let recorded = read_record(store, digest_key).map_err(|source| SyncError::StoreRead {
        key: digest_key.to_string(),
        source,
    })?;
    let artifact = store.head(artifact_key).map_err(|source| SyncError::StoreRead {
        key: artifact_key.to_string(),
        source,
    })?;
    Ok(StoreStatus {
        location: store.describe(),
        artifact_key: artifact_key.to_string(),
        digest_key: digest_key.to_string(),
        recorded_digest: recorded.and_then(|r| r.text),
        artifact,
    })
}

/// Whether the digest record describes the stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Consistency {
    Consistent { digest: Fingerprint },
    /// Record and artifact disagree (e.g. after a partial publish)
    Mismatch { recorded: String, actual: Fingerprint },
    MissingRecord { actual: Fingerprint },
    MissingArtifact { recorded: String },
    /// Neither object exists yet
    Empty,
}

impl Consistency {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent { .. } | Self::Empty)
    }
}

/// Spool the stored artifact to a scoped temp file and fingerprint it there.
fn fingerprint_stored(
    store: &dyn ObjectStore,
    key: &str,
    algorithm: DigestAlgorithm,
) -> Result<Option<Fingerprint>, SyncError> {
    let mut spool = create_download_file(None)?;
    let copied = store
        .get_into(key, spool.as_file_mut())
        .map_err(|source| SyncError::StoreRead {
            key: key.to_string(),
            source,
        })?;
    let Some(bytes) = copied else {
        return Ok(None);
    };
    log::debug!("fetched {bytes} bytes of {key} for verification");
    fingerprint_file(algorithm, spool.path())
        .map(Some)
        .map_err(|source| SyncError::Digest {
            path: spool.path().to_path_buf(),
            source,
        })
}

/// Download the stored artifact and check it against the digest record.
pub fn verify(
    store: &dyn ObjectStore,
    artifact_key: &str,
    digest_key: &str,
    algorithm: DigestAlgorithm,
) -> Result<Consistency, SyncError> {
    let recorded = read_record(store, digest_key)
        .map_err(|source| SyncError::StoreRead {
            key: digest_key.to_string(),
            source,
        })?
        .map(|r| r.text.unwrap_or_default());
    let actual = fingerprint_stored(store, artifact_key, algorithm)?;

    let result = match (recorded, actual) {
        (None, None) => Consistency::Empty,
        (Some(recorded), None) => Consistency::MissingArtifact { recorded },
        (None, Some(actual)) => Consistency::MissingRecord { actual },
        (Some(recorded), Some(actual)) if actual.matches_record(&recorded) => {
            Consistency::Consistent { digest: actual }
        }
        (Some(recorded), Some(actual)) => Consistency::Mismatch { recorded, actual },
    };
    log::debug!("verify {artifact_key} against {digest_key}: {result:?}");
    Ok(result)
}
