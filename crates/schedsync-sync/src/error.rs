//! Failure taxonomy for a sync run.
//!
//! Every variant is fatal for the run; recovery is the next scheduled run.

use std::io;
use std::path::PathBuf;

use schedsync_core::FetchError;
use schedsync_store::StoreError;
use thiserror::Error;

/// Invalid or missing configuration, detected before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("source URL is not set (GTFS_URL or [source].url)")]
    MissingSourceUrl,
    #[error("source URL must be http:// or https://, got {0:?}")]
    UnsupportedScheme(String),
    #[error("bucket is not set (S3_BUCKET_NAME or [store].bucket)")]
    MissingBucket,
    #[error("a custom S3 endpoint requires both access_key_id and secret_access_key")]
    EndpointWithoutCredentials,
    #[error("only one of access_key_id / secret_access_key is set")]
    PartialCredentials,
    #[error("{which} object name is empty")]
    EmptyObjectName { which: &'static str },
    #[error("object name {0:?} must be a single key segment without '/' or '..'")]
    InvalidObjectName(String),
    #[error("artifact and digest record would share the key {0:?}")]
    NameCollision(String),
    #[error("{which} timeout must be greater than zero")]
    ZeroTimeout { which: &'static str },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("cannot create download file in {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fingerprinting {path} failed: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading {key} from store failed: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("writing {key} to store failed: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Artifact replaced but its digest record was not; store is inconsistent
    /// until the next successful publish.
    #[error("partial publish: {artifact_key} was written but {digest_key} was not: {source}")]
    PartialPublish {
        artifact_key: String,
        digest_key: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Whether the run left the store with an artifact whose digest record is stale.
    pub fn is_partial_publish(&self) -> bool {
        matches!(self, Self::PartialPublish { .. })
    }

    /// Whether a concurrent run's write was detected.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::StoreWrite { source, .. } | Self::PartialPublish { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_publish_message_names_both_keys() {
        let err = SyncError::PartialPublish {
            artifact_key: "gtfs/gtfs.zip".into(),
            digest_key: "gtfs/hash.txt".into(),
            source: StoreError::Client("boom".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("gtfs/gtfs.zip"));
        assert!(msg.contains("gtfs/hash.txt"));
        assert!(err.is_partial_publish());
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_through_store_write() {
        let err = SyncError::StoreWrite {
            key: "gtfs/hash.txt".into(),
            source: StoreError::PreconditionFailed {
                key: "gtfs/hash.txt".into(),
            },
        };
        assert!(err.is_conflict());
        assert!(!err.is_partial_publish());
    }

    #[test]
    fn config_error_converts() {
        let err: SyncError = ConfigError::MissingBucket.into();
        assert!(err.to_string().starts_with("configuration:"));
    }
}
