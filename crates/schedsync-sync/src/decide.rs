//! Publish-or-skip decision and the two-object publish.

use std::path::Path;

use schedsync_core::Fingerprint;
use schedsync_store::{ObjectStore, Precondition, PutOptions, StoreError};

use crate::config::DIGEST_CONTENT_TYPE;
use crate::error::SyncError;
use crate::record::{RecordedDigest, record_body};

/// Why a candidate has to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReason {
    /// No digest record in the store
    FirstRun,
    /// Record names a different fingerprint
    Changed { previous: String },
    /// Record exists but is empty or not text
    UnreadableRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Publish(PublishReason),
}

/// Compare the candidate with the stored record.
pub fn decide(candidate: &Fingerprint, recorded: Option<&RecordedDigest>) -> Decision {
    match recorded {
        None => Decision::Publish(PublishReason::FirstRun),
        Some(record) if record.matches(candidate) => Decision::Skip,
        Some(RecordedDigest { text: Some(previous), .. }) => Decision::Publish(PublishReason::Changed {
            previous: previous.clone(),
        }),
        Some(_) => Decision::Publish(PublishReason::UnreadableRecord),
    }
}

/// Keys and write options for one publish.
#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub artifact_key: String,
    pub digest_key: String,
    pub artifact_content_type: String,
    /// Precondition on the digest-record write
    pub guard: Precondition,
}

impl PublishPlan {
    /// Re-check the guard before anything is written, so an already-lost race
    /// fails with zero writes instead of a partial publish.
    fn precheck(&self, store: &dyn ObjectStore) -> Result<(), SyncError> {
        let current = store
            .head(&self.digest_key)
            .map_err(|source| SyncError::StoreRead {
                key: self.digest_key.clone(),
                source,
            })?;
        let ok = match (&self.guard, current) {
            (Precondition::None, _) => true,
            (Precondition::IfAbsent, current) => current.is_none(),
            (Precondition::IfMatch(expected), Some(info)) => info.etag.as_deref() == Some(expected.as_str()),
            (Precondition::IfMatch(_), None) => false,
        };
        if ok {
            Ok(())
        } else {
            Err(SyncError::StoreWrite {
                key: self.digest_key.clone(),
                source: StoreError::PreconditionFailed {
                    key: self.digest_key.clone(),
                },
            })
        }
    }
}

/// Write the artifact, then its digest record.
///
/// Both writes must land for success. A failed artifact write leaves the
/// store untouched ([`SyncError::StoreWrite`]); a failed record write after a
/// successful artifact write is [`SyncError::PartialPublish`].
pub fn publish(
    store: &dyn ObjectStore,
    plan: &PublishPlan,
    candidate_path: &Path,
    candidate: &Fingerprint,
) -> Result<(), SyncError> {
    if plan.guard != Precondition::None {
        plan.precheck(store)?;
    }

    log::info!("Uploading artifact to {}/{}", store.describe(), plan.artifact_key);
    store
        .put_file(
            &plan.artifact_key,
            candidate_path,
            &PutOptions::new(&plan.artifact_content_type),
        )
        .map_err(|source| SyncError::StoreWrite {
            key: plan.artifact_key.clone(),
            source,
        })?;

    log::info!("Saving digest {} to {}", candidate.short(), plan.digest_key);
    let opts = PutOptions::new(DIGEST_CONTENT_TYPE).with_precondition(plan.guard.clone());
    store
        .put_bytes(&plan.digest_key, &record_body(candidate), &opts)
        .map_err(|source| {
            log::error!(
                "artifact {} updated but digest record {} was not; next run will republish",
                plan.artifact_key,
                plan.digest_key
            );
            SyncError::PartialPublish {
                artifact_key: plan.artifact_key.clone(),
                digest_key: plan.digest_key.clone(),
                source,
            }
        })
}

#[cfg(test)]
mod tests {
    use schedsync_core::{DigestAlgorithm, fingerprint_bytes};

    use super::*;

    fn fp(data: &[u8]) -> Fingerprint {
        fingerprint_bytes(DigestAlgorithm::Sha256, data)
    }

    fn record(text: &str) -> RecordedDigest {
        RecordedDigest::from_body(text.as_bytes(), None)
    }

    #[test]
    fn no_record_publishes() {
        assert_eq!(decide(&fp(b"a"), None), Decision::Publish(PublishReason::FirstRun));
    }

    #[test]
    fn equal_record_skips() {
        let candidate = fp(b"a");
        assert_eq!(decide(&candidate, Some(&record(candidate.as_hex()))), Decision::Skip);
    }

    #[test]
    fn record_with_newline_still_skips() {
        let candidate = fp(b"a");
        let text = format!("{candidate}\n");
        assert_eq!(decide(&candidate, Some(&record(&text))), Decision::Skip);
    }

    #[test]
    fn different_record_publishes_with_previous() {
        let old = fp(b"old");
        let new = fp(b"new");
        assert_eq!(
            decide(&new, Some(&record(old.as_hex()))),
            Decision::Publish(PublishReason::Changed {
                previous: old.as_hex().to_string()
            })
        );
    }

    #[test]
    fn unreadable_record_publishes() {
        assert_eq!(
            decide(&fp(b"a"), Some(&record(""))),
            Decision::Publish(PublishReason::UnreadableRecord)
        );
    }
}
