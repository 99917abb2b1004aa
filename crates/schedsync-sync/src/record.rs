//! The digest record: a small text object naming the stored artifact's fingerprint.

use schedsync_core::Fingerprint;
use schedsync_store::{ObjectStore, Precondition, StoreError};

/// Digest record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDigest {
    /// Trimmed record text; `None` when the object is empty or not UTF-8
    pub text: Option<String>,
    /// Store version tag of the record object
    pub etag: Option<String>,
}

impl RecordedDigest {
    pub fn from_body(body: &[u8], etag: Option<String>) -> Self {
        let text = std::str::from_utf8(body)
            .ok()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self { text, etag }
    }

    pub fn matches(&self, candidate: &Fingerprint) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| candidate.matches_record(text))
    }

    /// Short form for log lines.
    pub fn describe(&self) -> &str {
        self.text.as_deref().unwrap_or("<unreadable>")
    }
}

/// Read the digest record. A missing object is `Ok(None)`: the first-run state.
pub fn read_record(store: &dyn ObjectStore, key: &str) -> Result<Option<RecordedDigest>, StoreError> {
    let Some(obj) = store.get(key)? else {
        return Ok(None);
    };
    let record = RecordedDigest::from_body(&obj.body, obj.etag);
    if record.text.is_none() {
        log::warn!("digest record {key} is empty or not UTF-8, treating it as stale");
    }
    Ok(Some(record))
}

/// Body written to the record for `fingerprint`: bare lowercase hex, no newline.
pub fn record_body(fingerprint: &Fingerprint) -> Vec<u8> {
    fingerprint.as_hex().as_bytes().to_vec()
}

/// Precondition that makes the record write fail if another run changed the
/// record since `read` was taken.
pub fn guard_for(read: Option<&RecordedDigest>) -> Precondition {
    match read {
        None => Precondition::IfAbsent,
        Some(RecordedDigest { etag: Some(etag), .. }) => Precondition::IfMatch(etag.clone()),
        Some(RecordedDigest { etag: None, .. }) => {
            log::warn!("store returned no etag for the digest record, write will be unguarded");
            Precondition::None
        }
    }
}

#[cfg(test)]
mod tests {
    use schedsync_core::{DigestAlgorithm, fingerprint_bytes};
    use schedsync_store::{LocalStore, PutOptions};

    use super::*;

    fn fp(data: &[u8]) -> Fingerprint {
        fingerprint_bytes(DigestAlgorithm::Sha256, data)
    }

    #[test]
    fn from_body_trims() {
        let record = RecordedDigest::from_body(b"  abc123\n", None);
        assert_eq!(record.text.as_deref(), Some("abc123"));
    }

    #[test]
    fn from_body_unreadable() {
        assert_eq!(RecordedDigest::from_body(b"", None).text, None);
        assert_eq!(RecordedDigest::from_body(b"\n\t ", None).text, None);
        assert_eq!(RecordedDigest::from_body(&[0xff, 0xfe], None).text, None);
        assert_eq!(RecordedDigest::from_body(&[0xff], None).describe(), "<unreadable>");
    }

    #[test]
    fn matches_candidate() {
        let candidate = fp(b"feed");
        let record = RecordedDigest::from_body(&record_body(&candidate), None);
        assert!(record.matches(&candidate));
        assert!(!record.matches(&fp(b"other feed")));
        assert!(!RecordedDigest::from_body(b"", None).matches(&candidate));
    }

    #[test]
    fn record_body_is_bare_hex() {
        let candidate = fp(b"abc");
        assert_eq!(
            record_body(&candidate),
            b"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_vec()
        );
    }

    #[test]
    fn read_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), "transit").unwrap();
        assert_eq!(read_record(&store, "gtfs/hash.txt").unwrap(), None);
    }

    #[test]
    fn read_existing_record_keeps_etag() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), "transit").unwrap();
        store
            .put_bytes("gtfs/hash.txt", b"abc123\n", &PutOptions::new("text/plain"))
            .unwrap();
        let record = read_record(&store, "gtfs/hash.txt").unwrap().unwrap();
        assert_eq!(record.text.as_deref(), Some("abc123"));
        assert!(record.etag.is_some());
    }

    #[test]
    fn guard_preconditions() {
        assert_eq!(guard_for(None), Precondition::IfAbsent);
        let with_etag = RecordedDigest {
            text: Some("abc".into()),
            etag: Some("\"e1\"".into()),
        };
        assert_eq!(guard_for(Some(&with_etag)), Precondition::IfMatch("\"e1\"".into()));
        let without = RecordedDigest {
            text: Some("abc".into()),
            etag: None,
        };
        assert_eq!(guard_for(Some(&without)), Precondition::None);
    }
}
