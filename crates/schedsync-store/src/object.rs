//! Object storage abstraction used by the sync protocol.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("{operation} {key} failed: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },
    #[error("precondition failed on {key}: object was changed concurrently")]
    PreconditionFailed { key: String },
    #[error("store client setup failed: {0}")]
    Client(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

/// Object body plus the version tag the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Object metadata, without the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Condition the store must check before accepting a write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    #[default]
    None,
    /// Only write if no object exists at the key
    IfAbsent,
    /// Only write if the current object's etag equals this one
    IfMatch(String),
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub precondition: Precondition,
}

impl PutOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            precondition: Precondition::None,
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }
}

/// Key-value object storage.
///
/// A missing object is `Ok(None)`, never an error. Writes fully replace
/// whatever was at the key.
pub trait ObjectStore {
    /// Human-readable location, e.g. `s3://bucket`.
    fn describe(&self) -> String;

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;

    fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError>;

    /// Copy an object's body into `dest`, returning the byte count, or
    /// `None` if the object does not exist.
    ///
    /// The default goes through [`ObjectStore::get`]; backends override it
    /// to stream without holding the body in memory.
    fn get_into(&self, key: &str, dest: &mut dyn Write) -> Result<Option<u64>, StoreError> {
        let Some(obj) = self.get(key)? else {
            return Ok(None);
        };
        dest.write_all(&obj.body).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(obj.body.len() as u64))
    }

    fn put_bytes(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), StoreError>;

    /// Upload a local file without loading it into memory first.
    fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_options_default_unconditional() {
        let opts = PutOptions::new("text/plain");
        assert_eq!(opts.content_type, "text/plain");
        assert_eq!(opts.precondition, Precondition::None);
    }

    #[test]
    fn put_options_with_precondition() {
        let opts = PutOptions::new("text/plain").with_precondition(Precondition::IfMatch("\"abc\"".into()));
        assert_eq!(opts.precondition, Precondition::IfMatch("\"abc\"".into()));
    }

    #[test]
    fn conflict_detection() {
        assert!(StoreError::PreconditionFailed { key: "k".into() }.is_conflict());
        assert!(!StoreError::Client("x".into()).is_conflict());
    }

    #[test]
    fn display_backend() {
        let err = StoreError::Backend {
            operation: "PUT",
            key: "gtfs/hash.txt".into(),
            message: "AccessDenied".into(),
        };
        assert_eq!(format!("{err}"), "PUT gtfs/hash.txt failed: AccessDenied");
    }
}
