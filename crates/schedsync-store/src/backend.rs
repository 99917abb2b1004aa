//! Backend selection from configuration.

use std::path::PathBuf;

use crate::local::LocalStore;
use crate::object::{ObjectStore, StoreError};
use crate::s3::{S3Settings, S3Store};

/// Where objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    S3(S3Settings),
    /// Directory tree standing in for a bucket (testing, air-gapped mirrors)
    Local { root: PathBuf },
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3(_) => "s3",
            Self::Local { .. } => "local",
        }
    }
}

/// Open the configured backend for `bucket`.
pub fn open_store(backend: &StoreBackend, bucket: &str) -> Result<Box<dyn ObjectStore>, StoreError> {
    let store: Box<dyn ObjectStore> = match backend {
        StoreBackend::S3(settings) => Box::new(S3Store::connect(settings, bucket)?),
        StoreBackend::Local { root } => Box::new(LocalStore::open(root, bucket)?),
    };
    log::debug!("opened {} store at {}", backend.name(), store.describe());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::Local {
            root: dir.path().to_path_buf(),
        };
        let store = open_store(&backend, "transit").unwrap();
        assert_eq!(
            store.describe(),
            format!("file://{}", dir.path().join("transit").display())
        );
        assert_eq!(backend.name(), "local");
    }
}
