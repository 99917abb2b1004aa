//! Directory-backed object store
//!
//! Layout:
//! ```text
//! {base}/
//! └── {bucket}/
//!     └── {key...}          # one file per object, key segments as directories
//! ```
//!
//! Writes go to a hidden sibling `.{name}.tmp` and are renamed into place, so
//! readers see either the old or the new object, never a partial one. Etags
//! are blake3 content hashes. Preconditions are checked just before the
//! rename; that check is not atomic against other processes.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::object::{ObjectInfo, ObjectStore, Precondition, PutOptions, StoreError, StoredObject};

/// Object store rooted at a local directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) the bucket directory `{base}/{bucket}`.
    pub fn open(base: &Path, bucket: &str) -> Result<Self, StoreError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::InvalidKey {
                key: bucket.to_string(),
                reason: "bucket must be a single path segment",
            });
        }
        let root = base.join(bucket);
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason| StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if key.contains('\\') {
            return Err(invalid("backslash in key"));
        }
        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(invalid("key must be a relative path without . or .. segments")),
            }
        }
        if key.ends_with('/') {
            return Err(invalid("key names a directory"));
        }
        Ok(self.root.join(rel))
    }

    fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.tmp"))
    }

    fn etag_of(path: &Path) -> io::Result<String> {
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(fs::File::open(path)?)?;
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn current_etag(&self, key: &str, path: &Path) -> Result<Option<String>, StoreError> {
        match Self::etag_of(path) {
            Ok(etag) => Ok(Some(etag)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn check_precondition(&self, key: &str, path: &Path, precondition: &Precondition) -> Result<(), StoreError> {
        let ok = match precondition {
            Precondition::None => return Ok(()),
            Precondition::IfAbsent => self.current_etag(key, path)?.is_none(),
            Precondition::IfMatch(expected) => {
                self.current_etag(key, path)?.as_deref() == Some(expected.as_str())
            }
        };
        if ok {
            Ok(())
        } else {
            Err(StoreError::PreconditionFailed {
                key: key.to_string(),
            })
        }
    }

    /// Stage with `write_staged`, check the precondition, then rename into place.
    fn commit(
        &self,
        key: &str,
        opts: &PutOptions,
        write_staged: impl FnOnce(&Path) -> io::Result<()>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let staging = Self::staging_path(&path);
        if let Err(e) = write_staged(&staging) {
            let _ = fs::remove_file(&staging);
            return Err(io_err(e));
        }

        if let Err(e) = self.check_precondition(key, &path, &opts.precondition) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        fs::rename(&staging, &path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            io_err(e)
        })?;
        log::debug!("local store: wrote {}", path.display());
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(body) => {
                let etag = blake3::hash(&body).to_hex().to_string();
                Ok(Some(StoredObject {
                    body,
                    etag: Some(etag),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn get_into(&self, key: &str, dest: &mut dyn Write) -> Result<Option<u64>, StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let mut file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        io::copy(&mut file, dest).map(Some).map_err(io_err)
    }

    fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError> {
        let path = self.path_for(key)?;
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };
        Ok(Some(ObjectInfo {
            size: meta.len(),
            etag: self.current_etag(key, &path)?,
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    fn put_bytes(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), StoreError> {
        self.commit(key, opts, |staging| fs::write(staging, body))
    }

    fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> Result<(), StoreError> {
        self.commit(key, opts, |staging| fs::copy(path, staging).map(|_| ()))
    }
}
