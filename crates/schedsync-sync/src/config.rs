//! Run configuration, built once at startup and passed by reference.

use std::path::PathBuf;

use schedsync_core::{DigestAlgorithm, HttpSettings};
use schedsync_store::{ObjectLayout, S3Settings, StoreBackend};

use crate::error::ConfigError;

/// Content type of the digest record object
pub const DIGEST_CONTENT_TYPE: &str = "text/plain";

/// Everything one sync run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub http: HttpSettings,
    pub backend: StoreBackend,
    pub bucket: String,
    pub prefix: String,
    /// Object name of the artifact under `prefix`
    pub artifact_name: String,
    /// Object name of the digest record under `prefix`
    pub digest_name: String,
    pub artifact_content_type: String,
    /// Name the artifact after the server's Content-Disposition filename
    pub use_server_filename: bool,
    pub algorithm: DigestAlgorithm,
    /// Directory for the run's download file (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
    /// Make the digest-record write conditional on what this run read
    pub guard_concurrent: bool,
    /// Decide but never write
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            http: HttpSettings::default(),
            backend: StoreBackend::S3(S3Settings::default()),
            bucket: String::new(),
            prefix: "gtfs/".to_string(),
            artifact_name: "gtfs.zip".to_string(),
            digest_name: "hash.txt".to_string(),
            artifact_content_type: "application/zip".to_string(),
            use_server_filename: false,
            algorithm: DigestAlgorithm::Sha256,
            work_dir: None,
            guard_concurrent: false,
            dry_run: false,
        }
    }
}

fn check_name(which: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyObjectName { which });
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(ConfigError::InvalidObjectName(name.to_string()));
    }
    Ok(())
}

impl Config {
    /// Reject configurations that cannot work, before touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.source_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingSourceUrl);
        }
        let lower = url.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => {}
            _ => return Err(ConfigError::UnsupportedScheme(url.to_string())),
        }

        if self.http.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { which: "connect" });
        }
        if self.http.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { which: "read" });
        }
        self.validate_store()
    }

    /// Store-side checks only; enough for commands that never fetch.
    pub fn validate_store(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingBucket);
        }

        if let StoreBackend::S3(s3) = &self.backend {
            let has_key = s3.access_key_id.as_deref().is_some_and(|s| !s.is_empty());
            let has_secret = s3.secret_access_key.as_deref().is_some_and(|s| !s.is_empty());
            if s3.endpoint.is_some() && !(has_key && has_secret) {
                return Err(ConfigError::EndpointWithoutCredentials);
            }
            if has_key != has_secret {
                return Err(ConfigError::PartialCredentials);
            }
        }

        check_name("artifact", &self.artifact_name)?;
        check_name("digest record", &self.digest_name)?;
        if self.artifact_name == self.digest_name {
            return Err(ConfigError::NameCollision(self.digest_name.clone()));
        }
        Ok(())
    }

    pub fn layout(&self) -> ObjectLayout {
        ObjectLayout::new(&self.prefix)
    }

    pub fn digest_key(&self) -> String {
        self.layout().key(&self.digest_name)
    }

    /// Key for the artifact, honouring a server-suggested name when enabled.
    ///
    /// A suggested name equal to the digest record's name is ignored so the
    /// artifact can never overwrite its own record.
    pub fn artifact_key(&self, server_filename: Option<&str>) -> String {
        let name = match server_filename {
            Some(name) if self.use_server_filename && name != self.digest_name => name,
            Some(name) if self.use_server_filename => {
                log::warn!(
                    "server filename {name:?} collides with the digest record, using {:?}",
                    self.artifact_name
                );
                self.artifact_name.as_str()
            }
            _ => self.artifact_name.as_str(),
        };
        self.layout().key(name)
    }
}
