//! Configuration loading from TOML files and the environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use schedsync_core::{DigestAlgorithm, HttpSettings};
use schedsync_store::{S3Settings, StoreBackend};
use serde::Deserialize;

/// Global configuration for schedsync
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub artifact: ArtifactConfig,
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
    /// Seconds without body data before the download fails
    pub read_timeout: u64,
    pub connect_timeout: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            read_timeout: 60,
            connect_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub bucket: Option<String>,
    pub prefix: String,
    pub region: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub endpoint: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_key_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub secret_access_key: Option<String>,
    /// Base directory of the `local` backend
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::S3,
            bucket: None,
            prefix: "gtfs/".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            root: PathBuf::from("./objects"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub name: String,
    pub digest_name: String,
    pub content_type: String,
    pub use_server_filename: bool,
    pub algorithm: DigestAlgorithm,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            name: "gtfs.zip".to_string(),
            digest_name: "hash.txt".to_string(),
            content_type: "application/zip".to_string(),
            use_server_filename: false,
            algorithm: DigestAlgorithm::Sha256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SyncSection {
    pub guard_concurrent: bool,
    pub work_dir: Option<PathBuf>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./schedsync.toml (current directory)
    /// 2. ~/.config/schedsync/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("schedsync.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "schedsync") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables (empty values are ignored).
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GTFS_URL") {
            self.source.url = Some(v);
        }
        if let Some(v) = get("S3_BUCKET_NAME") {
            self.store.bucket = Some(v);
        }
        if let Some(v) = get("S3_PREFIX") {
            self.store.prefix = v;
        }
        if let Some(v) = get("S3_ENDPOINT_URL") {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = get("S3_REGION") {
            self.store.region = v;
        }
        if let Some(v) = get("S3_ACCESS_KEY_ID") {
            self.store.access_key_id = Some(v);
        }
        if let Some(v) = get("S3_SECRET_ACCESS_KEY") {
            self.store.secret_access_key = Some(v);
        }
        if let Some(v) = get("SCHEDSYNC_STORE_ROOT") {
            self.store.backend = BackendKind::Local;
            self.store.root = PathBuf::from(v);
        }
    }

    pub fn backend(&self) -> StoreBackend {
        match self.store.backend {
            BackendKind::S3 => StoreBackend::S3(S3Settings {
                region: self.store.region.clone(),
                endpoint: self.store.endpoint.clone(),
                access_key_id: self.store.access_key_id.clone(),
                secret_access_key: self.store.secret_access_key.clone(),
            }),
            BackendKind::Local => StoreBackend::Local {
                root: self.store.root.clone(),
            },
        }
    }

    /// Build the run configuration the sync pipeline consumes.
    pub fn to_sync_config(&self) -> schedsync_sync::Config {
        schedsync_sync::Config {
            source_url: self.source.url.clone().unwrap_or_default(),
            http: HttpSettings {
                connect_timeout: Duration::from_secs(self.source.connect_timeout),
                read_timeout: Duration::from_secs(self.source.read_timeout),
            },
            backend: self.backend(),
            bucket: self.store.bucket.clone().unwrap_or_default(),
            prefix: self.store.prefix.clone(),
            artifact_name: self.artifact.name.clone(),
            digest_name: self.artifact.digest_name.clone(),
            artifact_content_type: self.artifact.content_type.clone(),
            use_server_filename: self.artifact.use_server_filename,
            algorithm: self.artifact.algorithm,
            work_dir: self.sync.work_dir.clone(),
            guard_concurrent: self.sync.guard_concurrent,
            dry_run: false,
        }
    }
}
