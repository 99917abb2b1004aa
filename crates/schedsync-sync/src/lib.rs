//! schedsync-sync: change-detection-gated sync of one artifact
//!
//! Fetches the source artifact, fingerprints it, and publishes it together
//! with its digest record only when the fingerprint differs from the one on
//! record. A run writes either nothing or both objects.

pub mod config;
pub mod decide;
pub mod error;
pub mod record;
pub mod runner;
pub mod verify;

pub use config::{Config, DIGEST_CONTENT_TYPE};
pub use decide::{Decision, PublishPlan, PublishReason, decide, publish};
pub use error::{ConfigError, SyncError};
pub use record::{RecordedDigest, read_record};
pub use runner::{RunSummary, SyncOutcome, run};
pub use verify::{Consistency, StoreStatus, status, verify};
