//! schedsync core - fetching and fingerprinting the source artifact
//!
//! Provides the HTTP fetcher, the fingerprint engine, and the logging and
//! progress plumbing shared by the other schedsync crates.

pub mod digest;
pub mod fetch;
pub mod logging;
pub mod progress;
pub mod stream;

// Re-exports for convenience
pub use digest::{DigestAlgorithm, Fingerprint, fingerprint_bytes, fingerprint_file, fingerprint_reader};
pub use fetch::{Download, Fetcher, filename_from_disposition};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, upgrade_to_bar};
pub use stream::{FetchError, HttpSettings, SHARED_RUNTIME};
