//! Content fingerprints for change detection.
//!
//! A fingerprint stands in for full-content comparison, so only 256-bit
//! cryptographic hashes are offered. Input is always consumed in chunks.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Read chunk size for fingerprinting (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Hash function used for fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    fn hasher(self) -> Hasher {
        match self {
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
            Self::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown digest algorithm: {other} (expected sha256 or blake3)")),
        }
    }
}

enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finish(self) -> Fingerprint {
        match self {
            Self::Sha256(h) => Fingerprint(hex::encode(h.finalize())),
            Self::Blake3(h) => Fingerprint(h.finalize().to_hex().to_string()),
        }
    }
}

/// Lowercase hex digest of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }

    /// Whether a stored record names this fingerprint.
    ///
    /// Surrounding whitespace in the record is ignored; otherwise the
    /// comparison is exact.
    pub fn matches_record(&self, record: &str) -> bool {
        record.trim() == self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint everything `reader` yields, in fixed-size chunks.
pub fn fingerprint_reader<R: Read>(algorithm: DigestAlgorithm, mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

/// Fingerprint a file's contents.
pub fn fingerprint_file(algorithm: DigestAlgorithm, path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    fingerprint_reader(algorithm, file)
}

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Fingerprint {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    hasher.finish()
}
