//! Checksum algorithms usable as flexible checksums.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::Digest;

use crate::constants::X_AMZ_CHECKSUM_PREFIX;

/// Checksum algorithms a request may carry in a `x-amz-checksum-*` header
/// or trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// CRC-32 (IEEE 802.3).
    Crc32,
    /// CRC-32C (Castagnoli).
    Crc32c,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    Sha256,
    /// MD5.
    Md5,
}

impl ChecksumAlgorithm {
    /// Upper-case algorithm id, e.g. `CRC32C`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Md5 => "MD5",
        }
    }

    /// Header (or trailer) carrying this checksum, e.g. `x-amz-checksum-crc32`.
    pub fn header_name(&self) -> String {
        format!(
            "{X_AMZ_CHECKSUM_PREFIX}{}",
            self.as_str().to_ascii_lowercase()
        )
    }

    /// Size of the raw checksum in bytes.
    pub fn digest_size(&self) -> usize {
        match self {
            Self::Crc32 | Self::Crc32c => 4,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Md5 => 16,
        }
    }

    /// Length of the base64 encoded checksum.
    pub fn encoded_size(&self) -> usize {
        self.digest_size().div_ceil(3) * 4
    }

    /// Start an incremental computation.
    pub fn hasher(&self) -> ChecksumHasher {
        match self {
            Self::Crc32 => ChecksumHasher::Crc32(crc32fast::Hasher::new()),
            Self::Crc32c => ChecksumHasher::Crc32c(0),
            Self::Sha1 => ChecksumHasher::Sha1(sha1::Sha1::new()),
            Self::Sha256 => ChecksumHasher::Sha256(sha2::Sha256::new()),
            Self::Md5 => ChecksumHasher::Md5(md5::Md5::new()),
        }
    }

    /// Compute the checksum of an in-memory buffer.
    pub fn checksum(&self, content: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(content);
        hasher.finalize()
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = sigv4_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRC32" => Ok(Self::Crc32),
            "CRC32C" => Ok(Self::Crc32c),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "MD5" => Ok(Self::Md5),
            _ => Err(sigv4_core::Error::config_invalid(format!(
                "unknown checksum algorithm: {s}"
            ))),
        }
    }
}

/// Running state of a checksum computation.
#[derive(Clone)]
pub enum ChecksumHasher {
    /// CRC-32 state.
    Crc32(crc32fast::Hasher),
    /// CRC-32C state.
    Crc32c(u32),
    /// SHA-1 state.
    Sha1(sha1::Sha1),
    /// SHA-256 state.
    Sha256(sha2::Sha256),
    /// MD5 state.
    Md5(md5::Md5),
}

impl ChecksumHasher {
    /// Feed more bytes.
    pub fn update(&mut self, content: &[u8]) {
        match self {
            Self::Crc32(h) => h.update(content),
            Self::Crc32c(crc) => *crc = crc32c::crc32c_append(*crc, content),
            Self::Sha1(h) => h.update(content),
            Self::Sha256(h) => h.update(content),
            Self::Md5(h) => h.update(content),
        }
    }

    /// Finish and return the raw checksum bytes. CRCs are big-endian.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Crc32c(crc) => crc.to_be_bytes().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Md5(h) => h.finalize().to_vec(),
        }
    }
}

/// Checksums computed for a payload, shared across attempts of the same
/// request so a retry does not read the payload again.
#[derive(Debug, Clone, Default)]
pub struct ChecksumStore {
    values: Arc<Mutex<HashMap<ChecksumAlgorithm, Vec<u8>>>>,
}

impl ChecksumStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stored checksum.
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<Vec<u8>> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&algorithm)
            .cloned()
    }

    /// Store a checksum, replacing any previous value.
    pub fn put(&self, algorithm: ChecksumAlgorithm, value: Vec<u8>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(algorithm, value);
    }
}
