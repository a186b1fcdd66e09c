use crate::core::{SplitError, SplitResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Checksum algorithm for verifying package integrity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    Sha256,
    #[default]
    Blake3,
}

impl ChecksumAlgorithm {
    /// Parse algorithm from a prefixed checksum string
    pub fn from_checksum(checksum: &str) -> Self {
        if checksum.starts_with("sha256:") {
            ChecksumAlgorithm::Sha256
        } else {
            // Unprefixed checksums are BLAKE3
            ChecksumAlgorithm::Blake3
        }
    }

    /// Parse the `checksum_algorithm` config value
    pub fn from_name(name: &str) -> SplitResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(SplitError::Config(format!(
                "Unknown checksum algorithm '{}' (expected blake3 or sha256)",
                other
            ))),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Blake3 => "blake3",
        }
    }
}

/// Hash a file without loading it into memory
pub fn checksum_with_algorithm(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    checksum_reader(&mut reader, algorithm)
}

pub fn checksum_reader(reader: &mut impl io::Read, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            io::copy(reader, &mut hasher)?;
            Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
        }
        ChecksumAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            io::copy(reader, &mut hasher)?;
            Ok(format!("blake3:{}", hasher.finalize().to_hex()))
        }
    }
}

/// Calculate checksum of a file (defaults to BLAKE3)
pub fn checksum(path: &Path) -> io::Result<String> {
    checksum_with_algorithm(path, ChecksumAlgorithm::default())
}

/// Compare two checksums ignoring the algorithm prefix and hex case
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    let strip = |s: &str| -> String {
        s.split_once(':')
            .map(|(_, h)| h)
            .unwrap_or(s)
            .to_ascii_lowercase()
    };
    strip(expected) == strip(actual)
}

/// Verify a file's checksum matches the expected value (supports both SHA-256 and BLAKE3)
pub fn verify_checksum(path: &Path, expected: &str) -> io::Result<bool> {
    let actual = checksum_with_algorithm(path, ChecksumAlgorithm::from_checksum(expected))?;
    Ok(checksums_match(expected, &actual))
}
