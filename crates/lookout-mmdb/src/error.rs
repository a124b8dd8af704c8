//! Error types for MMDB format operations

use std::fmt;

/// Errors that can occur while opening, decoding, or building a database
#[derive(Debug, Clone)]
pub enum MmdbError {
    /// File does not conform to the MMDB format
    InvalidFormat(String),
    /// Metadata marker not found in the file
    MetadataNotFound,
    /// Metadata section present but malformed
    InvalidMetadata(String),
    /// Data section decoding error
    Decode(String),
    /// Invalid IP address or CIDR notation
    InvalidNetwork(String),
    /// Database building error
    Build(String),
    /// I/O error
    Io(String),
}

impl fmt::Display for MmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmdbError::InvalidFormat(msg) => write!(f, "Invalid MMDB format: {}", msg),
            MmdbError::MetadataNotFound => write!(f, "MMDB metadata marker not found"),
            MmdbError::InvalidMetadata(msg) => write!(f, "Invalid metadata: {}", msg),
            MmdbError::Decode(msg) => write!(f, "Data decode error: {}", msg),
            MmdbError::InvalidNetwork(msg) => write!(f, "Invalid network: {}", msg),
            MmdbError::Build(msg) => write!(f, "Build error: {}", msg),
            MmdbError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for MmdbError {}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::Io(err.to_string())
    }
}

impl From<String> for MmdbError {
    fn from(msg: String) -> Self {
        MmdbError::Decode(msg)
    }
}
