//! MMDB-specific Type Definitions
//!
//! Record widths, IP version, format constants and the format-level error type.

use thiserror::Error;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the all-zero separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: u32 = 16;

/// Number of leading zero bits under which IPv6 trees store IPv4 space
pub const IPV4_SUBTREE_DEPTH: u32 = 96;

/// MMDB-specific error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmdbError {
    /// Invalid file format
    #[error("Invalid MMDB format: {0}")]
    InvalidFormat(String),
    /// Metadata not found
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,
    /// Invalid metadata structure
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    /// Data decoding error
    #[error("Data decode error: {0}")]
    DecodeError(String),
}

/// IP version of the search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only (32-bit keys)
    V4,
    /// IPv6 (128-bit keys, IPv4 stored under a 96-bit zero prefix)
    V6,
}

impl IpVersion {
    /// Create from the metadata `ip_version` field
    pub fn from_metadata(version: u64) -> Result<Self, MmdbError> {
        match version {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            _ => Err(MmdbError::InvalidMetadata(format!(
                "Invalid IP version: {}",
                version
            ))),
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::InvalidFormat(format!(
                "Invalid record size: {} bits",
                bits
            ))),
        }
    }

    /// Width in bits
    pub fn bits(self) -> u32 {
        self as u32
    }
}
