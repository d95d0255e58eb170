//! MMDB Binary Format Parsing
//!
//! Only the header fields needed for lookups are extracted; everything else
//! stays in the (possibly memory-mapped) buffer.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ search tree                  │  node_count * node_bytes
//! ├──────────────────────────────┤
//! │ 16 zero bytes (separator)    │
//! ├──────────────────────────────┤
//! │ data section                 │
//! ├──────────────────────────────┤
//! │ \xAB\xCD\xEFMaxMind.com      │
//! │ metadata map                 │
//! └──────────────────────────────┘
//! ```

use super::types::{
    IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER,
};
use crate::data_section::{DataDecoder, DataValue};
use std::collections::HashMap;

/// The marker appears somewhere in the last 128KB of the file
const METADATA_SEARCH_SIZE: usize = 128 * 1024;

/// MMDB file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Amount subtracted, after `node_count`, from a data record value
    pub data_section_base: u32,
}

impl MmdbHeader {
    /// Header for a tree with the standard 16-byte separator
    pub fn new(node_count: u32, record_size: RecordSize, ip_version: IpVersion) -> Self {
        Self {
            node_count,
            record_size,
            ip_version,
            tree_size: (node_count as usize).saturating_mul(record_size.node_bytes()),
            data_section_base: DATA_SECTION_SEPARATOR_SIZE,
        }
    }

    /// Parse MMDB file and extract the lookup header
    pub fn from_file(data: &[u8]) -> Result<Self, MmdbError> {
        let metadata = MmdbMetadata::from_file(data)?;
        let map = match metadata.as_value()? {
            DataValue::Map(map) => map,
            _ => {
                return Err(MmdbError::InvalidMetadata(
                    "Metadata is not a map".to_string(),
                ))
            }
        };

        let node_count = extract_uint(&map, "node_count")?;
        let node_count = u32::try_from(node_count).map_err(|_| {
            MmdbError::InvalidMetadata(format!("node_count {} does not fit in 32 bits", node_count))
        })?;
        let record_size = RecordSize::from_bits(extract_uint(&map, "record_size")?)?;
        let ip_version = IpVersion::from_metadata(extract_uint(&map, "ip_version")?)?;

        let header = Self::new(node_count, record_size, ip_version);
        let data_start = header.tree_size as u64 + DATA_SECTION_SEPARATOR_SIZE as u64;
        if data_start > metadata.marker_offset() as u64 {
            return Err(MmdbError::InvalidFormat(format!(
                "Search tree of {} bytes overlaps metadata at offset {}",
                header.tree_size,
                metadata.marker_offset()
            )));
        }

        Ok(header)
    }

    /// Byte offset at which the data section begins
    pub fn data_section_start(&self) -> usize {
        self.tree_size
            .saturating_add(self.data_section_base as usize)
    }
}

/// Metadata access that decodes on demand
pub struct MmdbMetadata<'a> {
    raw_data: &'a [u8],
    marker_offset: usize,
}

impl<'a> MmdbMetadata<'a> {
    /// Locate the metadata section
    pub fn from_file(data: &'a [u8]) -> Result<Self, MmdbError> {
        Ok(MmdbMetadata {
            raw_data: data,
            marker_offset: find_metadata_marker(data)?,
        })
    }

    /// Offset of the metadata marker
    pub fn marker_offset(&self) -> usize {
        self.marker_offset
    }

    /// Decode the full metadata map
    pub fn as_value(&self) -> Result<DataValue, MmdbError> {
        let start = self.marker_offset + METADATA_MARKER.len();
        DataDecoder::new(&self.raw_data[start..])
            .decode(0)
            .map_err(|e| MmdbError::InvalidMetadata(format!("Failed to decode metadata: {}", e)))
    }
}

/// Find the metadata marker in MMDB file
///
/// If there are multiple markers, the last one wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_SIZE);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or(MmdbError::MetadataNotFound)
}

fn extract_uint(map: &HashMap<String, DataValue>, key: &str) -> Result<u64, MmdbError> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::InvalidMetadata(format!("Field '{}' is not an unsigned integer", key))
        }),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}
