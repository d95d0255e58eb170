//! MaxMind DB (MMDB) Reader
//!
//! Read-only access to the MMDB binary search tree: an address is resolved to
//! a data section offset, or to "not found".
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **node**: bit-packed node record reads (24/28/32-bit)
//! - **tree**: search tree traversal for IP lookups
//! - **format**: header and metadata extraction
//!
//! Turning an offset into attribute values is left to
//! `crate::data_section::DataDecoder` and `crate::decoder`.

pub mod format;
pub mod node;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, MmdbHeader, MmdbMetadata};
pub use node::{NodeReader, OUT_OF_RANGE_RECORD};
pub use tree::{LookupResult, SearchTree};
pub use types::{
    IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, IPV4_SUBTREE_DEPTH,
    METADATA_MARKER,
};
