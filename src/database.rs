//! Geolocation database
//!
//! A `GeoDatabase` owns one immutable MMDB image, either memory-mapped or held
//! in an owned buffer. It is opened once, shared by reference among any number
//! of concurrent readers, and released exactly once when closed or dropped.

use crate::data_section::DataValue;
use crate::error::{EnrichError, Result};
use crate::mmdb::{IpVersion, LookupResult, MmdbHeader, MmdbMetadata, SearchTree};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// Read-only IP geolocation database
///
/// # Examples
///
/// ```no_run
/// use geoenrich::GeoDatabase;
///
/// let db = GeoDatabase::open("GeoLite2-City.mmdb")?;
/// let result = db.resolve("8.8.8.8")?;
/// println!("found: {}", result.is_found());
/// db.close();
/// # Ok::<(), geoenrich::EnrichError>(())
/// ```
pub struct GeoDatabase {
    data: DatabaseStorage,
    header: MmdbHeader,
    /// First node of the IPv4 subtree (0 for IPv4 trees)
    ipv4_start: u32,
}

impl GeoDatabase {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| EnrichError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

        // SAFETY: the mapping is read-only and lives as long as the database.
        // Concurrent truncation of the file by another process is outside our
        // control, as for every mmap-based reader.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| EnrichError::Io(format!("Failed to mmap {}: {}", path.display(), e)))?;

        let db = Self::from_storage(DatabaseStorage::Mmap(mmap))?;
        tracing::info!(
            path = %path.display(),
            node_count = db.header.node_count,
            record_size = db.header.record_size.bits(),
            ip_version = ?db.header.ip_version,
            "opened geolocation database"
        );
        Ok(db)
    }

    /// Create database from an in-memory MMDB image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(DatabaseStorage::Owned(data))
    }

    /// Create database from raw search tree bytes and an explicit header
    ///
    /// No metadata section is required; `data` must start with the tree.
    pub fn from_tree(data: Vec<u8>, header: MmdbHeader) -> Self {
        Self::with_header(DatabaseStorage::Owned(data), header)
    }

    fn from_storage(storage: DatabaseStorage) -> Result<Self> {
        let header = MmdbHeader::from_file(storage.as_slice())?;
        Ok(Self::with_header(storage, header))
    }

    fn with_header(data: DatabaseStorage, header: MmdbHeader) -> Self {
        let ipv4_start = match header.ip_version {
            IpVersion::V4 => 0,
            IpVersion::V6 => SearchTree::new(data.as_slice(), &header).ipv4_start_node(),
        };
        Self {
            data,
            header,
            ipv4_start,
        }
    }

    /// Lookup header
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Search tree view over the database
    pub fn search_tree(&self) -> SearchTree<'_> {
        SearchTree::new(self.data.as_slice(), &self.header)
    }

    /// Parse `text` as an IP address and resolve it
    ///
    /// Only parsing can fail; an address without an entry is
    /// `LookupResult::NotFound`.
    pub fn resolve(&self, text: &str) -> Result<LookupResult> {
        Ok(self.resolve_ip(parse_address(text)?))
    }

    /// Resolve an IP address to a data section offset
    pub fn resolve_ip(&self, ip: IpAddr) -> LookupResult {
        let tree = self.search_tree();
        match ip {
            IpAddr::V4(addr) => tree.lookup_v4_from(self.ipv4_start, addr),
            IpAddr::V6(addr) => tree.lookup_v6(addr),
        }
    }

    /// The data section, starting just after the separator
    ///
    /// Empty when the buffer ends before the data section.
    pub fn data_section(&self) -> &[u8] {
        let data = self.data.as_slice();
        let start = self.header.data_section_start().min(data.len());
        &data[start..]
    }

    /// Full metadata map, decoded on demand
    pub fn metadata(&self) -> Option<DataValue> {
        MmdbMetadata::from_file(self.data.as_slice())
            .ok()?
            .as_value()
            .ok()
    }

    /// Whether the database is memory-mapped
    pub fn is_mmap(&self) -> bool {
        matches!(self.data, DatabaseStorage::Mmap(_))
    }

    /// Release the database
    pub fn close(self) {
        tracing::debug!(mmap = self.is_mmap(), "closing geolocation database");
    }
}

/// Parse IP address text, ignoring surrounding whitespace
pub fn parse_address(text: &str) -> Result<IpAddr> {
    let trimmed = text.trim();
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| EnrichError::Parse(trimmed.to_string()))
}
