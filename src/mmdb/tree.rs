//! MMDB Search Tree Traversal
//!
//! Walks the binary search tree one address bit at a time, most significant
//! bit first. Each step replaces the current node with one of its two child
//! records, which points to either:
//! - Another node (`record < node_count`, continue traversal)
//! - The "not found" marker (`record == node_count`)
//! - A data section entry (`record > node_count`)
//!
//! A walk never takes more steps than the address has bits, so it always
//! terminates, even over a corrupt or cyclic tree.

use super::format::MmdbHeader;
use super::node::NodeReader;
use super::types::{IpVersion, IPV4_SUBTREE_DEPTH};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Result of an IP lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// The address is not covered by any data record
    NotFound,
    /// The address resolved to a data record
    Found {
        /// Offset into the data section (relative to data section start)
        data_offset: u32,
        /// Network prefix length, in bits of the looked-up address family
        prefix_len: u8,
    },
}

impl LookupResult {
    /// True when the lookup reached a data record
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found { .. })
    }

    /// Data section offset, if found
    pub fn data_offset(&self) -> Option<u32> {
        match self {
            LookupResult::Found { data_offset, .. } => Some(*data_offset),
            LookupResult::NotFound => None,
        }
    }
}

/// Outcome of walking a run of address bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Stopped on a record value `>= node_count`
    Terminal { record: u32, depth: u32 },
    /// Consumed every bit while still on an interior node
    Interior { node: u32 },
}

/// Search tree for IP address lookups
pub struct SearchTree<'a> {
    reader: NodeReader<'a>,
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree over the raw file data
    ///
    /// Only the first `header.tree_size` bytes are visible to the node reader.
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        let tree = &data[..header.tree_size.min(data.len())];
        Self {
            reader: NodeReader::new(tree, header.record_size),
            header,
        }
    }

    /// Look up an IP address
    pub fn lookup(&self, ip: IpAddr) -> LookupResult {
        match ip {
            IpAddr::V4(addr) => self.lookup_v4(addr),
            IpAddr::V6(addr) => self.lookup_v6(addr),
        }
    }

    /// Look up an IPv4 address
    ///
    /// In an IPv6 tree the walk starts from the IPv4 subtree root, found by
    /// following 96 zero bits from the root.
    pub fn lookup_v4(&self, addr: Ipv4Addr) -> LookupResult {
        let start = match self.header.ip_version {
            IpVersion::V4 => 0,
            IpVersion::V6 => match self.ipv4_start() {
                Walk::Interior { node } => node,
                Walk::Terminal { record, .. } => return self.terminal(record, 0),
            },
        };

        match self.walk(start, u32::from(addr) as u128, 32) {
            Walk::Terminal { record, depth } => self.terminal(record, depth as u8),
            Walk::Interior { .. } => LookupResult::NotFound,
        }
    }

    /// Look up an IPv6 address
    ///
    /// An IPv4-only tree can only answer for IPv4-mapped addresses.
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> LookupResult {
        if self.header.ip_version == IpVersion::V4 {
            return match addr.to_ipv4_mapped() {
                Some(v4) => self.lookup_v4(v4),
                None => LookupResult::NotFound,
            };
        }

        match self.walk(0, u128::from(addr), 128) {
            Walk::Terminal { record, depth } => self.terminal(record, depth as u8),
            Walk::Interior { .. } => LookupResult::NotFound,
        }
    }

    /// Node at which IPv4 lookups begin inside an IPv6 tree
    ///
    /// Callers that look up many addresses should compute this once; see
    /// `GeoDatabase`, which caches it at open.
    pub fn ipv4_start_node(&self) -> u32 {
        match self.ipv4_start() {
            Walk::Interior { node } => node,
            Walk::Terminal { record, .. } => record,
        }
    }

    /// Look up an IPv4 address starting from a precomputed IPv4 start node
    pub fn lookup_v4_from(&self, start: u32, addr: Ipv4Addr) -> LookupResult {
        if start >= self.header.node_count {
            return self.terminal(start, 0);
        }
        match self.walk(start, u32::from(addr) as u128, 32) {
            Walk::Terminal { record, depth } => self.terminal(record, depth as u8),
            Walk::Interior { .. } => LookupResult::NotFound,
        }
    }

    fn ipv4_start(&self) -> Walk {
        self.walk(0, 0, IPV4_SUBTREE_DEPTH)
    }

    /// Follow the low `bit_count` bits of `bits`, most significant first
    fn walk(&self, start: u32, bits: u128, bit_count: u32) -> Walk {
        let node_count = self.header.node_count;
        let mut node = start;

        for i in 0..bit_count {
            if node >= node_count {
                return Walk::Terminal {
                    record: node,
                    depth: i,
                };
            }
            let offset = match self.reader.node_offset(node) {
                Some(offset) => offset,
                None => {
                    return Walk::Terminal {
                        record: node_count,
                        depth: i,
                    }
                }
            };
            let bit = ((bits >> (bit_count - 1 - i)) & 1) as u8;
            node = self.reader.read(offset, bit);
        }

        if node >= node_count {
            Walk::Terminal {
                record: node,
                depth: bit_count,
            }
        } else {
            Walk::Interior { node }
        }
    }

    /// Convert a terminal record into a lookup result
    ///
    /// Per the MMDB layout the data offset is
    /// `record - node_count - data_section_base`. A record pointing into the
    /// separator cannot address data and is reported as not found.
    fn terminal(&self, record: u32, prefix_len: u8) -> LookupResult {
        if record <= self.header.node_count {
            return LookupResult::NotFound;
        }

        match (record - self.header.node_count).checked_sub(self.header.data_section_base) {
            Some(data_offset) => LookupResult::Found {
                data_offset,
                prefix_len,
            },
            None => {
                tracing::debug!(
                    record,
                    node_count = self.header.node_count,
                    "search tree record points into the data section separator"
                );
                LookupResult::NotFound
            }
        }
    }
}
