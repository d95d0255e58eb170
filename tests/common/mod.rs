//! MMDB fixture writer shared by the integration tests
//!
//! Produces real MMDB images: search tree, separator, data section and
//! metadata, so tests exercise the same code paths as a production database.

#![allow(dead_code)]

use geoenrich::{IpVersion, RecordSize};
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Data section value
#[derive(Debug, Clone)]
pub enum Val {
    Str(String),
    Double(f64),
    U32(u32),
    Map(Vec<(String, Val)>),
    Array(Vec<Val>),
}

pub fn s(v: &str) -> Val {
    Val::Str(v.to_string())
}

pub fn map(entries: Vec<(&str, Val)>) -> Val {
    Val::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn control(out: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_num <= 7 {
        out.push((type_num << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_num - 7);
    }
    out.extend_from_slice(&extra);
}

pub fn encode(value: &Val, out: &mut Vec<u8>) {
    match value {
        Val::Str(v) => {
            control(out, 2, v.len());
            out.extend_from_slice(v.as_bytes());
        }
        Val::Double(v) => {
            control(out, 3, 8);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Val::U32(v) => {
            let bytes = v.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            control(out, 6, 4 - skip);
            out.extend_from_slice(&bytes[skip..]);
        }
        Val::Map(entries) => {
            control(out, 7, entries.len());
            for (k, v) in entries {
                encode(&Val::Str(k.clone()), out);
                encode(v, out);
            }
        }
        Val::Array(items) => {
            control(out, 11, items.len());
            for item in items {
                encode(item, out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Empty,
    Node(u32),
    Data(usize),
}

/// Builds an MMDB image from networks and their records
pub struct MmdbFixture {
    ip_version: IpVersion,
    record_size: RecordSize,
    nodes: Vec<[Slot; 2]>,
    records: Vec<Val>,
}

impl MmdbFixture {
    pub fn new(ip_version: IpVersion, record_size: RecordSize) -> Self {
        Self {
            ip_version,
            record_size,
            nodes: vec![[Slot::Empty; 2]],
            records: Vec::new(),
        }
    }

    /// Insert `cidr` (e.g. "8.8.8.0/24"). IPv4 networks in an IPv6 tree go
    /// under the `::/96` subtree.
    pub fn insert(&mut self, cidr: &str, record: Val) -> &mut Self {
        let (addr, len) = cidr.split_once('/').unwrap_or((cidr, ""));
        let ip: IpAddr = addr.parse().unwrap();
        let (bits, width, mut prefix_len): (u128, u32, u32) = match (ip, self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => (u32::from(v4) as u128, 32, 32),
            (IpAddr::V4(v4), IpVersion::V6) => (u32::from(v4) as u128, 128, 32),
            (IpAddr::V6(v6), IpVersion::V6) => (u128::from(v6), 128, 128),
            (IpAddr::V6(_), IpVersion::V4) => panic!("IPv6 network in IPv4 fixture"),
        };
        if !len.is_empty() {
            prefix_len = len.parse().unwrap();
        }
        if matches!((ip, self.ip_version), (IpAddr::V4(_), IpVersion::V6)) {
            prefix_len += 96;
        }
        assert!(prefix_len >= 1);

        let data = self.records.len();
        self.records.push(record);

        let mut node = 0usize;
        for depth in 0..prefix_len {
            let bit = ((bits >> (width - 1 - depth)) & 1) as usize;
            if depth + 1 == prefix_len {
                self.nodes[node][bit] = Slot::Data(data);
                break;
            }
            node = match self.nodes[node][bit] {
                Slot::Node(next) => next as usize,
                _ => {
                    self.nodes.push([Slot::Empty; 2]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Slot::Node(next as u32);
                    next
                }
            };
        }
        self
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Serialize the whole image
    pub fn build(&self) -> Vec<u8> {
        let mut data_section = Vec::new();
        let mut offsets = Vec::with_capacity(self.records.len());
        for record in &self.records {
            offsets.push(data_section.len() as u32);
            encode(record, &mut data_section);
        }

        let node_count = self.node_count();
        let value = |slot: Slot| match slot {
            Slot::Empty => node_count,
            Slot::Node(n) => n,
            Slot::Data(i) => node_count + 16 + offsets[i],
        };

        let mut out = Vec::new();
        for [left, right] in &self.nodes {
            write_node(&mut out, self.record_size, value(*left), value(*right));
        }
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&data_section);
        out.extend_from_slice(METADATA_MARKER);

        let ip_version = match self.ip_version {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        };
        let metadata = map(vec![
            ("node_count", Val::U32(node_count)),
            ("record_size", Val::U32(self.record_size.bits())),
            ("ip_version", Val::U32(ip_version)),
            ("database_type", s("GeoEnrich-Test")),
            ("languages", Val::Array(vec![s("en"), s("zh-CN")])),
        ]);
        encode(&metadata, &mut out);
        out
    }

    /// Write the image to a temporary file
    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}

pub fn write_node(out: &mut Vec<u8>, record_size: RecordSize, left: u32, right: u32) {
    match record_size {
        RecordSize::Bits24 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits28 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits32 => {
            out.extend_from_slice(&left.to_be_bytes());
            out.extend_from_slice(&right.to_be_bytes());
        }
    }
}

/// GeoIP2-style city record
pub fn city_record(city: &str, country: &str, iso: &str, lat: f64, lon: f64) -> Val {
    map(vec![
        ("city", map(vec![("names", map(vec![("en", s(city))]))])),
        (
            "country",
            map(vec![
                ("iso_code", s(iso)),
                ("names", map(vec![("en", s(country))])),
            ]),
        ),
        (
            "location",
            map(vec![
                ("latitude", Val::Double(lat)),
                ("longitude", Val::Double(lon)),
            ]),
        ),
    ])
}

/// The fixture most tests share
pub fn world_fixture(ip_version: IpVersion, record_size: RecordSize) -> MmdbFixture {
    let mut fixture = MmdbFixture::new(ip_version, record_size);
    fixture
        .insert(
            "8.8.8.0/24",
            city_record("Mountain View", "United States", "US", 37.386, -122.0838),
        )
        .insert(
            "1.1.1.0/24",
            map(vec![
                ("country", s("Australia")),
                ("region", s("Queensland")),
                ("city", s("Brisbane")),
                ("isp", s("Cloudflare")),
                ("country_code", s("AU")),
            ]),
        );
    if ip_version == IpVersion::V6 {
        fixture.insert(
            "2001:db8::/32",
            map(vec![("country", s("Documentation")), ("country_code", s("ZZ"))]),
        );
    }
    fixture
}
