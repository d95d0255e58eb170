#![no_main]
use geoenrich::mmdb::SearchTree;
use geoenrich::{IpVersion, MmdbHeader, RecordSize};
use libfuzzer_sys::fuzz_target;
use std::net::{Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    if data.len() < 22 {
        return;
    }

    // First bytes choose the layout and address, the rest is the tree
    let record_size = match data[0] % 3 {
        0 => RecordSize::Bits24,
        1 => RecordSize::Bits28,
        _ => RecordSize::Bits32,
    };
    let ip_version = if data[1] & 1 == 0 { IpVersion::V4 } else { IpVersion::V6 };
    let node_count = u32::from_be_bytes([0, 0, data[2], data[3]]);
    let mut v6 = [0u8; 16];
    v6.copy_from_slice(&data[4..20]);
    let tree = &data[20..];

    let header = MmdbHeader::new(node_count, record_size, ip_version);
    let search = SearchTree::new(tree, &header);
    let v4 = Ipv4Addr::new(v6[0], v6[1], v6[2], v6[3]);

    let a = search.lookup_v4(v4);
    assert_eq!(a, search.lookup_v4(v4));
    let start = search.ipv4_start_node();
    let _ = search.lookup_v4_from(start, v4);
    let _ = search.lookup_v6(Ipv6Addr::from(v6));
});
