#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Garbage images must be rejected or answer lookups, never panic
    if let Ok(db) = geoenrich::GeoDatabase::from_bytes(data.to_vec()) {
        let _ = db.resolve("1.2.3.4");
        let _ = db.resolve("2001:db8::1");
        let _ = db.metadata();
    }
});
