#![no_main]
use geoenrich::DataDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Pointer cycles and truncated values must surface as errors
    let decoder = DataDecoder::new(data);
    for offset in 0..data.len().min(16) {
        let _ = decoder.decode(offset as u32);
    }
});
