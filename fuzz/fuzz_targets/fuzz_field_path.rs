#![no_main]
use geoenrich::{FieldPath, FieldWriter, Record};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (path, json) = text.split_once('\n').unwrap_or((text, "{}"));
    let Ok(path) = FieldPath::parse(path) else {
        return;
    };
    let Ok(Value::Object(mut record)) = serde_json::from_str::<Value>(json) else {
        return;
    };

    let writer = FieldWriter::with_prefix("src");
    let _ = writer.get(&record, &path);
    let before: Record = record.clone();
    if writer.set(&mut record, Value::from("v"), &path).is_ok() {
        // A second identical write changes nothing
        let after = record.clone();
        let _ = writer.set(&mut record, Value::from("v"), &path);
        assert_eq!(record, after);
    } else {
        assert_eq!(record, before);
    }
});
