//! End-to-end enrichment tests
//!
//! Batches of JSON records are enriched against fixture databases written to
//! temporary files and opened through `EnrichConfig`.

mod common;

use common::world_fixture;
use geoenrich::{
    BatchEnricher, EnrichConfig, EnrichError, GeoDatabase, IpVersion, Record, RecordSize,
};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn enricher_with(config: EnrichConfig) -> BatchEnricher {
    let db = GeoDatabase::from_bytes(world_fixture(IpVersion::V6, RecordSize::Bits28).build())
        .unwrap();
    BatchEnricher::new(db, &config).unwrap()
}

fn mixed_batch(len: usize) -> Vec<Record> {
    (0..len)
        .map(|i| match i % 5 {
            0 => record(json!({"id": i, "ip": format!("8.8.8.{}", i % 256)})),
            1 => record(json!({"id": i, "ip": "1.1.1.1"})),
            2 => record(json!({"id": i, "ip": "10.0.0.1"})),
            3 => record(json!({"id": i, "ip": "garbage"})),
            _ => record(json!({"id": i, "ip": "2001:db8::7"})),
        })
        .collect()
}

#[test]
fn test_enrich_from_config_file() {
    let file = world_fixture(IpVersion::V4, RecordSize::Bits24).write_temp();
    let config = EnrichConfig::from_json(&format!(
        r#"{{"key": "client.ip", "data_path": {:?}, "parallelism": 2}}"#,
        file.path().to_str().unwrap()
    ))
    .unwrap();
    let enricher = BatchEnricher::from_config(&config).unwrap();
    assert_eq!(enricher.workers(), 2);
    assert!(enricher.database().is_mmap());

    let mut batch = vec![
        record(json!({"client": {"ip": "8.8.8.8"}})),
        record(json!({"client": {"ip": "1.1.1.1"}})),
    ];
    let report = enricher.enrich(&mut batch);
    assert_eq!(report.stats.total_errors, 0);

    assert_eq!(
        Value::Object(batch[0].clone()),
        json!({"client": {
            "ip": "8.8.8.8",
            "City": "Mountain View",
            "Country": "United States",
            "CountryCode": "US",
            "Latitude": "37.386",
            "Longitude": "-122.0838",
        }})
    );
    assert_eq!(
        Value::Object(batch[1].clone()),
        json!({"client": {
            "ip": "1.1.1.1",
            "Region": "Queensland",
            "City": "Brisbane",
            "Country": "Australia",
            "Isp": "Cloudflare",
            "CountryCode": "AU",
        }})
    );
    enricher.close();
}

#[test]
fn test_from_config_missing_database() {
    let config = EnrichConfig {
        data_path: "/nonexistent/geo.mmdb".into(),
        ..EnrichConfig::new("ip")
    };
    assert!(matches!(
        BatchEnricher::from_config(&config),
        Err(EnrichError::Io(_))
    ));
}

#[test]
fn test_results_independent_of_worker_count() {
    let len = 103;
    let mut reference: Option<(Vec<Record>, Vec<Option<EnrichError>>)> = None;

    for workers in [1, 4, len, len * 2] {
        let enricher = enricher_with(EnrichConfig {
            parallelism: Some(workers),
            ..EnrichConfig::new("ip")
        });
        let mut batch = mixed_batch(len);
        let report = enricher.enrich(&mut batch);

        assert_eq!(report.stats.total_processed, len);
        assert_eq!(report.errors.len(), len);
        for (i, r) in batch.iter().enumerate() {
            assert_eq!(r["id"], json!(i), "record order changed with {} workers", workers);
        }

        match &reference {
            None => reference = Some((batch, report.errors)),
            Some((records, errors)) => {
                assert_eq!(&batch, records, "records differ with {} workers", workers);
                assert_eq!(&report.errors, errors, "errors differ with {} workers", workers);
            }
        }
    }
}

#[test]
fn test_batch_error_accounting() {
    let enricher = enricher_with(EnrichConfig {
        parallelism: Some(4),
        ..EnrichConfig::new("ip")
    });
    let mut batch = mixed_batch(10);
    let report = enricher.enrich(&mut batch);

    // Indexes 2, 7 miss; 3, 8 fail to parse
    assert_eq!(report.stats.total_errors, 4);
    assert_eq!(report.stats.successes(), 6);
    assert_eq!(
        report.stats.first_error,
        Some(EnrichError::LookupMiss("10.0.0.1".to_string()))
    );
    assert_eq!(
        report.errors[3],
        Some(EnrichError::Parse("garbage".to_string()))
    );
    assert_eq!(batch[3], record(json!({"id": 3, "ip": "garbage"})));
    assert_eq!(batch[4]["Country"], json!("Documentation"));

    enricher.enrich(&mut mixed_batch(5));
    let totals = enricher.stats();
    assert_eq!(totals.errors, 6);
    assert_eq!(totals.success, 9);
    assert_eq!(
        totals.last_error.as_deref(),
        Some(EnrichError::LookupMiss("10.0.0.1".to_string()).to_string().as_str())
    );
}

#[test]
fn test_collision_goes_to_prefixed_key() {
    let enricher = enricher_with(EnrichConfig::new("host"));
    let mut batch = vec![record(json!({"host": "8.8.8.8", "City": "X"}))];
    let report = enricher.enrich(&mut batch);

    assert!(report.errors[0].is_none());
    assert_eq!(batch[0]["City"], json!("X"));
    assert_eq!(batch[0]["host_City"], json!("Mountain View"));
    assert_eq!(batch[0]["Country"], json!("United States"));
}

#[test]
fn test_collision_overwrites_without_prefixing() {
    let enricher = enricher_with(EnrichConfig {
        key_as_prefix: false,
        ..EnrichConfig::new("host")
    });
    let mut batch = vec![record(json!({"host": "8.8.8.8", "City": "X"}))];
    enricher.enrich(&mut batch);

    assert_eq!(batch[0]["City"], json!("Mountain View"));
    assert!(batch[0].get("host_City").is_none());
}

#[test]
fn test_enriching_twice_is_stable() {
    let enricher = enricher_with(EnrichConfig::new("ip"));
    let mut once = mixed_batch(20);
    enricher.enrich(&mut once);

    let mut twice = once.clone();
    enricher.enrich(&mut twice);
    assert_eq!(once, twice);
}

#[test]
fn test_target_and_wrong_shape() {
    let enricher = enricher_with(EnrichConfig {
        target: Some("geo.ip".to_string()),
        ..EnrichConfig::new("src")
    });
    let mut batch = vec![
        record(json!({"src": "1.1.1.1"})),
        record(json!({"src": "1.1.1.1", "geo": [1, 2]})),
        record(json!({"src": 7})),
    ];
    let report = enricher.enrich(&mut batch);

    assert_eq!(batch[0]["geo"]["ip"]["City"], json!("Brisbane"));
    assert_eq!(
        report.errors[1],
        Some(EnrichError::WrongShape("geo".to_string()))
    );
    assert_eq!(batch[1]["geo"], json!([1, 2]));
    assert_eq!(
        report.errors[2],
        Some(EnrichError::NotString("src".to_string()))
    );
    assert_eq!(report.stats.total_errors, 2);
}

#[test]
fn test_misses_can_be_ignored() {
    let enricher = enricher_with(EnrichConfig {
        miss_is_error: false,
        ..EnrichConfig::new("ip")
    });
    let mut batch = vec![record(json!({"ip": "10.0.0.1"}))];
    let report = enricher.enrich(&mut batch);
    assert_eq!(report.stats.total_errors, 0);
    assert_eq!(batch[0], record(json!({"ip": "10.0.0.1"})));
}
