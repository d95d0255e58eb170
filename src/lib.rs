//! Geoenrich - IP Geolocation Enrichment for Record Batches
//!
//! Geoenrich reads a MaxMind DB (MMDB) file, resolves IP address text to
//! geolocation attributes and writes them back into batches of JSON-like
//! records, using a bounded pool of worker threads.
//!
//! # Quick Start
//!
//! ```no_run
//! use geoenrich::{BatchEnricher, EnrichConfig};
//! use serde_json::json;
//!
//! let config = EnrichConfig::from_json(r#"{
//!     "key": "request.client_ip",
//!     "data_path": "GeoLite2-City.mmdb",
//!     "parallelism": 4
//! }"#)?;
//! let enricher = BatchEnricher::from_config(&config)?;
//!
//! let mut batch: Vec<geoenrich::Record> = vec![
//!     json!({"request": {"client_ip": "8.8.8.8"}}).as_object().cloned().unwrap(),
//!     json!({"request": {"client_ip": "not an ip"}}).as_object().cloned().unwrap(),
//! ];
//! let report = enricher.enrich(&mut batch);
//!
//! // {"request": {"client_ip": "8.8.8.8", "Country": "...", "City": "...", ...}}
//! println!("{}", serde_json::Value::Object(batch[0].clone()));
//! assert_eq!(report.stats.total_processed, 2);
//! # Ok::<(), geoenrich::EnrichError>(())
//! ```
//!
//! # Lookup Only
//!
//! ```no_run
//! use geoenrich::{GeoDatabase, LookupResult};
//!
//! let db = GeoDatabase::open("GeoLite2-City.mmdb")?;
//! match db.resolve("2001:4860:4860::8888")? {
//!     LookupResult::Found { data_offset, prefix_len } => {
//!         println!("offset {} for /{}", data_offset, prefix_len)
//!     }
//!     LookupResult::NotFound => println!("no entry"),
//! }
//! # Ok::<(), geoenrich::EnrichError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. Search Tree (binary trie)        │  mmdb::{node, tree}
//! │  2. 16-byte separator                │
//! │  3. Data Section                     │  data_section, decoder
//! │  4. Metadata                         │  mmdb::format
//! └──────────────────────────────────────┘
//!          ↓ mmap, shared read-only
//! ┌──────────────────────────────────────┐
//! │  BatchEnricher                       │  enricher
//! │  producer → W workers → collector    │
//! │  FieldPath get / FieldWriter set     │  field_path
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data_section;
pub mod database;
pub mod decoder;
pub mod enricher;
pub mod error;
pub mod field_path;
pub mod mmdb;
pub mod stats;

pub use crate::config::{default_parallelism, EnrichConfig};
pub use crate::data_section::{DataDecoder, DataValue};
pub use crate::database::{parse_address, GeoDatabase};
pub use crate::decoder::{Attribute, GeoInfo, MmdbRecordDecoder, RecordDecoder};
pub use crate::enricher::{BatchEnricher, BatchReport};
pub use crate::error::{EnrichError, Result};
pub use crate::field_path::{FieldPath, FieldWriter, Record};
pub use crate::mmdb::{IpVersion, LookupResult, MmdbError, MmdbHeader, RecordSize};
pub use crate::stats::{BatchStats, EnricherStats};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
