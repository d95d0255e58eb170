//! Batch enrichment
//!
//! For every record in a batch: read the source field, parse it as an IP
//! address, resolve it, decode the data record and write each present
//! attribute back into the record.
//!
//! ```text
//! producer ─► [Job queue] ─► W workers ─► [JobResult queue] ─► caller
//!  (index, &mut record)                    (index, error)      outcomes[index]
//! ```
//!
//! Records are mutated in place by whichever worker receives them; the
//! exclusive borrow travels with the job so no record is ever touched by two
//! workers. Outcomes are placed by index, so the report is in input order no
//! matter which worker finishes first. A failing record is left as it is
//! (possibly partially enriched) and never stops the batch.

use crate::config::EnrichConfig;
use crate::database::GeoDatabase;
use crate::decoder::{Attribute, GeoInfo, MmdbRecordDecoder, RecordDecoder};
use crate::error::{EnrichError, Result};
use crate::field_path::{FieldPath, FieldWriter, Record};
use crate::mmdb::LookupResult;
use crate::stats::{BatchStats, EnricherStats};
use crossbeam_channel::bounded;
use serde_json::Value;
use std::any::Any;
use std::panic;
use std::sync::Mutex;
use std::thread;

/// Work item: one record, exclusively borrowed, tagged with its position
struct Job<'a> {
    index: usize,
    record: &'a mut Record,
}

/// Outcome of one job
struct JobResult {
    index: usize,
    error: Option<EnrichError>,
}

/// Result of one batch call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Aggregate counts and first error
    pub stats: BatchStats,
    /// Per-record failure, in input order
    pub errors: Vec<Option<EnrichError>>,
}

/// Concurrent IP geolocation enricher
///
/// # Example
///
/// ```no_run
/// use geoenrich::{BatchEnricher, EnrichConfig};
/// use serde_json::json;
///
/// let config = EnrichConfig::from_json(
///     r#"{"key": "client.ip", "data_path": "GeoLite2-City.mmdb"}"#,
/// )?;
/// let enricher = BatchEnricher::from_config(&config)?;
///
/// let mut batch = vec![
///     json!({"client": {"ip": "8.8.8.8"}}).as_object().cloned().unwrap(),
/// ];
/// let report = enricher.enrich(&mut batch);
/// println!("{} errors", report.stats.total_errors);
/// enricher.close();
/// # Ok::<(), geoenrich::EnrichError>(())
/// ```
pub struct BatchEnricher {
    db: GeoDatabase,
    decoder: Box<dyn RecordDecoder>,
    source: FieldPath,
    /// Destination of each attribute, indexed like `Attribute::ALL`
    targets: Vec<FieldPath>,
    writer: FieldWriter,
    workers: usize,
    miss_is_error: bool,
    totals: Mutex<EnricherStats>,
}

impl BatchEnricher {
    /// Open the configured database and build an enricher over it
    pub fn from_config(config: &EnrichConfig) -> Result<Self> {
        config.validate()?;
        let db = GeoDatabase::open(&config.data_path)?;
        Self::new(db, config)
    }

    /// Build an enricher using the standard MMDB record decoder
    pub fn new(db: GeoDatabase, config: &EnrichConfig) -> Result<Self> {
        Self::with_decoder(db, MmdbRecordDecoder::default(), config)
    }

    /// Build an enricher with a custom record decoder
    pub fn with_decoder<D>(db: GeoDatabase, decoder: D, config: &EnrichConfig) -> Result<Self>
    where
        D: RecordDecoder + 'static,
    {
        let source = config.source_path()?;
        let target = config.target_path()?;
        let targets = Attribute::ALL
            .iter()
            .map(|attr| FieldPath::join(&target, attr.key()))
            .collect();
        let writer = if config.key_as_prefix {
            FieldWriter::with_prefix(source.last())
        } else {
            FieldWriter::overwriting()
        };

        Ok(Self {
            db,
            decoder: Box::new(decoder),
            source,
            targets,
            writer,
            workers: config.worker_count(),
            miss_is_error: config.miss_is_error,
            totals: Mutex::new(EnricherStats::default()),
        })
    }

    /// Configured worker count
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Underlying database
    pub fn database(&self) -> &GeoDatabase {
        &self.db
    }

    /// Running totals over every batch processed so far
    pub fn stats(&self) -> EnricherStats {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Resolve and decode one address
    ///
    /// `Ok(None)` means the address is valid but has no entry.
    pub fn lookup(&self, text: &str) -> Result<Option<GeoInfo>> {
        match self.db.resolve(text)? {
            LookupResult::Found { data_offset, .. } => {
                self.decoder.decode(&self.db, data_offset).map(Some)
            }
            LookupResult::NotFound => Ok(None),
        }
    }

    /// Enrich a single record in place
    ///
    /// Every present attribute is attempted even if an earlier write failed;
    /// the first failure is returned.
    pub fn enrich_record(&self, record: &mut Record) -> Result<()> {
        let info = {
            let text = match self.writer.get(record, &self.source)? {
                Value::String(s) => s.as_str(),
                _ => return Err(EnrichError::NotString(self.source.to_string())),
            };
            match self.lookup(text)? {
                Some(info) => info,
                None if self.miss_is_error => {
                    return Err(EnrichError::LookupMiss(text.trim().to_string()))
                }
                None => return Ok(()),
            }
        };

        let mut first_error = None;
        for (attr, value) in info.attributes() {
            let path = &self.targets[attr as usize];
            if let Err(e) = self.writer.set(record, Value::String(value.to_string()), path) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Enrich one record, turning a panic into a record failure
    fn enrich_isolated(&self, record: &mut Record) -> Result<()> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| self.enrich_record(record))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(EnrichError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Enrich every record of a batch in parallel
    ///
    /// Uses `min(workers, records.len())` worker threads. Always processes
    /// the whole batch; per-record failures are reported, not raised.
    pub fn enrich(&self, records: &mut [Record]) -> BatchReport {
        let len = records.len();
        if len == 0 {
            return BatchReport::default();
        }

        let workers = self.workers.min(len);
        let mut errors: Vec<Option<EnrichError>> = vec![None; len];
        let (job_tx, job_rx) = bounded::<Job<'_>>(workers);
        let (result_tx, result_rx) = bounded::<JobResult>(workers);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for job in job_rx {
                        let error = self.enrich_isolated(job.record).err();
                        if let Some(e) = &error {
                            tracing::trace!(index = job.index, error = %e, "record not enriched");
                        }
                        let result = JobResult {
                            index: job.index,
                            error,
                        };
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            // The result channel disconnects once every worker has exited,
            // which happens after the producer drops the job sender.
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for (index, record) in records.iter_mut().enumerate() {
                    if job_tx.send(Job { index, record }).is_err() {
                        break;
                    }
                }
            });

            for result in result_rx {
                errors[result.index] = result.error;
            }
        });

        let stats = BatchStats::from_outcomes(&errors);
        tracing::debug!(
            records = len,
            workers,
            errors = stats.total_errors,
            "enriched batch"
        );
        if let Some(first) = &stats.first_error {
            tracing::warn!(
                errors = stats.total_errors,
                first_error = %first,
                "batch had records that could not be enriched"
            );
        }

        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .add(&stats);

        BatchReport { stats, errors }
    }

    /// Release the database
    pub fn close(self) {
        self.db.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
