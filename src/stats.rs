//! Enrichment statistics

use crate::error::EnrichError;

/// Summary of one batch call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Records in the batch
    pub total_processed: usize,
    /// Records with at least one failure
    pub total_errors: usize,
    /// Failure of the lowest-index failing record
    pub first_error: Option<EnrichError>,
}

impl BatchStats {
    /// Build from per-record outcomes in input order
    pub fn from_outcomes(outcomes: &[Option<EnrichError>]) -> Self {
        Self {
            total_processed: outcomes.len(),
            total_errors: outcomes.iter().filter(|o| o.is_some()).count(),
            first_error: outcomes.iter().flatten().next().cloned(),
        }
    }

    /// Records processed without failure
    pub fn successes(&self) -> usize {
        self.total_processed - self.total_errors
    }
}

/// Running totals across batch calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnricherStats {
    /// Failed records
    pub errors: u64,
    /// Successful records
    pub success: u64,
    /// Most recent batch's first error, kept until a later batch fails
    pub last_error: Option<String>,
}

impl EnricherStats {
    /// Add one batch to the totals
    pub fn add(&mut self, batch: &BatchStats) {
        self.errors += batch.total_errors as u64;
        self.success += batch.successes() as u64;
        if let Some(err) = &batch.first_error {
            self.last_error = Some(err.to_string());
        }
    }
}
