//! In-memory service record source.
//!
//! Holds the outbound call roster in memory, seeded at startup. The
//! production roster lives in an externally maintained sheet; this adapter
//! carries the same contract for tests and local runs, including outcome
//! write-back.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::domain::conversation::{ConfirmationStatus, ServiceRecordSeed};
use crate::ports::{RecordError, ServiceRecordSource};

/// One roster row with its current outcome.
#[derive(Debug, Clone)]
struct StoredRecord {
    seed: ServiceRecordSeed,
    status: ConfirmationStatus,
    observations: String,
}

/// In-memory implementation of [`ServiceRecordSource`].
#[derive(Debug, Default)]
pub struct InMemoryRecordSource {
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the roster. Row handles are assigned by position.
    pub fn with_records(seeds: Vec<ServiceRecordSeed>) -> Self {
        let records = seeds
            .into_iter()
            .enumerate()
            .map(|(row, mut seed)| {
                seed.record_row = Some(row);
                StoredRecord {
                    seed,
                    status: ConfirmationStatus::Pendiente,
                    observations: String::new(),
                }
            })
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Current outcome of a row, for assertions and reporting.
    pub fn outcome(&self, record_row: usize) -> Option<(ConfirmationStatus, String)> {
        self.records
            .read()
            .ok()?
            .get(record_row)
            .map(|r| (r.status, r.observations.clone()))
    }
}

#[async_trait]
impl ServiceRecordSource for InMemoryRecordSource {
    async fn find_by_phone(&self, phone: &str) -> Result<ServiceRecordSeed, RecordError> {
        let records = self
            .records
            .read()
            .map_err(|e| RecordError::Backend(e.to_string()))?;
        records
            .iter()
            .find(|r| r.seed.phone == phone)
            .map(|r| r.seed.clone())
            .ok_or_else(|| RecordError::NotFound {
                phone: phone.to_string(),
            })
    }

    async fn update_outcome(
        &self,
        record_row: usize,
        status: ConfirmationStatus,
        observations: &str,
    ) -> Result<(), RecordError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RecordError::Backend(e.to_string()))?;
        let record = records
            .get_mut(record_row)
            .ok_or_else(|| RecordError::Backend(format!("no record at row {}", record_row)))?;
        record.status = status;
        record.observations = observations.to_string();
        Ok(())
    }
}
