//! Service record port - preloaded outbound call data.
//!
//! For outbound confirmation calls the initial identity and service fields
//! come from an externally maintained record set keyed by phone number.
//! The core consumes a flat field mapping and writes the call outcome back;
//! file formats and backup strategies are the collaborator's business.

use async_trait::async_trait;

use crate::domain::conversation::{ConfirmationStatus, ServiceRecordSeed};

/// Port for the outbound service-record source.
#[async_trait]
pub trait ServiceRecordSource: Send + Sync {
    /// Looks up the pending service record for a phone number.
    ///
    /// A missing record is a caller-visible failure
    /// ([`RecordError::NotFound`]), not an internally recovered condition.
    async fn find_by_phone(&self, phone: &str) -> Result<ServiceRecordSeed, RecordError>;

    /// Writes the call outcome back to the record.
    async fn update_outcome(
        &self,
        record_row: usize,
        status: ConfirmationStatus,
        observations: &str,
    ) -> Result<(), RecordError>;
}

/// Service record errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("no pending service record for phone {phone}")]
    NotFound { phone: String },

    #[error("record source error: {0}")]
    Backend(String),
}
