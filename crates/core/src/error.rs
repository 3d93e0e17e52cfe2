use crate::store::{Collection, Revision};
use dispensary_types::TextError;
use dispensary_uuid::{DocumentId, UuidError};

/// Failures raised by a [`RecordStore`](crate::store::RecordStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read document: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write document: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize document: {0}")]
    Deserialization(serde_json::Error),
    #[error(
        "{collection} document {id} changed since it was read (expected revision {expected}, found {})",
        found.map(|r| r.to_string()).unwrap_or_else(|| "none".into())
    )]
    Conflict {
        collection: Collection,
        id: DocumentId,
        expected: Revision,
        found: Option<Revision>,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by dispensary operations.
///
/// Nothing is retried or swallowed on the way up: callers see exactly which of these happened.
#[derive(Debug, thiserror::Error)]
pub enum DispensaryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid input: {0}")]
    Text(#[from] TextError),
    #[error("invalid id: {0}")]
    Uuid(#[from] UuidError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dispensing device rejected the command: {0}")]
    DeviceRejected(String),
    #[error("dispensing device unreachable: {0}")]
    DeviceUnreachable(String),

    /// The device acknowledged a dispense but the record could not be updated.
    ///
    /// Medicine has physically left the device while the prescription is still recorded as
    /// active. Re-dispatching would dispense a second time.
    #[error(
        "device dispensed {quantity} unit(s) for prescription {prescription_id} of patient {patient_id} but the record was not updated: {source}"
    )]
    StoreWriteFailedAfterAcknowledgment {
        patient_id: DocumentId,
        prescription_id: DocumentId,
        quantity: u32,
        #[source]
        source: StoreError,
    },

    #[error("record store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DispensaryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => DispensaryError::Conflict(err.to_string()),
            other => DispensaryError::Store(other),
        }
    }
}

impl DispensaryError {
    pub(crate) fn patient_not_found(id: &DocumentId) -> Self {
        Self::NotFound {
            entity: "patient",
            id: id.to_string(),
        }
    }

    pub(crate) fn medicine_not_found(id: &DocumentId) -> Self {
        Self::NotFound {
            entity: "medicine",
            id: id.to_string(),
        }
    }
}

pub type DispensaryResult<T> = std::result::Result<T, DispensaryError>;
