//! Typed repositories over the untyped [`RecordStore`](crate::store::RecordStore).
//!
//! Repositories translate between domain records and stored JSON documents and carry each
//! document's revision alongside the record, so that a later write can be guarded against
//! concurrent modification.

pub mod medicines;
pub mod patients;

use crate::error::{StoreError, StoreResult};
use crate::store::{Document, Revision};
use dispensary_uuid::DocumentId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use medicines::MedicineRepository;
pub use patients::PatientRepository;

/// A record as read from the store, with the revision it was read at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub id: DocumentId,
    pub revision: Revision,
    #[serde(flatten)]
    pub data: T,
}

impl<T: DeserializeOwned> Versioned<T> {
    pub(crate) fn decode(doc: Document) -> StoreResult<Self> {
        Ok(Self {
            id: doc.id,
            revision: doc.revision,
            data: serde_json::from_value(doc.body).map_err(StoreError::Deserialization)?,
        })
    }
}

pub(crate) fn encode<T: Serialize>(data: &T) -> StoreResult<Value> {
    serde_json::to_value(data).map_err(StoreError::Serialization)
}

/// Decode every document, logging and skipping the ones that no longer parse.
pub(crate) fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Vec<Versioned<T>> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id;
            match Versioned::decode(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "skipping undecodable document");
                    None
                }
            }
        })
        .collect()
}
