//! Shared fixtures for unit tests.

use crate::error::{StoreError, StoreResult};
use crate::models::{MedicineDetails, NewPatient};
use crate::store::{Collection, Document, DocumentFilter, MemoryStore, RecordStore, Revision};
use async_trait::async_trait;
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) fn text(s: &str) -> NonEmptyText {
    NonEmptyText::new(s).unwrap()
}

pub(crate) fn new_patient(name: &str) -> NewPatient {
    NewPatient {
        name: text(name),
        age: 52,
        height: 168.0,
        weight: 71.5,
        blood_pressure: "130/85".into(),
        temperature: 37.1,
    }
}

pub(crate) fn medicine(name: &str, dosage: &str) -> MedicineDetails {
    MedicineDetails {
        name: text(name),
        description: String::new(),
        dosage: text(dosage),
        frequency: text("Every 6 hours"),
    }
}

/// In-memory store that counts writes and can be told to fail them.
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    injected_conflicts: AtomicUsize,
}

impl CountingStore {
    /// Number of `set_document` calls seen so far, failed ones included.
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` guarded writes report a conflict without writing.
    pub(crate) fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn get_document(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> StoreResult<Option<Document>> {
        self.inner.get_document(collection, id).await
    }

    async fn add_document(&self, collection: Collection, body: Value) -> StoreResult<Document> {
        self.inner.add_document(collection, body).await
    }

    async fn set_document(
        &self,
        collection: Collection,
        id: &DocumentId,
        body: Value,
        expected: Option<Revision>,
    ) -> StoreResult<Revision> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::FileWrite(io::Error::new(
                io::ErrorKind::Other,
                "disk full",
            )));
        }
        if let Some(expected) = expected {
            let injected = self
                .injected_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StoreError::Conflict {
                    collection,
                    id: *id,
                    expected,
                    found: Some(expected.next()),
                });
            }
        }
        self.inner.set_document(collection, id, body, expected).await
    }

    async fn list_documents(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        self.inner.list_documents(collection, filter).await
    }
}
