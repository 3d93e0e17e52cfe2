use super::{Collection, Document, DocumentFilter, RecordStore, Revision};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dispensary_uuid::DocumentId;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store, used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(Collection, DocumentId), Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_document(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> StoreResult<Option<Document>> {
        Ok(self.documents.read().await.get(&(collection, *id)).cloned())
    }

    async fn add_document(&self, collection: Collection, body: Value) -> StoreResult<Document> {
        let doc = Document {
            id: DocumentId::new(),
            revision: Revision::INITIAL,
            body,
        };
        self.documents
            .write()
            .await
            .insert((collection, doc.id), doc.clone());
        Ok(doc)
    }

    async fn set_document(
        &self,
        collection: Collection,
        id: &DocumentId,
        body: Value,
        expected: Option<Revision>,
    ) -> StoreResult<Revision> {
        let mut documents = self.documents.write().await;
        let found = documents.get(&(collection, *id)).map(|d| d.revision);

        if let Some(expected) = expected {
            if found != Some(expected) {
                return Err(StoreError::Conflict {
                    collection,
                    id: *id,
                    expected,
                    found,
                });
            }
        }

        let revision = found.map_or(Revision::INITIAL, |r| r.next());
        documents.insert(
            (collection, *id),
            Document {
                id: *id,
                revision,
                body,
            },
        );
        Ok(revision)
    }

    async fn list_documents(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(filter.apply(
            documents
                .iter()
                .filter(|((c, _), _)| *c == collection)
                .map(|(_, doc)| doc.clone()),
        ))
    }
}
