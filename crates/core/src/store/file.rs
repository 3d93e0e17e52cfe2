//! File-backed record store.
//!
//! Documents are stored as JSON files in a sharded directory tree:
//!
//! ```text
//! <root>/
//!   patients/
//!     <s1>/
//!       <s2>/
//!         <id>/
//!           document.json    # {"revision": n, "body": {...}}
//!   medicines/
//!     ...
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the document id.
//!
//! Writes go to a temporary file that is renamed over the previous version, so readers never
//! observe a half-written document. Revision checks and the write that follows them run under one
//! async mutex, which makes the compare-and-set atomic for every writer sharing this `FileStore`.
//! Separate processes pointing at the same directory are not coordinated.

use super::{Collection, Document, DocumentFilter, RecordStore, Revision};
use crate::constants::DOCUMENT_FILENAME;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dispensary_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Serialize, Deserialize)]
struct StoredDocument {
    revision: Revision,
    body: Value,
}

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn document_path(&self, collection: Collection, id: &DocumentId) -> PathBuf {
        id.sharded_dir(&self.collection_dir(collection))
            .join(DOCUMENT_FILENAME)
    }

    async fn read_stored(path: &Path) -> StoreResult<Option<StoredDocument>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::FileRead(e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(StoreError::Deserialization)
    }

    async fn write_stored(path: &Path, stored: &StoredDocument) -> StoreResult<()> {
        let raw = serde_json::to_vec_pretty(stored).map_err(StoreError::Serialization)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(StoreError::FileWrite)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await.map_err(StoreError::FileWrite)?;
        fs::rename(&tmp, path).await.map_err(StoreError::FileWrite)
    }

    /// Collect `(id, path)` for every document file under a collection directory.
    ///
    /// Entries whose directory name is not a canonical id are skipped.
    async fn document_files(collection_dir: &Path) -> Vec<(DocumentId, PathBuf)> {
        let mut found = Vec::new();

        let mut s1_iter = match fs::read_dir(collection_dir).await {
            Ok(it) => it,
            Err(_) => return found,
        };
        while let Ok(Some(s1)) = s1_iter.next_entry().await {
            let mut s2_iter = match fs::read_dir(s1.path()).await {
                Ok(it) => it,
                Err(_) => continue,
            };
            while let Ok(Some(s2)) = s2_iter.next_entry().await {
                let mut id_iter = match fs::read_dir(s2.path()).await {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                while let Ok(Some(id_ent)) = id_iter.next_entry().await {
                    let id_path = id_ent.path();
                    let Some(id) = id_path
                        .file_name()
                        .and_then(|os| os.to_str())
                        .and_then(|name| DocumentId::parse(name).ok())
                    else {
                        continue;
                    };
                    let doc_path = id_path.join(DOCUMENT_FILENAME);
                    if fs::metadata(&doc_path).await.is_ok_and(|meta| meta.is_file()) {
                        found.push((id, doc_path));
                    }
                }
            }
        }

        found
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get_document(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> StoreResult<Option<Document>> {
        let path = self.document_path(collection, id);
        Ok(Self::read_stored(&path).await?.map(|stored| Document {
            id: *id,
            revision: stored.revision,
            body: stored.body,
        }))
    }

    async fn add_document(&self, collection: Collection, body: Value) -> StoreResult<Document> {
        let _guard = self.write_lock.lock().await;

        let id = DocumentId::new();
        let stored = StoredDocument {
            revision: Revision::INITIAL,
            body,
        };
        Self::write_stored(&self.document_path(collection, &id), &stored).await?;

        Ok(Document {
            id,
            revision: stored.revision,
            body: stored.body,
        })
    }

    async fn set_document(
        &self,
        collection: Collection,
        id: &DocumentId,
        body: Value,
        expected: Option<Revision>,
    ) -> StoreResult<Revision> {
        let _guard = self.write_lock.lock().await;

        let path = self.document_path(collection, id);
        let found = Self::read_stored(&path).await?.map(|s| s.revision);

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
        Self::write_stored(&path, &StoredDocument { revision, body }).await?;
        Ok(revision)
    }

    async fn list_documents(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();

        for (id, path) in Self::document_files(&self.collection_dir(collection)).await {
            match Self::read_stored(&path).await {
                Ok(Some(stored)) => documents.push(Document {
                    id,
                    revision: stored.revision,
                    body: stored.body,
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
                }
            }
        }

        Ok(filter.apply(documents))
    }
}
