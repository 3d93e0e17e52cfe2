//! Document record store.
//!
//! The store is deliberately dumb: it keeps whole JSON documents per collection, replaces them
//! wholesale, and lists them with an optional equality filter and sort key. The one thing it adds
//! over a plain key-value map is a per-document [`Revision`], which lets writers detect that a
//! document changed between their read and their write.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use dispensary_uuid::DocumentId;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// The collections the dispensary keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Medicines,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Medicines => "medicines",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic per-document version, starting at 1 when the document is added.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const INITIAL: Revision = Revision(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document together with its identity and revision.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub revision: Revision,
    pub body: Value,
}

/// Listing options: an optional `field == value` predicate and an optional sort field.
///
/// Without a sort field the order of results is unspecified.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentFilter {
    field_equals: Option<(String, Value)>,
    order_by: Option<String>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_equals = Some((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn matches(&self, body: &Value) -> bool {
        match &self.field_equals {
            Some((field, expected)) => body.get(field) == Some(expected),
            None => true,
        }
    }

    /// Filter and, when requested, sort a set of documents.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(&doc.body))
            .collect();

        if let Some(field) = &self.order_by {
            selected.sort_by(|a, b| compare_fields(a.body.get(field), b.body.get(field)));
        }
        selected
    }
}

// Missing fields sort first; mismatched types compare equal.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Whole-document persistence for the dispensary's collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one document, or `None` if it does not exist.
    async fn get_document(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> StoreResult<Option<Document>>;

    /// Store a new document under a freshly allocated id at [`Revision::INITIAL`].
    async fn add_document(&self, collection: Collection, body: Value) -> StoreResult<Document>;

    /// Replace a document wholesale and return its new revision.
    ///
    /// With `expected` set, the write only happens if the stored revision still equals it;
    /// otherwise `StoreError::Conflict` is returned and nothing is written. With `expected`
    /// unset the write is last-write-wins and creates the document if it is missing.
    async fn set_document(
        &self,
        collection: Collection,
        id: &DocumentId,
        body: Value,
        expected: Option<Revision>,
    ) -> StoreResult<Revision>;

    /// List the documents of a collection matching `filter`.
    async fn list_documents(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>>;
}
