use super::{decode_all, encode, Versioned};
use crate::error::{DispensaryError, DispensaryResult, StoreResult};
use crate::models::{NewPatient, Patient};
use crate::store::{Collection, DocumentFilter, RecordStore};
use chrono::Utc;
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;
use std::sync::Arc;

/// Patient documents, including their embedded prescriptions.
#[derive(Clone)]
pub struct PatientRepository {
    store: Arc<dyn RecordStore>,
}

impl PatientRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Registers a new patient with an empty prescription list.
    pub async fn create(
        &self,
        new: NewPatient,
        created_by: NonEmptyText,
    ) -> DispensaryResult<Versioned<Patient>> {
        new.validate()?;
        let patient = Patient::register(new, created_by, Utc::now());
        let doc = self
            .store
            .add_document(Collection::Patients, encode(&patient)?)
            .await?;

        tracing::info!(patient_id = %doc.id, "patient registered");
        Ok(Versioned {
            id: doc.id,
            revision: doc.revision,
            data: patient,
        })
    }

    /// Loads the full patient document.
    ///
    /// # Errors
    ///
    /// `DispensaryError::NotFound` if no such patient exists.
    pub async fn get(&self, id: &DocumentId) -> DispensaryResult<Versioned<Patient>> {
        self.fetch(id)
            .await?
            .ok_or_else(|| DispensaryError::patient_not_found(id))
    }

    pub(crate) async fn fetch(&self, id: &DocumentId) -> StoreResult<Option<Versioned<Patient>>> {
        self.store
            .get_document(Collection::Patients, id)
            .await?
            .map(Versioned::decode)
            .transpose()
    }

    /// Lists patients, optionally only those registered by one staff member.
    ///
    /// Documents that fail to decode are logged and skipped.
    pub async fn list(
        &self,
        created_by: Option<&NonEmptyText>,
    ) -> DispensaryResult<Vec<Versioned<Patient>>> {
        let filter = match created_by {
            Some(staff) => DocumentFilter::all().where_eq("created_by", staff.as_str()),
            None => DocumentFilter::all(),
        };
        let docs = self
            .store
            .list_documents(Collection::Patients, &filter.order_by("name"))
            .await?;
        Ok(decode_all(docs))
    }

    /// Replaces the stored document with `patient`, provided nobody wrote it since it was read.
    ///
    /// Returns the record at its new revision. A concurrent write surfaces as
    /// `StoreError::Conflict` and leaves the stored document untouched.
    pub async fn commit(&self, patient: Versioned<Patient>) -> StoreResult<Versioned<Patient>> {
        let revision = self
            .store
            .set_document(
                Collection::Patients,
                &patient.id,
                encode(&patient.data)?,
                Some(patient.revision),
            )
            .await?;
        Ok(Versioned {
            revision,
            ..patient
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, Revision};

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            name: text(name),
            age: 52,
            height: 168.0,
            weight: 71.5,
            blood_pressure: "130/85".into(),
            temperature: 37.1,
        }
    }

    fn repo() -> PatientRepository {
        PatientRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let repo = repo();
        let created = repo
            .create(new_patient("Ada"), text("assistantA"))
            .await
            .expect("create should succeed");

        let fetched = repo.get(&created.id).await.expect("get should succeed");
        assert_eq!(fetched, created);
        assert_eq!(fetched.revision, Revision::INITIAL);
        assert!(fetched.data.prescriptions.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_patient_is_not_found() {
        let err = repo().get(&DocumentId::new()).await.unwrap_err();
        assert!(matches!(err, DispensaryError::NotFound { entity: "patient", .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_creator() {
        let repo = repo();
        repo.create(new_patient("Ada"), text("assistantA"))
            .await
            .unwrap();
        repo.create(new_patient("Bo"), text("assistantB"))
            .await
            .unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);

        let own = repo.list(Some(&text("assistantB"))).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].data.name.as_str(), "Bo");
    }

    #[tokio::test]
    async fn test_commit_with_stale_revision_conflicts() {
        let repo = repo();
        let created = repo
            .create(new_patient("Ada"), text("assistantA"))
            .await
            .unwrap();

        let mut first = created.clone();
        first.data.age = 53;
        let committed = repo.commit(first).await.unwrap();
        assert_eq!(committed.revision, Revision::new(2));

        let mut stale = created;
        stale.data.weight = 80.0;
        let err = repo.commit(stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let current = repo.get(&committed.id).await.unwrap();
        assert_eq!(current.data.age, 53);
        assert_eq!(current.data.weight, 71.5);
    }
}
