use super::{decode_all, encode, Versioned};
use crate::constants::MEDICINE_SEARCH_LIMIT;
use crate::error::{DispensaryError, DispensaryResult};
use crate::models::{Medicine, MedicineDetails};
use crate::store::{Collection, DocumentFilter, RecordStore};
use chrono::Utc;
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;
use std::sync::Arc;

/// The medicine catalogue.
///
/// Editing a medicine never touches prescriptions already authorized against it; those carry
/// their own snapshot.
#[derive(Clone)]
pub struct MedicineRepository {
    store: Arc<dyn RecordStore>,
}

impl MedicineRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn add(
        &self,
        details: MedicineDetails,
        created_by: NonEmptyText,
    ) -> DispensaryResult<Versioned<Medicine>> {
        let medicine = Medicine {
            details,
            created_by,
            created_at: Utc::now(),
            updated_at: None,
        };
        let doc = self
            .store
            .add_document(Collection::Medicines, encode(&medicine)?)
            .await?;

        tracing::info!(medicine_id = %doc.id, name = %medicine.details.name, "medicine added");
        Ok(Versioned {
            id: doc.id,
            revision: doc.revision,
            data: medicine,
        })
    }

    pub async fn get(&self, id: &DocumentId) -> DispensaryResult<Versioned<Medicine>> {
        let doc = self
            .store
            .get_document(Collection::Medicines, id)
            .await?
            .ok_or_else(|| DispensaryError::medicine_not_found(id))?;
        Ok(Versioned::decode(doc)?)
    }

    /// Replaces the catalogue fields of a medicine.
    ///
    /// # Errors
    ///
    /// `NotFound` if the medicine does not exist, `Conflict` if it was edited concurrently.
    pub async fn update(
        &self,
        id: &DocumentId,
        details: MedicineDetails,
    ) -> DispensaryResult<Versioned<Medicine>> {
        let mut medicine = self.get(id).await?;
        medicine.data.details = details;
        medicine.data.updated_at = Some(Utc::now());

        medicine.revision = self
            .store
            .set_document(
                Collection::Medicines,
                id,
                encode(&medicine.data)?,
                Some(medicine.revision),
            )
            .await?;
        Ok(medicine)
    }

    /// All medicines, ordered by name.
    pub async fn list(&self) -> DispensaryResult<Vec<Versioned<Medicine>>> {
        let docs = self
            .store
            .list_documents(Collection::Medicines, &DocumentFilter::all().order_by("name"))
            .await?;
        Ok(decode_all(docs))
    }

    /// Case-insensitive name search, ordered by name and capped at
    /// [`MEDICINE_SEARCH_LIMIT`] results. A blank query matches nothing.
    pub async fn search(&self, query: &str) -> DispensaryResult<Vec<Versioned<Medicine>>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|m| m.data.details.name.as_str().to_lowercase().contains(&needle))
            .take(MEDICINE_SEARCH_LIMIT)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Revision};

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn details(name: &str, dosage: &str) -> MedicineDetails {
        MedicineDetails {
            name: text(name),
            description: String::new(),
            dosage: text(dosage),
            frequency: text("Twice daily"),
        }
    }

    fn repo() -> MedicineRepository {
        MedicineRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name() {
        let repo = repo();
        for name in ["Paracetamol", "Amoxicillin", "Ibuprofen"] {
            repo.add(details(name, "500mg"), text("drB")).await.unwrap();
        }

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.data.details.name.into_string())
            .collect();
        assert_eq!(names, vec!["Amoxicillin", "Ibuprofen", "Paracetamol"]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring_and_capped() {
        let repo = repo();
        repo.add(details("Paracetamol", "500mg"), text("drB"))
            .await
            .unwrap();
        repo.add(details("Ibuprofen", "200mg"), text("drB"))
            .await
            .unwrap();
        for i in 0..12 {
            repo.add(details(&format!("Cetirizine {i:02}"), "10mg"), text("drB"))
                .await
                .unwrap();
        }

        let hits = repo.search("  CETAM ").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].data.details.name.as_str(), "Paracetamol");

        let capped = repo.search("cet").await.unwrap();
        assert_eq!(capped.len(), MEDICINE_SEARCH_LIMIT);

        assert!(repo.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_details_and_bumps_revision() {
        let repo = repo();
        let added = repo
            .add(details("Paracetamol", "500mg"), text("drB"))
            .await
            .unwrap();

        let updated = repo
            .update(&added.id, details("Paracetamol", "1g"))
            .await
            .unwrap();
        assert_eq!(updated.revision, Revision::new(2));
        assert_eq!(updated.data.details.dosage.as_str(), "1g");
        assert!(updated.data.updated_at.is_some());

        let fetched = repo.get(&added.id).await.unwrap();
        assert_eq!(fetched.data.details.dosage.as_str(), "1g");
    }

    #[tokio::test]
    async fn test_update_unknown_medicine_is_not_found() {
        let err = repo()
            .update(&DocumentId::new(), details("X", "1mg"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispensaryError::NotFound { entity: "medicine", .. }));
    }
}
