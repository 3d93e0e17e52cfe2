//! Prescription authorization.

use crate::constants::MAX_COMMIT_ATTEMPTS;
use crate::error::{DispensaryResult, StoreError};
use crate::models::{MedicineSnapshot, PlacedPrescription, Prescription};
use crate::repositories::{MedicineRepository, PatientRepository};
use chrono::Utc;
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;

/// Appends newly authorized prescriptions to patient documents.
#[derive(Clone)]
pub struct PrescriptionService {
    patients: PatientRepository,
    medicines: MedicineRepository,
}

impl PrescriptionService {
    pub fn new(patients: PatientRepository, medicines: MedicineRepository) -> Self {
        Self {
            patients,
            medicines,
        }
    }

    /// Authorizes `medicine_id` for a patient and returns the new, active prescription with the
    /// position it was committed at.
    ///
    /// The medicine's name, dosage and frequency are copied onto the prescription. A concurrent
    /// change to the patient document is retried from a fresh read, since nothing outside the
    /// store has happened yet.
    ///
    /// # Errors
    ///
    /// `NotFound` if the patient or medicine does not exist, `Conflict` if the patient kept
    /// changing for [`MAX_COMMIT_ATTEMPTS`] attempts.
    pub async fn prescribe(
        &self,
        patient_id: &DocumentId,
        medicine_id: &DocumentId,
        notes: impl Into<String>,
        prescribed_by: &NonEmptyText,
    ) -> DispensaryResult<PlacedPrescription> {
        let medicine = self.medicines.get(medicine_id).await?;
        let prescription = Prescription::authorize(
            MedicineSnapshot::of(medicine.id, &medicine.data),
            notes,
            prescribed_by.clone(),
            Utc::now(),
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut patient = self.patients.get(patient_id).await?;
            patient.data.prescriptions.push(prescription.clone());

            match self.patients.commit(patient).await {
                Ok(committed) => {
                    let index = committed.data.prescriptions.len() - 1;
                    tracing::info!(
                        %patient_id,
                        prescription_id = %prescription.id,
                        medicine = %prescription.medicine().medicine_name,
                        index,
                        "prescription authorized"
                    );
                    return Ok(PlacedPrescription {
                        index,
                        prescription,
                    });
                }
                Err(StoreError::Conflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(%patient_id, attempt, "patient changed while prescribing, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
