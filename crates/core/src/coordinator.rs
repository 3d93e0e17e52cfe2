//! Prescription dispatch.
//!
//! [`DispatchCoordinator`] guards the single `active -> dispensed` transition. The transition is
//! only recorded after the device acknowledged a dispense, and the record is written with the
//! revision it was read at. Once the device has acted, the coordinator never calls it again for
//! the same dispatch: a failed write is reconciled against a fresh read or reported as
//! [`DispensaryError::StoreWriteFailedAfterAcknowledgment`].

use crate::constants::{DEFAULT_DISPENSE_QUANTITY, MAX_COMMIT_ATTEMPTS};
use crate::device::{
    device_timestamp, DeviceClient, DeviceCommand, DeviceOutcome, DeviceStatus, DispatchRequest,
    PrescriptionBundle,
};
use crate::error::{DispensaryError, DispensaryResult, StoreError};
use crate::models::{DispenseRecord, Patient, PlacedPrescription, PrescriptionSelector};
use crate::repositories::{PatientRepository, Versioned};
use chrono::Utc;
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;
use serde_json::Value;
use std::sync::Arc;

/// Prescriptions forwarded to the device for information only.
#[derive(Clone, Debug, PartialEq)]
pub struct PrescriptionNotice {
    pub patient_id: DocumentId,
    pub patient_name: String,
    pub prescriptions: Vec<Value>,
}

/// Confirmation that the device accepted a [`PrescriptionNotice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifyReceipt {
    pub delivered: usize,
    pub message: String,
}

/// Sends dispense commands to the device and records their outcome.
#[derive(Clone)]
pub struct DispatchCoordinator {
    patients: PatientRepository,
    device: Arc<dyn DeviceClient>,
}

impl DispatchCoordinator {
    pub fn new(patients: PatientRepository, device: Arc<dyn DeviceClient>) -> Self {
        Self { patients, device }
    }

    /// Dispenses one active prescription and marks it dispensed.
    ///
    /// Returns the dispensed prescription with its position in the committed patient document.
    ///
    /// `quantity` defaults to one unit. Precondition failures are reported before the device is
    /// contacted. A rejected or unreachable device leaves the prescription active so the call can
    /// be repeated.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a zero quantity.
    /// - `NotFound` for an unknown patient or prescription id.
    /// - `InvalidState` for an index out of range or a prescription that is already dispensed.
    /// - `DeviceRejected` / `DeviceUnreachable` when the device did not acknowledge.
    /// - `Conflict` when the prescription was dispensed by a concurrent dispatch.
    /// - `StoreWriteFailedAfterAcknowledgment` when the device acted but the record could not be
    ///   updated.
    pub async fn dispatch(
        &self,
        patient_id: &DocumentId,
        selector: impl Into<PrescriptionSelector>,
        quantity: Option<u32>,
        dispensed_by: &NonEmptyText,
    ) -> DispensaryResult<PlacedPrescription> {
        let selector = selector.into();
        let quantity = quantity.unwrap_or(DEFAULT_DISPENSE_QUANTITY);
        if quantity == 0 {
            return Err(DispensaryError::InvalidInput(
                "quantity must be at least 1".into(),
            ));
        }

        let patient = self.patients.get(patient_id).await?;
        let index = patient.data.locate(selector)?;
        let prescription = &patient.data.prescriptions[index];
        if !prescription.is_active() {
            return Err(DispensaryError::InvalidState(format!(
                "prescription {selector} of patient {patient_id} has already been dispensed"
            )));
        }
        let prescription_id = prescription.id;

        let request =
            DispatchRequest::new(&patient.data, prescription, quantity, dispensed_by, Utc::now());
        match self.device.send(&DeviceCommand::Dispense(request)).await {
            DeviceOutcome::Acknowledged => {}
            DeviceOutcome::Rejected(reason) => {
                tracing::warn!(%patient_id, %prescription_id, %reason, "device rejected dispense");
                return Err(DispensaryError::DeviceRejected(reason));
            }
            DeviceOutcome::Unreachable(reason) => {
                tracing::warn!(%patient_id, %prescription_id, %reason, "device unreachable");
                return Err(DispensaryError::DeviceUnreachable(reason));
            }
        }

        let record = DispenseRecord {
            dispensed_by: dispensed_by.clone(),
            dispensed_at: Utc::now(),
            quantity_dispensed: quantity,
        };
        self.record_dispense(patient, index, record).await
    }

    /// Writes the dispensed state after an acknowledgment, re-reading on revision conflicts.
    ///
    /// `index` must address the acknowledged prescription in `patient`.
    async fn record_dispense(
        &self,
        mut patient: Versioned<Patient>,
        mut index: usize,
        record: DispenseRecord,
    ) -> DispensaryResult<PlacedPrescription> {
        let patient_id = patient.id;
        let prescription_id = patient.data.prescriptions[index].id;
        let quantity = record.quantity_dispensed;
        let unrecorded = |source: StoreError| {
            tracing::error!(
                %patient_id,
                %prescription_id,
                quantity,
                error = %source,
                "device dispensed but the prescription is still recorded as active"
            );
            DispensaryError::StoreWriteFailedAfterAcknowledgment {
                patient_id,
                prescription_id,
                quantity,
                source,
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let prescription = &mut patient.data.prescriptions[index];
            if let Some(existing) = prescription.dispense_record() {
                tracing::error!(
                    %patient_id,
                    %prescription_id,
                    other_staff = %existing.dispensed_by,
                    "prescription was dispensed concurrently; the device dispensed it twice"
                );
                return Err(DispensaryError::Conflict(format!(
                    "prescription {prescription_id} was dispensed by {} while this dispense was in flight",
                    existing.dispensed_by
                )));
            }
            prescription.mark_dispensed(record.clone())?;

            let conflict = match self.patients.commit(patient).await {
                Ok(mut committed) => {
                    tracing::info!(
                        %patient_id,
                        %prescription_id,
                        quantity,
                        attempt,
                        "prescription dispensed"
                    );
                    return Ok(PlacedPrescription {
                        index,
                        prescription: committed.data.prescriptions.remove(index),
                    });
                }
                Err(e @ StoreError::Conflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => e,
                Err(e) => return Err(unrecorded(e)),
            };

            tracing::warn!(%patient_id, attempt, "patient changed during dispense, reconciling");
            patient = match self.patients.fetch(&patient_id).await {
                Ok(Some(fresh)) => fresh,
                Ok(None) => return Err(unrecorded(conflict)),
                Err(e) => return Err(unrecorded(e)),
            };
            index = match position_of(&patient.data, prescription_id) {
                Some(position) => position,
                None => return Err(unrecorded(conflict)),
            };
        }
    }

    /// Sends an informational bundle of prescriptions to the device.
    ///
    /// Nothing is read from or written to the store.
    pub async fn bulk_notify(
        &self,
        notice: PrescriptionNotice,
        sent_by: &NonEmptyText,
    ) -> DispensaryResult<NotifyReceipt> {
        let delivered = notice.prescriptions.len();
        let bundle = PrescriptionBundle {
            patient_name: notice.patient_name,
            patient_id: notice.patient_id.to_string(),
            total_prescriptions: delivered,
            prescriptions: notice.prescriptions,
            sent_by: sent_by.clone(),
            timestamp: device_timestamp(Utc::now()),
        };

        match self
            .device
            .send(&DeviceCommand::SendPrescriptions(bundle))
            .await
        {
            DeviceOutcome::Acknowledged => {
                tracing::info!(patient_id = %notice.patient_id, delivered, "prescriptions sent to device");
                Ok(NotifyReceipt {
                    delivered,
                    message: format!(
                        "Successfully sent {delivered} prescriptions to the dispensing device"
                    ),
                })
            }
            DeviceOutcome::Rejected(reason) => Err(DispensaryError::DeviceRejected(reason)),
            DeviceOutcome::Unreachable(reason) => Err(DispensaryError::DeviceUnreachable(reason)),
        }
    }

    pub async fn device_status(&self) -> DispensaryResult<DeviceStatus> {
        self.device.status().await
    }
}

fn position_of(patient: &Patient, prescription_id: DocumentId) -> Option<usize> {
    patient
        .prescriptions
        .iter()
        .position(|p| p.id == prescription_id)
}
