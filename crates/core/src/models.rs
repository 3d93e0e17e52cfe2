//! Records held in the record store.
//!
//! A [`Patient`] document embeds its ordered [`Prescription`]s. Each prescription carries a
//! [`MedicineSnapshot`] taken when it was authorized, so later catalogue edits never change what
//! gets dispensed.

use crate::error::{DispensaryError, DispensaryResult};
use chrono::{DateTime, Utc};
use dispensary_types::NonEmptyText;
use dispensary_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PATIENTS
// ============================================================================

/// Registration details for a new patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: NonEmptyText,
    pub age: u32,
    /// Height in centimetres.
    pub height: f64,
    /// Weight in kilograms.
    pub weight: f64,
    /// Blood pressure as written on the chart, e.g. `120/80`.
    pub blood_pressure: String,
    /// Body temperature in degrees Celsius.
    pub temperature: f64,
}

impl NewPatient {
    pub(crate) fn validate(&self) -> DispensaryResult<()> {
        for (field, value) in [
            ("height", self.height),
            ("weight", self.weight),
            ("temperature", self.temperature),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DispensaryError::InvalidInput(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

/// A patient document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub name: NonEmptyText,
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    #[serde(rename = "bp")]
    pub blood_pressure: String,
    #[serde(rename = "temp")]
    pub temperature: f64,
    pub created_by: NonEmptyText,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
}

impl Patient {
    pub(crate) fn register(new: NewPatient, created_by: NonEmptyText, at: DateTime<Utc>) -> Self {
        Self {
            name: new.name,
            age: new.age,
            height: new.height,
            weight: new.weight,
            blood_pressure: new.blood_pressure,
            temperature: new.temperature,
            created_by,
            created_at: at,
            prescriptions: Vec::new(),
        }
    }

    /// Resolve a selector to a position in this patient's prescription sequence.
    ///
    /// An index past the end is an `InvalidState`; an unknown stable id is `NotFound`.
    pub fn locate(&self, selector: PrescriptionSelector) -> DispensaryResult<usize> {
        match selector {
            PrescriptionSelector::Index(index) if index < self.prescriptions.len() => Ok(index),
            PrescriptionSelector::Index(index) => Err(DispensaryError::InvalidState(format!(
                "prescription index {index} is out of range (patient has {} prescriptions)",
                self.prescriptions.len()
            ))),
            PrescriptionSelector::Id(id) => self
                .prescriptions
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| DispensaryError::NotFound {
                    entity: "prescription",
                    id: id.to_string(),
                }),
        }
    }
}

/// Addresses one prescription of a patient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrescriptionSelector {
    /// Position in the patient's sequence, as shown to staff.
    Index(usize),
    /// Stable identifier assigned at authorization.
    Id(DocumentId),
}

impl From<usize> for PrescriptionSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<DocumentId> for PrescriptionSelector {
    fn from(id: DocumentId) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for PrescriptionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

// ============================================================================
// MEDICINES
// ============================================================================

/// Catalogue fields of a medicine, supplied when adding or editing one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineDetails {
    pub name: NonEmptyText,
    #[serde(default)]
    pub description: String,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
}

/// A medicine catalogue document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    #[serde(flatten)]
    pub details: MedicineDetails,
    pub created_by: NonEmptyText,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

/// Medicine fields copied onto a prescription at authorization time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineSnapshot {
    pub medicine_id: DocumentId,
    pub medicine_name: NonEmptyText,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
}

impl MedicineSnapshot {
    pub fn of(medicine_id: DocumentId, medicine: &Medicine) -> Self {
        Self {
            medicine_id,
            medicine_name: medicine.details.name.clone(),
            dosage: medicine.details.dosage.clone(),
            frequency: medicine.details.frequency.clone(),
        }
    }
}

/// Who dispensed a prescription, when, and how much.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseRecord {
    pub dispensed_by: NonEmptyText,
    pub dispensed_at: DateTime<Utc>,
    pub quantity_dispensed: u32,
}

/// Lifecycle state of a prescription: `active` until the device confirms a dispense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrescriptionState {
    Active,
    Dispensed(DispenseRecord),
}

/// A prescription embedded in a patient document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: DocumentId,
    #[serde(flatten)]
    medicine: MedicineSnapshot,
    #[serde(default)]
    pub notes: String,
    pub prescribed_by: NonEmptyText,
    pub prescribed_at: DateTime<Utc>,
    #[serde(flatten)]
    state: PrescriptionState,
}

impl Prescription {
    /// Authorize a new, active prescription for `medicine`.
    pub fn authorize(
        medicine: MedicineSnapshot,
        notes: impl Into<String>,
        prescribed_by: NonEmptyText,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            medicine,
            notes: notes.into(),
            prescribed_by,
            prescribed_at: at,
            state: PrescriptionState::Active,
        }
    }

    /// The medicine as it was when the prescription was authorized.
    pub fn medicine(&self) -> &MedicineSnapshot {
        &self.medicine
    }

    pub fn state(&self) -> &PrescriptionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PrescriptionState::Active)
    }

    pub fn dispense_record(&self) -> Option<&DispenseRecord> {
        match &self.state {
            PrescriptionState::Active => None,
            PrescriptionState::Dispensed(record) => Some(record),
        }
    }

    /// Move an active prescription to `dispensed`.
    ///
    /// Only the dispatch coordinator calls this, after the device acknowledged.
    pub(crate) fn mark_dispensed(&mut self, record: DispenseRecord) -> DispensaryResult<()> {
        if !self.is_active() {
            return Err(DispensaryError::InvalidState(format!(
                "prescription {} has already been dispensed",
                self.id
            )));
        }
        self.state = PrescriptionState::Dispensed(record);
        Ok(())
    }
}

/// A prescription together with its position in the patient's sequence, as committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedPrescription {
    pub index: usize,
    pub prescription: Prescription,
}
