//! Request and response bodies.
//!
//! Timestamps cross the wire as RFC 3339 strings and ids as canonical 32-character hex.

use dispensary_core::{
    DeviceStatus, Medicine, Patient, Prescription, PrescriptionState, Versioned,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub error: String,
    /// Stable machine-readable error code, e.g. `dispensed_not_recorded`.
    pub code: String,
}

// ============================================================================
// PATIENTS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    pub name: String,
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    pub bp: String,
    pub temp: f64,
    pub created_by: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPatientsQuery {
    /// Only patients registered by this staff member.
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionRes {
    pub id: String,
    pub index: usize,
    pub medicine_id: String,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: String,
    pub prescribed_by: String,
    pub prescribed_at: String,
    /// `active` or `dispensed`.
    pub status: String,
    pub dispensed_by: Option<String>,
    pub dispensed_at: Option<String>,
    pub quantity_dispensed: Option<u32>,
}

impl PrescriptionRes {
    pub fn new(index: usize, prescription: &Prescription) -> Self {
        let medicine = prescription.medicine();
        let (status, record) = match prescription.state() {
            PrescriptionState::Active => ("active", None),
            PrescriptionState::Dispensed(record) => ("dispensed", Some(record)),
        };
        Self {
            id: prescription.id.to_string(),
            index,
            medicine_id: medicine.medicine_id.to_string(),
            medicine_name: medicine.medicine_name.to_string(),
            dosage: medicine.dosage.to_string(),
            frequency: medicine.frequency.to_string(),
            notes: prescription.notes.clone(),
            prescribed_by: prescription.prescribed_by.to_string(),
            prescribed_at: prescription.prescribed_at.to_rfc3339(),
            status: status.into(),
            dispensed_by: record.map(|r| r.dispensed_by.to_string()),
            dispensed_at: record.map(|r| r.dispensed_at.to_rfc3339()),
            quantity_dispensed: record.map(|r| r.quantity_dispensed),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub revision: u64,
    pub name: String,
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    pub bp: String,
    pub temp: f64,
    pub created_by: String,
    pub created_at: String,
    pub prescriptions: Vec<PrescriptionRes>,
}

impl From<Versioned<Patient>> for PatientRes {
    fn from(patient: Versioned<Patient>) -> Self {
        let data = patient.data;
        Self {
            id: patient.id.to_string(),
            revision: patient.revision.value(),
            prescriptions: data
                .prescriptions
                .iter()
                .enumerate()
                .map(|(index, p)| PrescriptionRes::new(index, p))
                .collect(),
            name: data.name.into_string(),
            age: data.age,
            height: data.height,
            weight: data.weight,
            bp: data.blood_pressure,
            temp: data.temperature,
            created_by: data.created_by.into_string(),
            created_at: data.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrescribeReq {
    pub medicine_id: String,
    #[serde(default)]
    pub notes: String,
    pub prescribed_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispenseReq {
    pub dispensed_by: String,
    /// Units to dispense; one when omitted.
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispenseRes {
    pub success: bool,
    pub message: String,
    pub prescription: PrescriptionRes,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotifyReq {
    pub patient_name: String,
    /// Forwarded to the device as given.
    #[schema(value_type = Vec<Object>)]
    pub prescriptions: Vec<Value>,
    pub sent_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotifyRes {
    pub success: bool,
    pub message: String,
    pub delivered: usize,
}

// ============================================================================
// MEDICINES
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddMedicineReq {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub dosage: String,
    pub frequency: String,
    pub created_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateMedicineReq {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub dosage: String,
    pub frequency: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive fragment of the medicine name.
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicineRes {
    pub id: String,
    pub revision: u64,
    pub name: String,
    pub description: String,
    pub dosage: String,
    pub frequency: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<Versioned<Medicine>> for MedicineRes {
    fn from(medicine: Versioned<Medicine>) -> Self {
        let data = medicine.data;
        Self {
            id: medicine.id.to_string(),
            revision: medicine.revision.value(),
            name: data.details.name.into_string(),
            description: data.details.description,
            dosage: data.details.dosage.into_string(),
            frequency: data.details.frequency.into_string(),
            created_by: data.created_by.into_string(),
            created_at: data.created_at.to_rfc3339(),
            updated_at: data.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListMedicinesRes {
    pub medicines: Vec<MedicineRes>,
}

// ============================================================================
// DEVICE
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatusRes {
    pub status: String,
    pub ip: Option<String>,
    pub uptime: u64,
    pub dispensing: bool,
    pub servo_position: i32,
}

impl From<DeviceStatus> for DeviceStatusRes {
    fn from(status: DeviceStatus) -> Self {
        Self {
            status: status.status,
            ip: status.ip,
            uptime: status.uptime,
            dispensing: status.dispensing,
            servo_position: status.servo_position,
        }
    }
}
