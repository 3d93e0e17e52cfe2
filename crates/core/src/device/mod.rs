//! Dispensing device protocol.
//!
//! The device is an HTTP endpoint on the local network. Commands are JSON documents tagged with
//! an `action` field and posted to a path that depends on the command. A call yields a
//! [`DeviceOutcome`] rather than an error so that callers are forced to handle the three ways a
//! command can end.

mod http;

pub use http::HttpDeviceClient;

use crate::constants::{DEVICE_DISPENSE_PATH, DEVICE_PRESCRIPTIONS_PATH, DEVICE_TIMESTAMP_FORMAT};
use crate::error::DispensaryResult;
use crate::models::{Patient, Prescription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispensary_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Formats a timestamp the way the device firmware expects.
pub fn device_timestamp(at: DateTime<Utc>) -> String {
    at.format(DEVICE_TIMESTAMP_FORMAT).to_string()
}

/// Payload asking the device to dispense one prescription.
///
/// Built fresh for every attempt. It carries no identifier the device could use to recognise a
/// repeated command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub patient_name: NonEmptyText,
    pub medicine_name: NonEmptyText,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
    pub quantity: u32,
    pub notes: String,
    pub dispensed_by: NonEmptyText,
    pub timestamp: String,
}

impl DispatchRequest {
    /// Builds the request from the prescription's authorization-time medicine snapshot.
    pub fn new(
        patient: &Patient,
        prescription: &Prescription,
        quantity: u32,
        dispensed_by: &NonEmptyText,
        at: DateTime<Utc>,
    ) -> Self {
        let medicine = prescription.medicine();
        Self {
            patient_name: patient.name.clone(),
            medicine_name: medicine.medicine_name.clone(),
            dosage: medicine.dosage.clone(),
            frequency: medicine.frequency.clone(),
            quantity,
            notes: prescription.notes.clone(),
            dispensed_by: dispensed_by.clone(),
            timestamp: device_timestamp(at),
        }
    }
}

/// Informational bundle of a patient's prescriptions, sent so the device can pre-stage doses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionBundle {
    pub patient_name: String,
    pub patient_id: String,
    pub total_prescriptions: usize,
    pub prescriptions: Vec<Value>,
    pub sent_by: NonEmptyText,
    pub timestamp: String,
}

/// A command understood by the device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeviceCommand {
    Dispense(DispatchRequest),
    SendPrescriptions(PrescriptionBundle),
}

impl DeviceCommand {
    /// Device path the command is posted to.
    pub fn path(&self) -> &'static str {
        match self {
            DeviceCommand::Dispense(_) => DEVICE_DISPENSE_PATH,
            DeviceCommand::SendPrescriptions(_) => DEVICE_PRESCRIPTIONS_PATH,
        }
    }
}

/// How a single device call ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// The device answered with a success status.
    Acknowledged,
    /// The device answered, but declined the command.
    Rejected(String),
    /// No answer: the connection failed or the timeout elapsed. The device may or may not have
    /// acted on the command.
    Unreachable(String),
}

/// Device self-report from `GET /status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub status: String,
    #[serde(default)]
    pub ip: Option<String>,
    /// Seconds since the device booted.
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub dispensing: bool,
    /// Actuator position in degrees.
    #[serde(default)]
    pub servo_position: i32,
}

/// One network attempt per call, no retries.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn send(&self, command: &DeviceCommand) -> DeviceOutcome;

    async fn status(&self) -> DispensaryResult<DeviceStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicineSnapshot;
    use chrono::TimeZone;
    use dispensary_uuid::DocumentId;
    use serde_json::json;

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    #[test]
    fn test_dispense_command_wire_shape() {
        let patient = Patient {
            name: text("Ada"),
            age: 40,
            height: 170.0,
            weight: 70.0,
            blood_pressure: "120/80".into(),
            temperature: 36.8,
            created_by: text("assistantA"),
            created_at: Utc::now(),
            prescriptions: vec![],
        };
        let prescription = Prescription::authorize(
            MedicineSnapshot {
                medicine_id: DocumentId::new(),
                medicine_name: text("Paracetamol"),
                dosage: text("500mg"),
                frequency: text("Every 6 hours"),
            },
            "after food",
            text("drB"),
            Utc::now(),
        );
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();

        let command = DeviceCommand::Dispense(DispatchRequest::new(
            &patient,
            &prescription,
            2,
            &text("nurseA"),
            at,
        ));

        assert_eq!(command.path(), "/dispense");
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({
                "action": "dispense",
                "patient_name": "Ada",
                "medicine_name": "Paracetamol",
                "dosage": "500mg",
                "frequency": "Every 6 hours",
                "quantity": 2,
                "notes": "after food",
                "dispensed_by": "nurseA",
                "timestamp": "2026-03-01 09:30:05"
            })
        );
    }

    #[test]
    fn test_bundle_command_is_tagged_send_prescriptions() {
        let command = DeviceCommand::SendPrescriptions(PrescriptionBundle {
            patient_name: "Ada".into(),
            patient_id: "p1".into(),
            total_prescriptions: 1,
            prescriptions: vec![json!({"medicine_name": "Paracetamol"})],
            sent_by: text("nurseA"),
            timestamp: "2026-03-01 09:30:05".into(),
        });

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(command.path(), "/prescriptions");
        assert_eq!(value["action"], json!("send_prescriptions"));
        assert_eq!(value["total_prescriptions"], json!(1));
    }

    #[test]
    fn test_status_tolerates_missing_fields() {
        let status: DeviceStatus = serde_json::from_value(json!({"status": "online"})).unwrap();
        assert_eq!(status.status, "online");
        assert!(!status.dispensing);
        assert_eq!(status.servo_position, 0);
    }
}
