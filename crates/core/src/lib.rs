//! # Dispensary Core
//!
//! Core logic for coordinating prescriptions with a network-attached dispensing device.
//!
//! This crate contains:
//! - Patient and medicine records over a revisioned document store ([`store`], [`repositories`])
//! - Prescription authorization ([`prescribing`])
//! - The device wire protocol and HTTP client ([`device`])
//! - The dispatch state machine guarding `active -> dispensed` ([`coordinator`])
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod models;
pub mod prescribing;
pub mod repositories;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::{CoreConfig, DeviceConfig};
pub use coordinator::{DispatchCoordinator, NotifyReceipt, PrescriptionNotice};
pub use device::{DeviceClient, DeviceCommand, DeviceOutcome, DeviceStatus, HttpDeviceClient};
pub use error::{DispensaryError, DispensaryResult, StoreError, StoreResult};
pub use models::{
    DispenseRecord, Medicine, MedicineDetails, MedicineSnapshot, NewPatient, Patient,
    PlacedPrescription, Prescription, PrescriptionSelector, PrescriptionState,
};
pub use prescribing::PrescriptionService;
pub use repositories::{MedicineRepository, PatientRepository, Versioned};
pub use store::{FileStore, MemoryStore, RecordStore, Revision};

pub use dispensary_types::{NonEmptyText, TextError};
pub use dispensary_uuid::{DocumentId, UuidError};
