use crate::dto::{
    AddMedicineReq, CreatePatientReq, DeviceStatusRes, DispenseReq, DispenseRes, ErrorRes,
    HealthRes, ListMedicinesRes, ListPatientsQuery, ListPatientsRes, MedicineRes, NotifyReq,
    NotifyRes, PatientRes, PrescribeReq, PrescriptionRes, SearchQuery, UpdateMedicineReq,
};
use crate::error::Result;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dispensary_core::{
    DocumentId, MedicineDetails, NewPatient, NonEmptyText, PrescriptionNotice,
    PrescriptionSelector,
};

/// Accepts either a position (`0`, `1`, ...) or a stable prescription id.
fn parse_selector(raw: &str) -> Result<PrescriptionSelector> {
    match raw.parse::<usize>() {
        Ok(index) => Ok(index.into()),
        Err(_) => Ok(DocumentId::parse(raw)?.into()),
    }
}

fn medicine_details(
    name: String,
    description: String,
    dosage: String,
    frequency: String,
) -> Result<MedicineDetails> {
    Ok(MedicineDetails {
        name: NonEmptyText::new(name)?,
        description,
        dosage: NonEmptyText::new(dosage)?,
        frequency: NonEmptyText::new(frequency)?,
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Liveness probe; does not touch the store or the device.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Dispensary REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "Patients ordered by name", body = ListPatientsRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
) -> Result<Json<ListPatientsRes>> {
    let created_by = query
        .created_by
        .filter(|s| !s.trim().is_empty())
        .map(NonEmptyText::new)
        .transpose()?;
    let patients = state.patients.list(created_by.as_ref()).await?;
    Ok(Json(ListPatientsRes {
        patients: patients.into_iter().map(PatientRes::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>)> {
    let new = NewPatient {
        name: NonEmptyText::new(req.name)?,
        age: req.age,
        height: req.height,
        weight: req.weight,
        blood_pressure: req.bp,
        temperature: req.temp,
    };
    let created_by = NonEmptyText::new(req.created_by)?;
    let patient = state.patients.create(new, created_by).await?;
    Ok((StatusCode::CREATED, Json(patient.into())))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient with prescriptions", body = PatientRes),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientRes>> {
    let id = DocumentId::parse(&id)?;
    let patient = state.patients.get(&id).await?;
    Ok(Json(patient.into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/prescriptions",
    params(("id" = String, Path, description = "Patient id")),
    request_body = PrescribeReq,
    responses(
        (status = 201, description = "Prescription authorized", body = PrescriptionRes),
        (status = 404, description = "Patient or medicine not found", body = ErrorRes),
        (status = 409, description = "Patient kept changing", body = ErrorRes)
    )
)]
/// Authorize a prescription; the medicine's current name, dosage and frequency are copied onto it.
#[axum::debug_handler]
pub async fn prescribe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PrescribeReq>,
) -> Result<(StatusCode, Json<PrescriptionRes>)> {
    let patient_id = DocumentId::parse(&id)?;
    let medicine_id = DocumentId::parse(&req.medicine_id)?;
    let prescribed_by = NonEmptyText::new(req.prescribed_by)?;

    let placed = state
        .prescriptions
        .prescribe(&patient_id, &medicine_id, req.notes, &prescribed_by)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PrescriptionRes::new(placed.index, &placed.prescription)),
    ))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/prescriptions/{index}/dispense",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("index" = String, Path, description = "Prescription position or stable prescription id")
    ),
    request_body = DispenseReq,
    responses(
        (status = 200, description = "Device acknowledged and prescription recorded as dispensed", body = DispenseRes),
        (status = 404, description = "Patient or prescription not found", body = ErrorRes),
        (status = 409, description = "Already dispensed, index out of range, or concurrent dispense", body = ErrorRes),
        (status = 502, description = "Device rejected the command", body = ErrorRes),
        (status = 504, description = "Device unreachable or timed out", body = ErrorRes),
        (status = 500, description = "Device dispensed but the record was not updated (code dispensed_not_recorded)", body = ErrorRes)
    )
)]
/// Dispatch one prescription to the dispensing device.
///
/// A 504 leaves the prescription active and the request may be repeated, but the device may
/// already have acted on the lost command.
#[axum::debug_handler]
pub async fn dispense(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
    Json(req): Json<DispenseReq>,
) -> Result<Json<DispenseRes>> {
    let patient_id = DocumentId::parse(&id)?;
    let selector = parse_selector(&index)?;
    let dispensed_by = NonEmptyText::new(req.dispensed_by)?;

    let placed = state
        .coordinator
        .dispatch(&patient_id, selector, req.quantity, &dispensed_by)
        .await?;
    let prescription = &placed.prescription;

    Ok(Json(DispenseRes {
        success: true,
        message: format!(
            "Dispensed {} {}",
            prescription.medicine().medicine_name,
            prescription.medicine().dosage
        ),
        prescription: PrescriptionRes::new(placed.index, prescription),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/prescriptions/notify",
    params(("id" = String, Path, description = "Patient id")),
    request_body = NotifyReq,
    responses(
        (status = 200, description = "Device accepted the bundle", body = NotifyRes),
        (status = 502, description = "Device rejected the bundle", body = ErrorRes),
        (status = 504, description = "Device unreachable or timed out", body = ErrorRes)
    )
)]
/// Send prescriptions to the device for information. Nothing is recorded.
#[axum::debug_handler]
pub async fn notify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NotifyReq>,
) -> Result<Json<NotifyRes>> {
    let notice = PrescriptionNotice {
        patient_id: DocumentId::parse(&id)?,
        patient_name: req.patient_name,
        prescriptions: req.prescriptions,
    };
    let sent_by = NonEmptyText::new(req.sent_by)?;

    let receipt = state.coordinator.bulk_notify(notice, &sent_by).await?;
    Ok(Json(NotifyRes {
        success: true,
        message: receipt.message,
        delivered: receipt.delivered,
    }))
}

#[utoipa::path(
    get,
    path = "/medicines",
    responses(
        (status = 200, description = "Medicines ordered by name", body = ListMedicinesRes)
    )
)]
#[axum::debug_handler]
pub async fn list_medicines(State(state): State<AppState>) -> Result<Json<ListMedicinesRes>> {
    let medicines = state.medicines.list().await?;
    Ok(Json(ListMedicinesRes {
        medicines: medicines.into_iter().map(MedicineRes::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/medicines",
    request_body = AddMedicineReq,
    responses(
        (status = 201, description = "Medicine added", body = MedicineRes),
        (status = 400, description = "Bad request", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn add_medicine(
    State(state): State<AppState>,
    Json(req): Json<AddMedicineReq>,
) -> Result<(StatusCode, Json<MedicineRes>)> {
    let details = medicine_details(req.name, req.description, req.dosage, req.frequency)?;
    let created_by = NonEmptyText::new(req.created_by)?;
    let medicine = state.medicines.add(details, created_by).await?;
    Ok((StatusCode::CREATED, Json(medicine.into())))
}

#[utoipa::path(
    put,
    path = "/medicines/{id}",
    params(("id" = String, Path, description = "Medicine id")),
    request_body = UpdateMedicineReq,
    responses(
        (status = 200, description = "Medicine updated", body = MedicineRes),
        (status = 404, description = "Medicine not found", body = ErrorRes),
        (status = 409, description = "Edited concurrently", body = ErrorRes)
    )
)]
/// Edit a catalogue entry. Existing prescriptions keep the values they were authorized with.
#[axum::debug_handler]
pub async fn update_medicine(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMedicineReq>,
) -> Result<Json<MedicineRes>> {
    let id = DocumentId::parse(&id)?;
    let details = medicine_details(req.name, req.description, req.dosage, req.frequency)?;
    let medicine = state.medicines.update(&id, details).await?;
    Ok(Json(medicine.into()))
}

#[utoipa::path(
    get,
    path = "/medicines/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "At most ten medicines whose name contains the query", body = ListMedicinesRes)
    )
)]
#[axum::debug_handler]
pub async fn search_medicines(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListMedicinesRes>> {
    let medicines = state.medicines.search(&query.q).await?;
    Ok(Json(ListMedicinesRes {
        medicines: medicines.into_iter().map(MedicineRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/device/status",
    responses(
        (status = 200, description = "Device self-report", body = DeviceStatusRes),
        (status = 502, description = "Device answered with an error", body = ErrorRes),
        (status = 504, description = "Device unreachable or timed out", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn device_status(State(state): State<AppState>) -> Result<Json<DeviceStatusRes>> {
    let status = state.coordinator.device_status().await?;
    Ok(Json(status.into()))
}
