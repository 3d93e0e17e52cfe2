//! # API REST
//!
//! REST API for the dispensary.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Mapping of core errors onto status codes and a `{success, error, code}` body
//!
//! All behaviour lives in `dispensary-core`; handlers only parse input and shape output.

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};
use dispensary_core::{
    DeviceClient, DispatchCoordinator, MedicineRepository, PatientRepository, PrescriptionService,
    RecordStore,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub patients: PatientRepository,
    pub medicines: MedicineRepository,
    pub prescriptions: PrescriptionService,
    pub coordinator: DispatchCoordinator,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, device: Arc<dyn DeviceClient>) -> Self {
        let patients = PatientRepository::new(store.clone());
        let medicines = MedicineRepository::new(store);
        Self {
            prescriptions: PrescriptionService::new(patients.clone(), medicines.clone()),
            coordinator: DispatchCoordinator::new(patients.clone(), device),
            patients,
            medicines,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_patients,
        handlers::create_patient,
        handlers::get_patient,
        handlers::prescribe,
        handlers::dispense,
        handlers::notify,
        handlers::list_medicines,
        handlers::add_medicine,
        handlers::update_medicine,
        handlers::search_medicines,
        handlers::device_status,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ErrorRes,
        dto::CreatePatientReq,
        dto::PatientRes,
        dto::ListPatientsRes,
        dto::PrescriptionRes,
        dto::PrescribeReq,
        dto::DispenseReq,
        dto::DispenseRes,
        dto::NotifyReq,
        dto::NotifyRes,
        dto::AddMedicineReq,
        dto::UpdateMedicineReq,
        dto::MedicineRes,
        dto::ListMedicinesRes,
        dto::DeviceStatusRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full REST application, including Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route("/patients/:id", get(handlers::get_patient))
        .route("/patients/:id/prescriptions", post(handlers::prescribe))
        .route("/patients/:id/prescriptions/notify", post(handlers::notify))
        .route(
            "/patients/:id/prescriptions/:index/dispense",
            post(handlers::dispense),
        )
        .route(
            "/medicines",
            get(handlers::list_medicines).post(handlers::add_medicine),
        )
        .route("/medicines/search", get(handlers::search_medicines))
        .route("/medicines/:id", put(handlers::update_medicine))
        .route("/device/status", get(handlers::device_status))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use dispensary_core::store::{Collection, Document, DocumentFilter};
    use dispensary_core::{
        DeviceCommand, DeviceOutcome, DeviceStatus, DispensaryResult, DocumentId, MemoryStore,
        Revision, StoreError, StoreResult,
    };
    use serde_json::{json, Value};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    /// Device stub answering every command with the same outcome.
    struct FakeDevice(DeviceOutcome);

    #[async_trait]
    impl DeviceClient for FakeDevice {
        async fn send(&self, _command: &DeviceCommand) -> DeviceOutcome {
            self.0.clone()
        }

        async fn status(&self) -> DispensaryResult<DeviceStatus> {
            Ok(DeviceStatus {
                status: "online".into(),
                ip: Some("192.168.1.100".into()),
                uptime: 120,
                dispensing: false,
                servo_position: 90,
            })
        }
    }

    /// In-memory store whose writes, or the reads following a write, can be made to fail.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
        break_reads_on_write: AtomicBool,
        reads_broken: AtomicBool,
    }

    impl FaultyStore {
        fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Reads start failing once the next write has been committed.
        fn break_reads_after_next_write(&self) {
            self.break_reads_on_write.store(true, Ordering::SeqCst);
        }

        fn break_reads(&self) {
            self.reads_broken.store(true, Ordering::SeqCst);
        }

        fn heal(&self) {
            self.fail_writes.store(false, Ordering::SeqCst);
            self.break_reads_on_write.store(false, Ordering::SeqCst);
            self.reads_broken.store(false, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordStore for FaultyStore {
        async fn get_document(
            &self,
            collection: Collection,
            id: &DocumentId,
        ) -> StoreResult<Option<Document>> {
            if self.reads_broken.load(Ordering::SeqCst) {
                return Err(StoreError::FileRead(io::Error::new(
                    io::ErrorKind::Other,
                    "disk unavailable",
                )));
            }
            self.inner.get_document(collection, id).await
        }

        async fn add_document(&self, collection: Collection, body: Value) -> StoreResult<Document> {
            self.inner.add_document(collection, body).await
        }

        async fn set_document(
            &self,
            collection: Collection,
            id: &DocumentId,
            body: Value,
            expected: Option<Revision>,
        ) -> StoreResult<Revision> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::FileWrite(io::Error::new(
                    io::ErrorKind::Other,
                    "disk full",
                )));
            }
            let revision = self.inner.set_document(collection, id, body, expected).await?;
            if self.break_reads_on_write.swap(false, Ordering::SeqCst) {
                self.reads_broken.store(true, Ordering::SeqCst);
            }
            Ok(revision)
        }

        async fn list_documents(
            &self,
            collection: Collection,
            filter: &DocumentFilter,
        ) -> StoreResult<Vec<Document>> {
            self.inner.list_documents(collection, filter).await
        }
    }

    fn app(outcome: DeviceOutcome) -> Router {
        router(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FakeDevice(outcome)),
        ))
    }

    fn faulty_app(outcome: DeviceOutcome) -> (Router, Arc<FaultyStore>) {
        let store = Arc::new(FaultyStore::default());
        let app = router(AppState::new(store.clone(), Arc::new(FakeDevice(outcome))));
        (app, store)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers a patient and prescribes Paracetamol 500mg; returns the patient id.
    async fn seed(app: &Router) -> String {
        let (status, medicine) = call(
            app,
            Method::POST,
            "/medicines",
            Some(json!({
                "name": "Paracetamol",
                "description": "Analgesic",
                "dosage": "500mg",
                "frequency": "Every 6 hours",
                "created_by": "drB"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, patient) = call(
            app,
            Method::POST,
            "/patients",
            Some(json!({
                "name": "P",
                "age": 40,
                "height": 170.0,
                "weight": 70.0,
                "bp": "120/80",
                "temp": 36.8,
                "created_by": "assistantA"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let patient_id = patient["id"].as_str().unwrap().to_string();

        let (status, prescription) = call(
            app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions"),
            Some(json!({
                "medicine_id": medicine["id"],
                "notes": "after food",
                "prescribed_by": "drB"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(prescription["index"], json!(0));
        assert_eq!(prescription["status"], json!("active"));

        patient_id
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(DeviceOutcome::Acknowledged);
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_dispense_then_dispense_again() {
        let app = app(DeviceOutcome::Acknowledged);
        let patient_id = seed(&app).await;
        let uri = format!("/patients/{patient_id}/prescriptions/0/dispense");

        let (status, body) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({"dispensed_by": "nurseA", "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["prescription"]["status"], json!("dispensed"));
        assert_eq!(body["prescription"]["quantity_dispensed"], json!(2));
        assert_eq!(body["prescription"]["dispensed_by"], json!("nurseA"));

        let (status, body) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({"dispensed_by": "nurseA"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["code"], json!("invalid_state"));

        let (_, patient) = call(&app, Method::GET, &format!("/patients/{patient_id}"), None).await;
        assert_eq!(patient["prescriptions"][0]["status"], json!("dispensed"));
    }

    #[tokio::test]
    async fn test_device_errors_map_to_gateway_statuses() {
        let unreachable = app(DeviceOutcome::Unreachable("no response within 10s".into()));
        let patient_id = seed(&unreachable).await;
        let (status, body) = call(
            &unreachable,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/0/dispense"),
            Some(json!({"dispensed_by": "nurseA"})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["code"], json!("device_unreachable"));

        let rejected = app(DeviceOutcome::Rejected("tray jammed".into()));
        let patient_id = seed(&rejected).await;
        let (status, body) = call(
            &rejected,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/0/dispense"),
            Some(json!({"dispensed_by": "nurseA"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], json!("device_rejected"));
        assert!(body["error"].as_str().unwrap().contains("tray jammed"));
    }

    #[tokio::test]
    async fn test_committed_writes_succeed_even_if_later_reads_fail() {
        let (app, store) = faulty_app(DeviceOutcome::Acknowledged);
        let patient_id = seed(&app).await;
        let (_, medicines) = call(&app, Method::GET, "/medicines", None).await;
        let medicine_id = medicines["medicines"][0]["id"].clone();

        store.break_reads_after_next_write();
        let (status, prescription) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions"),
            Some(json!({"medicine_id": medicine_id, "prescribed_by": "drB"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(prescription["index"], json!(1));

        store.heal();
        let (_, patient) = call(&app, Method::GET, &format!("/patients/{patient_id}"), None).await;
        assert_eq!(patient["prescriptions"].as_array().unwrap().len(), 2);
        let stable_id = prescription["id"].as_str().unwrap();
        assert_eq!(patient["prescriptions"][1]["id"], json!(stable_id));

        store.break_reads_after_next_write();
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/{stable_id}/dispense"),
            Some(json!({"dispensed_by": "nurseA"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prescription"]["index"], json!(1));
        assert_eq!(body["prescription"]["status"], json!("dispensed"));
    }

    #[tokio::test]
    async fn test_unrecorded_dispense_is_distinguished_from_store_errors() {
        let (app, store) = faulty_app(DeviceOutcome::Acknowledged);
        let patient_id = seed(&app).await;

        store.fail_writes(true);
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/0/dispense"),
            Some(json!({"dispensed_by": "nurseA", "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["code"], json!("dispensed_not_recorded"));

        store.heal();
        store.break_reads();
        let (status, body) =
            call(&app, Method::GET, &format!("/patients/{patient_id}"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], json!("store_error"));
        assert_eq!(body["error"], json!("internal server error"));
    }

    #[tokio::test]
    async fn test_bad_ids_and_missing_patients() {
        let app = app(DeviceOutcome::Acknowledged);

        let (status, body) = call(&app, Method::GET, "/patients/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("invalid_input"));

        let missing = "0123456789abcdef0123456789abcdef";
        let (status, body) = call(&app, Method::GET, &format!("/patients/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("not_found"));

        let patient_id = seed(&app).await;
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/7/dispense"),
            Some(json!({"dispensed_by": "nurseA"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("invalid_state"));

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/0/dispense"),
            Some(json!({"dispensed_by": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_notify_and_device_status() {
        let app = app(DeviceOutcome::Acknowledged);
        let patient_id = seed(&app).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/patients/{patient_id}/prescriptions/notify"),
            Some(json!({
                "patient_name": "P",
                "prescriptions": [{"medicine_name": "Paracetamol"}],
                "sent_by": "nurseA"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            json!("Successfully sent 1 prescriptions to the dispensing device")
        );

        let (status, body) = call(&app, Method::GET, "/device/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["servo_position"], json!(90));
    }

    #[tokio::test]
    async fn test_medicine_search_and_edit() {
        let app = app(DeviceOutcome::Acknowledged);
        seed(&app).await;

        let (status, body) = call(&app, Method::GET, "/medicines/search?q=PARA", None).await;
        assert_eq!(status, StatusCode::OK);
        let medicines = body["medicines"].as_array().unwrap();
        assert_eq!(medicines.len(), 1);
        let id = medicines[0]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/medicines/{id}"),
            Some(json!({"name": "Paracetamol", "dosage": "1g", "frequency": "Twice daily"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dosage"], json!("1g"));
        assert_eq!(body["revision"], json!(2));

        let (_, body) = call(&app, Method::GET, "/medicines/search?q=", None).await;
        assert!(body["medicines"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (status, body) = call(
            &app(DeviceOutcome::Acknowledged),
            Method::GET,
            "/api-docs/openapi.json",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]
            .get("/patients/{id}/prescriptions/{index}/dispense")
            .is_some());
    }
}
