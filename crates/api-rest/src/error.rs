use crate::dto::ErrorRes;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dispensary_core::{DispensaryError, TextError, UuidError};

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// A [`DispensaryError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DispensaryError);

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DispensaryError::InvalidInput(_)
            | DispensaryError::Text(_)
            | DispensaryError::Uuid(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            DispensaryError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DispensaryError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            DispensaryError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            DispensaryError::DeviceRejected(_) => (StatusCode::BAD_GATEWAY, "device_rejected"),
            DispensaryError::DeviceUnreachable(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "device_unreachable")
            }
            DispensaryError::StoreWriteFailedAfterAcknowledgment { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dispensed_not_recorded")
            }
            DispensaryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        }
    }
}

impl From<DispensaryError> for ApiError {
    fn from(err: DispensaryError) -> Self {
        Self(err)
    }
}

impl From<TextError> for ApiError {
    fn from(err: TextError) -> Self {
        Self(err.into())
    }
}

impl From<UuidError> for ApiError {
    fn from(err: UuidError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error = match &self.0 {
            DispensaryError::Store(_) => {
                tracing::error!("Record store error: {:?}", self.0);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorRes {
                success: false,
                error,
                code: code.into(),
            }),
        )
            .into_response()
    }
}
