//! One response envelope for every route, success or failure:
//! `{"success": bool, "message"?: string, "data"?: any, "error"?: kind}`.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use assetkeep_core::{DomainError, ErrorKind};
use assetkeep_infra::services::ServiceError;

/// Include the underlying error text in 500 responses. Set once at startup.
static EXPOSE_DETAIL: AtomicBool = AtomicBool::new(false);

pub fn expose_internal_detail(enabled: bool) {
    EXPOSE_DETAIL.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, None, Some(data))
}

pub fn ok_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    respond(StatusCode::OK, Some(message.into()), Some(data))
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    respond(StatusCode::CREATED, Some(message.into()), Some(data))
}

pub fn message(message: impl Into<String>) -> Response {
    respond::<()>(StatusCode::OK, Some(message.into()), None)
}

fn respond<T: Serialize>(status: StatusCode, message: Option<String>, data: Option<T>) -> Response {
    (status, Json(Envelope { success: true, message, data })).into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ExternalServiceFailure => StatusCode::BAD_GATEWAY,
    }
}

/// Handler error. Domain failures keep their message; everything else is
/// logged with a correlation id and answered with a generic 500.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => ApiError::Domain(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Domain(DomainError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(e) => {
                let kind = e.kind();
                json_error(status_for(kind), kind.as_str(), e.message())
            }
            ApiError::Internal(detail) => {
                let correlation_id = Uuid::now_v7();
                tracing::error!(%correlation_id, error = %detail, "request failed");
                let mut body = json!({
                    "success": false,
                    "error": "internal_error",
                    "message": "Internal server error",
                    "correlation_id": correlation_id.to_string(),
                });
                if EXPOSE_DETAIL.load(Ordering::Relaxed) {
                    body["detail"] = json!(detail);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

pub type ApiResult = Result<Response, ApiError>;

/// Unwrap a JSON body, answering malformed input in the envelope format.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(ApiError::from)
}

/// Parse a path/query id, mapping failures to `400`.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetkeep_infra::StoreError;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (DomainError::forbidden("x"), StatusCode::FORBIDDEN),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::external("x"), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn store_failures_are_internal() {
        let err: ApiError = ServiceError::Store(StoreError::Unavailable("pool timed out".into())).into();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
