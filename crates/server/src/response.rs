use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use model::Metadata;
use serde::Serialize;

/// Success envelope: `{code, message, payload, metadata?}`.
#[derive(Debug, Serialize)]
pub struct WebSuccess<T> {
    code: u16,
    message: String,
    payload: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl<T: Serialize> WebSuccess<T> {
    fn with_status(status: StatusCode, payload: T, metadata: Option<Metadata>) -> Self {
        Self {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default().to_owned(),
            payload,
            metadata,
        }
    }

    pub fn ok(payload: T) -> Self {
        Self::with_status(StatusCode::OK, payload, None)
    }

    pub fn created(payload: T) -> Self {
        Self::with_status(StatusCode::CREATED, payload, None)
    }

    pub fn paged(payload: T, metadata: Metadata) -> Self {
        Self::with_status(StatusCode::OK, payload, Some(metadata))
    }
}

impl<T: Serialize> IntoResponse for WebSuccess<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
