//! HTTP mapping of resource errors.
//!
//! Failures are rendered as Kubernetes `Status` objects so that clients
//! built for the cluster API can decode them.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use globalhub_core::error::HubError;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub HubError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            HubError::MalformedSelector { .. }
            | HubError::InvalidContinueToken(_)
            | HubError::InvalidPatch(_) => StatusCode::BAD_REQUEST,
            HubError::NotFound { .. } => StatusCode::NOT_FOUND,
            HubError::UnsupportedPatchPath { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HubError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match &self.0 {
            HubError::MalformedSelector { .. }
            | HubError::InvalidContinueToken(_)
            | HubError::InvalidPatch(_) => "BadRequest",
            HubError::NotFound { .. } => "NotFound",
            HubError::UnsupportedPatchPath { .. } => "Invalid",
            HubError::StoreUnavailable(_) => "ServiceUnavailable",
            HubError::Internal(_) => "InternalError",
        }
    }
}

/// Body of an error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub metadata: serde_json::Value,
    pub status: &'static str,
    pub message: String,
    pub reason: &'static str,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            error!(error = %self.0, status = code.as_u16(), "Request failed");
        } else {
            debug!(error = %self.0, status = code.as_u16(), "Request rejected");
        }

        let body = StatusBody {
            kind: "Status",
            api_version: "v1",
            metadata: json!({}),
            status: "Failure",
            message: self.0.to_string(),
            reason: self.reason(),
            code: code.as_u16(),
        };
        (code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (
                HubError::MalformedSelector {
                    selector: "=x".into(),
                    reason: "missing key".into(),
                },
                400,
            ),
            (HubError::InvalidContinueToken("bad".into()), 400),
            (HubError::InvalidPatch("bad".into()), 400),
            (HubError::not_found("policy", "x"), 404),
            (
                HubError::UnsupportedPatchPath {
                    path: "/spec".into(),
                },
                422,
            ),
            (HubError::StoreUnavailable("down".into()), 503),
            (HubError::Internal("oops".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError(err).status_code().as_u16(), code);
        }
    }
}
