//! 🚨 HttpError: how an [`AquaError`] looks once it leaves through the front door.
//!
//! Every failure answers with `{"status": <code>, "message": "..."}`. The code
//! comes from the error's family: caller mistakes are 400, missing things 404,
//! conflicts 409, and whatever the service said is passed through as-is.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::error::AquaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<AquaError> for HttpError {
    fn from(err: AquaError) -> Self {
        let status = match &err {
            e if e.is_local_precondition() => StatusCode::BAD_REQUEST,
            AquaError::ModelFileDescription(_) => StatusCode::BAD_REQUEST,
            AquaError::ModelArtifactNotFound
            | AquaError::ModelProvenanceNotFound
            | AquaError::MetadataArtifactNotFound { .. } => StatusCode::NOT_FOUND,
            AquaError::ModelWithActiveDeployment | AquaError::BucketNotVersioned(_) => StatusCode::CONFLICT,
            AquaError::Service { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AquaError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            AquaError::Service { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("💀 {} {}", self.status, self.message);
        } else {
            warn!("⚠️ {} {}", self.status, self.message);
        }
        let body = json!({ "status": self.status.as_u16(), "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_each_error_family_gets_its_code() {
        let cases = [
            (AquaError::InvalidArgument("nope".into()), StatusCode::BAD_REQUEST),
            (AquaError::ModelProvenanceNotFound, StatusCode::NOT_FOUND),
            (AquaError::ModelWithActiveDeployment, StatusCode::CONFLICT),
            (
                AquaError::Service {
                    status: 429,
                    code: "TooManyRequests".into(),
                    message: "slow down".into(),
                    url: "http://x".into(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AquaError::WorkRequestFailed {
                    id: "wr".into(),
                    status: "FAILED".into(),
                    message: "boom".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status, expected);
        }
    }

    #[test]
    fn the_one_where_the_service_message_is_passed_through_untouched() {
        let http = HttpError::from(AquaError::Service {
            status: 404,
            code: "NotAuthorizedOrNotFound".into(),
            message: "Authorization failed or requested resource not found.".into(),
            url: "http://x".into(),
        });
        assert_eq!(http.status, StatusCode::NOT_FOUND);
        assert_eq!(http.message, "Authorization failed or requested resource not found.");
    }
}
