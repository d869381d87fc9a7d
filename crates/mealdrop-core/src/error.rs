use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// JSON body every error response carries.
///
/// `kind` is a stable SCREAMING_CASE discriminator clients may branch on;
/// `message` is human-readable and free to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_owned(),
            message: message.into(),
        }
    }
}

/// Build the canonical error response for a status/kind/message triple.
pub fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (status, axum::Json(ErrorBody::new(kind, message))).into_response()
}
