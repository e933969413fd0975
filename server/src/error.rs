//! Unified handler error type.
//!
//! Every error response carries `{"message": "<reason>"}` and is recorded on the
//! error-log target together with its status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use joblib::ERROR_LOG_TARGET;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed parameter, or an unknown action.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The runner could not be launched.
    #[error("{0}")]
    Spawn(String),

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Spawn(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<joblib::error::Error> for ServerError {
    fn from(err: joblib::error::Error) -> Self {
        use joblib::error::Error::*;
        match err {
            NotFound(_) => ServerError::NotFound(err.to_string()),
            Spawn(_) => ServerError::Spawn(err.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        error!(target: ERROR_LOG_TARGET, status = status.as_u16(), reason = %message, "request failed");
        (status, Json(json!({ "message": message }))).into_response()
    }
}
