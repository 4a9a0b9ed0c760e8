//! Error taxonomy for the receiver and its storage sink.
//!
//! Every variant collapses to a generic `{"detail": ...}` body at the HTTP
//! boundary. Full error text only ever reaches the log.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::types::ErrorDetail;

pub const INVALID_PAYLOAD: &str = "Invalid JSON payload";
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum StorageError {
    /// Key is empty, absolute, or tries to escape the sink root.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    #[error("record {0:?} already exists")]
    AlreadyExists(String),

    #[error("i/o failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ReceiverError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => INVALID_PAYLOAD,
            Self::Storage(_) | Self::Unexpected(_) => INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for ReceiverError {
    fn into_response(self) -> Response {
        match &self {
            Self::MalformedPayload(e) => warn!(error = %e, "Invalid JSON payload"),
            Self::Storage(e) => error!(error = %e, "Failed to persist webhook"),
            Self::Unexpected(e) => error!(error = %e, "Error processing webhook"),
        }

        let body = ErrorDetail {
            detail: self.detail().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
