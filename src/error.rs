// Error taxonomy for the ingestion and query pipelines.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Write-path failure. The ingestion loop treats this as non-fatal: the
/// window is lost, the loop continues.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Read-path failure, surfaced to the transport layer as a client or server
/// error depending on cause.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("unknown user id: {0}")]
    UnknownUser(i64),

    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("response encoding failure: {0}")]
    Encoding(#[from] CodecError),
}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::InvalidInterval(_)
            | QueryError::InvalidChannel(_)
            | QueryError::UnknownUser(_) => StatusCode::BAD_REQUEST,
            QueryError::Storage(_) | QueryError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Malformed wire payload on decode. No partial data is returned.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("missing '{0}' key in payload")]
    MissingKey(&'static str),

    #[error("array length mismatch: {timestamps} timestamps, {values} values")]
    LengthMismatch { timestamps: usize, values: usize },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}
