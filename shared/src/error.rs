use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::types::ApiResponse;

/// Error codes returned in the `error.code` field of the response envelope.
/// Stable strings, safe to match on from client code.
pub mod codes {
    pub const VALIDATION: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INSUFFICIENT_STOCK: &str = "INSUFFICIENT_STOCK";
    pub const INSUFFICIENT_RESERVED_STOCK: &str = "INSUFFICIENT_RESERVED_STOCK";
    pub const UNKNOWN_DIRECTION: &str = "UNKNOWN_DIRECTION";
    pub const MISSING_REFERENCE: &str = "MISSING_REFERENCE";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INTERNAL: &str = "INTERNAL_ERROR";
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock for variant {variant_id} at location {location_id}: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: i64,
        location_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("insufficient reserved stock for variant {variant_id} at location {location_id}: requested release {requested}, reserved {reserved}")]
    InsufficientReservedStock {
        variant_id: i64,
        location_id: i64,
        requested: i64,
        reserved: i64,
    },

    /// Aggregate shortfall across every location considered for a
    /// reservation create — the per-variant breakdown the HTTP surface
    /// must expose so the client can present shortages.
    #[error("insufficient stock to satisfy reservation")]
    ReservationShortfall { details: Vec<StockShortfall> },

    #[error("unknown transaction direction for transaction type {0:?}")]
    UnknownDirection(String),

    #[error("reference_id is required for transaction type {0:?}")]
    MissingReference(String),

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StockShortfall {
    pub variant_id: i64,
    pub requested: i64,
    pub total_available: i64,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::InsufficientStock { .. }
            | Error::InsufficientReservedStock { .. }
            | Error::ReservationShortfall { .. }
            | Error::UnknownDirection(_)
            | Error::MissingReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => codes::NOT_FOUND,
            Error::Validation(_) => codes::VALIDATION,
            Error::InsufficientStock { .. } | Error::ReservationShortfall { .. } => codes::INSUFFICIENT_STOCK,
            Error::InsufficientReservedStock { .. } => codes::INSUFFICIENT_RESERVED_STOCK,
            Error::UnknownDirection(_) => codes::UNKNOWN_DIRECTION,
            Error::MissingReference(_) => codes::MISSING_REFERENCE,
            Error::Forbidden => codes::FORBIDDEN,
            _ => codes::INTERNAL,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::ReservationShortfall { details } => serde_json::to_value(details).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "unhandled error");
        }
        let mut body = ApiResponse::<()>::error(self.code().to_string(), self.to_string());
        if let Some(error) = body.error.as_mut() {
            error.details = self.details();
        }
        (self.status_code(), Json(body)).into_response()
    }
}
