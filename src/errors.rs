use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::orders::store::StoreError;
use crate::payments::GatewayError;

const GENERIC_MESSAGE: &str = "Internal server error";

/// Body of every error response: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors surfaced by the checkout handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Payment has not completed (status: {status})")]
    PaymentNotCompleted { status: String },

    #[error("Cart {0} has already been completed")]
    CartAlreadyCompleted(String),

    #[error("Payment intent {0} has already been used for another cart")]
    PaymentIntentAlreadyUsed(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Payment provider error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_)
            | ApiError::InvalidField { .. }
            | ApiError::Gateway(GatewayError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::PaymentNotCompleted { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::CartAlreadyCompleted(_) | ApiError::PaymentIntentAlreadyUsed(_) => {
                StatusCode::CONFLICT
            }
            ApiError::MalformedBody(_)
            | ApiError::Gateway(_)
            | ApiError::Storage(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side failures never leak their detail.
    pub fn response_message(&self) -> String {
        if self.status_code().is_server_error() {
            GENERIC_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("CODE: {}, ERROR: {}", status.as_u16(), self);
        } else {
            warn!("CODE: {}, ERROR: {}", status.as_u16(), self);
        }
        let body = ErrorBody {
            error: self.response_message(),
        };
        (status, Json(body)).into_response()
    }
}
