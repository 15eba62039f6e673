//! Error taxonomy shared by every pipeline stage and collaborator.
//!
//! Stages never render error bodies themselves. Converting an [`AppError`] into a
//! response stores the error in the response extensions; the terminal error
//! stage ([`crate::api::middleware::errors`]) picks it up and decides the final
//! client-visible shape exactly once.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

/// Message shown for programming faults when details must not leak.
pub const GENERIC_FAULT_MESSAGE: &str = "Something went very wrong!";

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Malformed client input.
    #[error("{message}")]
    Validation { message: String, details: Value },

    /// Body exceeded the configured cap.
    #[error("{message}")]
    PayloadTooLarge { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("{message}")]
    TooManyRequests { message: String, details: Value },

    /// Expected failure raised on purpose by a collaborator, with its own status.
    #[error("{message}")]
    Operational {
        status: StatusCode,
        message: String,
        details: Value,
    },

    /// Programming fault: unexpected, never raised intentionally.
    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn payload_too_large(message: impl Into<String>, details: Value) -> Self {
        Self::PayloadTooLarge {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn too_many_requests(message: impl Into<String>, details: Value) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            details,
        }
    }
    /// Collaborator-raised failure. Statuses below 400 are clamped to 500.
    pub fn operational(status: StatusCode, message: impl Into<String>, details: Value) -> Self {
        let status = if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::Operational {
            status,
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Wraps a bodiless error status produced by a library layer
    /// (e.g. `405 Method Not Allowed` from the router).
    pub fn from_status(status: StatusCode) -> Self {
        let message = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
        if status.is_server_error() {
            Self::internal(message, json!({ "status": status.as_u16() }))
        } else {
            Self::operational(status, message, Value::Null)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Operational { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NotFound { .. } => "not_found",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Operational { .. } => "operational_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether the message is safe to show to clients in production.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::PayloadTooLarge { message, .. }
            | Self::NotFound { message, .. }
            | Self::TooManyRequests { message, .. }
            | Self::Operational { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn details(&self) -> &Value {
        match self {
            Self::Validation { details, .. }
            | Self::PayloadTooLarge { details, .. }
            | Self::NotFound { details, .. }
            | Self::TooManyRequests { details, .. }
            | Self::Operational { details, .. }
            | Self::Internal { details, .. } => details,
        }
    }

    /// `fail` for client errors, `error` for server errors.
    pub fn status_label(&self) -> &'static str {
        if self.status().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Message a client may see; programming faults collapse to a generic one
    /// unless `verbose` is set.
    pub fn public_message(&self, verbose: bool) -> &str {
        if verbose || self.is_operational() {
            self.message()
        } else {
            GENERIC_FAULT_MESSAGE
        }
    }

    /// Builds the JSON body for API clients.
    pub fn to_json(&self, verbose: bool) -> ErrorBody<'_> {
        ErrorBody {
            status: self.status_label(),
            message: self.public_message(verbose),
            error: verbose.then(|| ErrorInfo {
                code: self.code(),
                status_code: self.status().as_u16(),
                is_operational: self.is_operational(),
                details: self.details(),
            }),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorInfo<'a> {
    code: &'static str,
    status_code: u16,
    is_operational: bool,
    details: &'a Value,
}

impl IntoResponse for AppError {
    /// Produces the production-safe JSON shape and attaches the error itself,
    /// so the terminal stage can re-render it for the request's mode and path.
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.to_json(false))).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::bad_request("Invalid input data", json!({ "reason": e.to_string() }))
    }
}
