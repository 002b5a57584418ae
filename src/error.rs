//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type. On the WebSocket path every
//! variant is non-fatal to the connection and only logged; on the REST path
//! each variant maps to an HTTP status code and a structured JSON body.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ListingId, NotificationId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "notification not found: 12",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                 |
/// |-----------|-------------------|-----------------------------|
/// | 1000–1999 | Protocol / input  | 400 Bad Request             |
/// | 2000–2999 | Not found / auth  | 404 / 401 / 403             |
/// | 3000–3999 | Server            | 500 / 502 / 504             |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Inbound frame is not a `{"type", "payload"}` JSON object.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Payload does not match the shape required by its event type.
    #[error("malformed {event_type} payload: {reason}")]
    MalformedPayload {
        /// Event type whose payload failed to decode.
        event_type: String,
        /// Decoder message.
        reason: String,
    },

    /// No handler is registered for the event type.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Recipient lookup for a listing failed.
    #[error("recipient lookup failed for listing {listing_id}: {reason}")]
    LookupFailed {
        /// Listing whose recipients could not be resolved.
        listing_id: ListingId,
        /// Underlying failure.
        reason: String,
    },

    /// Listing does not exist, so it has no agent.
    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    /// Notification store failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Handler lookups and writes did not finish in time.
    #[error("handler timed out after {0:?}")]
    HandlerTimeout(Duration),

    /// Notification with the given ID was not found for the caller.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// Missing or unknown session token.
    #[error("unauthorized")]
    Unauthorized,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedEnvelope(_) => 1002,
            Self::MalformedPayload { .. } => 1003,
            Self::UnknownEventType(_) => 1004,
            Self::NotificationNotFound(_) => 2001,
            Self::ListingNotFound(_) => 2002,
            Self::Unauthorized => 2401,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::LookupFailed { .. } => 3002,
            Self::HandlerTimeout(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedEnvelope(_)
            | Self::MalformedPayload { .. }
            | Self::UnknownEventType(_) => StatusCode::BAD_REQUEST,
            Self::NotificationNotFound(_) | Self::ListingNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::LookupFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::HandlerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<sqlx::Error> for HubError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
