use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Everything that can abort a decision cycle, classified by how it is
/// surfaced to the caller. Collaborator failures are never recovered inside
/// the pipeline; the cycle aborts with one of these.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The caller's request failed validation.
    #[error("invalid request: {0}")]
    ClientInput(String),

    /// Network error or non-2xx from an analyzer/advisor/sizer.
    #[error("{agent} agent unavailable: {reason}")]
    CollaboratorUnavailable { agent: &'static str, reason: String },

    /// A collaborator replied, but the payload violates its schema.
    #[error("{agent} agent returned an invalid payload: {reason}")]
    CollaboratorContract { agent: &'static str, reason: String },

    /// The exchange replied with a terminal non-filled status or a 4xx.
    #[error("exchange rejected the order ({status}): {detail}")]
    ExchangeRejected { status: String, detail: String },

    /// The exchange call dropped after send. The order may or may not have
    /// executed; operator intervention is required.
    #[error("exchange state unknown after send: {0}")]
    ExchangeUnknown(String),

    /// Receipt could not be written after a confirmed fill.
    #[error("receipt persistence failed: {0}")]
    Persistence(String),

    /// A collaborator call or the whole cycle exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The exchange client is disabled (startup ping failed).
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl CycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CycleError::ClientInput(_) => StatusCode::BAD_REQUEST,
            CycleError::CollaboratorUnavailable { .. } => StatusCode::BAD_GATEWAY,
            CycleError::CollaboratorContract { .. } => StatusCode::BAD_GATEWAY,
            CycleError::ExchangeRejected { .. } => StatusCode::BAD_GATEWAY,
            CycleError::ExchangeUnknown(_) => StatusCode::GATEWAY_TIMEOUT,
            CycleError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CycleError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CycleError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for CycleError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            CycleError::ClientInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CycleError::CollaboratorUnavailable {
                agent: "risk",
                reason: "connection refused".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            CycleError::Timeout("cycle deadline".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            CycleError::Unavailable("exchange disabled".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
