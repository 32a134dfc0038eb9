// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP response envelopes.
//!
//! Success bodies are `{"success": true, "data": ...}`; errors are
//! `{"success": false, "error": "...", "details": ...}` with `details`
//! omitted when empty.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::governance::GovernanceError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

/// Error envelope.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            error: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        let message = err.to_string();
        match err {
            GovernanceError::Validation(_) => Self::bad_request(message),
            GovernanceError::PermissionDenied(_) => Self::new(StatusCode::FORBIDDEN, message),
            GovernanceError::NotFound(_) => Self::not_found(message),
            GovernanceError::StateConflict(_) => Self::new(StatusCode::CONFLICT, message),
            GovernanceError::NotGoverned(_) => Self::new(StatusCode::PRECONDITION_FAILED, message),
            GovernanceError::Quorum(_) => Self::unprocessable(message),
            GovernanceError::TimeLockActive { remaining_secs } => {
                Self::new(StatusCode::TOO_EARLY, message)
                    .with_details(json!({ "time_remaining_secs": remaining_secs }))
            }
            GovernanceError::Provisioning(_) | GovernanceError::Gateway(_) => {
                Self::new(StatusCode::BAD_GATEWAY, message)
            }
            GovernanceError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                Self::internal("Internal storage error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::GatewayError;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn into_response_returns_error_envelope() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "success": false, "error": "bad data" }));
    }

    #[tokio::test]
    async fn time_lock_error_carries_remaining_seconds() {
        let api: ApiError = GovernanceError::TimeLockActive { remaining_secs: 42 }.into();
        assert_eq!(api.status, StatusCode::TOO_EARLY);
        let body = body_json(api.into_response()).await;
        assert_eq!(body["details"]["time_remaining_secs"], 42);
    }

    #[test]
    fn governance_errors_map_to_status_codes() {
        let cases = [
            (GovernanceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GovernanceError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (GovernanceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GovernanceError::StateConflict("x".into()), StatusCode::CONFLICT),
            (GovernanceError::NotGoverned("x".into()), StatusCode::PRECONDITION_FAILED),
            (GovernanceError::Quorum("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (GovernanceError::Provisioning("x".into()), StatusCode::BAD_GATEWAY),
            (
                GovernanceError::Gateway(GatewayError::Rejected("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn success_envelope_wraps_data() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({ "success": true, "data": [1, 2] }));
    }
}
