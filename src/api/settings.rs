// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Votes on account settings changes.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::{ApiError, ApiResponse, ErrorBody},
    governance::SettingsVoteOutcome,
    models::{CancelRequest, VoteRequest},
    state::AppState,
    storage::{SettingsChange, VoteType},
};

#[utoipa::path(
    get,
    path = "/v1/multisig/settings-changes/{change_id}",
    params(("change_id" = String, Path, description = "Settings change id")),
    tag = "Accounts",
    responses(
        (status = 200, body = SettingsChange),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_change(
    Path(change_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SettingsChange>>, ApiError> {
    let change = state.governance.settings.change(&change_id)?;
    Ok(ApiResponse::ok(change))
}

/// Approve a settings change; the approval that reaches quorum applies it.
#[utoipa::path(
    post,
    path = "/v1/multisig/settings-changes/{change_id}/approve",
    params(("change_id" = String, Path, description = "Settings change id")),
    request_body = VoteRequest,
    tag = "Accounts",
    responses(
        (status = 200, body = SettingsVoteOutcome),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Change is no longer pending", body = ErrorBody)
    )
)]
pub async fn approve(
    Path(change_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ApiResponse<SettingsVoteOutcome>>, ApiError> {
    let outcome = state
        .governance
        .settings
        .vote(&change_id, &request.member_key, VoteType::Approve)?;
    Ok(ApiResponse::ok(outcome))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/settings-changes/{change_id}/reject",
    params(("change_id" = String, Path, description = "Settings change id")),
    request_body = VoteRequest,
    tag = "Accounts",
    responses(
        (status = 200, body = SettingsVoteOutcome),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn reject(
    Path(change_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ApiResponse<SettingsVoteOutcome>>, ApiError> {
    let outcome = state
        .governance
        .settings
        .vote(&change_id, &request.member_key, VoteType::Reject)?;
    Ok(ApiResponse::ok(outcome))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/settings-changes/{change_id}/cancel",
    params(("change_id" = String, Path, description = "Settings change id")),
    request_body = CancelRequest,
    tag = "Accounts",
    responses(
        (status = 200, body = SettingsChange),
        (status = 403, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn cancel(
    Path(change_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<ApiResponse<SettingsChange>>, ApiError> {
    let change = state
        .governance
        .settings
        .cancel_change(&change_id, &request.requested_by)?;
    Ok(ApiResponse::ok(change))
}
