// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    error::{ApiError, ApiResponse, ErrorBody},
    governance::{InactiveMember, RemovalBatch},
    models::RecordActivityRequest,
    state::AppState,
    storage::MemberActivity,
};

#[utoipa::path(
    post,
    path = "/v1/multisig/members/activity",
    request_body = RecordActivityRequest,
    tag = "Members",
    responses(
        (status = 200, body = MemberActivity),
        (status = 404, description = "Key is not a member of any account", body = ErrorBody)
    )
)]
pub async fn record_activity(
    State(state): State<AppState>,
    Json(request): Json<RecordActivityRequest>,
) -> Result<Json<ApiResponse<MemberActivity>>, ApiError> {
    let action = request.action.as_deref().unwrap_or("heartbeat");
    let activity = state
        .governance
        .inactivity
        .record_activity(&request.member_key, action)?;
    Ok(ApiResponse::ok(activity))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/members/inactive",
    tag = "Members",
    responses((status = 200, body = [InactiveMember]))
)]
pub async fn list_inactive(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<InactiveMember>>>, ApiError> {
    Ok(ApiResponse::ok(state.governance.inactivity.list_inactive()?))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/members/removal-eligible",
    tag = "Members",
    responses((status = 200, body = [InactiveMember]))
)]
pub async fn list_removal_eligible(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<InactiveMember>>>, ApiError> {
    Ok(ApiResponse::ok(
        state.governance.inactivity.list_removal_eligible()?,
    ))
}

/// Remove every removal-eligible member whose account keeps quorum.
#[utoipa::path(
    post,
    path = "/v1/multisig/members/remove-eligible",
    tag = "Members",
    responses((status = 200, body = RemovalBatch))
)]
pub async fn remove_all_eligible(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RemovalBatch>>, ApiError> {
    let batch = state.governance.inactivity.remove_all_eligible()?;
    Ok(ApiResponse::ok(batch))
}
