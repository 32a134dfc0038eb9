// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ApiResponse, ErrorBody},
    governance::{AccountHealth, GovernanceError, ProvisionOutcome},
    models::{AccountView, EnsureAccountRequest, ProposeSettingsRequest, RemoveMemberRequest},
    state::AppState,
    storage::{SettingsChange, SignerRemoval, StoreReader},
};

/// Return the user's governance account, provisioning it on first use.
#[utoipa::path(
    post,
    path = "/v1/multisig/accounts",
    request_body = EnsureAccountRequest,
    tag = "Accounts",
    responses(
        (status = 201, description = "Account provisioned", body = ProvisionOutcome),
        (status = 200, description = "Account already existed", body = ProvisionOutcome),
        (status = 404, description = "Unknown user", body = ErrorBody),
        (status = 502, description = "Gateway failed; retry is safe", body = ErrorBody)
    )
)]
pub async fn ensure_account(
    State(state): State<AppState>,
    Json(request): Json<EnsureAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProvisionOutcome>>), ApiError> {
    let outcome = state
        .governance
        .provisioner
        .ensure_account(&request.user_id)
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, ApiResponse::ok(outcome)))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/accounts/{account_id}",
    params(("account_id" = String, Path, description = "Governance account id")),
    tag = "Accounts",
    responses(
        (status = 200, body = AccountView),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_account(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccountView>>, ApiError> {
    let read = state.store.read().map_err(GovernanceError::from)?;
    let account = read
        .account(&account_id)
        .map_err(GovernanceError::from)?
        .ok_or_else(|| ApiError::not_found(format!("Account not found: {account_id}")))?;
    let members = read.members(&account_id).map_err(GovernanceError::from)?;
    Ok(ApiResponse::ok(AccountView { account, members }))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/accounts/{account_id}/health",
    params(("account_id" = String, Path, description = "Governance account id")),
    tag = "Accounts",
    responses(
        (status = 200, body = AccountHealth),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_health(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccountHealth>>, ApiError> {
    let health = state.governance.inactivity.get_health(&account_id)?;
    Ok(ApiResponse::ok(health))
}

/// Propose a threshold and/or time-lock change. It is applied once approved
/// by the account's current threshold of active members.
#[utoipa::path(
    post,
    path = "/v1/multisig/accounts/{account_id}/settings",
    params(("account_id" = String, Path, description = "Governance account id")),
    request_body = ProposeSettingsRequest,
    tag = "Accounts",
    responses(
        (status = 201, body = SettingsChange),
        (status = 400, description = "Threshold out of range", body = ErrorBody),
        (status = 403, description = "Requester is not a proposing member", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn propose_settings_change(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ProposeSettingsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SettingsChange>>), ApiError> {
    let change = state.governance.settings.propose_change(
        &account_id,
        &request.requested_by,
        request.threshold,
        request.time_lock_secs,
    )?;
    Ok((StatusCode::CREATED, ApiResponse::ok(change)))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/accounts/{account_id}/settings",
    params(("account_id" = String, Path, description = "Governance account id")),
    tag = "Accounts",
    responses(
        (status = 200, body = [SettingsChange]),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn list_settings_changes(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SettingsChange>>>, ApiError> {
    let changes = state.governance.settings.changes(&account_id)?;
    Ok(ApiResponse::ok(changes))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/accounts/{account_id}/removals",
    params(("account_id" = String, Path, description = "Governance account id")),
    tag = "Accounts",
    responses(
        (status = 200, body = [SignerRemoval]),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn list_removals(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SignerRemoval>>>, ApiError> {
    let removals = state.governance.inactivity.removals(&account_id)?;
    Ok(ApiResponse::ok(removals))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/accounts/{account_id}/members/{member_id}/remove",
    params(
        ("account_id" = String, Path, description = "Governance account id"),
        ("member_id" = String, Path, description = "Member to deactivate")
    ),
    request_body = RemoveMemberRequest,
    tag = "Accounts",
    responses(
        (status = 200, body = SignerRemoval),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Member already inactive", body = ErrorBody),
        (status = 422, description = "Removal would break quorum", body = ErrorBody)
    )
)]
pub async fn remove_member(
    Path((account_id, member_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(request): Json<RemoveMemberRequest>,
) -> Result<Json<ApiResponse<SignerRemoval>>, ApiError> {
    let removal = state.governance.inactivity.remove_member(
        &account_id,
        &member_id,
        &request.removed_by,
        request.reason.as_deref().unwrap_or_default(),
    )?;
    Ok(ApiResponse::ok(removal))
}
