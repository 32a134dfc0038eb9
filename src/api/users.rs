// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ApiResponse},
    models::{RegisterUserRequest, RegisterWalletRequest, WalletRegistration},
    state::AppState,
    storage::UserRecord,
};

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterUserRequest,
    tag = "Registry",
    responses(
        (status = 201, description = "User registered", body = UserRecord),
        (status = 400, description = "Missing fields", body = crate::error::ErrorBody),
        (status = 409, description = "User exists with a different key", body = crate::error::ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserRecord>>), ApiError> {
    let user = state
        .governance
        .registry
        .register_user(&request.user_id, &request.public_key)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(user)))
}

#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/wallets",
    params(("user_id" = String, Path, description = "Owning user")),
    request_body = RegisterWalletRequest,
    tag = "Registry",
    responses(
        (status = 201, description = "Wallet registered", body = WalletRegistration),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
        (status = 409, description = "Wallet owned by another user", body = crate::error::ErrorBody)
    )
)]
pub async fn register_wallet(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RegisterWalletRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WalletRegistration>>), ApiError> {
    state
        .governance
        .registry
        .register_wallet(&request.address, &user_id)?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(WalletRegistration {
            address: request.address.trim().to_string(),
            user_id,
        }),
    ))
}
