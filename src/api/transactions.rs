// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Proposal, vote and execution endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ApiResponse, ErrorBody},
    governance::{
        BatchResult, ExecutionOutcome, GovernanceError, ProposalOutcome, TimeLockStatus,
        TransactionDetail, VoteOutcome,
    },
    models::{CancelRequest, CreateProposalRequest, ExecuteBatchRequest, ExecuteRequest, VoteRequest},
    state::AppState,
    storage::{GovernedTransaction, VoteType},
};

/// Create a transfer. Governed accounts get a PROPOSED transaction; other
/// wallets are reported as not requiring governance.
#[utoipa::path(
    post,
    path = "/v1/multisig/proposals",
    request_body = CreateProposalRequest,
    tag = "Transactions",
    responses(
        (status = 201, description = "Governed transaction created", body = ProposalOutcome),
        (status = 200, description = "Wallet is not governed", body = ProposalOutcome),
        (status = 400, body = ErrorBody),
        (status = 403, description = "Requester is not a proposing member", body = ErrorBody)
    )
)]
pub async fn create_proposal(
    State(state): State<AppState>,
    Json(request): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProposalOutcome>>), ApiError> {
    let outcome = state
        .governance
        .proposals
        .create_transfer_proposal(request.into())
        .await?;
    let status = match outcome {
        ProposalOutcome::NotRequired => StatusCode::OK,
        ProposalOutcome::Required { .. } => StatusCode::CREATED,
    };
    Ok((status, ApiResponse::ok(outcome)))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/transactions/{id}",
    params(("id" = String, Path, description = "Transaction id")),
    tag = "Transactions",
    responses(
        (status = 200, body = TransactionDetail),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TransactionDetail>>, ApiError> {
    let detail = state.governance.proposals.transaction_detail(&id)?;
    Ok(ApiResponse::ok(detail))
}

/// Retry the on-chain proposal of a PENDING transaction.
#[utoipa::path(
    post,
    path = "/v1/multisig/transactions/{id}/submit",
    params(("id" = String, Path, description = "Transaction id")),
    tag = "Transactions",
    responses(
        (status = 200, body = GovernedTransaction),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Transaction is not PENDING", body = ErrorBody),
        (status = 502, body = ErrorBody)
    )
)]
pub async fn submit_proposal(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<GovernedTransaction>>, ApiError> {
    let tx = state.governance.proposals.submit_proposal(&id).await?;
    Ok(ApiResponse::ok(tx))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/transactions/{id}/approve",
    params(("id" = String, Path, description = "Transaction id")),
    request_body = VoteRequest,
    tag = "Transactions",
    responses(
        (status = 200, body = VoteOutcome),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn approve(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ApiResponse<VoteOutcome>>, ApiError> {
    cast_vote(&state, &id, &request.member_key, VoteType::Approve).await
}

#[utoipa::path(
    post,
    path = "/v1/multisig/transactions/{id}/reject",
    params(("id" = String, Path, description = "Transaction id")),
    request_body = VoteRequest,
    tag = "Transactions",
    responses(
        (status = 200, body = VoteOutcome),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn reject(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ApiResponse<VoteOutcome>>, ApiError> {
    cast_vote(&state, &id, &request.member_key, VoteType::Reject).await
}

async fn cast_vote(
    state: &AppState,
    id: &str,
    member_key: &str,
    vote: VoteType,
) -> Result<Json<ApiResponse<VoteOutcome>>, ApiError> {
    let outcome = state.governance.approvals.vote(id, member_key, vote).await?;
    Ok(ApiResponse::ok(outcome))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/transactions/{id}/cancel",
    params(("id" = String, Path, description = "Transaction id")),
    request_body = CancelRequest,
    tag = "Transactions",
    responses(
        (status = 200, body = GovernedTransaction),
        (status = 403, body = ErrorBody),
        (status = 409, description = "Transaction can no longer be cancelled", body = ErrorBody)
    )
)]
pub async fn cancel(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<ApiResponse<GovernedTransaction>>, ApiError> {
    let tx = state.governance.proposals.cancel(&id, &request.requested_by)?;
    Ok(ApiResponse::ok(tx))
}

#[utoipa::path(
    get,
    path = "/v1/multisig/transactions/{id}/time-lock",
    params(("id" = String, Path, description = "Transaction id")),
    tag = "Transactions",
    responses(
        (status = 200, body = TimeLockStatus),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn time_lock(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TimeLockStatus>>, ApiError> {
    let status = state.governance.time_lock.can_execute(&id)?;
    Ok(ApiResponse::ok(status))
}

#[utoipa::path(
    post,
    path = "/v1/multisig/transactions/{id}/execute",
    params(("id" = String, Path, description = "Transaction id")),
    request_body = ExecuteRequest,
    tag = "Transactions",
    responses(
        (status = 200, body = ExecutionOutcome),
        (status = 409, body = ErrorBody),
        (status = 422, description = "Quorum not reached", body = ErrorBody),
        (status = 425, description = "Time lock still running", body = ErrorBody),
        (status = 502, body = ErrorBody)
    )
)]
pub async fn execute(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ApiResponse<ExecutionOutcome>>, ApiError> {
    let outcome = state
        .governance
        .executor
        .execute_one(&id, &request.executor_key)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Execute every APPROVED transaction whose time lock has elapsed.
#[utoipa::path(
    post,
    path = "/v1/multisig/execute-batch",
    request_body = ExecuteBatchRequest,
    tag = "Transactions",
    responses(
        (status = 200, body = BatchResult),
        (status = 400, description = "No executor key given or configured", body = ErrorBody)
    )
)]
pub async fn execute_batch(
    State(state): State<AppState>,
    Json(request): Json<ExecuteBatchRequest>,
) -> Result<Json<ApiResponse<BatchResult>>, ApiError> {
    let executor_key = request
        .executor_key
        .or_else(|| state.config.executor_key.clone())
        .ok_or_else(|| GovernanceError::Validation("executor_key is required".to_string()))?;
    let result = state.governance.executor.execute_batch(&executor_key).await?;
    Ok(ApiResponse::ok(result))
}
