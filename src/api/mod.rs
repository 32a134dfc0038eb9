// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    governance::{
        AccountHealth, BatchItem, BatchResult, ExecutionOutcome, InactiveMember, ProposalOutcome,
        ProvisionOutcome, RemovalBatch, RemovalResult, SettingsOutcome, SettingsVoteOutcome,
        TimeLockStatus, TransactionDetail, VoteOutcome,
    },
    models::{
        AccountView, CancelRequest, CreateProposalRequest, EnsureAccountRequest,
        ExecuteBatchRequest, ExecuteRequest, ProposeSettingsRequest, RecordActivityRequest,
        RegisterUserRequest, RegisterWalletRequest, RemoveMemberRequest, VoteRequest,
        WalletRegistration,
    },
    state::AppState,
    storage::{
        Approval, Capabilities, GovernanceAccount, GovernedTransaction, Member, MemberActivity,
        Proposal, ProposalStatus, ProvisioningState, SettingsChange, SettingsVote, SignerRemoval,
        TxStatus, UserRecord, VoteType,
    },
};

pub mod accounts;
pub mod health;
pub mod members;
pub mod settings;
pub mod transactions;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Registry
        .route("/users", post(users::register_user))
        .route("/users/{user_id}/wallets", post(users::register_wallet))
        // Accounts
        .route("/multisig/accounts", post(accounts::ensure_account))
        .route("/multisig/accounts/{account_id}", get(accounts::get_account))
        .route(
            "/multisig/accounts/{account_id}/health",
            get(accounts::get_health),
        )
        .route(
            "/multisig/accounts/{account_id}/settings",
            post(accounts::propose_settings_change).get(accounts::list_settings_changes),
        )
        .route(
            "/multisig/settings-changes/{change_id}",
            get(settings::get_change),
        )
        .route(
            "/multisig/settings-changes/{change_id}/approve",
            post(settings::approve),
        )
        .route(
            "/multisig/settings-changes/{change_id}/reject",
            post(settings::reject),
        )
        .route(
            "/multisig/settings-changes/{change_id}/cancel",
            post(settings::cancel),
        )
        .route(
            "/multisig/accounts/{account_id}/removals",
            get(accounts::list_removals),
        )
        .route(
            "/multisig/accounts/{account_id}/members/{member_id}/remove",
            post(accounts::remove_member),
        )
        // Transactions
        .route("/multisig/proposals", post(transactions::create_proposal))
        .route(
            "/multisig/transactions/{id}",
            get(transactions::get_transaction),
        )
        .route(
            "/multisig/transactions/{id}/submit",
            post(transactions::submit_proposal),
        )
        .route(
            "/multisig/transactions/{id}/approve",
            post(transactions::approve),
        )
        .route(
            "/multisig/transactions/{id}/reject",
            post(transactions::reject),
        )
        .route(
            "/multisig/transactions/{id}/cancel",
            post(transactions::cancel),
        )
        .route(
            "/multisig/transactions/{id}/time-lock",
            get(transactions::time_lock),
        )
        .route(
            "/multisig/transactions/{id}/execute",
            post(transactions::execute),
        )
        .route("/multisig/execute-batch", post(transactions::execute_batch))
        // Members
        .route("/multisig/members/activity", post(members::record_activity))
        .route("/multisig/members/inactive", get(members::list_inactive))
        .route(
            "/multisig/members/removal-eligible",
            get(members::list_removal_eligible),
        )
        .route(
            "/multisig/members/remove-eligible",
            post(members::remove_all_eligible),
        );

    let health_routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        users::register_user,
        users::register_wallet,
        accounts::ensure_account,
        accounts::get_account,
        accounts::get_health,
        accounts::propose_settings_change,
        accounts::list_settings_changes,
        settings::get_change,
        settings::approve,
        settings::reject,
        settings::cancel,
        accounts::list_removals,
        accounts::remove_member,
        transactions::create_proposal,
        transactions::get_transaction,
        transactions::submit_proposal,
        transactions::approve,
        transactions::reject,
        transactions::cancel,
        transactions::time_lock,
        transactions::execute,
        transactions::execute_batch,
        members::record_activity,
        members::list_inactive,
        members::list_removal_eligible,
        members::remove_all_eligible
    ),
    components(
        schemas(
            ErrorBody,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            RegisterUserRequest,
            RegisterWalletRequest,
            WalletRegistration,
            EnsureAccountRequest,
            AccountView,
            ProposeSettingsRequest,
            RemoveMemberRequest,
            CreateProposalRequest,
            VoteRequest,
            CancelRequest,
            ExecuteRequest,
            ExecuteBatchRequest,
            RecordActivityRequest,
            UserRecord,
            ProvisioningState,
            GovernanceAccount,
            Member,
            Capabilities,
            GovernedTransaction,
            TxStatus,
            Proposal,
            ProposalStatus,
            Approval,
            VoteType,
            SignerRemoval,
            MemberActivity,
            SettingsChange,
            SettingsVote,
            ProvisionOutcome,
            ProposalOutcome,
            TransactionDetail,
            SettingsOutcome,
            SettingsVoteOutcome,
            VoteOutcome,
            TimeLockStatus,
            ExecutionOutcome,
            BatchItem,
            BatchResult,
            InactiveMember,
            RemovalResult,
            RemovalBatch,
            AccountHealth
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Registry", description = "Users and wallet ownership"),
        (name = "Accounts", description = "Governance accounts, settings and signer removal"),
        (name = "Transactions", description = "Proposals, votes and execution"),
        (name = "Members", description = "Signer activity and inactivity sweeps")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::blockchain::MockGateway;
    use crate::config::GovernanceConfig;
    use crate::storage::GovernanceStore;

    struct TestApp {
        app: Router,
        _dir: TempDir,
    }

    fn test_app(executor_key: Option<&str>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            service_signer_keys: vec!["key-b".to_string(), "key-c".to_string()],
            executor_key: executor_key.map(str::to_string),
            ..GovernanceConfig::default()
        };
        let store = Arc::new(GovernanceStore::open(&config.storage_paths().governance_db()).unwrap());
        let state = AppState::new(store, Arc::new(MockGateway::new()), config);
        TestApp {
            app: router(state),
            _dir: dir,
        }
    }

    impl TestApp {
        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let request = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(body) => request
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn provision(&self) -> String {
            let (status, _) = self
                .call(
                    Method::POST,
                    "/v1/users",
                    Some(json!({ "user_id": "user-a", "public_key": "key-a" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, _) = self
                .call(
                    Method::POST,
                    "/v1/users/user-a/wallets",
                    Some(json!({ "address": "wallet-a" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, body) = self
                .call(
                    Method::POST,
                    "/v1/multisig/accounts",
                    Some(json!({ "user_id": "user-a" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["data"]["account"]["account_id"].as_str().unwrap().to_string()
        }

        async fn propose(&self) -> String {
            let (status, body) = self
                .call(
                    Method::POST,
                    "/v1/multisig/proposals",
                    Some(json!({
                        "from_wallet": "wallet-a",
                        "to_wallet": "wallet-x",
                        "amount": "10.00",
                        "currency": "EURC",
                        "requested_by": "key-a"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["data"]["governance"], "required");
            body["data"]["transaction"]["transaction_id"]
                .as_str()
                .unwrap()
                .to_string()
        }
    }

    #[tokio::test]
    async fn liveness_and_readiness_report_ok() {
        let app = test_app(None);
        let (status, body) = app.call(Method::GET, "/health/live", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = app.call(Method::GET, "/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn transfer_flows_from_proposal_to_execution() {
        let app = test_app(Some("key-b"));
        let account_id = app.provision().await;
        let tx_id = app.propose().await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/transactions/{tx_id}/approve"),
                Some(json!({ "member_key": "key-a" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "PROPOSED");

        let (_, body) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/transactions/{tx_id}/approve"),
                Some(json!({ "member_key": "key-b" })),
            )
            .await;
        assert_eq!(body["data"]["status"], "APPROVED");

        let (status, body) = app
            .call(
                Method::GET,
                &format!("/v1/multisig/transactions/{tx_id}/time-lock"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["can_execute"], true);

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/transactions/{tx_id}/execute"),
                Some(json!({ "executor_key": "key-b" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "EXECUTED");
        assert!(body["data"]["tx_hash"].is_string());

        let (_, body) = app
            .call(
                Method::GET,
                &format!("/v1/multisig/accounts/{account_id}"),
                None,
            )
            .await;
        assert_eq!(body["data"]["members"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ungoverned_wallet_does_not_require_approval() {
        let app = test_app(None);
        let (status, body) = app
            .call(
                Method::POST,
                "/v1/multisig/proposals",
                Some(json!({
                    "from_wallet": "wallet-unknown",
                    "to_wallet": "wallet-x",
                    "amount": "1",
                    "currency": "EURC",
                    "requested_by": "key-a"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["governance"], "not_required");
    }

    #[tokio::test]
    async fn unknown_transaction_returns_error_envelope() {
        let app = test_app(None);
        let (status, body) = app
            .call(Method::GET, "/v1/multisig/transactions/missing", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn execute_batch_requires_an_executor_key() {
        let app = test_app(None);
        let (status, _) = app
            .call(Method::POST, "/v1/multisig/execute-batch", Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .call(
                Method::POST,
                "/v1/multisig/execute-batch",
                Some(json!({ "executor_key": "key-b" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["processed"], 0);
    }

    #[tokio::test]
    async fn non_member_vote_is_forbidden() {
        let app = test_app(None);
        app.provision().await;
        let tx_id = app.propose().await;

        let (status, _) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/transactions/{tx_id}/reject"),
                Some(json!({ "member_key": "stranger" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn removal_that_breaks_quorum_is_unprocessable() {
        let app = test_app(None);
        let account_id = app.provision().await;
        let (_, body) = app
            .call(
                Method::GET,
                &format!("/v1/multisig/accounts/{account_id}"),
                None,
            )
            .await;
        let members = body["data"]["members"].as_array().unwrap().clone();
        let first = members[0]["member_id"].as_str().unwrap().to_string();
        let second = members[1]["member_id"].as_str().unwrap().to_string();

        let uri = |member_id: &str| {
            format!("/v1/multisig/accounts/{account_id}/members/{member_id}/remove")
        };
        let removal = json!({ "removed_by": "admin" });

        let (status, _) = app
            .call(Method::POST, &uri(&first), Some(removal.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.call(Method::POST, &uri(&second), Some(removal)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = app
            .call(
                Method::GET,
                &format!("/v1/multisig/accounts/{account_id}/removals"),
                None,
            )
            .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settings_change_needs_a_member_and_quorum() {
        let app = test_app(None);
        let account_id = app.provision().await;
        let settings_uri = format!("/v1/multisig/accounts/{account_id}/settings");

        let (status, _) = app
            .call(
                Method::POST,
                &settings_uri,
                Some(json!({ "requested_by": "stranger", "threshold": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app
            .call(Method::PUT, &settings_uri, Some(json!({ "threshold": 1 })))
            .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = app
            .call(
                Method::POST,
                &settings_uri,
                Some(json!({ "requested_by": "key-a", "threshold": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "PENDING");
        let change_id = body["data"]["change_id"].as_str().unwrap().to_string();

        let (_, body) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/settings-changes/{change_id}/approve"),
                Some(json!({ "member_key": "key-a" })),
            )
            .await;
        assert_eq!(body["data"]["change"]["status"], "PENDING");
        let (_, body) = app
            .call(Method::GET, &format!("/v1/multisig/accounts/{account_id}"), None)
            .await;
        assert_eq!(body["data"]["account"]["threshold"], 2);

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/multisig/settings-changes/{change_id}/approve"),
                Some(json!({ "member_key": "key-c" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["change"]["status"], "APPROVED");
        assert_eq!(body["data"]["applied"]["account"]["threshold"], 1);

        let (_, body) = app.call(Method::GET, &settings_uri, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn openapi_lists_governance_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/multisig/proposals"));
        assert!(doc
            .paths
            .paths
            .contains_key("/v1/multisig/transactions/{id}/execute"));
        assert!(doc
            .paths
            .paths
            .contains_key("/v1/multisig/settings-changes/{change_id}/approve"));
    }
}
