// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Engine results
//! (`VoteOutcome`, `TimeLockStatus`, `BatchResult`, ...) are serialized as
//! they are; this module only holds what the HTTP layer adds.
//!
//! ## Model Categories
//!
//! - **Registry**: users and wallet ownership
//! - **Accounts**: provisioning, settings changes and signer removal
//! - **Transactions**: proposals, votes, cancellation and execution
//! - **Members**: activity reporting

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::governance::TransferRequest;
use crate::storage::{GovernanceAccount, Member};

// =============================================================================
// Registry Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub user_id: String,
    /// Signing key enrolled as a member when the account is provisioned
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterWalletRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WalletRegistration {
    pub address: String,
    pub user_id: String,
}

// =============================================================================
// Account Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnsureAccountRequest {
    pub user_id: String,
}

/// Governance account with its members.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountView {
    pub account: GovernanceAccount,
    pub members: Vec<Member>,
}

/// Opens a settings change; it takes effect once approved by quorum.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProposeSettingsRequest {
    /// Public key of a member holding `propose`
    pub requested_by: String,
    #[serde(default)]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub time_lock_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveMemberRequest {
    /// Identity of whoever requested the removal
    pub removed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Transaction Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProposalRequest {
    pub from_wallet: String,
    pub to_wallet: String,
    /// Decimal amount, e.g. "12.50"
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Public key of the proposing member
    pub requested_by: String,
}

impl From<CreateProposalRequest> for TransferRequest {
    fn from(request: CreateProposalRequest) -> Self {
        TransferRequest {
            from_wallet: request.from_wallet,
            to_wallet: request.to_wallet,
            amount: request.amount,
            currency: request.currency,
            notes: request.notes,
            requested_by: request.requested_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub member_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub requested_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    pub executor_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExecuteBatchRequest {
    /// Defaults to the configured executor key
    #[serde(default)]
    pub executor_key: Option<String>,
}

// =============================================================================
// Member Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordActivityRequest {
    pub member_key: String,
    /// Label of the observed action
    #[serde(default)]
    pub action: Option<String>,
}
