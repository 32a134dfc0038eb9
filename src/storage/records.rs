// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted governance records.
//!
//! Every record is stored as JSON in the embedded database. Status enums
//! serialize as SCREAMING_SNAKE_CASE so that stored rows and API payloads use
//! the same vocabulary (`PENDING`, `APPROVED`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle status of a governed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Records written, not yet proposed on-chain
    Pending,
    /// Interim marker held while on-chain registration is in flight
    Proposing,
    /// Proposed on-chain, collecting votes
    Proposed,
    /// Approval threshold reached
    Approved,
    /// Interim marker held while the gateway call is in flight
    Submitting,
    /// Executed on-chain (terminal)
    Executed,
    /// Reject threshold reached (terminal)
    Rejected,
    /// Cancelled before quorum (terminal)
    Cancelled,
    /// Gateway execution failed; may be re-attempted
    Failed,
}

impl TxStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Rejected | Self::Cancelled)
    }

    /// Statuses an executor may claim with the SUBMITTING compare-and-set.
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Approved | Self::Failed)
    }

    /// Statuses that may still be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Proposed)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Proposing => "PROPOSING",
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Submitting => "SUBMITTING",
            Self::Executed => "EXECUTED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Status of the proposal attached to a governed transaction, and of a
/// settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    /// Superseded by an account settings change
    Stale,
}

impl ProposalStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A member's vote on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Approve,
    Reject,
}

// =============================================================================
// Capabilities
// =============================================================================

/// A single member permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Propose,
    Vote,
    Execute,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Propose => f.write_str("propose"),
            Self::Vote => f.write_str("vote"),
            Self::Execute => f.write_str("execute"),
        }
    }
}

/// Fixed capability set held by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    pub propose: bool,
    pub vote: bool,
    pub execute: bool,
}

impl Capabilities {
    /// Every capability.
    pub const ALL: Capabilities = Capabilities {
        propose: true,
        vote: true,
        execute: true,
    };

    /// Co-signer capabilities (no proposing).
    pub const COSIGNER: Capabilities = Capabilities {
        propose: false,
        vote: true,
        execute: true,
    };

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Propose => self.propose,
            Capability::Vote => self.vote,
            Capability::Execute => self.execute,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Provisioning progress for a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisioningState {
    /// No governance account requested yet
    Unprovisioned,
    /// Create-key reserved; gateway confirmation outstanding (safe to retry)
    Pending { create_key: String },
    /// Governance account persisted
    Provisioned { account_id: String },
}

/// A registered wallet user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    pub user_id: String,
    /// The user's signing key, enrolled as a member on provisioning
    pub public_key: String,
    pub provisioning: ProvisioningState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(user_id: String, public_key: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            public_key,
            provisioning: ProvisioningState::Unprovisioned,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        match &self.provisioning {
            ProvisioningState::Provisioned { account_id } => Some(account_id),
            _ => None,
        }
    }
}

/// An on-chain governance account requiring N-of-M approvals.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GovernanceAccount {
    pub account_id: String,
    /// On-chain address returned by the gateway
    pub address: String,
    pub create_key: String,
    pub name: String,
    pub owner_user_id: String,
    pub threshold: u32,
    pub time_lock_secs: u64,
    pub active: bool,
    /// Last allocated transaction index (0 = none yet)
    pub transaction_index: u64,
    /// Proposals at or below this index were superseded by a settings change
    pub stale_transaction_index: u64,
    /// Signature of the account creation
    pub creation_signature: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A signer on a governance account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub member_id: String,
    pub account_id: String,
    pub public_key: String,
    pub capabilities: Capabilities,
    pub active: bool,
    /// Weak back-reference to the owning user, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn can(&self, capability: Capability) -> bool {
        self.active && self.capabilities.allows(capability)
    }
}

/// A fund movement governed by an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GovernedTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub transaction_index: u64,
    pub from_wallet: String,
    pub to_wallet: String,
    /// Decimal amount in human-readable format
    pub amount: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub requested_by: String,
    pub status: TxStatus,
    /// On-chain signature once executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Instruction returned by the gateway when the transaction was proposed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_instruction: Option<String>,
    /// Last gateway failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub execution_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Off-chain record tracking one transaction through voting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Proposal {
    pub proposal_id: String,
    pub transaction_id: String,
    pub account_id: String,
    pub transaction_index: u64,
    pub proposer_key: String,
    pub status: ProposalStatus,
    pub approve_count: u32,
    pub reject_count: u32,
    /// When the approval threshold was first reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One member's vote on one transaction (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Approval {
    pub transaction_id: String,
    pub member_id: String,
    pub member_key: String,
    pub vote: VoteType,
    /// Time the current vote type was cast
    pub voted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Audit record written when a signer is retired.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignerRemoval {
    pub removal_id: String,
    pub account_id: String,
    pub removed_member_id: String,
    pub removed_member_key: String,
    pub removed_by: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<u64>,
    /// Approved transactions sent back to voting because they lost quorum
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reopened_transactions: Vec<String>,
    pub removed_at: DateTime<Utc>,
}

/// Last observed activity for a signer key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberActivity {
    pub member_key: String,
    pub last_activity_at: DateTime<Utc>,
    /// Short label of the action that was observed
    pub last_action: String,
}

/// One member's vote on a settings change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsVote {
    pub member_id: String,
    pub member_key: String,
    pub vote: VoteType,
    pub voted_at: DateTime<Utc>,
}

/// A proposed change to an account's threshold and/or time lock.
///
/// Applied only once `threshold` active members approve it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsChange {
    pub change_id: String,
    pub account_id: String,
    pub proposer_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_lock_secs: Option<u64>,
    pub status: ProposalStatus,
    /// One entry per member, last write wins
    pub votes: Vec<SettingsVote>,
    pub approve_count: u32,
    pub reject_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TxStatus::Executed.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
        assert!(TxStatus::Cancelled.is_terminal());
        assert!(!TxStatus::Failed.is_terminal());
        assert!(!TxStatus::Submitting.is_terminal());
        assert!(!TxStatus::Approved.is_terminal());
    }

    #[test]
    fn failed_is_retriable() {
        assert!(TxStatus::Failed.is_executable());
        assert!(TxStatus::Approved.is_executable());
        assert!(!TxStatus::Submitting.is_executable());
        assert!(!TxStatus::Proposed.is_executable());
    }

    #[test]
    fn proposing_is_held_open() {
        assert!(!TxStatus::Proposing.is_terminal());
        assert!(!TxStatus::Proposing.is_cancellable());
        assert!(!TxStatus::Proposing.is_executable());
        assert_eq!(TxStatus::Proposing.to_string(), "PROPOSING");
        let json = serde_json::to_string(&TxStatus::Proposing).unwrap();
        assert_eq!(json, "\"PROPOSING\"");
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&TxStatus::Submitting).unwrap();
        assert_eq!(json, "\"SUBMITTING\"");
        let vote: VoteType = serde_json::from_str("\"REJECT\"").unwrap();
        assert_eq!(vote, VoteType::Reject);
    }

    #[test]
    fn inactive_member_has_no_capabilities() {
        let mut member = Member {
            member_id: "m1".to_string(),
            account_id: "a1".to_string(),
            public_key: "key".to_string(),
            capabilities: Capabilities::COSIGNER,
            active: true,
            user_id: None,
            added_at: Utc::now(),
            deactivated_at: None,
        };
        assert!(member.can(Capability::Vote));
        assert!(!member.can(Capability::Propose));

        member.active = false;
        assert!(!member.can(Capability::Vote));
    }

    #[test]
    fn provisioning_state_is_tagged() {
        let state = ProvisioningState::Pending {
            create_key: "ck".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["create_key"], "ck");
    }
}
