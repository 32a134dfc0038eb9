// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Proposal Lifecycle Manager
//!
//! Turns transfer requests into governed transactions.
//!
//! ## Governance Decision
//!
//! Any outbound movement from a wallet owned by a registered user needs
//! approval, whatever the destination. Wallets with no registered owner are
//! reported as not requiring governance.
//!
//! ## Index Allocation
//!
//! The next transaction index is `account.transaction_index + 1`, allocated
//! in the same write transaction that persists the transaction and proposal.
//! Indices are never reused, even after cancellation.
//!
//! ## On-chain Submission
//!
//! After the records are written (PENDING) the submitter claims the
//! transaction by moving it to PROPOSING, registers it with the Blockchain
//! Gateway and proposes it; success moves it to PROPOSED. A gateway failure
//! releases the claim back to PENDING and [`ProposalManager::submit_proposal`]
//! retries. Only the caller that won the PENDING → PROPOSING compare-and-set
//! talks to the gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{GovernanceError, GovernanceResult};
use super::inactivity::touch;
use crate::blockchain::{with_timeout, BlockchainGateway, GatewayError, TransferParams};
use crate::storage::{
    Approval, Capability, GovernanceAccount, GovernanceStore, GovernedTransaction, Proposal,
    ProposalStatus, StoreReader, TxStatus,
};

/// Input for [`ProposalManager::create_transfer_proposal`].
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_wallet: String,
    pub to_wallet: String,
    pub amount: String,
    pub currency: String,
    pub notes: Option<String>,
    /// Public key of the member requesting the transfer
    pub requested_by: String,
}

/// Result of [`ProposalManager::create_transfer_proposal`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "governance", rename_all = "snake_case")]
pub enum ProposalOutcome {
    /// The source wallet has no registered owner; no approval is needed.
    NotRequired,
    Required {
        transaction: GovernedTransaction,
        proposal: Proposal,
        /// Gateway failure that left the transaction PENDING
        #[serde(skip_serializing_if = "Option::is_none")]
        submission_error: Option<String>,
    },
}

/// Transaction with its proposal and votes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionDetail {
    pub transaction: GovernedTransaction,
    pub proposal: Proposal,
    pub approvals: Vec<Approval>,
}

/// Validate a positive decimal amount and return it trimmed.
pub(crate) fn validate_amount(amount: &str) -> GovernanceResult<String> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let well_formed = !amount.is_empty()
        && !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
        && !(amount.contains('.') && fraction.is_empty());
    if !well_formed {
        return Err(GovernanceError::Validation(format!("Invalid amount: {amount:?}")));
    }
    if amount.chars().all(|c| c == '0' || c == '.') {
        return Err(GovernanceError::Validation("Amount must be positive".to_string()));
    }
    Ok(amount.to_string())
}

fn required(field: &str, value: &str) -> GovernanceResult<()> {
    if value.trim().is_empty() {
        return Err(GovernanceError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProposalManager {
    store: Arc<GovernanceStore>,
    gateway: Arc<dyn BlockchainGateway>,
    gateway_timeout: Duration,
}

impl ProposalManager {
    pub fn new(
        store: Arc<GovernanceStore>,
        gateway: Arc<dyn BlockchainGateway>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout,
        }
    }

    pub async fn create_transfer_proposal(
        &self,
        request: TransferRequest,
    ) -> GovernanceResult<ProposalOutcome> {
        self.create_transfer_proposal_at(request, Utc::now()).await
    }

    pub async fn create_transfer_proposal_at(
        &self,
        request: TransferRequest,
        now: DateTime<Utc>,
    ) -> GovernanceResult<ProposalOutcome> {
        required("from_wallet", &request.from_wallet)?;
        required("to_wallet", &request.to_wallet)?;
        required("currency", &request.currency)?;
        required("requested_by", &request.requested_by)?;
        let amount = validate_amount(&request.amount)?;

        let account_id = {
            let read = self.store.read()?;
            let Some(owner_id) = read.wallet_owner(&request.from_wallet)? else {
                info!(from_wallet = %request.from_wallet, "Source wallet not governed");
                return Ok(ProposalOutcome::NotRequired);
            };
            let owner = read
                .user(&owner_id)?
                .ok_or_else(|| GovernanceError::not_found("User", &owner_id))?;
            owner.account_id().map(str::to_string).ok_or_else(|| {
                GovernanceError::NotGoverned(format!(
                    "User {owner_id} has no governance account; provision one first"
                ))
            })?
        };

        let (transaction, proposal) = self.store.write(|w| {
            let mut account = w
                .account(&account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", &account_id))?;
            if !account.active {
                return Err(GovernanceError::NotGoverned(format!(
                    "Governance account {account_id} is deactivated"
                )));
            }
            let proposer = w.member_by_key(&account_id, &request.requested_by)?;
            if !proposer.is_some_and(|m| m.can(Capability::Propose)) {
                return Err(GovernanceError::PermissionDenied(format!(
                    "{} may not propose on account {account_id}",
                    request.requested_by
                )));
            }

            account.transaction_index += 1;
            account.updated_at = now;
            let index = account.transaction_index;

            let transaction = GovernedTransaction {
                transaction_id: Uuid::new_v4().to_string(),
                account_id: account_id.clone(),
                transaction_index: index,
                from_wallet: request.from_wallet.clone(),
                to_wallet: request.to_wallet.clone(),
                amount: amount.clone(),
                currency: request.currency.clone(),
                notes: request.notes.clone(),
                requested_by: request.requested_by.clone(),
                status: TxStatus::Pending,
                tx_hash: None,
                proposal_instruction: None,
                failure_reason: None,
                execution_attempts: 0,
                executed_by: None,
                executed_at: None,
                created_at: now,
                updated_at: now,
            };
            let proposal = Proposal {
                proposal_id: Uuid::new_v4().to_string(),
                transaction_id: transaction.transaction_id.clone(),
                account_id: account_id.clone(),
                transaction_index: index,
                proposer_key: request.requested_by.clone(),
                status: ProposalStatus::Pending,
                approve_count: 0,
                reject_count: 0,
                approved_at: None,
                created_at: now,
                updated_at: now,
            };

            w.put_account(&account)?;
            w.put_transaction(&transaction)?;
            w.put_proposal(&proposal)?;
            touch(w, &request.requested_by, "propose", now)?;
            Ok((transaction, proposal))
        })?;

        info!(
            transaction_id = %transaction.transaction_id,
            account_id = %transaction.account_id,
            transaction_index = transaction.transaction_index,
            "Governed transaction created"
        );

        match self.submit(&transaction.transaction_id, now).await {
            Ok(proposed) => Ok(ProposalOutcome::Required {
                transaction: proposed,
                proposal,
                submission_error: None,
            }),
            Err(GovernanceError::Gateway(e)) => {
                warn!(
                    transaction_id = %transaction.transaction_id,
                    error = %e,
                    "On-chain proposal failed; transaction left PENDING"
                );
                let transaction = self.current(&transaction.transaction_id)?;
                Ok(ProposalOutcome::Required {
                    transaction,
                    proposal,
                    submission_error: Some(e.to_string()),
                })
            }
            Err(GovernanceError::StateConflict(reason)) => {
                // a concurrent submit_proposal claimed it first
                debug!(transaction_id = %transaction.transaction_id, %reason, "Submission already in progress");
                let transaction = self.current(&transaction.transaction_id)?;
                Ok(ProposalOutcome::Required {
                    transaction,
                    proposal,
                    submission_error: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Retry on-chain registration of a PENDING transaction.
    pub async fn submit_proposal(&self, transaction_id: &str) -> GovernanceResult<GovernedTransaction> {
        self.submit(transaction_id, Utc::now()).await
    }

    async fn submit(&self, transaction_id: &str, now: DateTime<Utc>) -> GovernanceResult<GovernedTransaction> {
        let (tx, account) = self.claim_for_proposal(transaction_id, now)?;

        let instruction = match self.register_on_chain(&tx, &account).await {
            Ok(instruction) => instruction,
            Err(e) => {
                if let Err(release_err) = self.release_claim(transaction_id, &e, now) {
                    error!(
                        transaction_id = %transaction_id,
                        error = %release_err,
                        "Failed to release PROPOSING claim; transaction needs manual recovery"
                    );
                }
                return Err(e);
            }
        };

        let proposed = self.store.write(|w| {
            let mut current = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            if current.status != TxStatus::Proposing {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} became {} during submission",
                    current.status
                )));
            }
            current.status = TxStatus::Proposed;
            current.proposal_instruction = Some(instruction.clone());
            current.failure_reason = None;
            current.updated_at = now;
            w.put_transaction(&current)?;
            Ok(current)
        })?;

        info!(
            transaction_id = %transaction_id,
            transaction_index = proposed.transaction_index,
            "Transaction proposed on-chain"
        );
        Ok(proposed)
    }

    /// Compare-and-set PENDING → PROPOSING so only one caller registers the
    /// transaction with the gateway.
    fn claim_for_proposal(
        &self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<(GovernedTransaction, GovernanceAccount)> {
        self.store.write(|w| {
            let mut tx = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            if tx.status != TxStatus::Pending {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} is {}, expected PENDING",
                    tx.status
                )));
            }
            let account = w
                .account(&tx.account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", &tx.account_id))?;
            tx.status = TxStatus::Proposing;
            tx.updated_at = now;
            w.put_transaction(&tx)?;
            Ok((tx, account))
        })
    }

    /// Return a PROPOSING transaction to PENDING after a gateway failure.
    fn release_claim(
        &self,
        transaction_id: &str,
        cause: &GovernanceError,
        now: DateTime<Utc>,
    ) -> GovernanceResult<()> {
        self.store.write(|w| {
            let Some(mut tx) = w.transaction(transaction_id)? else {
                return Ok(());
            };
            if tx.status == TxStatus::Proposing {
                tx.status = TxStatus::Pending;
                tx.failure_reason = Some(cause.to_string());
                tx.updated_at = now;
                w.put_transaction(&tx)?;
            }
            Ok(())
        })
    }

    /// Register the transfer with the gateway and propose it.
    async fn register_on_chain(
        &self,
        tx: &GovernedTransaction,
        account: &GovernanceAccount,
    ) -> GovernanceResult<String> {
        let created = with_timeout(
            self.gateway_timeout,
            self.gateway.create_transaction(TransferParams {
                multisig: &account.address,
                index: tx.transaction_index,
                from: &tx.from_wallet,
                to: &tx.to_wallet,
                amount: &tx.amount,
                currency: &tx.currency,
                memo: tx.notes.as_deref(),
            }),
        )
        .await?;
        if created.index != tx.transaction_index {
            return Err(GatewayError::InvalidResponse(format!(
                "gateway registered index {} for transaction index {}",
                created.index, tx.transaction_index
            ))
            .into());
        }

        let instruction = with_timeout(
            self.gateway_timeout,
            self.gateway
                .propose(&account.address, tx.transaction_index, &tx.requested_by),
        )
        .await?;
        Ok(instruction)
    }

    /// Cancel a PENDING or PROPOSED transaction before quorum.
    ///
    /// Allowed for the proposer and for any active member holding `propose`.
    pub fn cancel(&self, transaction_id: &str, requested_by: &str) -> GovernanceResult<GovernedTransaction> {
        required("requested_by", requested_by)?;
        let now = Utc::now();

        let cancelled = self.store.write(|w| {
            let mut tx = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            if !tx.status.is_cancellable() {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} is {} and cannot be cancelled",
                    tx.status
                )));
            }
            let mut proposal = w
                .proposal(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Proposal", transaction_id))?;

            let member = w.member_by_key(&tx.account_id, requested_by)?;
            let is_proposer = proposal.proposer_key == requested_by
                && member.as_ref().is_some_and(|m| m.active);
            let may_propose = member.as_ref().is_some_and(|m| m.can(Capability::Propose));
            if !is_proposer && !may_propose {
                return Err(GovernanceError::PermissionDenied(format!(
                    "{requested_by} may not cancel transaction {transaction_id}"
                )));
            }

            tx.status = TxStatus::Cancelled;
            tx.updated_at = now;
            proposal.status = ProposalStatus::Cancelled;
            proposal.updated_at = now;
            w.put_transaction(&tx)?;
            w.put_proposal(&proposal)?;
            touch(w, requested_by, "cancel", now)?;
            Ok(tx)
        })?;

        info!(transaction_id = %transaction_id, cancelled_by = %requested_by, "Transaction cancelled");
        Ok(cancelled)
    }

    fn current(&self, transaction_id: &str) -> GovernanceResult<GovernedTransaction> {
        self.store
            .read()?
            .transaction(transaction_id)?
            .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))
    }

    pub fn transaction_detail(&self, transaction_id: &str) -> GovernanceResult<TransactionDetail> {
        let read = self.store.read()?;
        let transaction = read
            .transaction(transaction_id)?
            .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
        let proposal = read
            .proposal(transaction_id)?
            .ok_or_else(|| GovernanceError::not_found("Proposal", transaction_id))?;
        let approvals = read.approvals(transaction_id)?;
        Ok(TransactionDetail {
            transaction,
            proposal,
            approvals,
        })
    }
}
