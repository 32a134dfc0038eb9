// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Approval Aggregator
//!
//! Records member votes and recomputes proposal status.
//!
//! Each (transaction, member) pair has exactly one approval row; a changed
//! vote overwrites it and resubmitting the same vote is a no-op. Counts only
//! include votes from currently active members, so they never exceed the
//! active-member count.
//!
//! | Condition | Proposal | Transaction |
//! |-----------|----------|-------------|
//! | `approve_count >= threshold` | APPROVED | APPROVED |
//! | `reject_count >= threshold` | REJECTED | REJECTED |
//! | otherwise | PENDING | PROPOSED |
//!
//! The rejection rule mirrors the approval rule.
//!
//! An APPROVED (or FAILED) transaction keeps its status only while its
//! active-member approvals still reach the threshold. Signer removal and
//! settings changes re-check it with [`lost_quorum`] in the same write.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::error::{GovernanceError, GovernanceResult};
use super::inactivity::touch;
use crate::blockchain::{with_timeout, BlockchainGateway};
use crate::storage::{
    Approval, Capability, GovernanceAccount, GovernanceStore, GovernedTransaction, Member,
    Proposal, ProposalStatus, StoreReader, StoreResult, StoreWrite, TxStatus, VoteType,
};

/// Vote tally over active members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Tally {
    pub approve: u32,
    pub reject: u32,
}

pub(crate) fn active_member_ids(members: &[Member]) -> HashSet<String> {
    members
        .iter()
        .filter(|m| m.active)
        .map(|m| m.member_id.clone())
        .collect()
}

pub(crate) fn tally(approvals: &[Approval], active: &HashSet<String>) -> Tally {
    approvals
        .iter()
        .filter(|a| active.contains(&a.member_id))
        .fold(Tally::default(), |mut t, a| {
            match a.vote {
                VoteType::Approve => t.approve += 1,
                VoteType::Reject => t.reject += 1,
            }
            t
        })
}

/// Executable transactions of `account` whose active-member approvals no
/// longer reach its current threshold.
pub(crate) fn lost_quorum<R: StoreReader>(
    reader: &R,
    account: &GovernanceAccount,
) -> StoreResult<Vec<(GovernedTransaction, Proposal, Tally)>> {
    let active = active_member_ids(&reader.members(&account.account_id)?);
    let mut out = Vec::new();
    for tx in reader.account_transactions(&account.account_id)? {
        if !tx.status.is_executable() {
            continue;
        }
        let Some(proposal) = reader.proposal(&tx.transaction_id)? else {
            continue;
        };
        let counts = tally(&reader.approvals(&tx.transaction_id)?, &active);
        if counts.approve < account.threshold {
            out.push((tx, proposal, counts));
        }
    }
    Ok(out)
}

/// Send transactions that lost quorum back to PROPOSED so voting resumes.
pub(crate) fn reopen_below_quorum(
    w: &StoreWrite<'_>,
    account: &GovernanceAccount,
    now: DateTime<Utc>,
) -> StoreResult<Vec<String>> {
    let mut reopened = Vec::new();
    for (mut tx, mut proposal, counts) in lost_quorum(w, account)? {
        proposal.status = ProposalStatus::Pending;
        proposal.approve_count = counts.approve;
        proposal.reject_count = counts.reject;
        proposal.approved_at = None;
        proposal.updated_at = now;
        tx.status = TxStatus::Proposed;
        tx.updated_at = now;
        w.put_proposal(&proposal)?;
        w.put_transaction(&tx)?;
        info!(
            transaction_id = %tx.transaction_id,
            approve_count = counts.approve,
            threshold = account.threshold,
            "Approved transaction lost quorum; reopened for voting"
        );
        reopened.push(tx.transaction_id);
    }
    Ok(reopened)
}

/// Result of [`ApprovalAggregator::vote`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteOutcome {
    pub transaction_id: String,
    pub vote: VoteType,
    pub status: TxStatus,
    pub proposal_status: ProposalStatus,
    pub approve_count: u32,
    pub reject_count: u32,
    pub threshold: u32,
    /// `false` when the same vote was already recorded
    pub changed: bool,
    /// Gateway instruction for the vote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

#[derive(Clone)]
pub struct ApprovalAggregator {
    store: Arc<GovernanceStore>,
    gateway: Arc<dyn BlockchainGateway>,
    gateway_timeout: Duration,
}

impl ApprovalAggregator {
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

    pub async fn vote(
        &self,
        transaction_id: &str,
        member_key: &str,
        vote: VoteType,
    ) -> GovernanceResult<VoteOutcome> {
        self.vote_at(transaction_id, member_key, vote, Utc::now()).await
    }

    /// Record `member_key`'s vote as cast at `now`.
    pub async fn vote_at(
        &self,
        transaction_id: &str,
        member_key: &str,
        vote: VoteType,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VoteOutcome> {
        let (tx, address) = {
            let read = self.store.read()?;
            let tx = read
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            let account = read
                .account(&tx.account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", &tx.account_id))?;
            let member = authorized_voter(read.member_by_key(&tx.account_id, member_key)?, member_key)?;

            if tx.status.is_terminal() {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} is {}",
                    tx.status
                )));
            }
            if let Some(existing) = read.approval(transaction_id, &member.member_id)? {
                if existing.vote == vote {
                    debug!(transaction_id = %transaction_id, member_key = %member_key, "Duplicate vote ignored");
                    let proposal = read
                        .proposal(transaction_id)?
                        .ok_or_else(|| GovernanceError::not_found("Proposal", transaction_id))?;
                    return Ok(VoteOutcome {
                        transaction_id: tx.transaction_id,
                        vote,
                        status: tx.status,
                        proposal_status: proposal.status,
                        approve_count: proposal.approve_count,
                        reject_count: proposal.reject_count,
                        threshold: account.threshold,
                        changed: false,
                        instruction: None,
                    });
                }
            }
            if tx.status != TxStatus::Proposed {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} is {}; votes are accepted while PROPOSED",
                    tx.status
                )));
            }
            (tx, account.address)
        };

        let call = match vote {
            VoteType::Approve => self.gateway.approve(&address, tx.transaction_index, member_key),
            VoteType::Reject => self.gateway.reject(&address, tx.transaction_index, member_key),
        };
        let instruction = with_timeout(self.gateway_timeout, call).await?;

        let outcome = self.store.write(|w| {
            let mut tx = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            if tx.status != TxStatus::Proposed {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} became {} while voting",
                    tx.status
                )));
            }
            let account = w
                .account(&tx.account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", &tx.account_id))?;
            let member = authorized_voter(w.member_by_key(&tx.account_id, member_key)?, member_key)?;
            let mut proposal = w
                .proposal(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Proposal", transaction_id))?;

            let created_at = w
                .approval(transaction_id, &member.member_id)?
                .map(|a| a.created_at)
                .unwrap_or(now);
            w.put_approval(&Approval {
                transaction_id: transaction_id.to_string(),
                member_id: member.member_id.clone(),
                member_key: member.public_key.clone(),
                vote,
                voted_at: now,
                created_at,
            })?;

            let members = w.members(&tx.account_id)?;
            let counts = tally(&w.approvals(transaction_id)?, &active_member_ids(&members));
            proposal.approve_count = counts.approve;
            proposal.reject_count = counts.reject;
            proposal.updated_at = now;

            if counts.approve >= account.threshold {
                proposal.status = ProposalStatus::Approved;
                proposal.approved_at = Some(now);
                tx.status = TxStatus::Approved;
            } else if counts.reject >= account.threshold {
                proposal.status = ProposalStatus::Rejected;
                tx.status = TxStatus::Rejected;
            }
            tx.updated_at = now;

            w.put_proposal(&proposal)?;
            w.put_transaction(&tx)?;
            touch(w, member_key, vote_action(vote), now)?;

            Ok(VoteOutcome {
                transaction_id: tx.transaction_id,
                vote,
                status: tx.status,
                proposal_status: proposal.status,
                approve_count: counts.approve,
                reject_count: counts.reject,
                threshold: account.threshold,
                changed: true,
                instruction: Some(instruction.clone()),
            })
        })?;

        info!(
            transaction_id = %transaction_id,
            member_key = %member_key,
            vote = ?vote,
            approve_count = outcome.approve_count,
            reject_count = outcome.reject_count,
            status = %outcome.status,
            "Vote recorded"
        );
        Ok(outcome)
    }
}

pub(crate) fn vote_action(vote: VoteType) -> &'static str {
    match vote {
        VoteType::Approve => "approve",
        VoteType::Reject => "reject",
    }
}

pub(crate) fn authorized_voter(member: Option<Member>, member_key: &str) -> GovernanceResult<Member> {
    match member {
        Some(m) if m.can(Capability::Vote) => Ok(m),
        Some(_) => Err(GovernanceError::PermissionDenied(format!(
            "Member {member_key} is inactive or may not vote"
        ))),
        None => Err(GovernanceError::PermissionDenied(format!(
            "{member_key} is not a member of this account"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::testing::Fixture;

    #[tokio::test]
    async fn scenario_a_votes_reach_quorum_and_open_the_gate() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.propose("25").await;
        let approvals = &fx.governance.approvals;

        let first = approvals
            .vote(&tx.transaction_id, "key-a", VoteType::Approve)
            .await
            .unwrap();
        assert_eq!(first.approve_count, 1);
        assert_eq!(first.status, TxStatus::Proposed);
        assert!(first.instruction.is_some());
        assert!(!fx.governance.time_lock.can_execute(&tx.transaction_id).unwrap().can_execute);

        let second = approvals
            .vote(&tx.transaction_id, "key-b", VoteType::Approve)
            .await
            .unwrap();
        assert_eq!(second.approve_count, 2);
        assert_eq!(second.status, TxStatus::Approved);
        assert_eq!(second.proposal_status, ProposalStatus::Approved);
        assert!(fx.governance.time_lock.can_execute(&tx.transaction_id).unwrap().can_execute);

        let executed = fx
            .governance
            .executor
            .execute_one(&tx.transaction_id, "key-b")
            .await
            .unwrap();
        assert_eq!(executed.status, TxStatus::Executed);
        assert!(executed.tx_hash.is_some());
    }

    #[tokio::test]
    async fn duplicate_vote_is_a_no_op() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.propose("3").await;
        let approvals = &fx.governance.approvals;

        approvals.vote(&tx.transaction_id, "key-a", VoteType::Approve).await.unwrap();
        let again = approvals.vote(&tx.transaction_id, "key-a", VoteType::Approve).await.unwrap();
        assert!(!again.changed);
        assert_eq!(again.approve_count, 1);

        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.approvals.len(), 1);
    }

    #[tokio::test]
    async fn changed_vote_overwrites_the_row() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.propose("3").await;
        let approvals = &fx.governance.approvals;

        approvals.vote(&tx.transaction_id, "key-a", VoteType::Approve).await.unwrap();
        let changed = approvals.vote(&tx.transaction_id, "key-a", VoteType::Reject).await.unwrap();
        assert!(changed.changed);
        assert_eq!(changed.approve_count, 0);
        assert_eq!(changed.reject_count, 1);

        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.approvals.len(), 1);
        assert_eq!(detail.approvals[0].vote, VoteType::Reject);
    }

    #[tokio::test]
    async fn reject_threshold_rejects_and_freezes() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.propose("3").await;
        let approvals = &fx.governance.approvals;

        approvals.vote(&tx.transaction_id, "key-b", VoteType::Reject).await.unwrap();
        let outcome = approvals.vote(&tx.transaction_id, "key-c", VoteType::Reject).await.unwrap();
        assert_eq!(outcome.status, TxStatus::Rejected);
        assert_eq!(outcome.proposal_status, ProposalStatus::Rejected);

        let err = approvals
            .vote(&tx.transaction_id, "key-a", VoteType::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::StateConflict(_)));
        let err = fx.governance.proposals.cancel(&tx.transaction_id, "key-a").unwrap_err();
        assert!(matches!(err, GovernanceError::StateConflict(_)));
    }

    #[tokio::test]
    async fn outsiders_and_removed_members_cannot_vote() {
        let fx = Fixture::with_config(|c| {
            c.service_signer_keys = vec!["key-b".into(), "key-c".into(), "key-d".into()];
        });
        let account = fx.provisioned().await;
        let tx = fx.propose("3").await;
        let approvals = &fx.governance.approvals;

        let err = approvals
            .vote(&tx.transaction_id, "key-zzz", VoteType::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::PermissionDenied(_)));

        approvals.vote(&tx.transaction_id, "key-d", VoteType::Approve).await.unwrap();
        let removed = fx.member("key-d");
        fx.governance
            .inactivity
            .remove_member(&account.account_id, &removed.member_id, "admin", "rotated")
            .unwrap();

        let err = approvals
            .vote(&tx.transaction_id, "key-d", VoteType::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::PermissionDenied(_)));

        // the removed member's earlier approval no longer counts
        let outcome = approvals.vote(&tx.transaction_id, "key-a", VoteType::Approve).await.unwrap();
        assert_eq!(outcome.approve_count, 1);
        assert_eq!(outcome.status, TxStatus::Proposed);
    }

    #[tokio::test]
    async fn gateway_failure_records_nothing() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.propose("3").await;
        fx.gateway.set_fail_votes(true);

        let err = fx
            .governance
            .approvals
            .vote(&tx.transaction_id, "key-a", VoteType::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Gateway(_)));
        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert!(detail.approvals.is_empty());
        assert_eq!(detail.proposal.approve_count, 0);
    }

    #[tokio::test]
    async fn concurrent_votes_never_double_count() {
        let fx = Fixture::with_config(|c| {
            c.service_signer_keys = vec!["key-b".into(), "key-c".into(), "key-d".into()];
        });
        fx.provisioned().await;
        let tx = fx.propose("3").await;

        let mut handles = Vec::new();
        for key in ["key-a", "key-b", "key-c", "key-d", "key-a", "key-b"] {
            let approvals = fx.governance.approvals.clone();
            let id = tx.transaction_id.clone();
            handles.push(tokio::spawn(async move {
                approvals.vote(&id, key, VoteType::Approve).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.transaction.status, TxStatus::Approved);
        assert!(detail.proposal.approve_count <= 4);
        assert!(detail.proposal.approve_count >= 2);
        assert!(detail.approvals.len() <= 4);
    }

    #[test]
    fn tally_ignores_inactive_members() {
        let now = Utc::now();
        let approvals: Vec<Approval> = [("m1", VoteType::Approve), ("m2", VoteType::Reject), ("m3", VoteType::Approve)]
            .into_iter()
            .map(|(id, vote)| Approval {
                transaction_id: "tx".to_string(),
                member_id: id.to_string(),
                member_key: id.to_string(),
                vote,
                voted_at: now,
                created_at: now,
            })
            .collect();
        let active: HashSet<String> = ["m1", "m2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tally(&approvals, &active), Tally { approve: 1, reject: 1 });
    }
}
