// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settings Governance
//!
//! Threshold and time-lock changes go through the same quorum as transfers.
//! A member holding `propose` opens a [`SettingsChange`]; active members vote
//! on it and the account's *current* threshold decides:
//!
//! | Condition | Change | Account |
//! |-----------|--------|---------|
//! | `approve_count >= threshold` | APPROVED | settings applied |
//! | `reject_count >= threshold` | REJECTED | unchanged |
//! | otherwise | PENDING | unchanged |
//!
//! ## Applying a Change
//!
//! In one write transaction:
//!
//! 1. the new threshold is checked against the active-member count again
//!    (if it no longer fits, the change becomes STALE instead)
//! 2. `stale_transaction_index` moves to the last allocated index and every
//!    open transfer proposal up to it becomes STALE with its transaction
//!    CANCELLED
//! 3. APPROVED or FAILED transactions whose approvals fall short of the new
//!    threshold are handled the same way
//! 4. other pending settings changes of the account become STALE
//!
//! Settings are an off-chain gate; no gateway call is made.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use super::approvals::{active_member_ids, authorized_voter, lost_quorum, vote_action, Tally};
use super::error::{GovernanceError, GovernanceResult};
use super::inactivity::touch;
use crate::storage::{
    Capability, GovernanceAccount, GovernanceStore, ProposalStatus, SettingsChange, SettingsVote,
    StoreReader, StoreWrite, TxStatus, VoteType,
};

/// Effect of an applied settings change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsOutcome {
    pub account: GovernanceAccount,
    /// Transactions whose proposals were marked STALE and cancelled
    pub stale_transactions: Vec<String>,
    /// Other pending settings changes superseded by this one
    pub stale_changes: Vec<String>,
}

/// Result of [`SettingsManager::vote`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsVoteOutcome {
    pub change: SettingsChange,
    pub threshold: u32,
    /// `false` when the same vote was already recorded
    pub changed: bool,
    /// Present when this vote applied the change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<SettingsOutcome>,
}

fn tally_votes(votes: &[SettingsVote], active: &HashSet<String>) -> Tally {
    votes
        .iter()
        .filter(|v| active.contains(&v.member_id))
        .fold(Tally::default(), |mut t, v| {
            match v.vote {
                VoteType::Approve => t.approve += 1,
                VoteType::Reject => t.reject += 1,
            }
            t
        })
}

fn active_count<R: StoreReader>(reader: &R, account_id: &str) -> GovernanceResult<u32> {
    Ok(reader.members(account_id)?.iter().filter(|m| m.active).count() as u32)
}

fn check_threshold(threshold: u32, active: u32) -> GovernanceResult<()> {
    if threshold < 1 || threshold > active {
        return Err(GovernanceError::Validation(format!(
            "Threshold must be between 1 and {active} active members"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SettingsManager {
    store: Arc<GovernanceStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<GovernanceStore>) -> Self {
        Self { store }
    }

    pub fn propose_change(
        &self,
        account_id: &str,
        requested_by: &str,
        threshold: Option<u32>,
        time_lock_secs: Option<u64>,
    ) -> GovernanceResult<SettingsChange> {
        self.propose_change_at(account_id, requested_by, threshold, time_lock_secs, Utc::now())
    }

    /// Open a settings change on behalf of a proposing member.
    pub fn propose_change_at(
        &self,
        account_id: &str,
        requested_by: &str,
        threshold: Option<u32>,
        time_lock_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> GovernanceResult<SettingsChange> {
        if threshold.is_none() && time_lock_secs.is_none() {
            return Err(GovernanceError::Validation(
                "Provide threshold and/or time_lock_secs".to_string(),
            ));
        }
        if requested_by.trim().is_empty() {
            return Err(GovernanceError::Validation("requested_by is required".to_string()));
        }

        let change = self.store.write(|w| {
            let account = w
                .account(account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", account_id))?;
            if !account.active {
                return Err(GovernanceError::NotGoverned(format!(
                    "Governance account {account_id} is deactivated"
                )));
            }
            let proposer = w.member_by_key(account_id, requested_by)?;
            if !proposer.is_some_and(|m| m.can(Capability::Propose)) {
                return Err(GovernanceError::PermissionDenied(format!(
                    "{requested_by} may not change settings of account {account_id}"
                )));
            }
            if let Some(threshold) = threshold {
                check_threshold(threshold, active_count(w, account_id)?)?;
            }

            let change = SettingsChange {
                change_id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                proposer_key: requested_by.to_string(),
                threshold,
                time_lock_secs,
                status: ProposalStatus::Pending,
                votes: Vec::new(),
                approve_count: 0,
                reject_count: 0,
                created_at: now,
                updated_at: now,
                applied_at: None,
            };
            w.put_settings_change(&change)?;
            touch(w, requested_by, "propose", now)?;
            Ok(change)
        })?;

        info!(
            change_id = %change.change_id,
            account_id = %account_id,
            threshold = ?threshold,
            time_lock_secs = ?time_lock_secs,
            "Settings change proposed"
        );
        Ok(change)
    }

    pub fn vote(
        &self,
        change_id: &str,
        member_key: &str,
        vote: VoteType,
    ) -> GovernanceResult<SettingsVoteOutcome> {
        self.vote_at(change_id, member_key, vote, Utc::now())
    }

    /// Record a vote and apply or reject the change once the threshold is met.
    pub fn vote_at(
        &self,
        change_id: &str,
        member_key: &str,
        vote: VoteType,
        now: DateTime<Utc>,
    ) -> GovernanceResult<SettingsVoteOutcome> {
        let outcome = self.store.write(|w| {
            let mut change = w
                .settings_change(change_id)?
                .ok_or_else(|| GovernanceError::not_found("Settings change", change_id))?;
            let account = w
                .account(&change.account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", &change.account_id))?;
            let member = authorized_voter(w.member_by_key(&change.account_id, member_key)?, member_key)?;

            let existing = change.votes.iter().find(|v| v.member_id == member.member_id);
            if existing.is_some_and(|v| v.vote == vote) {
                debug!(change_id = %change_id, member_key = %member_key, "Duplicate settings vote ignored");
                return Ok(SettingsVoteOutcome {
                    threshold: account.threshold,
                    change,
                    changed: false,
                    applied: None,
                });
            }
            if !change.status.is_open() {
                return Err(GovernanceError::StateConflict(format!(
                    "Settings change {change_id} is {:?}",
                    change.status
                )));
            }

            change.votes.retain(|v| v.member_id != member.member_id);
            change.votes.push(SettingsVote {
                member_id: member.member_id.clone(),
                member_key: member.public_key.clone(),
                vote,
                voted_at: now,
            });
            let counts = tally_votes(&change.votes, &active_member_ids(&w.members(&change.account_id)?));
            change.approve_count = counts.approve;
            change.reject_count = counts.reject;
            change.updated_at = now;

            let mut applied = None;
            if counts.approve >= account.threshold {
                let fits = match change.threshold {
                    Some(threshold) => check_threshold(threshold, active_count(w, &change.account_id)?).is_ok(),
                    None => true,
                };
                if fits {
                    applied = Some(apply(w, account.clone(), &change, now)?);
                    change.status = ProposalStatus::Approved;
                    change.applied_at = Some(now);
                } else {
                    change.status = ProposalStatus::Stale;
                }
            } else if counts.reject >= account.threshold {
                change.status = ProposalStatus::Rejected;
            }

            w.put_settings_change(&change)?;
            touch(w, member_key, vote_action(vote), now)?;
            Ok::<_, GovernanceError>(SettingsVoteOutcome {
                threshold: account.threshold,
                change,
                changed: true,
                applied,
            })
        })?;

        info!(
            change_id = %change_id,
            member_key = %member_key,
            vote = ?vote,
            approve_count = outcome.change.approve_count,
            reject_count = outcome.change.reject_count,
            status = ?outcome.change.status,
            "Settings vote recorded"
        );
        if let Some(applied) = &outcome.applied {
            info!(
                account_id = %applied.account.account_id,
                threshold = applied.account.threshold,
                time_lock_secs = applied.account.time_lock_secs,
                stale = applied.stale_transactions.len(),
                "Account settings updated"
            );
        }
        Ok(outcome)
    }

    /// Withdraw a pending change. Allowed for its proposer and for any active
    /// member holding `propose`.
    pub fn cancel_change(&self, change_id: &str, requested_by: &str) -> GovernanceResult<SettingsChange> {
        let now = Utc::now();
        let change = self.store.write(|w| {
            let mut change = w
                .settings_change(change_id)?
                .ok_or_else(|| GovernanceError::not_found("Settings change", change_id))?;
            if !change.status.is_open() {
                return Err(GovernanceError::StateConflict(format!(
                    "Settings change {change_id} is {:?} and cannot be cancelled",
                    change.status
                )));
            }
            let member = w.member_by_key(&change.account_id, requested_by)?;
            let is_proposer =
                change.proposer_key == requested_by && member.as_ref().is_some_and(|m| m.active);
            if !is_proposer && !member.is_some_and(|m| m.can(Capability::Propose)) {
                return Err(GovernanceError::PermissionDenied(format!(
                    "{requested_by} may not cancel settings change {change_id}"
                )));
            }
            change.status = ProposalStatus::Cancelled;
            change.updated_at = now;
            w.put_settings_change(&change)?;
            touch(w, requested_by, "cancel", now)?;
            Ok(change)
        })?;
        info!(change_id = %change_id, cancelled_by = %requested_by, "Settings change cancelled");
        Ok(change)
    }

    pub fn change(&self, change_id: &str) -> GovernanceResult<SettingsChange> {
        self.store
            .read()?
            .settings_change(change_id)?
            .ok_or_else(|| GovernanceError::not_found("Settings change", change_id))
    }

    /// Settings changes of an account, oldest first.
    pub fn changes(&self, account_id: &str) -> GovernanceResult<Vec<SettingsChange>> {
        let read = self.store.read()?;
        if read.account(account_id)?.is_none() {
            return Err(GovernanceError::not_found("Account", account_id));
        }
        Ok(read.settings_changes(account_id)?)
    }
}

fn apply(
    w: &StoreWrite<'_>,
    mut account: GovernanceAccount,
    change: &SettingsChange,
    now: DateTime<Utc>,
) -> GovernanceResult<SettingsOutcome> {
    if let Some(threshold) = change.threshold {
        account.threshold = threshold;
    }
    if let Some(time_lock_secs) = change.time_lock_secs {
        account.time_lock_secs = time_lock_secs;
    }
    account.stale_transaction_index = account.transaction_index;
    account.updated_at = now;
    w.put_account(&account)?;

    let mut stale = Vec::new();
    for mut tx in w.account_transactions(&account.account_id)? {
        if tx.transaction_index > account.stale_transaction_index || !tx.status.is_cancellable() {
            continue;
        }
        let Some(mut proposal) = w.proposal(&tx.transaction_id)? else {
            continue;
        };
        if !proposal.status.is_open() {
            continue;
        }
        proposal.status = ProposalStatus::Stale;
        proposal.updated_at = now;
        tx.status = TxStatus::Cancelled;
        tx.updated_at = now;
        w.put_proposal(&proposal)?;
        w.put_transaction(&tx)?;
        stale.push(tx.transaction_id);
    }

    for (mut tx, mut proposal, counts) in lost_quorum(w, &account)? {
        proposal.status = ProposalStatus::Stale;
        proposal.approve_count = counts.approve;
        proposal.reject_count = counts.reject;
        proposal.updated_at = now;
        tx.status = TxStatus::Cancelled;
        tx.updated_at = now;
        w.put_proposal(&proposal)?;
        w.put_transaction(&tx)?;
        stale.push(tx.transaction_id);
    }

    let mut stale_changes = Vec::new();
    for mut other in w.settings_changes(&account.account_id)? {
        if other.change_id == change.change_id || !other.status.is_open() {
            continue;
        }
        other.status = ProposalStatus::Stale;
        other.updated_at = now;
        w.put_settings_change(&other)?;
        stale_changes.push(other.change_id);
    }

    Ok(SettingsOutcome {
        account,
        stale_transactions: stale,
        stale_changes,
    })
}
