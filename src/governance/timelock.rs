// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Time-Lock Gate
//!
//! Decides whether a transaction that reached quorum has also cleared its
//! account's mandatory delay.
//!
//! The delay starts at the *threshold time*: the `voted_at` of the k-th
//! APPROVE (k = threshold) from active members, ordered by vote time. Later
//! approvals do not move it. With a zero time lock the gate opens as soon as
//! quorum is reached.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::{GovernanceError, GovernanceResult};
use crate::storage::{
    Approval, GovernanceAccount, GovernanceStore, GovernedTransaction, StoreReader, TxStatus,
    VoteType,
};

/// Time-lock evaluation for one transaction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeLockStatus {
    pub transaction_id: String,
    pub status: TxStatus,
    pub can_execute: bool,
    pub approve_count: u32,
    pub threshold: u32,
    pub time_lock_secs: u64,
    /// When the approval threshold was reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_reached_at: Option<DateTime<Utc>>,
    /// Earliest execution time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of the quorum and delay checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Open,
    QuorumNotMet,
    Locked { remaining_secs: i64 },
}

#[derive(Debug, Clone)]
pub(crate) struct Evaluation {
    pub gate: Gate,
    pub approve_count: u32,
    pub threshold_reached_at: Option<DateTime<Utc>>,
    pub executable_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// Convert a closed gate into the matching error.
    pub fn ensure_open(&self, threshold: u32) -> GovernanceResult<()> {
        match self.gate {
            Gate::Open => Ok(()),
            Gate::QuorumNotMet => Err(GovernanceError::Quorum(format!(
                "Quorum not reached: {} of {} approvals",
                self.approve_count, threshold
            ))),
            Gate::Locked { remaining_secs } => {
                Err(GovernanceError::TimeLockActive { remaining_secs })
            }
        }
    }
}

/// Seconds until `until`, rounded up so a positive remainder never reads as zero.
fn seconds_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (until - now).num_milliseconds();
    (millis + 999).div_euclid(1000)
}

/// Pure gate evaluation over an account's settings and the votes cast.
pub(crate) fn evaluate(
    account: &GovernanceAccount,
    approvals: &[Approval],
    active_member_ids: &HashSet<String>,
    now: DateTime<Utc>,
) -> Evaluation {
    let mut approve_times: Vec<DateTime<Utc>> = approvals
        .iter()
        .filter(|a| a.vote == VoteType::Approve && active_member_ids.contains(&a.member_id))
        .map(|a| a.voted_at)
        .collect();
    approve_times.sort();

    let approve_count = approve_times.len() as u32;
    let threshold = account.threshold.max(1) as usize;

    let Some(reached_at) = approve_times.get(threshold - 1).copied() else {
        return Evaluation {
            gate: Gate::QuorumNotMet,
            approve_count,
            threshold_reached_at: None,
            executable_at: None,
        };
    };

    let lock = i64::try_from(account.time_lock_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    let executable_at = reached_at
        .checked_add_signed(lock)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let gate = if now >= executable_at {
        Gate::Open
    } else {
        Gate::Locked {
            remaining_secs: seconds_until(executable_at, now),
        }
    };

    Evaluation {
        gate,
        approve_count,
        threshold_reached_at: Some(reached_at),
        executable_at: Some(executable_at),
    }
}

/// Load the inputs for `tx` from `reader` and evaluate the gate.
pub(crate) fn inspect<R: StoreReader>(
    reader: &R,
    tx: &GovernedTransaction,
    now: DateTime<Utc>,
) -> GovernanceResult<(GovernanceAccount, Evaluation)> {
    let account = reader
        .account(&tx.account_id)?
        .ok_or_else(|| GovernanceError::not_found("Account", &tx.account_id))?;
    let active: HashSet<String> = reader
        .members(&tx.account_id)?
        .into_iter()
        .filter(|m| m.active)
        .map(|m| m.member_id)
        .collect();
    let approvals = reader.approvals(&tx.transaction_id)?;
    let evaluation = evaluate(&account, &approvals, &active, now);
    Ok((account, evaluation))
}

/// Read-only Time-Lock Gate.
#[derive(Clone)]
pub struct TimeLockGate {
    store: Arc<GovernanceStore>,
}

impl TimeLockGate {
    pub fn new(store: Arc<GovernanceStore>) -> Self {
        Self { store }
    }

    pub fn can_execute(&self, transaction_id: &str) -> GovernanceResult<TimeLockStatus> {
        self.can_execute_at(transaction_id, Utc::now())
    }

    pub fn can_execute_at(
        &self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<TimeLockStatus> {
        let read = self.store.read()?;
        let tx = read
            .transaction(transaction_id)?
            .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
        let (account, evaluation) = inspect(&read, &tx, now)?;

        let (mut can_execute, mut time_remaining_secs, mut reason) = match evaluation.gate {
            Gate::Open => (true, None, None),
            Gate::QuorumNotMet => (
                false,
                None,
                Some(format!(
                    "Quorum not reached: {} of {} approvals",
                    evaluation.approve_count, account.threshold
                )),
            ),
            Gate::Locked { remaining_secs } => (
                false,
                Some(remaining_secs),
                Some(format!("Time lock active: {remaining_secs}s remaining")),
            ),
        };

        if can_execute && !tx.status.is_executable() {
            can_execute = false;
            time_remaining_secs = None;
            reason = Some(format!("Transaction is {}", tx.status));
        }

        Ok(TimeLockStatus {
            transaction_id: tx.transaction_id,
            status: tx.status,
            can_execute,
            approve_count: evaluation.approve_count,
            threshold: account.threshold,
            time_lock_secs: account.time_lock_secs,
            threshold_reached_at: evaluation.threshold_reached_at,
            executable_at: evaluation.executable_at,
            time_remaining_secs,
            reason,
        })
    }
}
