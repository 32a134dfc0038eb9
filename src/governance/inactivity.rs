// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Inactivity Monitor
//!
//! Tracks when each signer key last acted and retires members that stopped
//! participating, without ever dropping an account below its threshold.
//!
//! Activity is stored in the governance database keyed by public key, so it
//! survives restarts. Members with no recorded activity are measured from the
//! time they were added.
//!
//! A removal that leaves an APPROVED transaction short of its threshold sends
//! that transaction back to PROPOSED in the same write.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::approvals::reopen_below_quorum;
use super::error::{GovernanceError, GovernanceResult};
use crate::config::GovernanceConfig;
use crate::storage::{
    GovernanceAccount, GovernanceStore, Member, MemberActivity, SignerRemoval, StoreReader,
    StoreResult, StoreWrite,
};

/// `removed_by` recorded for removals made by the monitor itself.
pub const SYSTEM_REMOVER: &str = "system:inactivity-monitor";

const INACTIVITY_REASON: &str = "inactive";

/// Record activity for `member_key` inside an open write transaction.
///
/// Never moves the timestamp backwards.
pub(crate) fn touch(
    w: &StoreWrite<'_>,
    member_key: &str,
    action: &str,
    at: DateTime<Utc>,
) -> StoreResult<MemberActivity> {
    if let Some(existing) = w.activity(member_key)? {
        if existing.last_activity_at > at {
            return Ok(existing);
        }
    }
    let activity = MemberActivity {
        member_key: member_key.to_string(),
        last_activity_at: at,
        last_action: action.to_string(),
    };
    w.put_activity(&activity)?;
    Ok(activity)
}

/// Out-of-range windows saturate instead of panicking.
fn hours(h: i64) -> Duration {
    Duration::try_hours(h).unwrap_or(if h < 0 { Duration::MIN } else { Duration::MAX })
}

/// An active member that has been idle longer than the inactivity window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InactiveMember {
    pub account_id: String,
    pub member_id: String,
    pub public_key: String,
    /// `None` if the member never acted since being added
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    pub hours_since_activity: i64,
}

/// Per-member outcome of [`InactivityMonitor::remove_all_eligible`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RemovalResult {
    pub account_id: String,
    pub member_id: String,
    pub public_key: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RemovalBatch {
    pub processed: usize,
    pub removed: usize,
    pub failed: usize,
    pub results: Vec<RemovalResult>,
}

/// Signer health of one governance account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountHealth {
    pub account_id: String,
    pub total_members: u32,
    pub active_members: u32,
    pub inactive_members: u32,
    pub threshold: u32,
    pub is_healthy: bool,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct InactivityMonitor {
    store: Arc<GovernanceStore>,
    window: Duration,
    removal_after: Duration,
}

impl InactivityMonitor {
    pub fn new(store: Arc<GovernanceStore>, config: &GovernanceConfig) -> Self {
        Self {
            store,
            window: hours(config.inactivity_window_hours),
            removal_after: hours(config.removal_eligible_hours),
        }
    }

    pub fn record_activity(&self, member_key: &str, action: &str) -> GovernanceResult<MemberActivity> {
        self.record_activity_at(member_key, action, Utc::now())
    }

    /// Record that `member_key` acted at `at`.
    ///
    /// Fails with `NotFound` if the key is not a member of any account.
    pub fn record_activity_at(
        &self,
        member_key: &str,
        action: &str,
        at: DateTime<Utc>,
    ) -> GovernanceResult<MemberActivity> {
        if member_key.trim().is_empty() {
            return Err(GovernanceError::Validation("member_key is required".to_string()));
        }
        self.store.write(|w| {
            let mut known = false;
            for account in w.accounts()? {
                if w.member_by_key(&account.account_id, member_key)?.is_some() {
                    known = true;
                    break;
                }
            }
            if !known {
                return Err(GovernanceError::not_found("Member key", member_key));
            }
            Ok(touch(w, member_key, action, at)?)
        })
    }

    pub fn list_inactive(&self) -> GovernanceResult<Vec<InactiveMember>> {
        self.list_inactive_at(Utc::now())
    }

    /// Active members idle for longer than the inactivity window.
    pub fn list_inactive_at(&self, now: DateTime<Utc>) -> GovernanceResult<Vec<InactiveMember>> {
        let read = self.store.read()?;
        let mut out = Vec::new();
        for account in read.accounts()? {
            if account.active {
                out.extend(self.idle_members(&read, &account, now)?);
            }
        }
        Ok(out)
    }

    pub fn list_removal_eligible(&self) -> GovernanceResult<Vec<InactiveMember>> {
        self.list_removal_eligible_at(Utc::now())
    }

    /// Inactive members idle for at least the removal-eligibility period.
    pub fn list_removal_eligible_at(&self, now: DateTime<Utc>) -> GovernanceResult<Vec<InactiveMember>> {
        let min_hours = self.removal_after.num_hours();
        Ok(self
            .list_inactive_at(now)?
            .into_iter()
            .filter(|m| m.hours_since_activity >= min_hours)
            .collect())
    }

    fn idle_members<R: StoreReader>(
        &self,
        reader: &R,
        account: &GovernanceAccount,
        now: DateTime<Utc>,
    ) -> GovernanceResult<Vec<InactiveMember>> {
        let mut idle = Vec::new();
        for member in reader.members(&account.account_id)? {
            if !member.active {
                continue;
            }
            let activity = reader.activity(&member.public_key)?;
            let last_seen = activity
                .as_ref()
                .map(|a| a.last_activity_at)
                .unwrap_or(member.added_at);
            let idle_for = now - last_seen;
            if idle_for > self.window {
                idle.push(InactiveMember {
                    account_id: account.account_id.clone(),
                    member_id: member.member_id,
                    public_key: member.public_key,
                    last_activity_at: activity.as_ref().map(|a| a.last_activity_at),
                    last_action: activity.map(|a| a.last_action),
                    hours_since_activity: idle_for.num_hours(),
                });
            }
        }
        Ok(idle)
    }

    pub fn remove_member(
        &self,
        account_id: &str,
        member_id: &str,
        removed_by: &str,
        reason: &str,
    ) -> GovernanceResult<SignerRemoval> {
        self.remove_member_at(account_id, member_id, removed_by, reason, Utc::now())
    }

    /// Deactivate a member and write the removal audit record.
    ///
    /// Fails with `Quorum` (leaving state unchanged) if the account would be
    /// left with fewer active members than its threshold.
    pub fn remove_member_at(
        &self,
        account_id: &str,
        member_id: &str,
        removed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<SignerRemoval> {
        if removed_by.trim().is_empty() {
            return Err(GovernanceError::Validation("removed_by is required".to_string()));
        }
        let reason = if reason.trim().is_empty() { INACTIVITY_REASON } else { reason };

        let removal = self.store.write(|w| {
            let account = w
                .account(account_id)?
                .ok_or_else(|| GovernanceError::not_found("Account", account_id))?;
            let mut member = w
                .member(member_id)?
                .filter(|m| m.account_id == account_id)
                .ok_or_else(|| GovernanceError::not_found("Member", member_id))?;
            if !member.active {
                return Err(GovernanceError::StateConflict(format!(
                    "Member {member_id} is already inactive"
                )));
            }

            let active_count = w.members(account_id)?.iter().filter(|m| m.active).count() as u32;
            let remaining = active_count.saturating_sub(1);
            if remaining < account.threshold {
                return Err(GovernanceError::Quorum(format!(
                    "Removing member would leave {remaining} active members, below threshold {}",
                    account.threshold
                )));
            }

            member.active = false;
            member.deactivated_at = Some(now);
            w.put_member(&member)?;
            let reopened = reopen_below_quorum(w, &account, now)?;

            let removal = SignerRemoval {
                removal_id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                removed_member_id: member.member_id.clone(),
                removed_member_key: member.public_key.clone(),
                removed_by: removed_by.to_string(),
                reason: reason.to_string(),
                transaction_index: None,
                reopened_transactions: reopened,
                removed_at: now,
            };
            w.put_removal(&removal)?;
            Ok::<_, GovernanceError>(removal)
        })?;

        info!(
            account_id = %account_id,
            member_id = %member_id,
            removed_by = %removed_by,
            reopened = removal.reopened_transactions.len(),
            "Signer removed"
        );
        Ok(removal)
    }

    pub fn remove_all_eligible(&self) -> GovernanceResult<RemovalBatch> {
        self.remove_all_eligible_at(Utc::now())
    }

    /// Remove every eligible member one at a time; failures are reported per
    /// member and never stop the batch.
    pub fn remove_all_eligible_at(&self, now: DateTime<Utc>) -> GovernanceResult<RemovalBatch> {
        let eligible = self.list_removal_eligible_at(now)?;
        let mut results = Vec::with_capacity(eligible.len());

        for candidate in eligible {
            let reason = format!(
                "{INACTIVITY_REASON} for {} hours",
                candidate.hours_since_activity
            );
            let outcome = self.remove_member_at(
                &candidate.account_id,
                &candidate.member_id,
                SYSTEM_REMOVER,
                &reason,
                now,
            );
            let (success, removal_id, error) = match outcome {
                Ok(removal) => (true, Some(removal.removal_id), None),
                Err(e) => {
                    warn!(
                        account_id = %candidate.account_id,
                        member_id = %candidate.member_id,
                        error = %e,
                        "Failed to remove inactive signer"
                    );
                    (false, None, Some(e.to_string()))
                }
            };
            results.push(RemovalResult {
                account_id: candidate.account_id,
                member_id: candidate.member_id,
                public_key: candidate.public_key,
                success,
                removal_id,
                error,
            });
        }

        let removed = results.iter().filter(|r| r.success).count();
        Ok(RemovalBatch {
            processed: results.len(),
            removed,
            failed: results.len() - removed,
            results,
        })
    }

    pub fn get_health(&self, account_id: &str) -> GovernanceResult<AccountHealth> {
        self.get_health_at(account_id, Utc::now())
    }

    pub fn get_health_at(&self, account_id: &str, now: DateTime<Utc>) -> GovernanceResult<AccountHealth> {
        let read = self.store.read()?;
        let account = read
            .account(account_id)?
            .ok_or_else(|| GovernanceError::not_found("Account", account_id))?;
        let members: Vec<Member> = read.members(account_id)?;
        let total = members.len() as u32;
        let active = members.iter().filter(|m| m.active).count() as u32;
        let idle = self.idle_members(&read, &account, now)?;

        let mut warnings = Vec::new();
        if active < account.threshold {
            warnings.push(format!(
                "Active members ({active}) below threshold ({}): account cannot reach quorum",
                account.threshold
            ));
        } else if active == account.threshold {
            warnings.push(format!(
                "No spare signers: every one of the {active} active members is needed for quorum"
            ));
        }
        if !idle.is_empty() {
            warnings.push(format!(
                "{} active member(s) idle for more than {} hours",
                idle.len(),
                self.window.num_hours()
            ));
        }

        Ok(AccountHealth {
            account_id: account.account_id,
            total_members: total,
            active_members: active,
            inactive_members: total - active,
            threshold: account.threshold,
            is_healthy: active >= account.threshold,
            warnings,
        })
    }

    /// Removal history of an account, oldest first.
    pub fn removals(&self, account_id: &str) -> GovernanceResult<Vec<SignerRemoval>> {
        let read = self.store.read()?;
        if read.account(account_id)?.is_none() {
            return Err(GovernanceError::not_found("Account", account_id));
        }
        Ok(read.removals(account_id)?)
    }
}
