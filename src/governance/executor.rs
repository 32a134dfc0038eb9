// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auto Executor
//!
//! Submits transactions that cleared quorum and time lock to the Blockchain
//! Gateway.
//!
//! ## Execution Protocol
//!
//! ```text
//! APPROVED | FAILED ──CAS──▶ SUBMITTING ──gateway ok──▶ EXECUTED
//!                                     └──gateway err──▶ FAILED (retriable)
//! ```
//!
//! The compare-and-set runs in one write transaction together with the
//! quorum and time-lock re-check, so only one caller can hold SUBMITTING for
//! a transaction and reach the gateway. Executing an EXECUTED transaction is
//! a no-op returning the stored hash. A gateway timeout counts as a failure.
//!
//! A transaction left in SUBMITTING (process died mid-call) is not recovered
//! automatically, since the on-chain outcome is unknown.
//!
//! ## Batches
//!
//! [`AutoExecutor::execute_batch`] picks up every APPROVED transaction.
//! Transactions of one account run sequentially in index order; accounts run
//! concurrently. Every item reports its own outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::error::{GovernanceError, GovernanceResult};
use super::inactivity::touch;
use super::timelock::inspect;
use crate::blockchain::{with_timeout, BlockchainGateway};
use crate::storage::{Capability, GovernanceStore, GovernedTransaction, StoreReader, TxStatus};

/// Result of [`AutoExecutor::execute_one`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecutionOutcome {
    pub transaction_id: String,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// `true` when the transaction had already been executed
    pub already_executed: bool,
}

/// Per-transaction entry of a batch run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItem {
    pub transaction_id: String,
    pub account_id: String,
    pub transaction_index: u64,
    pub success: bool,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResult {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

enum Claim {
    AlreadyExecuted(GovernedTransaction),
    Claimed {
        tx: GovernedTransaction,
        address: String,
    },
}

#[derive(Clone)]
pub struct AutoExecutor {
    store: Arc<GovernanceStore>,
    gateway: Arc<dyn BlockchainGateway>,
    gateway_timeout: Duration,
}

impl AutoExecutor {
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

    pub async fn execute_one(
        &self,
        transaction_id: &str,
        executor_key: &str,
    ) -> GovernanceResult<ExecutionOutcome> {
        self.execute_one_at(transaction_id, executor_key, Utc::now()).await
    }

    /// Execute one transaction, evaluating the time lock at `now`.
    pub async fn execute_one_at(
        &self,
        transaction_id: &str,
        executor_key: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<ExecutionOutcome> {
        let (tx, address) = match self.claim(transaction_id, executor_key, now)? {
            Claim::AlreadyExecuted(tx) => {
                debug!(transaction_id = %transaction_id, "Transaction already executed");
                return Ok(ExecutionOutcome {
                    transaction_id: tx.transaction_id,
                    status: tx.status,
                    tx_hash: tx.tx_hash,
                    already_executed: true,
                });
            }
            Claim::Claimed { tx, address } => (tx, address),
        };

        info!(
            transaction_id = %transaction_id,
            transaction_index = tx.transaction_index,
            attempt = tx.execution_attempts,
            "Submitting transaction for execution"
        );

        let result = with_timeout(
            self.gateway_timeout,
            self.gateway
                .execute(&address, tx.transaction_index, executor_key),
        )
        .await;
        let finished_at = Utc::now();

        let finalized = self.store.write(|w| {
            let mut current = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            match &result {
                Ok(receipt) => {
                    current.status = TxStatus::Executed;
                    current.tx_hash = Some(receipt.signature.clone());
                    current.failure_reason = None;
                    current.executed_by = Some(executor_key.to_string());
                    current.executed_at = Some(finished_at);
                }
                Err(e) => {
                    current.status = TxStatus::Failed;
                    current.failure_reason = Some(e.to_string());
                }
            }
            current.updated_at = finished_at;
            w.put_transaction(&current)?;
            Ok::<_, GovernanceError>(current)
        });

        let finalized = match finalized {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    gateway_result = ?result,
                    error = %e,
                    "Failed to persist execution result; transaction left SUBMITTING"
                );
                return Err(e);
            }
        };

        match result {
            Ok(_) => {
                info!(
                    transaction_id = %transaction_id,
                    tx_hash = ?finalized.tx_hash,
                    "Transaction executed"
                );
                Ok(ExecutionOutcome {
                    transaction_id: finalized.transaction_id,
                    status: finalized.status,
                    tx_hash: finalized.tx_hash,
                    already_executed: false,
                })
            }
            Err(e) => {
                warn!(transaction_id = %transaction_id, error = %e, "Transaction execution failed");
                Err(e.into())
            }
        }
    }

    /// Re-validate and move the transaction to SUBMITTING in one write.
    fn claim(&self, transaction_id: &str, executor_key: &str, now: DateTime<Utc>) -> GovernanceResult<Claim> {
        self.store.write(|w| {
            let mut tx = w
                .transaction(transaction_id)?
                .ok_or_else(|| GovernanceError::not_found("Transaction", transaction_id))?;
            let executor = w.member_by_key(&tx.account_id, executor_key)?;
            if !executor.is_some_and(|m| m.can(Capability::Execute)) {
                return Err(GovernanceError::PermissionDenied(format!(
                    "{executor_key} may not execute on account {}",
                    tx.account_id
                )));
            }

            match tx.status {
                TxStatus::Executed => return Ok(Claim::AlreadyExecuted(tx)),
                TxStatus::Submitting => {
                    return Err(GovernanceError::StateConflict(format!(
                        "Transaction {transaction_id} is already being submitted"
                    )))
                }
                status if status.is_terminal() => {
                    return Err(GovernanceError::StateConflict(format!(
                        "Transaction {transaction_id} is {status}"
                    )))
                }
                _ => {}
            }

            let (account, evaluation) = inspect(w, &tx, now)?;
            evaluation.ensure_open(account.threshold)?;
            if !tx.status.is_executable() {
                return Err(GovernanceError::StateConflict(format!(
                    "Transaction {transaction_id} is {}, expected APPROVED",
                    tx.status
                )));
            }

            tx.status = TxStatus::Submitting;
            tx.execution_attempts += 1;
            tx.updated_at = now;
            w.put_transaction(&tx)?;
            touch(w, executor_key, "execute", now)?;
            Ok(Claim::Claimed {
                tx,
                address: account.address,
            })
        })
    }

    pub async fn execute_batch(&self, executor_key: &str) -> GovernanceResult<BatchResult> {
        self.execute_batch_at(executor_key, Utc::now()).await
    }

    /// Attempt every APPROVED transaction; one item's failure never stops
    /// the others.
    pub async fn execute_batch_at(
        &self,
        executor_key: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<BatchResult> {
        let mut by_account: BTreeMap<String, Vec<GovernedTransaction>> = BTreeMap::new();
        for tx in self.store.transactions_with_status(TxStatus::Approved)? {
            by_account.entry(tx.account_id.clone()).or_default().push(tx);
        }

        let mut tasks = JoinSet::new();
        for (account_id, mut txs) in by_account {
            txs.sort_by_key(|tx| tx.transaction_index);
            let executor = self.clone();
            let executor_key = executor_key.to_string();
            tasks.spawn(async move {
                let mut items = Vec::with_capacity(txs.len());
                for tx in txs {
                    let outcome = executor
                        .execute_one_at(&tx.transaction_id, &executor_key, now)
                        .await;
                    items.push(batch_item(&executor, &account_id, tx, outcome));
                }
                items
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(items) => results.extend(items),
                Err(e) => error!(error = %e, "Batch execution task failed"),
            }
        }
        results.sort_by(|a, b| {
            (a.account_id.as_str(), a.transaction_index).cmp(&(b.account_id.as_str(), b.transaction_index))
        });

        let successful = results.iter().filter(|r| r.success).count();
        Ok(BatchResult {
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        })
    }
}

fn batch_item(
    executor: &AutoExecutor,
    account_id: &str,
    tx: GovernedTransaction,
    outcome: GovernanceResult<ExecutionOutcome>,
) -> BatchItem {
    match outcome {
        Ok(done) => BatchItem {
            transaction_id: done.transaction_id,
            account_id: account_id.to_string(),
            transaction_index: tx.transaction_index,
            success: true,
            status: done.status,
            tx_hash: done.tx_hash,
            error: None,
        },
        Err(e) => {
            match &e {
                GovernanceError::TimeLockActive { .. } => {
                    debug!(transaction_id = %tx.transaction_id, error = %e, "Batch item still time-locked")
                }
                _ => warn!(transaction_id = %tx.transaction_id, error = %e, "Batch item failed"),
            }
            // report the status the item was left in
            let status = executor
                .store
                .read()
                .ok()
                .and_then(|r| r.transaction(&tx.transaction_id).ok().flatten())
                .map(|current| current.status)
                .unwrap_or(tx.status);
            BatchItem {
                transaction_id: tx.transaction_id,
                account_id: account_id.to_string(),
                transaction_index: tx.transaction_index,
                success: false,
                status,
                tx_hash: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::testing::Fixture;
    use crate::storage::VoteType;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn reexecuting_returns_stored_hash() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        let executor = &fx.governance.executor;

        let first = executor.execute_one(&tx.transaction_id, "key-b").await.unwrap();
        let second = executor.execute_one(&tx.transaction_id, "key-c").await.unwrap();
        assert!(!first.already_executed);
        assert!(second.already_executed);
        assert_eq!(first.tx_hash, second.tx_hash);
        assert_eq!(fx.gateway.execute_calls(), 1);
    }

    #[tokio::test]
    async fn quorum_and_time_lock_block_before_the_gateway() {
        let fx = Fixture::with_config(|c| c.default_time_lock_secs = 3600);
        fx.provisioned().await;
        let executor = &fx.governance.executor;

        let open = fx.propose("1").await;
        let err = executor.execute_one(&open.transaction_id, "key-b").await.unwrap_err();
        assert!(matches!(err, GovernanceError::Quorum(_)));

        let t = Utc::now();
        let approved = fx.approved_transfer(t).await;
        let err = executor
            .execute_one_at(&approved.transaction_id, "key-b", t + ChronoDuration::seconds(10))
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::TimeLockActive { remaining_secs: 3590 }));
        assert_eq!(fx.gateway.execute_calls(), 0);

        let done = executor
            .execute_one_at(&approved.transaction_id, "key-b", t + ChronoDuration::seconds(3600))
            .await
            .unwrap();
        assert_eq!(done.status, TxStatus::Executed);
    }

    #[tokio::test]
    async fn scenario_b_time_lock_opens_at_threshold_plus_delay() {
        let fx = Fixture::with_config(|c| c.default_time_lock_secs = 3600);
        fx.provisioned().await;
        let tx = fx.propose("9").await;
        let t = Utc::now();
        let approvals = &fx.governance.approvals;
        let gate = &fx.governance.time_lock;

        approvals
            .vote_at(&tx.transaction_id, "key-a", VoteType::Approve, t - ChronoDuration::seconds(60))
            .await
            .unwrap();
        approvals
            .vote_at(&tx.transaction_id, "key-b", VoteType::Approve, t)
            .await
            .unwrap();

        let locked = gate.can_execute_at(&tx.transaction_id, t + ChronoDuration::seconds(3599)).unwrap();
        assert!(!locked.can_execute);
        assert_eq!(locked.time_remaining_secs, Some(1));
        assert_eq!(locked.threshold_reached_at, Some(t));

        let open = gate.can_execute_at(&tx.transaction_id, t + ChronoDuration::seconds(3600)).unwrap();
        assert!(open.can_execute);
        assert!(open.time_remaining_secs.is_none());
    }

    #[tokio::test]
    async fn gateway_failure_marks_failed_and_retry_succeeds() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        let executor = &fx.governance.executor;
        fx.gateway.fail_execute_for(tx.transaction_index);

        let err = executor.execute_one(&tx.transaction_id, "key-b").await.unwrap_err();
        assert!(matches!(err, GovernanceError::Gateway(_)));
        let failed = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(failed.transaction.status, TxStatus::Failed);
        assert!(failed.transaction.failure_reason.is_some());

        fx.gateway.clear_execute_failure(tx.transaction_index);
        let done = executor.execute_one(&tx.transaction_id, "key-b").await.unwrap();
        assert_eq!(done.status, TxStatus::Executed);
        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.transaction.execution_attempts, 2);
        assert!(detail.transaction.failure_reason.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_timeout_is_a_failure() {
        let fx = Fixture::with_config(|c| c.gateway_timeout = std::time::Duration::from_secs(5));
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        fx.gateway.set_execute_delay(Some(std::time::Duration::from_secs(60)));

        let err = fx
            .governance
            .executor
            .execute_one(&tx.transaction_id, "key-b")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::Gateway(crate::blockchain::GatewayError::Timeout(_))
        ));
        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.transaction.status, TxStatus::Failed);
    }

    #[tokio::test]
    async fn concurrent_execution_submits_once() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        fx.gateway.set_execute_delay(Some(std::time::Duration::from_millis(50)));

        let e1 = fx.governance.executor.clone();
        let e2 = fx.governance.executor.clone();
        let (a, b) = tokio::join!(
            e1.execute_one(&tx.transaction_id, "key-b"),
            e2.execute_one(&tx.transaction_id, "key-c"),
        );

        assert_eq!(fx.gateway.execute_calls(), 1);
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, Err(GovernanceError::StateConflict(_)))));
    }

    #[tokio::test]
    async fn owner_only_executor_must_hold_execute() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        let err = fx
            .governance
            .executor
            .execute_one(&tx.transaction_id, "key-zzz")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn executed_hash_is_not_returned_to_non_executors() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;
        let executor = &fx.governance.executor;
        executor.execute_one(&tx.transaction_id, "key-b").await.unwrap();

        let err = executor
            .execute_one(&tx.transaction_id, "key-zzz")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::PermissionDenied(_)));
        assert_eq!(fx.gateway.execute_calls(), 1);
    }

    #[tokio::test]
    async fn scenario_d_batch_isolates_the_failing_item() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let now = Utc::now();
        let first = fx.approved_transfer(now).await;
        let second = fx.approved_transfer(now).await;
        let third = fx.approved_transfer(now).await;
        fx.gateway.fail_execute_for(second.transaction_index);

        let batch = fx.governance.executor.execute_batch("key-b").await.unwrap();
        assert_eq!(batch.processed, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(
            fx.gateway.executed_indices(),
            vec![first.transaction_index, second.transaction_index, third.transaction_index]
        );

        let status = |id: &str| {
            fx.governance
                .proposals
                .transaction_detail(id)
                .unwrap()
                .transaction
                .status
        };
        assert_eq!(status(&first.transaction_id), TxStatus::Executed);
        assert_eq!(status(&second.transaction_id), TxStatus::Failed);
        assert_eq!(status(&third.transaction_id), TxStatus::Executed);
        assert_eq!(batch.results[1].status, TxStatus::Failed);
        assert!(batch.results[1].error.is_some());
        assert!(fx
            .store
            .transactions_with_status(TxStatus::Submitting)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn batch_runs_accounts_independently() {
        let fx = Fixture::new();
        fx.provisioned().await;
        fx.provision_user("user-b", "key-x", "wallet-b").await;
        let now = Utc::now();
        fx.approved_transfer(now).await;
        fx.approved_transfer_from("wallet-b", "key-x", now).await;

        let batch = fx.governance.executor.execute_batch("key-b").await.unwrap();
        assert_eq!(batch.processed, 2);
        assert_eq!(batch.successful, 2);
        assert_ne!(batch.results[0].account_id, batch.results[1].account_id);
    }
}
