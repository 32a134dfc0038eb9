// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Governance Sweeper
//!
//! The one periodic task per process. Each sweep:
//! 1. Executes every APPROVED transaction whose time lock has elapsed
//!    (skipped when no executor key is configured).
//! 2. Scans for inactive signers and logs them.
//! 3. Removes removal-eligible signers when `AUTO_REMOVE_INACTIVE` is set.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown. A sweep
//! in progress finishes before the loop observes cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::executor::AutoExecutor;
use super::inactivity::InactivityMonitor;
use crate::config::GovernanceConfig;

/// Summary of one sweep, mostly for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub executed: usize,
    pub execution_failures: usize,
    pub inactive: usize,
    pub removed: usize,
}

pub struct GovernanceSweeper {
    executor: AutoExecutor,
    inactivity: InactivityMonitor,
    executor_key: Option<String>,
    interval: Duration,
    auto_remove: bool,
}

impl GovernanceSweeper {
    pub fn new(executor: AutoExecutor, inactivity: InactivityMonitor, config: &GovernanceConfig) -> Self {
        Self {
            executor,
            inactivity,
            executor_key: config.executor_key.clone(),
            interval: config.sweep_interval,
            auto_remove: config.auto_remove_inactive,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            executor_configured = self.executor_key.is_some(),
            auto_remove = self.auto_remove,
            "Governance sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Governance sweeper shutting down");
                return;
            }

            self.sweep().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Governance sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(executor_key) = &self.executor_key {
            match self.executor.execute_batch(executor_key).await {
                Ok(batch) if batch.processed > 0 => {
                    info!(
                        processed = batch.processed,
                        successful = batch.successful,
                        failed = batch.failed,
                        "Sweeper: batch execution finished"
                    );
                    report.executed = batch.successful;
                    report.execution_failures = batch.failed;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Sweeper: batch execution failed"),
            }
        }

        match self.inactivity.list_inactive() {
            Ok(inactive) => {
                if !inactive.is_empty() {
                    info!(count = inactive.len(), "Sweeper: inactive signers detected");
                }
                report.inactive = inactive.len();
            }
            Err(e) => warn!(error = %e, "Sweeper: inactivity scan failed"),
        }

        if self.auto_remove {
            match self.inactivity.remove_all_eligible() {
                Ok(batch) if batch.processed > 0 => {
                    info!(
                        processed = batch.processed,
                        removed = batch.removed,
                        failed = batch.failed,
                        "Sweeper: inactive signer removal finished"
                    );
                    report.removed = batch.removed;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Sweeper: inactive signer removal failed"),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::testing::Fixture;
    use crate::storage::TxStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn sweep_executes_approved_transactions() {
        let fx = Fixture::new();
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;

        let report = fx.sweeper().sweep().await;
        assert_eq!(report.executed, 1);
        assert_eq!(report.execution_failures, 0);
        assert_eq!(report.removed, 0);

        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.transaction.status, TxStatus::Executed);
    }

    #[tokio::test]
    async fn sweep_without_executor_key_leaves_transactions() {
        let fx = Fixture::with_config(|c| c.executor_key = None);
        fx.provisioned().await;
        let tx = fx.approved_transfer(Utc::now()).await;

        let report = fx.sweeper().sweep().await;
        assert_eq!(report, SweepReport::default());
        let detail = fx.governance.proposals.transaction_detail(&tx.transaction_id).unwrap();
        assert_eq!(detail.transaction.status, TxStatus::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancellation() {
        let fx = Fixture::new();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(fx.sweeper().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
