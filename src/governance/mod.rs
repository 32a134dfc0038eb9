// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Multisig Governance Engine
//!
//! Turns fund-movement requests into threshold-approved, time-locked,
//! on-chain-executed transactions.
//!
//! ## Components
//!
//! - [`Registry`]: users and the wallets they own
//! - [`Provisioner`]: creates a user's governance account on demand
//! - [`ProposalManager`]: governance decision, index allocation, proposals
//!   and cancellation
//! - [`SettingsManager`]: quorum-approved threshold and time-lock changes
//! - [`ApprovalAggregator`]: votes and proposal status
//! - [`TimeLockGate`]: quorum plus mandatory delay
//! - [`AutoExecutor`]: status compare-and-set and gateway submission
//! - [`InactivityMonitor`]: signer activity, removal and account health
//! - [`GovernanceSweeper`]: the periodic background task
//!
//! ## Transaction Status
//!
//! ```text
//! PENDING ◀─▶ PROPOSING ─▶ PROPOSED ◀─▶ APPROVED ─▶ SUBMITTING ─▶ EXECUTED
//!    │                       │  │          ▲             │
//!    │                       │  │          └── FAILED ◀──┘
//!    │                       │  └─▶ REJECTED
//!    └───────────────────────┴─▶ CANCELLED
//! ```
//!
//! EXECUTED, REJECTED and CANCELLED are terminal. PROPOSING falls back to
//! PENDING when the gateway fails. An APPROVED transaction returns to
//! PROPOSED when a signer removal costs it quorum, and is cancelled when a
//! settings change raises the threshold above its approvals.

pub mod approvals;
pub mod error;
pub mod executor;
pub mod inactivity;
pub mod proposals;
pub mod provisioner;
pub mod registry;
pub mod settings;
pub mod sweeper;
pub mod timelock;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use approvals::{ApprovalAggregator, VoteOutcome};
pub use error::{GovernanceError, GovernanceResult};
pub use executor::{AutoExecutor, BatchItem, BatchResult, ExecutionOutcome};
pub use inactivity::{
    AccountHealth, InactiveMember, InactivityMonitor, RemovalBatch, RemovalResult, SYSTEM_REMOVER,
};
pub use proposals::{ProposalManager, ProposalOutcome, TransactionDetail, TransferRequest};
pub use provisioner::{ProvisionOutcome, Provisioner};
pub use registry::Registry;
pub use settings::{SettingsManager, SettingsOutcome, SettingsVoteOutcome};
pub use sweeper::{GovernanceSweeper, SweepReport};
pub use timelock::{TimeLockGate, TimeLockStatus};

use crate::blockchain::BlockchainGateway;
use crate::config::GovernanceConfig;
use crate::storage::GovernanceStore;

/// All governance components over one store and gateway.
#[derive(Clone)]
pub struct Governance {
    pub registry: Registry,
    pub provisioner: Provisioner,
    pub proposals: ProposalManager,
    pub settings: SettingsManager,
    pub approvals: ApprovalAggregator,
    pub time_lock: TimeLockGate,
    pub executor: AutoExecutor,
    pub inactivity: InactivityMonitor,
}

impl Governance {
    pub fn new(
        store: Arc<GovernanceStore>,
        gateway: Arc<dyn BlockchainGateway>,
        config: &GovernanceConfig,
    ) -> Self {
        let timeout = config.gateway_timeout;
        Self {
            registry: Registry::new(store.clone()),
            provisioner: Provisioner::new(store.clone(), gateway.clone(), config),
            proposals: ProposalManager::new(store.clone(), gateway.clone(), timeout),
            settings: SettingsManager::new(store.clone()),
            approvals: ApprovalAggregator::new(store.clone(), gateway.clone(), timeout),
            time_lock: TimeLockGate::new(store.clone()),
            executor: AutoExecutor::new(store.clone(), gateway, timeout),
            inactivity: InactivityMonitor::new(store, config),
        }
    }

    /// Background sweeper sharing this engine's components.
    pub fn sweeper(&self, config: &GovernanceConfig) -> GovernanceSweeper {
        GovernanceSweeper::new(self.executor.clone(), self.inactivity.clone(), config)
    }
}
