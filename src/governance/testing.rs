// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for governance tests.
//!
//! The default fixture provisions `user-a` (key `key-a`, wallet `wallet-a`)
//! with service signers `key-b` and `key-c`, threshold 2 and no time lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use super::{Governance, GovernanceSweeper, ProposalOutcome, TransferRequest};
use crate::blockchain::MockGateway;
use crate::config::GovernanceConfig;
use crate::storage::{GovernanceAccount, GovernanceStore, GovernedTransaction, Member, StoreReader, TxStatus, VoteType};

pub(crate) struct Fixture {
    pub governance: Governance,
    pub gateway: MockGateway,
    pub store: Arc<GovernanceStore>,
    pub config: GovernanceConfig,
    _dir: TempDir,
}

pub(crate) fn transfer(from: &str, requested_by: &str, amount: &str) -> TransferRequest {
    TransferRequest {
        from_wallet: from.to_string(),
        to_wallet: "wallet-external".to_string(),
        amount: amount.to_string(),
        currency: "EURC".to_string(),
        notes: None,
        requested_by: requested_by.to_string(),
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut GovernanceConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GovernanceConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            service_signer_keys: vec!["key-b".to_string(), "key-c".to_string()],
            executor_key: Some("key-b".to_string()),
            ..GovernanceConfig::default()
        };
        customize(&mut config);

        let store = Arc::new(GovernanceStore::open(&config.storage_paths().governance_db()).unwrap());
        let gateway = MockGateway::new();
        let governance = Governance::new(store.clone(), Arc::new(gateway.clone()), &config);
        Self {
            governance,
            gateway,
            store,
            config,
            _dir: dir,
        }
    }

    pub fn sweeper(&self) -> GovernanceSweeper {
        self.governance.sweeper(&self.config)
    }

    /// Register a user owning `wallet` and provision their account.
    pub async fn provision_user(&self, user_id: &str, key: &str, wallet: &str) -> GovernanceAccount {
        self.governance.registry.register_user(user_id, key).unwrap();
        self.governance.registry.register_wallet(wallet, user_id).unwrap();
        self.governance
            .provisioner
            .ensure_account(user_id)
            .await
            .unwrap()
            .account
    }

    pub async fn provisioned(&self) -> GovernanceAccount {
        self.provision_user("user-a", "key-a", "wallet-a").await
    }

    /// Member of user-a's account holding `key`.
    pub fn member(&self, key: &str) -> Member {
        let read = self.store.read().unwrap();
        let user = read.user("user-a").unwrap().unwrap();
        let account_id = user.account_id().unwrap();
        read.member_by_key(account_id, key).unwrap().unwrap()
    }

    pub async fn propose_from(&self, wallet: &str, requested_by: &str, amount: &str) -> GovernedTransaction {
        let outcome = self
            .governance
            .proposals
            .create_transfer_proposal(transfer(wallet, requested_by, amount))
            .await
            .unwrap();
        match outcome {
            ProposalOutcome::Required { transaction, .. } => {
                assert_eq!(transaction.status, TxStatus::Proposed);
                transaction
            }
            ProposalOutcome::NotRequired => panic!("{wallet} should be governed"),
        }
    }

    /// A PROPOSED transfer out of `wallet-a`.
    pub async fn propose(&self, amount: &str) -> GovernedTransaction {
        self.propose_from("wallet-a", "key-a", amount).await
    }

    /// A transfer out of `wallet` approved by its owner and `key-b` at `at`.
    pub async fn approved_transfer_from(
        &self,
        wallet: &str,
        owner_key: &str,
        at: DateTime<Utc>,
    ) -> GovernedTransaction {
        let tx = self.propose_from(wallet, owner_key, "10").await;
        for key in [owner_key, "key-b"] {
            self.governance
                .approvals
                .vote_at(&tx.transaction_id, key, VoteType::Approve, at)
                .await
                .unwrap();
        }
        let approved = self
            .store
            .read()
            .unwrap()
            .transaction(&tx.transaction_id)
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, TxStatus::Approved);
        approved
    }

    pub async fn approved_transfer(&self, at: DateTime<Utc>) -> GovernedTransaction {
        self.approved_transfer_from("wallet-a", "key-a", at).await
    }
}
