// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process Blockchain Gateway for tests and `dev` builds.
//!
//! Records every call and supports failure and latency injection so the
//! executor's partial-failure paths can be exercised without a chain.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::gateway::{BlockchainGateway, GatewayError, GatewayResult};
use super::types::{
    CreateAccountParams, CreatedAccount, CreatedTransaction, ExecutionReceipt, TransferParams,
};

#[derive(Default)]
struct MockState {
    accounts_created: u32,
    fail_create_account: bool,
    fail_create_transaction: bool,
    fail_votes: bool,
    fail_execute_indices: HashSet<u64>,
    execute_delay: Option<Duration>,
    create_transaction_delay: Option<Duration>,
    create_transaction_calls: usize,
    execute_calls: Vec<(String, u64, String)>,
}

/// Mock gateway with shared, clonable state.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `create_account` fail until cleared.
    pub fn set_fail_create_account(&self, fail: bool) {
        self.state().fail_create_account = fail;
    }

    /// Make `create_transaction` fail until cleared.
    pub fn set_fail_create_transaction(&self, fail: bool) {
        self.state().fail_create_transaction = fail;
    }

    /// Make approve/reject instruction building fail until cleared.
    pub fn set_fail_votes(&self, fail: bool) {
        self.state().fail_votes = fail;
    }

    /// Make `execute` fail for the given transaction index.
    pub fn fail_execute_for(&self, index: u64) {
        self.state().fail_execute_indices.insert(index);
    }

    /// Stop failing `execute` for the given transaction index.
    pub fn clear_execute_failure(&self, index: u64) {
        self.state().fail_execute_indices.remove(&index);
    }

    /// Delay every `execute` call.
    pub fn set_execute_delay(&self, delay: Option<Duration>) {
        self.state().execute_delay = delay;
    }

    /// Delay every `create_transaction` call.
    pub fn set_create_transaction_delay(&self, delay: Option<Duration>) {
        self.state().create_transaction_delay = delay;
    }

    /// Number of `create_transaction` calls observed (successful or not).
    pub fn create_transaction_calls(&self) -> usize {
        self.state().create_transaction_calls
    }

    /// Number of `execute` calls observed (successful or not).
    pub fn execute_calls(&self) -> usize {
        self.state().execute_calls.len()
    }

    /// Indices passed to `execute`, in call order.
    pub fn executed_indices(&self) -> Vec<u64> {
        self.state().execute_calls.iter().map(|(_, i, _)| *i).collect()
    }

    pub fn accounts_created(&self) -> u32 {
        self.state().accounts_created
    }
}

#[async_trait]
impl BlockchainGateway for MockGateway {
    async fn create_account(&self, params: CreateAccountParams<'_>) -> GatewayResult<CreatedAccount> {
        let mut state = self.state();
        if state.fail_create_account {
            return Err(GatewayError::Rejected("account creation failed".to_string()));
        }
        state.accounts_created += 1;
        Ok(CreatedAccount {
            address: format!("msig-{}", &params.create_key[..params.create_key.len().min(16)]),
            create_key: params.create_key.to_string(),
            signature: format!("create-sig-{}", state.accounts_created),
        })
    }

    async fn create_transaction(&self, params: TransferParams<'_>) -> GatewayResult<CreatedTransaction> {
        let delay = {
            let mut state = self.state();
            state.create_transaction_calls += 1;
            state.create_transaction_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state().fail_create_transaction {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(CreatedTransaction {
            index: params.index,
            instruction: format!("create-tx:{}:{}", params.multisig, params.index),
        })
    }

    async fn propose(&self, multisig: &str, index: u64, proposer_key: &str) -> GatewayResult<String> {
        Ok(format!("propose:{multisig}:{index}:{proposer_key}"))
    }

    async fn approve(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String> {
        if self.state().fail_votes {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(format!("approve:{multisig}:{index}:{member_key}"))
    }

    async fn reject(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String> {
        if self.state().fail_votes {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(format!("reject:{multisig}:{index}:{member_key}"))
    }

    async fn execute(
        &self,
        multisig: &str,
        index: u64,
        executor_key: &str,
    ) -> GatewayResult<ExecutionReceipt> {
        let delay = {
            let mut state = self.state();
            state
                .execute_calls
                .push((multisig.to_string(), index, executor_key.to_string()));
            state.execute_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state().fail_execute_indices.contains(&index) {
            return Err(GatewayError::Rejected(format!(
                "simulated execution failure for index {index}"
            )));
        }
        Ok(ExecutionReceipt {
            signature: format!("sig-{multisig}-{index}"),
        })
    }
}
