// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain Gateway contract.
//!
//! The gateway builds and sends instructions against the on-chain governance
//! program. Everything on the far side of this trait (signature verification,
//! address derivation, instruction encoding) is out of scope for this crate.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    CreateAccountParams, CreatedAccount, CreatedTransaction, ExecutionReceipt, TransferParams,
};

/// Errors that can occur during gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected request: {0}")]
    Rejected(String),

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Trait abstraction for on-chain governance operations.
///
/// Implemented by [`super::HttpGateway`] in production and by
/// `MockGateway` in tests and `dev` builds.
#[async_trait]
pub trait BlockchainGateway: Send + Sync {
    /// Create the on-chain governance account.
    async fn create_account(&self, params: CreateAccountParams<'_>) -> GatewayResult<CreatedAccount>;

    /// Register a transfer transaction on the governance account.
    async fn create_transaction(&self, params: TransferParams<'_>) -> GatewayResult<CreatedTransaction>;

    /// Build the proposal instruction for a registered transaction.
    async fn propose(&self, multisig: &str, index: u64, proposer_key: &str) -> GatewayResult<String>;

    /// Build an approve instruction.
    async fn approve(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String>;

    /// Build a reject instruction.
    async fn reject(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String>;

    /// Execute an approved transaction. This is the irreversible step.
    async fn execute(
        &self,
        multisig: &str,
        index: u64,
        executor_key: &str,
    ) -> GatewayResult<ExecutionReceipt>;
}

/// Bound a gateway call. A timeout is reported as a gateway failure.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_results() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, GatewayError>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: GatewayResult<u8> = with_timeout(Duration::from_secs(1), async {
            Err(GatewayError::Rejected("nope".to_string()))
        })
        .await;
        assert_eq!(err, Err(GatewayError::Rejected("nope".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_converts_hang_into_error() {
        let result: GatewayResult<()> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(GatewayError::Timeout(Duration::from_millis(50))));
    }
}
