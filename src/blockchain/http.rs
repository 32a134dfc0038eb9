// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Blockchain Gateway service.
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/accounts` | `CreateAccountParams` | `CreatedAccount` |
//! | POST | `/transactions` | `TransferParams` | `CreatedTransaction` |
//! | POST | `/multisigs/{address}/transactions/{index}/propose` | `{ "member_key" }` | `{ "instruction" }` |
//! | POST | `/multisigs/{address}/transactions/{index}/approve` | `{ "member_key" }` | `{ "instruction" }` |
//! | POST | `/multisigs/{address}/transactions/{index}/reject` | `{ "member_key" }` | `{ "instruction" }` |
//! | POST | `/multisigs/{address}/transactions/{index}/execute` | `{ "member_key" }` | `ExecutionReceipt` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::gateway::{BlockchainGateway, GatewayError, GatewayResult};
use super::types::{
    CreateAccountParams, CreatedAccount, CreatedTransaction, ExecutionReceipt, TransferParams,
};

#[derive(Serialize)]
struct MemberKeyBody<'a> {
    member_key: &'a str,
}

#[derive(Deserialize)]
struct InstructionBody {
    instruction: String,
}

/// Blockchain Gateway reached over HTTP/JSON.
pub struct HttpGateway {
    base_url: url::Url,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a client for the gateway at `base_url`.
    ///
    /// `timeout` bounds every request at the transport level; callers still
    /// wrap calls in [`super::with_timeout`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut base_url: url::Url = base_url
            .parse()
            .map_err(|e: url::ParseError| GatewayError::Transport(format!("Invalid gateway URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> GatewayResult<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Transport(format!("Invalid gateway path {path}: {e}")))
    }

    fn transaction_path(multisig: &str, index: u64, action: &str) -> String {
        format!("multisigs/{multisig}/transactions/{index}/{action}")
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<T> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Transport(format!("request timed out: {e}"))
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {detail}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl BlockchainGateway for HttpGateway {
    async fn create_account(&self, params: CreateAccountParams<'_>) -> GatewayResult<CreatedAccount> {
        self.post("accounts", &params).await
    }

    async fn create_transaction(&self, params: TransferParams<'_>) -> GatewayResult<CreatedTransaction> {
        self.post("transactions", &params).await
    }

    async fn propose(&self, multisig: &str, index: u64, proposer_key: &str) -> GatewayResult<String> {
        let path = Self::transaction_path(multisig, index, "propose");
        let body: InstructionBody = self
            .post(&path, &MemberKeyBody { member_key: proposer_key })
            .await?;
        Ok(body.instruction)
    }

    async fn approve(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String> {
        let path = Self::transaction_path(multisig, index, "approve");
        let body: InstructionBody = self.post(&path, &MemberKeyBody { member_key }).await?;
        Ok(body.instruction)
    }

    async fn reject(&self, multisig: &str, index: u64, member_key: &str) -> GatewayResult<String> {
        let path = Self::transaction_path(multisig, index, "reject");
        let body: InstructionBody = self.post(&path, &MemberKeyBody { member_key }).await?;
        Ok(body.instruction)
    }

    async fn execute(
        &self,
        multisig: &str,
        index: u64,
        executor_key: &str,
    ) -> GatewayResult<ExecutionReceipt> {
        let path = Self::transaction_path(multisig, index, "execute");
        self.post(&path, &MemberKeyBody { member_key: executor_key })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let gateway = HttpGateway::new("http://gateway.local/api/v1", Duration::from_secs(5)).unwrap();
        let url = gateway.endpoint("accounts").unwrap();
        assert_eq!(url.as_str(), "http://gateway.local/api/v1/accounts");
    }

    #[test]
    fn transaction_paths_embed_address_and_index() {
        let gateway = HttpGateway::new("http://gateway.local/", Duration::from_secs(5)).unwrap();
        let path = HttpGateway::transaction_path("Msig111", 42, "execute");
        let url = gateway.endpoint(&path).unwrap();
        assert_eq!(
            url.as_str(),
            "http://gateway.local/multisigs/Msig111/transactions/42/execute"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpGateway::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }
}
