// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain Gateway request/response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::Capabilities;

/// A member enrolled on the on-chain governance account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GatewayMember {
    pub public_key: String,
    pub capabilities: Capabilities,
}

/// Result of creating an on-chain governance account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedAccount {
    /// On-chain address of the governance account
    pub address: String,
    /// Create-key the address was derived from
    pub create_key: String,
    /// Signature of the creation transaction
    pub signature: String,
}

/// Result of registering a transfer transaction on-chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedTransaction {
    /// Transaction index assigned on-chain
    pub index: u64,
    /// Serialized instruction
    pub instruction: String,
}

/// Result of executing a transaction on-chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionReceipt {
    /// Transaction signature / hash
    pub signature: String,
}

/// Parameters for account creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountParams<'a> {
    pub creator_key: &'a str,
    pub create_key: &'a str,
    pub members: &'a [GatewayMember],
    pub threshold: u32,
    pub time_lock: u64,
}

/// Parameters for registering a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferParams<'a> {
    /// On-chain governance account address
    pub multisig: &'a str,
    /// Index allocated off-chain; the gateway registers the transfer at this slot
    pub index: u64,
    pub from: &'a str,
    pub to: &'a str,
    pub amount: &'a str,
    pub currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<&'a str>,
}
