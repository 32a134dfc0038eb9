// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Multisig - Governance Engine for the Custodial Wallet
//!
//! Fund movements out of a governed wallet become on-chain proposals that
//! need N-of-M signer approval and a time lock before they execute.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - Blockchain Gateway client and mock
//! - `config` - Environment configuration
//! - `governance` - Provisioning, proposals, votes, time lock, execution and inactivity
//! - `storage` - Governance database (redb)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod governance;
pub mod models;
pub mod state;
pub mod storage;
