// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistence Store
//!
//! Durable records for governance accounts, members, governed transactions,
//! proposals, approvals, settings changes, signer removals and signer
//! activity.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   governance/
//!     governance.redb   # Embedded ACID database (all governance tables)
//! ```
//!
//! Signer activity lives in the same database as everything else, so
//! inactivity detection survives restarts and is shared by every request
//! handler and the background sweeper.

pub mod governance_db;
pub mod paths;
pub mod records;

pub use governance_db::{GovernanceStore, StoreError, StoreRead, StoreReader, StoreResult, StoreWrite};
pub use paths::StoragePaths;
pub use records::{
    Approval, Capabilities, Capability, GovernanceAccount, GovernedTransaction, Member,
    MemberActivity, Proposal, ProposalStatus, ProvisioningState, SettingsChange, SettingsVote,
    SignerRemoval, TxStatus, UserRecord, VoteType,
};
