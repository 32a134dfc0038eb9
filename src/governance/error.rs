// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Governance error taxonomy.

use crate::blockchain::GatewayError;
use crate::storage::StoreError;

/// Errors returned by governance operations.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Bad input; never retryable.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Action is invalid for the current status.
    #[error("{0}")]
    StateConflict(String),

    /// Quorum is not met, or an action would drop active members below threshold.
    #[error("{0}")]
    Quorum(String),

    /// Execution attempted before the time lock elapsed. Callers may poll and retry.
    #[error("time lock active: {remaining_secs}s remaining")]
    TimeLockActive { remaining_secs: i64 },

    /// The source wallet's owner has no governance account yet.
    #[error("{0}")]
    NotGoverned(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;

impl GovernanceError {
    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} not found: {id}"))
    }
}
