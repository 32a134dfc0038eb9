// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::BlockchainGateway;
use crate::config::GovernanceConfig;
use crate::governance::Governance;
use crate::storage::GovernanceStore;

/// Shared state for request handlers and the background sweeper.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GovernanceStore>,
    pub governance: Governance,
    pub config: Arc<GovernanceConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<GovernanceStore>,
        gateway: Arc<dyn BlockchainGateway>,
        config: GovernanceConfig,
    ) -> Self {
        let governance = Governance::new(store.clone(), gateway, &config);
        Self {
            store,
            governance,
            config: Arc::new(config),
        }
    }
}
