// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Multisig Provisioner
//!
//! Creates a user's governance account the first time one is needed.
//!
//! ## Flow
//!
//! 1. A user that already owns an active account gets it back unchanged.
//! 2. Otherwise (no account yet, or the previous one was deactivated) a
//!    create-key is reserved and the user is marked
//!    `Pending { create_key }`. A retry after a failed attempt reuses the
//!    same key, so the on-chain address stays stable.
//! 3. The Blockchain Gateway creates the on-chain account.
//! 4. Only after the gateway confirms are the account, its initial members
//!    and the `Provisioned` marker written, in one transaction.
//!
//! Provisioning is serialised in-process so two concurrent requests for the
//! same user cannot both reach the gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{GovernanceError, GovernanceResult};
use crate::blockchain::{with_timeout, BlockchainGateway, CreateAccountParams, GatewayMember};
use crate::config::GovernanceConfig;
use crate::storage::{
    Capabilities, GovernanceAccount, GovernanceStore, Member, ProvisioningState, StoreReader,
    UserRecord,
};

/// Result of [`Provisioner::ensure_account`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProvisionOutcome {
    pub account: GovernanceAccount,
    pub members: Vec<Member>,
    /// `false` when the account already existed
    pub created: bool,
}

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<GovernanceStore>,
    gateway: Arc<dyn BlockchainGateway>,
    gateway_timeout: Duration,
    default_threshold: u32,
    default_time_lock_secs: u64,
    service_signer_keys: Vec<String>,
    lock: Arc<Mutex<()>>,
}

/// Generate a fresh create-key bound to `user_id`.
fn generate_create_key(user_id: &str) -> GovernanceResult<String> {
    let mut seed = [0u8; 32];
    SystemRandom::new()
        .fill(&mut seed)
        .map_err(|_| GovernanceError::Provisioning("Failed to generate create key".to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(user_id.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

impl Provisioner {
    pub fn new(
        store: Arc<GovernanceStore>,
        gateway: Arc<dyn BlockchainGateway>,
        config: &GovernanceConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout: config.gateway_timeout,
            default_threshold: config.default_threshold,
            default_time_lock_secs: config.default_time_lock_secs,
            service_signer_keys: config.service_signer_keys.clone(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Initial signer set: the user's key with every capability, then each
    /// service signer as a co-signer.
    fn initial_members(&self, user_key: &str) -> Vec<GatewayMember> {
        let mut members = vec![GatewayMember {
            public_key: user_key.to_string(),
            capabilities: Capabilities::ALL,
        }];
        for key in &self.service_signer_keys {
            if members.iter().all(|m| &m.public_key != key) {
                members.push(GatewayMember {
                    public_key: key.clone(),
                    capabilities: Capabilities::COSIGNER,
                });
            }
        }
        members
    }

    /// Mark the user `Pending` under a fresh create-key.
    fn reserve_create_key(&self, user: &UserRecord) -> GovernanceResult<String> {
        let create_key = generate_create_key(&user.user_id)?;
        self.store.write(|w| {
            let mut pending = user.clone();
            pending.provisioning = ProvisioningState::Pending {
                create_key: create_key.clone(),
            };
            pending.updated_at = Utc::now();
            w.put_user(&pending)
        })?;
        Ok(create_key)
    }

    /// Return the user's governance account, creating it if needed.
    pub async fn ensure_account(&self, user_id: &str) -> GovernanceResult<ProvisionOutcome> {
        let _guard = self.lock.lock().await;

        let user = self
            .store
            .read()?
            .user(user_id)?
            .ok_or_else(|| GovernanceError::not_found("User", user_id))?;

        let create_key = match &user.provisioning {
            ProvisioningState::Provisioned { account_id } => {
                let read = self.store.read()?;
                let account = read
                    .account(account_id)?
                    .ok_or_else(|| GovernanceError::not_found("Account", account_id))?;
                if account.active {
                    let members = read.members(account_id)?;
                    return Ok(ProvisionOutcome {
                        account,
                        members,
                        created: false,
                    });
                }
                info!(
                    user_id = %user_id,
                    account_id = %account_id,
                    "Governance account deactivated; provisioning a replacement"
                );
                self.reserve_create_key(&user)?
            }
            ProvisioningState::Pending { create_key } => {
                info!(user_id = %user_id, "Resuming pending provisioning");
                create_key.clone()
            }
            ProvisioningState::Unprovisioned => self.reserve_create_key(&user)?,
        };

        let gateway_members = self.initial_members(&user.public_key);
        let threshold = self
            .default_threshold
            .clamp(1, gateway_members.len() as u32);

        let created = with_timeout(
            self.gateway_timeout,
            self.gateway.create_account(CreateAccountParams {
                creator_key: &user.public_key,
                create_key: &create_key,
                members: &gateway_members,
                threshold,
                time_lock: self.default_time_lock_secs,
            }),
        )
        .await
        .map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Governance account creation failed");
            GovernanceError::Provisioning(e.to_string())
        })?;

        let now = Utc::now();
        let account = GovernanceAccount {
            account_id: Uuid::new_v4().to_string(),
            address: created.address,
            create_key: created.create_key,
            name: format!("{user_id} governance"),
            owner_user_id: user_id.to_string(),
            threshold,
            time_lock_secs: self.default_time_lock_secs,
            active: true,
            transaction_index: 0,
            stale_transaction_index: 0,
            creation_signature: created.signature,
            created_at: now,
            updated_at: now,
        };
        let members: Vec<Member> = gateway_members
            .into_iter()
            .map(|m| Member {
                member_id: Uuid::new_v4().to_string(),
                account_id: account.account_id.clone(),
                user_id: (m.public_key == user.public_key).then(|| user_id.to_string()),
                public_key: m.public_key,
                capabilities: m.capabilities,
                active: true,
                added_at: now,
                deactivated_at: None,
            })
            .collect();

        self.store.write(|w| {
            w.put_account(&account)?;
            for member in &members {
                w.put_member(member)?;
            }
            let mut provisioned = user.clone();
            provisioned.provisioning = ProvisioningState::Provisioned {
                account_id: account.account_id.clone(),
            };
            provisioned.updated_at = now;
            w.put_user(&provisioned)
        })?;

        info!(
            user_id = %user_id,
            account_id = %account.account_id,
            address = %account.address,
            threshold,
            members = members.len(),
            "Governance account provisioned"
        );

        Ok(ProvisionOutcome {
            account,
            members,
            created: true,
        })
    }
}
