// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User and wallet registry.
//!
//! Governance is required for any outbound movement from a wallet owned by a
//! registered user, so the engine needs to know who owns which wallet and
//! which key each user signs with.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::error::{GovernanceError, GovernanceResult};
use crate::storage::{GovernanceStore, StoreReader, UserRecord};

#[derive(Clone)]
pub struct Registry {
    store: Arc<GovernanceStore>,
}

impl Registry {
    pub fn new(store: Arc<GovernanceStore>) -> Self {
        Self { store }
    }

    /// Register a user with their signing key.
    ///
    /// Registering the same user with the same key again returns the stored
    /// record; a different key is a conflict.
    pub fn register_user(&self, user_id: &str, public_key: &str) -> GovernanceResult<UserRecord> {
        let user_id = user_id.trim();
        let public_key = public_key.trim();
        if user_id.is_empty() || public_key.is_empty() {
            return Err(GovernanceError::Validation(
                "user_id and public_key are required".to_string(),
            ));
        }

        let (user, created) = self.store.write(|w| {
            if let Some(existing) = w.user(user_id)? {
                if existing.public_key != public_key {
                    return Err(GovernanceError::StateConflict(format!(
                        "User {user_id} is already registered with a different key"
                    )));
                }
                return Ok((existing, false));
            }
            let user = UserRecord::new(user_id.to_string(), public_key.to_string());
            w.put_user(&user)?;
            Ok((user, true))
        })?;

        if created {
            info!(user_id = %user.user_id, "User registered");
        }
        Ok(user)
    }

    /// Record that `user_id` owns the wallet at `address`.
    pub fn register_wallet(&self, address: &str, user_id: &str) -> GovernanceResult<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GovernanceError::Validation("Wallet address is required".to_string()));
        }

        self.store.write(|w| {
            let mut user = w
                .user(user_id)?
                .ok_or_else(|| GovernanceError::not_found("User", user_id))?;
            match w.wallet_owner(address)? {
                Some(owner) if owner == user_id => return Ok(()),
                Some(_) => {
                    return Err(GovernanceError::StateConflict(format!(
                        "Wallet {address} is owned by another user"
                    )))
                }
                None => {}
            }
            w.put_wallet_owner(address, user_id)?;
            user.updated_at = Utc::now();
            w.put_user(&user)?;
            Ok(())
        })?;

        info!(user_id = %user_id, wallet = %address, "Wallet registered");
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> GovernanceResult<UserRecord> {
        self.store
            .read()?
            .user(user_id)?
            .ok_or_else(|| GovernanceError::not_found("User", user_id))
    }
}
