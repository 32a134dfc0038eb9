// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`GovernanceConfig`] loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for persistent storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `BLOCKCHAIN_GATEWAY_URL` | Base URL of the Blockchain Gateway | Required (mock in `dev` builds) |
//! | `GATEWAY_TIMEOUT_SECS` | Upper bound for every gateway call | `30` |
//! | `DEFAULT_THRESHOLD` | Threshold for newly provisioned accounts | `2` |
//! | `DEFAULT_TIME_LOCK_SECS` | Time lock for newly provisioned accounts | `0` |
//! | `SERVICE_SIGNER_KEYS` | Comma-separated co-signer keys added to every account | empty |
//! | `EXECUTOR_KEY` | Key used by batch execution sweeps | first service signer |
//! | `INACTIVITY_WINDOW_HOURS` | Idle time before a signer is flagged inactive | `24` |
//! | `REMOVAL_ELIGIBLE_HOURS` | Idle time before an inactive signer may be removed | `48` |
//! | `SWEEP_INTERVAL_SECS` | Interval of the background sweeper | `60` |
//! | `AUTO_REMOVE_INACTIVE` | Let the sweeper remove eligible signers | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use crate::storage::StoragePaths;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const GATEWAY_URL_ENV: &str = "BLOCKCHAIN_GATEWAY_URL";
pub const GATEWAY_TIMEOUT_ENV: &str = "GATEWAY_TIMEOUT_SECS";
pub const DEFAULT_THRESHOLD_ENV: &str = "DEFAULT_THRESHOLD";
pub const DEFAULT_TIME_LOCK_ENV: &str = "DEFAULT_TIME_LOCK_SECS";
pub const SERVICE_SIGNER_KEYS_ENV: &str = "SERVICE_SIGNER_KEYS";
pub const EXECUTOR_KEY_ENV: &str = "EXECUTOR_KEY";
pub const INACTIVITY_WINDOW_ENV: &str = "INACTIVITY_WINDOW_HOURS";
pub const REMOVAL_ELIGIBLE_ENV: &str = "REMOVAL_ELIGIBLE_HOURS";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const AUTO_REMOVE_ENV: &str = "AUTO_REMOVE_INACTIVE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Upper bound for the inactivity and removal windows (100 years).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 100;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {value:?} ({reason})")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Governance engine configuration.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub data_dir: String,
    pub host: String,
    pub port: u16,
    pub gateway_url: Option<String>,
    pub gateway_timeout: Duration,
    pub default_threshold: u32,
    pub default_time_lock_secs: u64,
    pub service_signer_keys: Vec<String>,
    pub executor_key: Option<String>,
    pub inactivity_window_hours: i64,
    pub removal_eligible_hours: i64,
    pub sweep_interval: Duration,
    pub auto_remove_inactive: bool,
    pub log_format: LogFormat,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            gateway_url: None,
            gateway_timeout: Duration::from_secs(30),
            default_threshold: 2,
            default_time_lock_secs: 0,
            service_signer_keys: Vec::new(),
            executor_key: None,
            inactivity_window_hours: 24,
            removal_eligible_hours: 48,
            sweep_interval: Duration::from_secs(60),
            auto_remove_inactive: false,
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn parse_ranged<T>(
    name: &'static str,
    raw: Option<String>,
    default: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let value = parse_var(name, raw, default)?;
    if !range.contains(&value) {
        return Err(ConfigError {
            name,
            value: value.to_string(),
            reason: format!("must be between {} and {}", range.start(), range.end()),
        });
    }
    Ok(value)
}

impl GovernanceConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using `lookup` to resolve variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let service_signer_keys: Vec<String> = lookup(SERVICE_SIGNER_KEYS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let executor_key = lookup(EXECUTOR_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .or_else(|| service_signer_keys.first().cloned());

        let default_threshold: u32 =
            parse_var(DEFAULT_THRESHOLD_ENV, lookup(DEFAULT_THRESHOLD_ENV), defaults.default_threshold)?;
        if default_threshold == 0 {
            return Err(ConfigError {
                name: DEFAULT_THRESHOLD_ENV,
                value: "0".to_string(),
                reason: "threshold must be at least 1".to_string(),
            });
        }

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let auto_remove_inactive = match lookup(AUTO_REMOVE_ENV) {
            Some(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => defaults.auto_remove_inactive,
        };

        Ok(Self {
            data_dir: lookup(DATA_DIR_ENV).unwrap_or(defaults.data_dir),
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: parse_var(PORT_ENV, lookup(PORT_ENV), defaults.port)?,
            gateway_url: lookup(GATEWAY_URL_ENV).filter(|u| !u.trim().is_empty()),
            gateway_timeout: Duration::from_secs(parse_ranged(
                GATEWAY_TIMEOUT_ENV,
                lookup(GATEWAY_TIMEOUT_ENV),
                defaults.gateway_timeout.as_secs(),
                1..=u64::from(u32::MAX),
            )?),
            default_threshold,
            default_time_lock_secs: parse_var(
                DEFAULT_TIME_LOCK_ENV,
                lookup(DEFAULT_TIME_LOCK_ENV),
                defaults.default_time_lock_secs,
            )?,
            service_signer_keys,
            executor_key,
            inactivity_window_hours: parse_ranged(
                INACTIVITY_WINDOW_ENV,
                lookup(INACTIVITY_WINDOW_ENV),
                defaults.inactivity_window_hours,
                0..=MAX_WINDOW_HOURS,
            )?,
            removal_eligible_hours: parse_ranged(
                REMOVAL_ELIGIBLE_ENV,
                lookup(REMOVAL_ELIGIBLE_ENV),
                defaults.removal_eligible_hours,
                0..=MAX_WINDOW_HOURS,
            )?,
            sweep_interval: Duration::from_secs(parse_ranged(
                SWEEP_INTERVAL_ENV,
                lookup(SWEEP_INTERVAL_ENV),
                defaults.sweep_interval.as_secs(),
                1..=u64::from(u32::MAX),
            )?),
            auto_remove_inactive,
            log_format,
        })
    }

    /// Storage paths rooted at the configured data directory.
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir)
    }
}
