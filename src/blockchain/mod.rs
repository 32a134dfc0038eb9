// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain Gateway integration.
//!
//! This module provides:
//! - The [`BlockchainGateway`] contract consumed by the governance engine
//! - An HTTP/JSON client for the external gateway service
//! - A bounded-timeout wrapper; a timeout counts as a gateway failure
//! - An in-process mock for tests and `dev` builds

pub mod gateway;
pub mod http;
#[cfg(any(test, feature = "dev"))]
pub mod mock;
pub mod types;

pub use gateway::{with_timeout, BlockchainGateway, GatewayError, GatewayResult};
pub use http::HttpGateway;
#[cfg(any(test, feature = "dev"))]
pub use mock::MockGateway;
pub use types::*;
