// Network Fail-Safe - Library Root
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Network Fail-Safe
//!
//! Keeps a host on the best authorized network it can reach. A
//! [`FailoverEngine`](services::FailoverEngine) polls internet
//! reachability, fails over down a priority list of saved profiles when
//! the link drops, and climbs back up once a higher-ranked profile is in
//! range again.

pub mod models;
pub mod network_utils;
pub mod services;
pub mod storage;

/// Human-readable application name.
pub const APP_NAME: &str = "Network Fail-Safe";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
