// Network Fail-Safe - Shared Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared types used by the engine, the services and the daemon:
//!
//! - **Config**: Failover configuration (priority list, thresholds, timeouts)
//! - **Status**: Engine state and status snapshots
//! - **Error**: Shared error types

pub mod config;
pub mod error;
pub mod status;

pub use config::FailoverConfig;
pub use error::{CommandError, Error, Result};
pub use status::{EngineState, EngineStatus};

/// Application name used for identifiers and notifications.
pub const APP_ID: &str = "network-failsafe";

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "network-failsafe";
