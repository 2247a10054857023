// Network Fail-Safe - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Services behind the failover engine.
//!
//! - Command: Bounded external command execution
//! - Reachability: Ping-based internet check
//! - Network: Platform network control (nmcli / netsh)
//! - Notify: Desktop and log notifications
//! - Failover: The decision engine tying them together

pub mod command;
pub mod failover;
pub mod network;
pub mod notify;
pub mod reachability;

pub use command::{CommandRunner, SystemCommandRunner};
pub use failover::{ConfigSource, Counters, FailoverEngine, LogSink, TickOutcome};
pub use network::{CommandNetworkAdapter, NetworkAdapter, Platform};
pub use notify::{DesktopNotifier, LogNotifier, Notifier, Urgency};
pub use reachability::{Reachability, ReachabilityProbe};
