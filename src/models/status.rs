// Network Fail-Safe - Engine Status
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Engine state and the status snapshot handed to readers.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

/// Lifecycle state of the failover engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    /// Constructed, never started.
    #[default]
    Init,
    /// Holding the current network.
    Running,
    /// Looking for a usable authorized network.
    Scanning,
    /// A connect attempt is in progress.
    Switching,
    /// Started with an empty priority list.
    NoConfig,
    /// Stopped until the next start.
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::Scanning => "SCANNING",
            Self::Switching => "SWITCHING",
            Self::NoConfig => "NO_CONFIG",
            Self::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the engine status.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Internet reachability at the last check, if any check ran.
    pub online: Option<bool>,
    /// Network the OS reported as active at the last check.
    pub network: Option<String>,
    /// Position of `network` in the priority list; serialized as -1 when absent.
    #[serde(serialize_with = "serialize_index")]
    pub index: Option<usize>,
    /// When the last check completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Local>>,
}

fn serialize_index<S: Serializer>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => serializer.serialize_i64(*i as i64),
        None => serializer.serialize_i64(-1),
    }
}

impl EngineStatus {
    /// Human-readable priority, e.g. "#1", or "Unauthorized".
    pub fn priority_label(&self) -> String {
        match self.index {
            Some(i) => format!("#{}", i + 1),
            None => "Unauthorized".to_string(),
        }
    }

    /// One-line summary for periodic status reporting.
    pub fn summary(&self) -> String {
        let online = if self.online == Some(true) {
            "CONNECTED"
        } else {
            "OFFLINE"
        };
        format!(
            "FailSafe: {} | Net: {} | Priority: {} | State: {}",
            online,
            self.network.as_deref().unwrap_or("None"),
            self.priority_label(),
            self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_serializes_as_minus_one_when_absent() {
        let status = EngineStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["index"], -1);
        assert_eq!(json["state"], "INIT");
        assert!(json["online"].is_null());
    }

    #[test]
    fn test_summary() {
        let status = EngineStatus {
            state: EngineState::Running,
            online: Some(true),
            network: Some("Home".to_string()),
            index: Some(0),
            last_check: None,
        };
        assert_eq!(
            status.summary(),
            "FailSafe: CONNECTED | Net: Home | Priority: #1 | State: RUNNING"
        );
        assert_eq!(EngineStatus::default().priority_label(), "Unauthorized");
    }
}
