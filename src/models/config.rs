// Network Fail-Safe - Failover Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Failover configuration model.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine fallback for an unset (zero) recover threshold.
pub const FALLBACK_RECOVER_THRESHOLD: u32 = 5;

/// Engine fallback for an unset (zero) check interval.
pub const FALLBACK_CHECK_INTERVAL_MS: u64 = 5000;

/// Failover configuration, read once per engine start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Authorized profiles, most preferred first.
    #[serde(default)]
    pub priority_list: Vec<String>,

    /// Check interval in milliseconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,

    /// Number of failed checks before taking action.
    ///
    /// Loaded and reported, never consulted by the decision logic.
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: u32,

    /// Consecutive stable ticks before trying a higher priority profile.
    #[serde(default = "default_recover_threshold")]
    pub recover_threshold: u32,

    /// Echo targets tried in order for the reachability check.
    #[serde(default = "default_probe_targets")]
    pub probe_targets: Vec<String>,

    /// Per-target echo timeout in milliseconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Upper bound for every network-control command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Show desktop notifications.
    #[serde(default = "default_true")]
    pub show_notifications: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum log entries to keep.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

fn default_check_interval() -> u64 {
    3000
}

fn default_fail_threshold() -> u32 {
    3
}

fn default_recover_threshold() -> u32 {
    2
}

fn default_probe_targets() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_entries() -> usize {
    1000
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            priority_list: Vec::new(),
            check_interval_ms: default_check_interval(),
            fail_threshold: default_fail_threshold(),
            recover_threshold: default_recover_threshold(),
            probe_targets: default_probe_targets(),
            probe_timeout_ms: default_probe_timeout(),
            command_timeout_ms: default_command_timeout(),
            show_notifications: true,
            log_level: default_log_level(),
            max_log_entries: default_max_log_entries(),
        }
    }
}

impl FailoverConfig {
    /// Create a configuration with the given priority list and defaults elsewhere.
    pub fn with_priority_list<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            priority_list: profiles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether there is anything for the engine to do.
    pub fn has_priority_list(&self) -> bool {
        !self.priority_list.is_empty()
    }

    /// Position of a profile in the priority list.
    pub fn index_of(&self, profile: &str) -> Option<usize> {
        self.priority_list.iter().position(|p| p == profile)
    }

    /// Recover threshold as the engine applies it (zero counts as unset).
    pub fn effective_recover_threshold(&self) -> u32 {
        match self.recover_threshold {
            0 => FALLBACK_RECOVER_THRESHOLD,
            n => n,
        }
    }

    /// Timer period as the engine applies it (zero counts as unset).
    pub fn effective_check_interval(&self) -> Duration {
        match self.check_interval_ms {
            0 => Duration::from_millis(FALLBACK_CHECK_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }

    /// Load configuration from TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_config_defaults() {
        let config: FailoverConfig = toml::from_str("priority_list = [\"Home\", \"Phone\"]").unwrap();
        assert_eq!(config.priority_list, vec!["Home", "Phone"]);
        assert_eq!(config.check_interval_ms, 3000);
        assert_eq!(config.fail_threshold, 3);
        assert_eq!(config.recover_threshold, 2);
        assert_eq!(config.probe_targets, vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn test_zero_values_fall_back_to_engine_defaults() {
        let config = FailoverConfig {
            check_interval_ms: 0,
            recover_threshold: 0,
            ..FailoverConfig::default()
        };
        assert_eq!(config.effective_recover_threshold(), 5);
        assert_eq!(config.effective_check_interval(), Duration::from_millis(5000));

        let config = FailoverConfig::default();
        assert_eq!(config.effective_recover_threshold(), 2);
        assert_eq!(config.effective_check_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn test_index_of() {
        let config = FailoverConfig::with_priority_list(["A", "B", "C"]);
        assert_eq!(config.index_of("B"), Some(1));
        assert_eq!(config.index_of("Z"), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = FailoverConfig::with_priority_list(["Office", "Hotspot"]);
        config.save_to_file(&path).unwrap();
        assert_eq!(FailoverConfig::load_from_file(&path).unwrap(), config);
    }
}
