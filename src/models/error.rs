// Network Fail-Safe - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the Network Fail-Safe daemon.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Network Fail-Safe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single external command run.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("Command timed out after {}ms: {command}", .limit.as_millis())]
    Timeout { command: String, limit: Duration },

    #[error("Command exited with {}: {command}: {}", exit_label(.code), .stderr.trim())]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    #[error("Failed to spawn {command}: {reason}")]
    SpawnFailure { command: String, reason: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

impl CommandError {
    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Everything the command printed before failing, stdout first.
    pub fn output(&self) -> String {
        match self {
            Self::NonZeroExit { stdout, stderr, .. } => {
                let mut out = stdout.trim().to_string();
                if !stderr.trim().is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(stderr.trim());
                }
                out
            }
            other => other.to_string(),
        }
    }
}

/// Main error type for Network Fail-Safe operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Command Errors
    // ========================================
    #[error(transparent)]
    Command(#[from] CommandError),

    // ========================================
    // Network Errors
    // ========================================
    #[error("Connect to {profile} failed: {output}")]
    ConnectFailed { profile: String, output: String },

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new connect failed error.
    pub fn connect_failed(profile: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ConnectFailed {
            profile: profile.into(),
            output: output.into(),
        }
    }

    /// Check if this error came from a command hitting its time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Command(e) if e.is_timeout())
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_output_joins_streams() {
        let err = CommandError::NonZeroExit {
            command: "nmcli device wifi connect Home".to_string(),
            code: Some(10),
            stderr: "Error: No network with SSID 'Home' found.\n".to_string(),
            stdout: String::new(),
        };
        assert_eq!(err.output(), "Error: No network with SSID 'Home' found.");
        assert!(err.to_string().contains("status 10"));
    }

    #[test]
    fn test_timeout_detection() {
        let err: Error = CommandError::Timeout {
            command: "ping".to_string(),
            limit: Duration::from_millis(1500),
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("1500ms"));
        assert!(!Error::connect_failed("Home", "Error: timeout waiting for reply").is_timeout());
    }
}
