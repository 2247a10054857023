// Network Fail-Safe - Network Adapter
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Platform network control.
//!
//! [`NetworkAdapter`] is the capability set the failover engine drives.
//! [`CommandNetworkAdapter`] implements it on top of `nmcli` (POSIX) or
//! `netsh wlan` (Windows); every call is bounded by the command timeout.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::command::CommandRunner;
use crate::models::{Error, Result};
use crate::network_utils::{
    output_reports_failure, parse_netsh_active, parse_netsh_profiles, parse_netsh_ssids,
    parse_nmcli_active, parse_nmcli_profiles, parse_nmcli_ssids,
};

/// OS command dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// NetworkManager's `nmcli`.
    Posix,
    /// `netsh wlan`.
    Windows,
}

impl Platform {
    /// Dialect of the platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posix => "nmcli",
            Self::Windows => "netsh",
        }
    }
}

/// Network-control operations the engine needs.
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    /// Saved profiles known to the OS.
    async fn list_profiles(&self) -> Result<Vec<String>>;

    /// Profile the OS currently reports as connected.
    async fn active_network(&self) -> Result<Option<String>>;

    /// Whether `profile` is visible in a current scan.
    ///
    /// The scan is parsed into SSIDs and compared whole. A plain substring
    /// search of the tool output would report `HomeNet` as in range while
    /// only `HomeNet-Guest` is.
    async fn is_profile_available(&self, profile: &str) -> Result<bool>;

    /// Associate with `profile`.
    async fn connect(&self, profile: &str) -> Result<()>;
}

/// Adapter that drives the platform's command-line tool.
pub struct CommandNetworkAdapter {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    timeout: Duration,
}

impl CommandNetworkAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, platform: Platform, timeout: Duration) -> Self {
        Self {
            runner,
            platform,
            timeout,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        Ok(self.runner.run(program, args, self.timeout).await?)
    }
}

#[async_trait]
impl NetworkAdapter for CommandNetworkAdapter {
    async fn list_profiles(&self) -> Result<Vec<String>> {
        match self.platform {
            Platform::Posix => {
                let out = self.run("nmcli", &["-t", "-f", "NAME", "connection", "show"]).await?;
                Ok(parse_nmcli_profiles(&out))
            }
            Platform::Windows => {
                let out = self.run("netsh", &["wlan", "show", "profiles"]).await?;
                Ok(parse_netsh_profiles(&out))
            }
        }
    }

    async fn active_network(&self) -> Result<Option<String>> {
        match self.platform {
            Platform::Posix => {
                let out = self
                    .run("nmcli", &["-t", "-f", "NAME,STATE", "connection", "show", "--active"])
                    .await?;
                Ok(parse_nmcli_active(&out))
            }
            Platform::Windows => {
                let out = self.run("netsh", &["wlan", "show", "interfaces"]).await?;
                Ok(parse_netsh_active(&out))
            }
        }
    }

    async fn is_profile_available(&self, profile: &str) -> Result<bool> {
        let ssids = match self.platform {
            Platform::Posix => {
                let out = self.run("nmcli", &["-t", "-f", "SSID", "dev", "wifi"]).await?;
                parse_nmcli_ssids(&out)
            }
            Platform::Windows => {
                let out = self.run("netsh", &["wlan", "show", "networks"]).await?;
                parse_netsh_ssids(&out)
            }
        };
        let available = ssids.iter().any(|ssid| ssid == profile);
        debug!("Profile {} available: {}", profile, available);
        Ok(available)
    }

    async fn connect(&self, profile: &str) -> Result<()> {
        let result = match self.platform {
            Platform::Posix => {
                self.run("nmcli", &["device", "wifi", "connect", profile]).await
            }
            Platform::Windows => {
                let name_arg = format!("name={}", profile);
                self.run("netsh", &["wlan", "connect", name_arg.as_str()]).await
            }
        };

        match result {
            Ok(out) if output_reports_failure(&out) => {
                // Exit status said success but the tool printed an error.
                Err(Error::connect_failed(profile, out.trim()))
            }
            Ok(out) => {
                info!("{} connect {}: {}", self.platform.as_str(), profile, out.trim());
                Ok(())
            }
            Err(Error::Command(e)) if !e.is_timeout() => Err(Error::connect_failed(profile, e.output())),
            Err(e) => Err(e),
        }
    }
}
