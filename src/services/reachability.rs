// Network Fail-Safe - Reachability Probe
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Internet reachability check.
//!
//! Pings a short ordered list of targets, one echo request each, and
//! reports success on the first reply. There is no retry; the caller's
//! polling interval is the retry cadence.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::command::CommandRunner;
use super::Platform;

/// Extra time granted to `ping` on top of its own reply timeout.
const PING_GRACE: Duration = Duration::from_millis(1000);

/// Answers whether the host can currently reach the internet.
#[async_trait]
pub trait Reachability: Send + Sync {
    /// Try each target once, in order; true on the first reply.
    async fn has_internet(&self, targets: &[String], per_target_timeout: Duration) -> bool;
}

/// Ping-based reachability probe.
pub struct ReachabilityProbe {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
}

impl ReachabilityProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, platform: Platform) -> Self {
        Self { runner, platform }
    }

    /// Arguments for a single echo request to `target`.
    fn ping_args(&self, target: &str, timeout: Duration) -> Vec<String> {
        match self.platform {
            Platform::Posix => {
                let secs = timeout.as_secs().max(1);
                vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), target.into()]
            }
            Platform::Windows => {
                let ms = timeout.as_millis().max(1);
                vec!["-n".into(), "1".into(), "-w".into(), ms.to_string(), target.into()]
            }
        }
    }

    /// Check a single target.
    pub async fn check_target(&self, target: &str, timeout: Duration) -> bool {
        let args = self.ping_args(target, timeout);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let limit = timeout + PING_GRACE;

        match self.runner.run("ping", &args, limit).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Reachability probe to {} failed: {}", target, e);
                false
            }
        }
    }
}

#[async_trait]
impl Reachability for ReachabilityProbe {
    async fn has_internet(&self, targets: &[String], per_target_timeout: Duration) -> bool {
        for target in targets {
            if self.check_target(target, per_target_timeout).await {
                debug!("Reachability: {} answered", target);
                return true;
            }
        }
        debug!("Reachability: all {} target(s) failed", targets.len());
        false
    }
}
