// Network Fail-Safe - Desktop Notifications
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Fire-and-forget user notifications.

use std::process::Stdio;
use tracing::{debug, info, warn};

/// Notification urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Critical => "critical",
        }
    }
}

/// Sink for user-facing notifications. Delivery is never awaited.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, urgency: Urgency);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        match urgency {
            Urgency::Critical => warn!("[NOTIFY] {}: {}", title, body),
            _ => info!("[NOTIFY] {}: {}", title, body),
        }
    }
}

/// Notifier that shows desktop notifications through `notify-send`.
///
/// Falls back to the log when `notify-send` cannot be spawned.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        LogNotifier.notify(title, body, urgency);

        // Spawning a tokio child needs a runtime to reap it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let spawned = tokio::process::Command::new("notify-send")
            .args(["-a", self.app_name.as_str(), "-u", urgency.as_str(), title, body])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                handle.spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => debug!("notify-send unavailable: {}", e),
        }
    }
}
