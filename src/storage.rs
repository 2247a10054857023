// Network Fail-Safe - Local Storage
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Local data storage for the daemon.
//!
//! Handles:
//! - Failover configuration (`config.toml`)
//! - Log history (`logs.json`), written from a [`LogWriter`] task so the
//!   engine never waits on the disk
//!
//! This module uses RwLock for thread-safe access. Lock poisoning is handled
//! by recovering the inner value; the data itself is still usable.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{FailoverConfig, Result, CONFIG_DIR_NAME};
use crate::services::{ConfigSource, LogSink};

/// Configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Log history file inside the config directory.
pub const LOGS_FILE_NAME: &str = "logs.json";

/// A log entry with timestamp, level, and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    fn now(level: &str, message: &str) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level: level.to_uppercase(),
            message: message.to_string(),
        }
    }
}

/// Read a JSON file; `None` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

/// Write a JSON file readable only by the owner.
fn write_private_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(io::Error::from)?;
    Ok(())
}

/// Local data store for the daemon.
#[derive(Debug)]
pub struct DataStore {
    /// Configuration directory path.
    config_dir: PathBuf,
    /// Configuration file path.
    config_file: PathBuf,
    /// Log file path.
    logs_file: PathBuf,

    /// Last configuration read from disk.
    config: RwLock<FailoverConfig>,
    /// In-memory log entries, oldest first (also persisted to disk).
    logs: RwLock<Vec<LogEntry>>,
}

impl DataStore {
    /// Create a new data store with the default config directory.
    pub fn new() -> Self {
        Self::with_config_dir(Self::default_config_dir())
    }

    /// Default config directory (`$XDG_CONFIG_HOME/network-failsafe`).
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// Log level configured in `config_dir`, read without side effects.
    ///
    /// Used to set up logging before the store itself is opened.
    pub fn peek_log_level(config_dir: &Path) -> Option<String> {
        FailoverConfig::load_from_file(&config_dir.join(CONFIG_FILE_NAME))
            .ok()
            .map(|config| config.log_level)
    }

    /// Create a new data store with a specific config directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&config_dir) {
            error!("Failed to create config directory: {}", e);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700));
        }

        let store = Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
            logs_file: config_dir.join(LOGS_FILE_NAME),
            config_dir,
            config: RwLock::new(FailoverConfig::default()),
            logs: RwLock::new(Vec::new()),
        };

        store.reload_config();
        match read_json::<Vec<LogEntry>>(&store.logs_file) {
            Ok(Some(entries)) => {
                info!("Loaded {} log entries from disk", entries.len());
                store.write_lock(&store.logs, "logs", |logs| *logs = entries);
            }
            Ok(None) => {}
            Err(e) => error!("Failed to load log history: {}", e),
        }
        store
    }

    // ========================================================================
    // RwLock Helper Methods (handle poisoning gracefully)
    // ========================================================================

    /// Read from RwLock, recovering from poison if needed.
    fn read_lock<T, F, R>(&self, lock: &RwLock<T>, context: &str, reader: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        match lock.read() {
            Ok(guard) => reader(&*guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading {}, recovering", context);
                reader(&*poisoned.into_inner())
            }
        }
    }

    /// Write to RwLock, recovering from poison if needed.
    fn write_lock<T, F, R>(&self, lock: &RwLock<T>, context: &str, writer: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        match lock.write() {
            Ok(mut guard) => writer(&mut *guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing {}, recovering", context);
                writer(&mut *poisoned.into_inner())
            }
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Read `config.toml`, writing defaults first if it does not exist.
    ///
    /// A file that fails to parse is left untouched and defaults are used.
    pub fn reload_config(&self) -> FailoverConfig {
        let config = if self.config_file.exists() {
            match FailoverConfig::load_from_file(&self.config_file) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", self.config_file);
                    config
                }
                Err(e) => {
                    error!("Failed to load configuration, using defaults: {}", e);
                    FailoverConfig::default()
                }
            }
        } else {
            let config = FailoverConfig::default();
            match config.save_to_file(&self.config_file) {
                Ok(()) => info!("Wrote default configuration to {:?}", self.config_file),
                Err(e) => error!("Failed to write default configuration: {}", e),
            }
            config
        };

        self.write_lock(&self.config, "config", |c| *c = config.clone());
        config
    }

    /// The configuration as last read from disk.
    pub fn config(&self) -> FailoverConfig {
        self.read_lock(&self.config, "config", |c| c.clone())
    }

    /// Persist a new configuration.
    pub fn save_config(&self, config: &FailoverConfig) -> Result<()> {
        config.save_to_file(&self.config_file)?;
        self.write_lock(&self.config, "config", |c| *c = config.clone());
        Ok(())
    }

    // ========================================================================
    // Logs
    // ========================================================================

    /// All log entries, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.read_lock(&self.logs, "logs", |l| l.clone())
    }

    /// Append a batch of messages and rewrite `logs.json` once.
    ///
    /// Only the newest `max_log_entries` entries are kept. Blocks on file
    /// I/O; async callers go through [`LogWriter`].
    pub fn append_logs(&self, level: &str, messages: &[String]) -> Result<()> {
        let limit = self.config().max_log_entries;
        let snapshot = self.write_lock(&self.logs, "logs", |logs| {
            logs.extend(messages.iter().map(|m| LogEntry::now(level, m)));
            let excess = logs.len().saturating_sub(limit);
            logs.drain(..excess);
            logs.clone()
        });
        write_private_json(&self.logs_file, &snapshot)
    }

    /// Append a single message. Blocks on file I/O.
    pub fn append_log(&self, level: &str, message: &str) -> Result<()> {
        self.append_logs(level, &[message.to_string()])
    }

    /// Drop the whole history, in memory and on disk.
    pub fn clear_logs(&self) -> Result<()> {
        self.write_lock(&self.logs, "logs", |logs| logs.clear());
        write_private_json(&self.logs_file, &Vec::<LogEntry>::new())
    }

    /// Get the config directory path.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for DataStore {
    fn load_config(&self) -> FailoverConfig {
        self.reload_config()
    }
}

/// Background writer for the log history.
///
/// Sinks handed out by [`LogWriter::sink`] only queue the message. A task
/// drains the queue and persists each batch on the blocking pool.
pub struct LogWriter {
    sender: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl LogWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<DataStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::drain(store, receiver));
        Self { sender, task }
    }

    /// A log sink that queues messages for this writer.
    pub fn sink(&self) -> LogSink {
        let sender = self.sender.clone();
        Arc::new(move |message: &str| {
            if sender.send(message.to_string()).is_err() {
                debug!("Log writer gone, dropping: {}", message);
            }
        })
    }

    async fn drain(store: Arc<DataStore>, mut receiver: mpsc::UnboundedReceiver<String>) {
        while let Some(first) = receiver.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = receiver.try_recv() {
                batch.push(next);
            }

            let store = Arc::clone(&store);
            let written = tokio::task::spawn_blocking(move || store.append_logs("info", &batch)).await;
            match written {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to persist log entries: {}", e),
                Err(e) => error!("Log writer task failed: {}", e),
            }
        }
    }

    /// Stop accepting messages and wait up to `grace` for queued ones to be
    /// written. Sinks from [`LogWriter::sink`] must be dropped first or the
    /// wait runs out. Returns whether everything was written.
    pub async fn finish(self, grace: Duration) -> bool {
        drop(self.sender);
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Log writer task failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Log writer still busy after {}ms", grace.as_millis());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DataStore) {
        let dir = TempDir::new().unwrap();
        let store = DataStore::with_config_dir(dir.path().join("cfg"));
        (dir, store)
    }

    fn messages(store: &DataStore) -> Vec<String> {
        store.logs().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_missing_config_writes_defaults() {
        let (dir, store) = store();
        let path = dir.path().join("cfg").join(CONFIG_FILE_NAME);
        assert!(path.exists());
        assert_eq!(store.config(), FailoverConfig::default());
        assert_eq!(FailoverConfig::load_from_file(&path).unwrap(), FailoverConfig::default());
    }

    #[test]
    fn test_config_source_rereads_file() {
        let (_dir, store) = store();
        let edited = FailoverConfig::with_priority_list(["Home", "Phone"]);
        edited.save_to_file(&store.config_dir().join(CONFIG_FILE_NAME)).unwrap();

        assert_eq!(store.load_config().priority_list, vec!["Home", "Phone"]);
        assert_eq!(store.config().priority_list, vec!["Home", "Phone"]);
    }

    #[test]
    fn test_unparseable_config_falls_back_to_defaults() {
        let (_dir, store) = store();
        let path = store.config_dir().join(CONFIG_FILE_NAME);
        fs::write(&path, "priority_list = [").unwrap();

        assert_eq!(store.load_config(), FailoverConfig::default());
        // The broken file is left for the user to fix.
        assert_eq!(fs::read_to_string(&path).unwrap(), "priority_list = [");
    }

    #[test]
    fn test_peek_log_level_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        assert_eq!(DataStore::peek_log_level(dir.path()), None);
        assert!(!dir.path().join(CONFIG_FILE_NAME).exists());

        let config = FailoverConfig {
            log_level: "debug".to_string(),
            ..FailoverConfig::default()
        };
        config.save_to_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(DataStore::peek_log_level(dir.path()).as_deref(), Some("debug"));
    }

    #[test]
    fn test_log_history_is_bounded_and_persisted() {
        let (dir, store) = store();
        let config = FailoverConfig {
            max_log_entries: 3,
            ..FailoverConfig::default()
        };
        store.save_config(&config).unwrap();

        for i in 0..5 {
            store.append_log("info", &format!("entry {}", i)).unwrap();
        }
        assert_eq!(messages(&store), vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(store.logs()[0].level, "INFO");

        let reopened = DataStore::with_config_dir(dir.path().join("cfg"));
        assert_eq!(reopened.logs(), store.logs());

        reopened.clear_logs().unwrap();
        assert!(DataStore::with_config_dir(dir.path().join("cfg")).logs().is_empty());
    }

    #[tokio::test]
    async fn test_log_writer_persists_queued_messages() {
        let (dir, store) = store();
        let store = Arc::new(store);
        let writer = LogWriter::spawn(Arc::clone(&store));

        let sink = writer.sink();
        sink("Engine started.");
        sink("Connected to Home.");
        drop(sink);
        assert!(writer.finish(Duration::from_secs(5)).await);

        assert_eq!(messages(&store), vec!["Engine started.", "Connected to Home."]);
        let reopened = DataStore::with_config_dir(dir.path().join("cfg"));
        assert_eq!(messages(&reopened), vec!["Engine started.", "Connected to Home."]);
    }

    #[tokio::test]
    async fn test_log_writer_finish_times_out_while_a_sink_is_alive() {
        let (_dir, store) = store();
        let writer = LogWriter::spawn(Arc::new(store));
        let _sink = writer.sink();
        assert!(!writer.finish(Duration::from_millis(50)).await);
    }
}
