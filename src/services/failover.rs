// Network Fail-Safe - Failover Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Failover decision engine.
//!
//! The engine polls reachability and the active network on a timer and
//! moves the host to the best authorized profile it can reach:
//!
//! - **Scan** when offline or on a network outside the priority list:
//!   connect to the first available profile, skipping the failing one.
//! - **Recover** when online on a lower-priority profile: after
//!   `recover_threshold` stable ticks, try the profiles ranked above it.
//! - **Hold** when online on the top-priority profile.
//!
//! Ticks are single-flight. A tick that arrives while another is running
//! is dropped. Every run carries a generation number. Start and stop bump
//! it while holding the status lock, and a tick only writes status or
//! counters after comparing the number under that same lock. A tick
//! still in flight when the engine is stopped therefore cannot touch
//! status, counters or the network.

use chrono::Local;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard, Weak};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::network::NetworkAdapter;
use super::notify::{Notifier, Urgency};
use super::reachability::Reachability;
use crate::models::{EngineState, EngineStatus, FailoverConfig};

/// Receives human-readable engine events. One sink is active at a time.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Supplies a fresh configuration on every engine start.
pub trait ConfigSource: Send + Sync {
    fn load_config(&self) -> FailoverConfig;
}

impl ConfigSource for FailoverConfig {
    fn load_config(&self) -> FailoverConfig {
        self.clone()
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was in flight, or the engine is not running.
    Skipped,
    /// Stayed on the current network.
    Held,
    /// Connected to a profile.
    Switched { profile: String, index: usize },
    /// Scanned without finding a profile to connect to.
    NoCandidate,
    /// The engine was stopped or restarted while the tick ran.
    Stale,
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Non-zero once the stranded alert fired for the current episode.
    pub fail_count: u32,
    /// Consecutive stable online ticks on a lower-priority profile.
    pub success_count: u32,
}

/// Read from a lock, recovering from poison.
fn read<T: Clone>(lock: &RwLock<T>) -> T {
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Write to a lock, recovering from poison.
fn write<T, R>(lock: &RwLock<T>, writer: impl FnOnce(&mut T) -> R) -> R {
    writer(&mut lock_write(lock))
}

fn lock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Engine lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

struct Shared {
    adapter: Arc<dyn NetworkAdapter>,
    probe: Arc<dyn Reachability>,
    notifier: Arc<dyn Notifier>,
    config_source: Arc<dyn ConfigSource>,

    config: RwLock<Arc<FailoverConfig>>,
    status: RwLock<EngineStatus>,
    log_sink: RwLock<Option<LogSink>>,
    timer: Mutex<Option<JoinHandle<()>>>,

    fail_count: AtomicU32,
    success_count: AtomicU32,
    in_flight: AtomicBool,
    /// Only changed while the status write lock is held.
    generation: AtomicU64,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Run `update` on the status if `generation` is still current.
    ///
    /// Counter updates that belong to a tick go inside `update` too, so
    /// they cannot land after a stop. `update` must not log or notify.
    fn guarded<R>(&self, generation: u64, update: impl FnOnce(&mut EngineStatus) -> R) -> Option<R> {
        let mut status = lock_write(&self.status);
        if self.is_current(generation) {
            Some(update(&mut status))
        } else {
            None
        }
    }

    /// Begin a new run in `state`. `prepare` runs under the status lock,
    /// before any tick of the new run can be admitted.
    fn advance(&self, state: EngineState, prepare: impl FnOnce()) -> u64 {
        let mut status = lock_write(&self.status);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        status.state = state;
        prepare();
        generation
    }

    /// Generation and configuration a new tick runs under, or `None` when
    /// ticks are not accepted.
    fn admit(&self) -> Option<(u64, Arc<FailoverConfig>)> {
        let status = match self.status.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match status.state {
            EngineState::Stopped | EngineState::NoConfig => None,
            _ => Some((self.generation.load(Ordering::SeqCst), read(&self.config))),
        }
    }

    fn log(&self, message: &str) {
        info!("[STATUS] {}", message);
        let sink = read(&self.log_sink);
        if let Some(sink) = sink {
            sink(message);
        }
    }

    fn try_enter(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag: &self.in_flight })
    }

    fn cancel_timer(&self) {
        let handle = match self.timer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            debug!("Check timer cancelled");
        }
    }
}

/// Holds the single-flight flag; clears it when dropped.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Puts the engine back to RUNNING when a connect attempt ends, however it ends.
struct SwitchScope<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl Drop for SwitchScope<'_> {
    fn drop(&mut self) {
        self.shared
            .guarded(self.generation, |s| s.state = EngineState::Running);
    }
}

/// State for one tick. Owning the flight guard is what makes
/// [`TickRun::try_connect`] mutually exclusive with other ticks.
struct TickRun<'a> {
    shared: &'a Shared,
    config: Arc<FailoverConfig>,
    generation: u64,
    _flight: FlightGuard<'a>,
}

impl TickRun<'_> {
    fn live(&self) -> bool {
        self.shared.is_current(self.generation)
    }

    fn guarded<R>(&self, update: impl FnOnce(&mut EngineStatus) -> R) -> Option<R> {
        self.shared.guarded(self.generation, update)
    }

    fn set_state(&self, state: EngineState) -> bool {
        self.guarded(|s| s.state = state).is_some()
    }

    fn log(&self, message: &str) {
        if self.live() {
            self.shared.log(message);
        } else {
            debug!("[STALE] {}", message);
        }
    }

    fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        if self.live() {
            self.shared.notifier.notify(title, body, urgency);
        }
    }

    async fn is_available(&self, profile: &str) -> bool {
        match self.shared.adapter.is_profile_available(profile).await {
            Ok(available) => available,
            Err(e) => {
                debug!("Availability check for {} failed: {}", profile, e);
                false
            }
        }
    }

    async fn run(self) -> TickOutcome {
        let config = Arc::clone(&self.config);
        let online = self
            .shared
            .probe
            .has_internet(&config.probe_targets, config.probe_timeout())
            .await;
        let active = match self.shared.adapter.active_network().await {
            Ok(active) => active,
            Err(e) => {
                debug!("Active network lookup failed: {}", e);
                None
            }
        };

        let actual_index = active.as_deref().and_then(|name| config.index_of(name));
        let refreshed = self.guarded(|s| {
            s.online = Some(online);
            s.network = active.clone();
            s.index = actual_index;
            s.last_check = Some(Local::now());
        });
        if refreshed.is_none() {
            return TickOutcome::Stale;
        }

        match actual_index {
            Some(index) if online && index == 0 => self.hold(),
            Some(index) if online => self.recover(index).await,
            _ => self.scan(online, actual_index).await,
        }
    }

    /// Offline, or on a network outside the priority list.
    async fn scan(&self, online: bool, actual_index: Option<usize>) -> TickOutcome {
        if !self.set_state(EngineState::Scanning) {
            return TickOutcome::Stale;
        }
        let index_label = actual_index.map(|i| i as i64).unwrap_or(-1);
        self.log(&format!(
            "Issue detected (Online: {}, Index: {}). Scanning...",
            online, index_label
        ));

        for (index, target) in self.config.priority_list.iter().enumerate() {
            if Some(index) == actual_index {
                self.log(&format!(
                    "Skipping {} (already connected but no internet).",
                    target
                ));
                continue;
            }
            let available = self.is_available(target).await;
            if !self.live() {
                return TickOutcome::Stale;
            }
            if !available {
                continue;
            }
            if self.try_connect(index).await {
                self.guarded(|_| {
                    self.shared.fail_count.store(0, Ordering::SeqCst);
                    self.shared.success_count.store(0, Ordering::SeqCst);
                });
                return TickOutcome::Switched {
                    profile: target.clone(),
                    index,
                };
            }
            if !self.live() {
                return TickOutcome::Stale;
            }
        }

        let first_alert = self.guarded(|_| {
            if online || self.shared.fail_count.load(Ordering::SeqCst) != 0 {
                return false;
            }
            self.shared.fail_count.store(1, Ordering::SeqCst);
            true
        });
        match first_alert {
            None => return TickOutcome::Stale,
            Some(true) => self.notify(
                "Connection Lost",
                "No authorized backup networks found in range.",
                Urgency::Critical,
            ),
            Some(false) => {}
        }
        TickOutcome::NoCandidate
    }

    /// Online on a lower-priority profile.
    async fn recover(&self, actual_index: usize) -> TickOutcome {
        let stable = self.guarded(|s| {
            s.state = EngineState::Running;
            self.shared.success_count.fetch_add(1, Ordering::SeqCst) + 1
        });
        let Some(stable) = stable else {
            return TickOutcome::Stale;
        };
        if stable < self.config.effective_recover_threshold() {
            return TickOutcome::Held;
        }

        self.log("Checking if higher priority networks are back in range...");
        for (index, better) in self.config.priority_list[..actual_index].iter().enumerate() {
            let available = self.is_available(better).await;
            if !self.live() {
                return TickOutcome::Stale;
            }
            if !available {
                continue;
            }
            if self.try_connect(index).await {
                self.guarded(|_| self.shared.success_count.store(0, Ordering::SeqCst));
                return TickOutcome::Switched {
                    profile: better.clone(),
                    index,
                };
            }
            if !self.live() {
                return TickOutcome::Stale;
            }
        }

        // Nothing better; require a fresh stability run before looking again.
        match self.guarded(|_| self.shared.success_count.store(0, Ordering::SeqCst)) {
            Some(()) => TickOutcome::Held,
            None => TickOutcome::Stale,
        }
    }

    /// Online on the top-priority profile.
    fn hold(&self) -> TickOutcome {
        let held = self.guarded(|s| {
            s.state = EngineState::Running;
            self.shared.fail_count.store(0, Ordering::SeqCst);
        });
        match held {
            Some(()) => TickOutcome::Held,
            None => TickOutcome::Stale,
        }
    }

    /// Attempt to connect to the profile at `index`. Never fails; errors are
    /// logged and reported as `false`. Nothing is attempted once the run is
    /// stale.
    async fn try_connect(&self, index: usize) -> bool {
        let Some(name) = self.config.priority_list.get(index) else {
            return false;
        };

        if !self.set_state(EngineState::Switching) {
            debug!("Not connecting to {}: engine stopped", name);
            return false;
        }
        let _scope = SwitchScope {
            shared: self.shared,
            generation: self.generation,
        };
        self.notify(
            "Network Switch",
            &format!("Attempting to connect to: {}", name),
            Urgency::Normal,
        );

        let result = self.shared.adapter.connect(name).await;

        match result {
            Ok(()) => {
                let recorded = self.guarded(|s| {
                    s.network = Some(name.clone());
                    s.index = Some(index);
                });
                if recorded.is_none() {
                    debug!("Discarding connect result for {}: engine restarted", name);
                    return false;
                }
                self.log(&format!("Connected to {}.", name));
                self.notify(
                    "Connected",
                    &format!("Successfully switched to {}", name),
                    Urgency::Normal,
                );
                true
            }
            Err(e) => {
                self.log(&format!("Connection Error: {}", e));
                false
            }
        }
    }
}

/// Handle to a failover engine. Clones share the same engine.
#[derive(Clone)]
pub struct FailoverEngine {
    shared: Arc<Shared>,
}

impl FailoverEngine {
    /// Create an engine in the INIT state.
    pub fn new(
        adapter: Arc<dyn NetworkAdapter>,
        probe: Arc<dyn Reachability>,
        notifier: Arc<dyn Notifier>,
        config_source: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                adapter,
                probe,
                notifier,
                config_source,
                config: RwLock::new(Arc::new(FailoverConfig::default())),
                status: RwLock::new(EngineStatus::default()),
                log_sink: RwLock::new(None),
                timer: Mutex::new(None),
                fail_count: AtomicU32::new(0),
                success_count: AtomicU32::new(0),
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start (or restart) the engine.
    ///
    /// Cancels any running timer, installs `log_sink` in place of the
    /// previous one, re-reads the configuration, runs one tick and arms
    /// the periodic timer. With an empty priority list the engine goes
    /// to NO_CONFIG and no timer is armed.
    pub async fn start(&self, log_sink: LogSink) {
        let shared = &self.shared;
        shared.cancel_timer();

        let config = Arc::new(shared.config_source.load_config());
        let state = if config.has_priority_list() {
            EngineState::Running
        } else {
            EngineState::NoConfig
        };
        let generation = shared.advance(state, || {
            write(&shared.log_sink, |sink| *sink = Some(log_sink));
            write(&shared.config, |c| *c = Arc::clone(&config));
            // Seeded so the first tick may try an upgrade straight away.
            shared
                .success_count
                .store(config.effective_recover_threshold(), Ordering::SeqCst);
            shared.fail_count.store(0, Ordering::SeqCst);
        });

        if state == EngineState::NoConfig {
            shared.log("Engine started but no priority list is configured.");
            return;
        }

        shared.log("Engine started.");
        debug!(
            "Priority list: {:?} (recover threshold {}, fail threshold {} unused)",
            config.priority_list,
            config.effective_recover_threshold(),
            config.fail_threshold
        );

        if self.tick().await == TickOutcome::Skipped {
            debug!("Initial check skipped: a check from the previous run still holds the gate");
        }

        if !shared.is_current(generation) {
            return;
        }
        let period = config.effective_check_interval();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let engine = FailoverEngine { shared };
                // Spawned so an overrunning tick is absorbed by the flight guard.
                tokio::spawn(async move {
                    engine.tick().await;
                });
            }
        });
        match shared.timer.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
        info!("Check timer armed every {}ms", period.as_millis());
    }

    /// Stop the engine. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        let shared = &self.shared;
        shared.cancel_timer();
        shared.advance(EngineState::Stopped, || {});
        shared.log("Engine stopped.");
    }

    /// Run one evaluation.
    pub async fn tick(&self) -> TickOutcome {
        let shared = &*self.shared;
        let Some((generation, config)) = shared.admit() else {
            return TickOutcome::Skipped;
        };
        if !config.has_priority_list() {
            return TickOutcome::Skipped;
        }
        let Some(flight) = shared.try_enter() else {
            debug!("Tick skipped: previous tick or switch still in progress");
            return TickOutcome::Skipped;
        };

        let run = TickRun {
            shared,
            config,
            generation,
            _flight: flight,
        };
        let outcome = run.run().await;
        debug!("Tick outcome: {:?}", outcome);
        outcome
    }

    /// Point-in-time copy of the engine status.
    pub fn status(&self) -> EngineStatus {
        read(&self.shared.status)
    }

    /// Configuration of the current run.
    pub fn config(&self) -> Arc<FailoverConfig> {
        read(&self.shared.config)
    }

    pub fn counters(&self) -> Counters {
        Counters {
            fail_count: self.shared.fail_count.load(Ordering::SeqCst),
            success_count: self.shared.success_count.load(Ordering::SeqCst),
        }
    }
}
