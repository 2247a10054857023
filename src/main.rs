// Network Fail-Safe - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Network Fail-Safe
//!
//! Daemon that keeps the host on the highest-priority authorized network
//! that has working internet.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use network_failsafe::models::{FailoverConfig, APP_ID};
use network_failsafe::services::{
    CommandNetworkAdapter, DesktopNotifier, FailoverEngine, LogNotifier, NetworkAdapter, Notifier,
    Platform, ReachabilityProbe, SystemCommandRunner,
};
use network_failsafe::storage::{DataStore, LogWriter};
use network_failsafe::{APP_NAME, VERSION};

/// What the user asked the binary to do.
#[derive(Debug, Default)]
struct Options {
    debug_mode: bool,
    list_profiles: bool,
    once: bool,
    config_dir: Option<PathBuf>,
}

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
    println!();
    println!("Automatic network failover across a priority list of saved profiles.");
}

/// Print help information and exit.
fn print_help() {
    println!("Usage: {} [OPTIONS]", env::args().next().unwrap_or_else(|| APP_ID.to_string()));
    println!();
    println!("Automatic network failover across a priority list of saved profiles.");
    println!();
    println!("Options:");
    println!("  -h, --help              Show this help message and exit");
    println!("  -v, --version           Show version information and exit");
    println!("  -d, --debug             Enable debug logging");
    println!("  -l, --list-profiles     Print the saved network profiles and exit");
    println!("  -o, --once              Run a single check, print the status as JSON and exit");
    println!("  -c, --config-dir <DIR>  Read config.toml from DIR instead of the default");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG                Set log level (trace, debug, info, warn, error)");
    println!();
    println!("Report bugs to: https://github.com/christosdaggas/network-failsafe/issues");
}

/// Parse arguments. `Err` carries the exit code for early exits.
fn parse_args(args: &[String]) -> Result<Options, ExitCode> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Err(ExitCode::SUCCESS);
            }
            "-v" | "--version" => {
                print_version();
                return Err(ExitCode::SUCCESS);
            }
            "-d" | "--debug" => options.debug_mode = true,
            "-l" | "--list-profiles" => options.list_profiles = true,
            "-o" | "--once" => options.once = true,
            "-c" | "--config-dir" => match iter.next() {
                Some(dir) => options.config_dir = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("Option {} requires a directory argument.", arg);
                    return Err(ExitCode::FAILURE);
                }
            },
            _ => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Try '--help' for more information.");
                return Err(ExitCode::FAILURE);
            }
        }
    }
    Ok(options)
}

/// How long shutdown waits for queued log entries to reach the disk.
const LOG_FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Initialize logging. `--debug` wins over the configured level.
fn init_logging(debug_mode: bool, configured: Option<&str>) {
    let log_level = if debug_mode {
        tracing::Level::DEBUG
    } else {
        configured
            .and_then(|level| level.parse().ok())
            .unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .init();
}

fn build_notifier(config: &FailoverConfig) -> Arc<dyn Notifier> {
    if config.show_notifications && cfg!(target_os = "linux") {
        Arc::new(DesktopNotifier::new(APP_NAME))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
    }
}

async fn run(options: Options, store: Arc<DataStore>) -> ExitCode {
    let config = store.config();
    let platform = Platform::current();
    let runner = Arc::new(SystemCommandRunner::new());
    let adapter = Arc::new(CommandNetworkAdapter::new(
        runner.clone(),
        platform,
        config.command_timeout(),
    ));

    if options.list_profiles {
        return match adapter.list_profiles().await {
            Ok(profiles) => {
                for profile in profiles {
                    println!("{}", profile);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to list profiles: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let probe = Arc::new(ReachabilityProbe::new(runner, platform));
    let engine = FailoverEngine::new(adapter, probe, build_notifier(&config), store.clone());

    let log_writer = LogWriter::spawn(Arc::clone(&store));
    engine.start(log_writer.sink()).await;

    let code = if options.once {
        let status = engine.status();
        engine.stop();
        match serde_json::to_string_pretty(&status) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize status: {}", e);
                ExitCode::FAILURE
            }
        }
    } else {
        let period = engine.config().effective_check_interval();
        let mut summary = tokio::time::interval(period);
        summary.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = summary.tick() => tracing::info!("{}", engine.status().summary()),
            }
        }

        tracing::info!("Shutting down");
        engine.stop();
        ExitCode::SUCCESS
    };

    // The engine owns the last sink; the writer drains once it is gone.
    drop(engine);
    log_writer.finish(LOG_FLUSH_GRACE).await;
    code
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(code) => return code,
    };

    let config_dir = options
        .config_dir
        .clone()
        .unwrap_or_else(DataStore::default_config_dir);
    init_logging(
        options.debug_mode,
        DataStore::peek_log_level(&config_dir).as_deref(),
    );
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::debug!("Config directory: {:?}", config_dir);
    let store = Arc::new(DataStore::with_config_dir(config_dir));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(options, store))
}
