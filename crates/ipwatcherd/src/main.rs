// # ipwatcherd - IP Watcher Daemon
//
// CRITICAL RULES:
// - This is a THIN integration layer ONLY
// - DO NOT add DNS logic, diffing or scheduling here
// - All watcher logic MUST be in ipwatcher-core
//
// The daemon is responsible for:
// 1. Reading environment variables and the YAML configuration file
// 2. Initializing logging and the runtime
// 3. Wiring the Cloudflare gateway and the HTTP IP lookup into a Scheduler
// 4. Translating SIGTERM/SIGINT into a shutdown request
//
// ## Environment
//
// - `CONFIG_FILE`: Path to the YAML configuration (default: `config.yaml`)
// - `CLOUDFLARE_API_TOKEN`: Cloudflare API token (required)
// - `IPWATCHER_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `IPWATCHER_MODE`: set to `dry-run` to log writes instead of sending them
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export CONFIG_FILE=/etc/ipwatcher/config.yaml
//
// ipwatcherd
// ```

use anyhow::Result;
use ipwatcher_core::{Config, Scheduler, WatchEvent, shutdown};
use ipwatcher_ip_http::HttpIpLookup;
use ipwatcher_provider_cloudflare::CloudflareGateway;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WatcherExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WatcherExitCode> for ExitCode {
    fn from(code: WatcherExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Process settings taken from the environment
struct DaemonEnv {
    config_file: PathBuf,
    api_token: String,
    log_level: String,
    dry_run: bool,
}

// The token must never show up in logs
impl std::fmt::Debug for DaemonEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonEnv")
            .field("config_file", &self.config_file)
            .field("api_token", &"<REDACTED>")
            .field("log_level", &self.log_level)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DaemonEnv {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_file = var("CONFIG_FILE")
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let api_token = var("CLOUDFLARE_API_TOKEN").unwrap_or_default();
        if api_token.trim().is_empty() {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN environment variable is required. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token"
            );
        }

        let log_level = var("IPWATCHER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        if parse_log_level(&log_level).is_none() {
            anyhow::bail!(
                "IPWATCHER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                log_level
            );
        }

        let dry_run = var("IPWATCHER_MODE")
            .unwrap_or_default()
            .eq_ignore_ascii_case("dry-run");

        Ok(Self {
            config_file: PathBuf::from(config_file),
            api_token,
            log_level,
            dry_run,
        })
    }
}

fn parse_log_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let daemon_env = match DaemonEnv::from_env() {
        Ok(daemon_env) => daemon_env,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WatcherExitCode::ConfigError.into();
        }
    };

    let log_level = parse_log_level(&daemon_env.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatcherExitCode::ConfigError.into();
    }

    let config = match Config::load(&daemon_env.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return WatcherExitCode::ConfigError.into();
        }
    };

    info!("Starting ipwatcherd daemon");
    info!(
        "Configuration loaded from {}: {} domain(s)",
        daemon_env.config_file.display(),
        config.domains.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatcherExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(daemon_env, config).await {
            error!("Daemon error: {}", e);
            WatcherExitCode::RuntimeError
        } else {
            WatcherExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(daemon_env: DaemonEnv, config: Config) -> Result<()> {
    let gateway = CloudflareGateway::new(daemon_env.api_token, daemon_env.dry_run)?;
    if gateway.is_dry_run() {
        warn!("Cloudflare gateway running in DRY-RUN mode - no changes will be made");
    }
    let lookup = HttpIpLookup::new()?;

    let (scheduler, events) = Scheduler::new(&config, Arc::new(gateway), Arc::new(lookup))?;
    debug!("{:?}", scheduler);

    // Install handlers before the first pass so an early signal is not lost
    let mut signals = ShutdownSignals::install()?;
    let (handle, shutdown) = shutdown::channel();

    let signal_task = tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received shutdown signal: {}", name);
        handle.trigger();
    });
    let event_task = tokio::spawn(log_events(events));

    let result = scheduler.run(shutdown).await;

    signal_task.abort();
    drop(scheduler);
    // Channel closes with the scheduler; drain what is left
    if let Err(e) = event_task.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    result?;
    info!("IP watcher daemon stopped");
    Ok(())
}

/// Log scheduler events until the channel closes
async fn log_events(mut events: mpsc::Receiver<WatchEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WatchEvent::PassCompleted {
                trigger,
                domains,
                failures,
            } if failures > 0 => {
                warn!(
                    "{:?} pass finished with {} of {} domain(s) failing",
                    trigger, failures, domains
                );
            }
            other => debug!("Event: {:?}", other),
        }
    }
}

/// SIGTERM and SIGINT listeners
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for either signal; returns its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C listener
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
