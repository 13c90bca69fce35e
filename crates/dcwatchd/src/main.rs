// # dcwatchd - Datacenter Availability Watcher Daemon
//
// Thin integration layer: all polling, comparison and caching logic lives in
// dcwatch-core. This binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Wiring the OVH source, the memory cache and the optional notifier
// 4. Running the poller until SIGINT/SIGTERM
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Availability API
// - `DCWATCH_API_BASE_URL`: Availability endpoint (default: OVH public endpoint)
// - `DCWATCH_API_TIMEOUT_SECS`: Per-request timeout in seconds (default: 5)
//
// ### Poll loop
// - `DCWATCH_POLL_INTERVAL_MS`: Tick interval in milliseconds (default: 10000)
//
// ### Notifications
// - `DCWATCH_WEBHOOK_URL`: Discord-compatible webhook (optional; unset = log only)
// - `DCWATCH_WEBHOOK_USERNAME`: Display name of the message author
// - `DCWATCH_WEBHOOK_AVATAR_URL`: Avatar of the message author
//
// ### Logging
// - `DCWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// The watched plan list is built in and fixed for the life of the process.
//
// ## Example
//
// ```bash
// export DCWATCH_WEBHOOK_URL=https://discord.com/api/webhooks/<id>/<token>
// export DCWATCH_LOG_LEVEL=debug
//
// dcwatchd
// ```

use anyhow::{Context, Result};
use dcwatch_core::config::{
    ApiConfig, DEFAULT_API_BASE_URL, NotifierConfig, PollConfig, default_webhook_avatar_url,
    default_webhook_username,
};
use dcwatch_core::traits::Notifier;
use dcwatch_core::{MemoryCache, PollEvent, Poller, WatcherConfig, default_watched_configs};
use dcwatch_source_ovh::OvhAvailabilitySource;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DcwatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DcwatchExitCode> for ExitCode {
    fn from(code: DcwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
struct Config {
    api_base_url: String,
    api_timeout_secs: u64,
    poll_interval_ms: u64,
    webhook_url: Option<String>,
    webhook_username: String,
    webhook_avatar_url: String,
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_secs: 5,
            poll_interval_ms: 10_000,
            webhook_url: None,
            webhook_username: default_webhook_username(),
            webhook_avatar_url: default_webhook_avatar_url(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_base_url: env::var("DCWATCH_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_timeout_secs: parse_env("DCWATCH_API_TIMEOUT_SECS")?
                .unwrap_or(defaults.api_timeout_secs),
            poll_interval_ms: parse_env("DCWATCH_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            webhook_url: env::var("DCWATCH_WEBHOOK_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            webhook_username: env::var("DCWATCH_WEBHOOK_USERNAME")
                .unwrap_or(defaults.webhook_username),
            webhook_avatar_url: env::var("DCWATCH_WEBHOOK_AVATAR_URL")
                .unwrap_or(defaults.webhook_avatar_url),
            log_level: env::var("DCWATCH_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Validate the configuration
    ///
    /// Checks URL schemes, numeric ranges and the log level up front so the
    /// daemon fails at startup rather than on the first tick.
    fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://")
        {
            anyhow::bail!(
                "DCWATCH_API_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                self.api_base_url
            );
        }

        if !(1..=60).contains(&self.api_timeout_secs) {
            anyhow::bail!(
                "DCWATCH_API_TIMEOUT_SECS must be between 1 and 60 seconds. Got: {}",
                self.api_timeout_secs
            );
        }

        if !(1_000..=3_600_000).contains(&self.poll_interval_ms) {
            anyhow::bail!(
                "DCWATCH_POLL_INTERVAL_MS must be between 1000 and 3600000. Got: {}",
                self.poll_interval_ms
            );
        }

        if let Some(ref url) = self.webhook_url {
            // Never echo the URL: it contains the webhook token
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("DCWATCH_WEBHOOK_URL must use HTTP or HTTPS scheme");
            }
            if self.webhook_username.trim().is_empty() {
                anyhow::bail!("DCWATCH_WEBHOOK_USERNAME cannot be empty");
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DCWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the library configuration
    fn to_watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            api: ApiConfig {
                base_url: self.api_base_url.clone(),
                timeout_secs: self.api_timeout_secs,
                exclude_datacenters: false,
            },
            watched: default_watched_configs(),
            poll: PollConfig {
                interval_ms: self.poll_interval_ms,
                ..PollConfig::default()
            },
            notifier: match &self.webhook_url {
                Some(url) => NotifierConfig::DiscordWebhook {
                    url: url.clone(),
                    username: self.webhook_username.clone(),
                    avatar_url: self.webhook_avatar_url.clone(),
                },
                None => NotifierConfig::Disabled,
            },
        }
    }
}

/// Parse an optional numeric environment variable
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_number(name, env::var(name).ok())
}

fn parse_number<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number. Got: '{}'", name, raw)),
        None => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DcwatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DcwatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DcwatchExitCode::ConfigError.into();
    }

    info!("Starting dcwatchd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DcwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DcwatchExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DcwatchExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the notifier selected by configuration
#[cfg(feature = "discord")]
fn build_notifier(config: &NotifierConfig) -> Result<Option<Arc<dyn Notifier>>> {
    let notifier = dcwatch_notify_discord::DiscordWebhookNotifier::from_config(config)
        .context("Failed to create webhook notifier")?;
    Ok(notifier.map(|n| Arc::new(n) as Arc<dyn Notifier>))
}

#[cfg(not(feature = "discord"))]
fn build_notifier(config: &NotifierConfig) -> Result<Option<Arc<dyn Notifier>>> {
    if !matches!(config, NotifierConfig::Disabled) {
        warn!(
            "Notifier {} is configured but dcwatchd was built without the discord feature",
            config.type_name()
        );
    }
    Ok(None)
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let watcher_config = config.to_watcher_config();

    let source = OvhAvailabilitySource::from_config(&watcher_config.api)
        .context("Failed to create availability source")?;
    info!("Availability endpoint: {}", source.base_url());

    info!("Notifier type: {}", watcher_config.notifier.type_name());
    let notifier = build_notifier(&watcher_config.notifier)?;
    match &notifier {
        Some(n) => info!("Notifications: {}", n.notifier_name()),
        None => warn!("No webhook configured, changes will only be logged"),
    }

    for watched in &watcher_config.watched {
        info!("Watching {} (server {})", watched.plan_code, watched.server);
    }

    let (poller, mut events) = Poller::new(
        Arc::new(source),
        Arc::new(MemoryCache::new()),
        notifier,
        watcher_config,
    )
    .context("Failed to create poller")?;

    // Keep the event channel drained
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PollEvent::NotifyFailed { .. } | PollEvent::FetchFailed { .. } => {
                    debug!(?event, "Poll event")
                }
                _ => tracing::trace!(?event, "Poll event"),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = poller.clone();
    let poll_handle = tokio::spawn(async move { runner.run_with_shutdown(Some(shutdown_rx)).await });

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    // The poller may already have stopped; nothing to signal then
    let _ = shutdown_tx.send(());

    poll_handle
        .await
        .context("Poller task panicked")?
        .context("Poller failed")?;

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
