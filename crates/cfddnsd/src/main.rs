// # cfddnsd - Cloudflare DDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in cfddns-core.
//
// The cfddnsd daemon is responsible for:
// 1. Loading configuration (TOML file plus `DDNS_*` environment overlay)
// 2. Initializing logging and the runtime
// 3. Wiring address sources and the Cloudflare provider into the engine
// 4. Running until SIGTERM or SIGINT
//
// ## Configuration
//
// - `DDNS_CONFIG`: path to the TOML file (default `config.toml`; optional)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `DDNS_A`, `DDNS_AAAA`, `DDNS_REPEAT`, `DDNS_TIMEOUT`, `DDNS_TTL`,
//   `DDNS_CLOUDFLARE`, `DDNS_DETECT_IPV4`, `DDNS_DETECT_IPV6`: override
//   the matching file settings
//
// ## Example
//
// ```bash
// export DDNS_AAAA=true
// export DDNS_REPEAT=10m
// export DDNS_CLOUDFLARE='[{"zone_id":"023e...","authentication":{"api_token":"..."},"subdomains":[{"name":"home"}]}]'
//
// cfddnsd
// ```

use anyhow::{Context, Result};
use cfddns_core::config::DdnsConfig;
use cfddns_core::traits::{AddressFamily, IpSource};
use cfddns_core::{AddressObserver, DdnsEngine, DetectionStrategy, EngineEvent};
use cfddns_ip_http::HttpIpSource;
use cfddns_ip_route::RouteIpSource;
use cfddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
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
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process-level settings that live outside the TOML file
struct Settings {
    config_path: PathBuf,
    log_level: Level,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        let config_path = env::var("DDNS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let raw_level = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_level = match raw_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                raw_level
            ),
        };

        Ok(Self {
            config_path,
            log_level,
        })
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match DdnsConfig::load(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting cfddnsd");
    info!(
        "Configuration loaded: {} zone(s), A={}, AAAA={}",
        config.cloudflare.len(),
        config.a,
        config.aaaa
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: DdnsConfig) -> Result<()> {
    // One client for every request; carries the configured timeout
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build HTTP client")?;

    let observer = build_observer(&config, &client);
    let provider = Box::new(CloudflareProvider::new(client));

    let (engine, event_rx) = DdnsEngine::new(observer, provider, config)?;

    // Install signal handlers before the first cycle so a failure surfaces early
    let shutdown = shutdown_signal()?;

    let monitor = tokio::spawn(log_events(event_rx));

    engine.run_until(shutdown).await?;

    // The engine owns the only sender; dropping it ends the monitor
    drop(engine);
    if let Err(e) = monitor.await {
        debug!("Event monitor ended abnormally: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Build one address source per enabled family
fn build_observer(config: &DdnsConfig, client: &reqwest::Client) -> AddressObserver {
    let detection = &config.detection;

    config
        .enabled_families()
        .into_iter()
        .fold(AddressObserver::new(), |observer, family| {
            let source: Box<dyn IpSource> = match detection.strategy(family) {
                DetectionStrategy::Http => Box::new(HttpIpSource::with_urls(
                    client.clone(),
                    detection.url(AddressFamily::V4),
                    detection.url(AddressFamily::V6),
                )),
                DetectionStrategy::Route => Box::new(RouteIpSource::with_probes(
                    detection.probe(AddressFamily::V4),
                    detection.probe(AddressFamily::V6),
                )),
            };
            info!("{} detection via {}", family, source.source_name());
            observer.with_source(family, source)
        })
}

/// Log engine events at debug level until the engine goes away
async fn log_events(mut event_rx: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            EngineEvent::CycleCompleted {
                cycle,
                writes,
                failures,
            } => debug!(
                "Cycle {} complete: {} write(s), {} failure(s)",
                cycle, writes, failures
            ),
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Future that completes on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future that completes on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
