// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of UDElectrical.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! UDElectrical poller entry point.
//!
//! Sets up the configured connection, logs the four readings after every
//! poll and runs until Ctrl-C. On unix, SIGUSR1 forces a refresh and SIGHUP
//! re-reads the API key from the config and re-authenticates.

mod config;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use udelectrical_core::{
    Connection, ConnectionEntry, CoordinatorEvent, CoordinatorRegistry, MemoryReadingStore,
    Reading, ReadingStore, reauthenticate, setup_entry, unload_entry,
};

use crate::config::{AppConfig, config_path};

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let (config, source) = AppConfig::load(&path)?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    info!("🚀 Starting UDElectrical poller");
    info!("✅ Loaded configuration from {}", source);

    let registry = CoordinatorRegistry::new();
    let store: Arc<dyn ReadingStore> = Arc::new(MemoryReadingStore::new());
    let entry = ConnectionEntry::new(config.connection.clone());
    let retry = Duration::from_secs(config.system.setup_retry_secs);

    let Some(connection) = connect(&entry, &registry, &store, retry).await? else {
        info!("Shutdown requested before setup completed");
        return Ok(());
    };
    let connection = Arc::new(connection);

    present(&connection.readings);
    let presenter = Arc::downgrade(&connection);
    let listener = connection.coordinator.subscribe(move |event| {
        let Some(connection) = presenter.upgrade() else {
            return;
        };
        match event {
            CoordinatorEvent::Updated(_) => present(&connection.readings),
            CoordinatorEvent::Failed(failure) if failure.requires_reauth() => {
                error!(
                    "❌ [{}] {}; update api_key and send SIGHUP to re-authenticate",
                    connection.entry.title, failure
                );
            }
            CoordinatorEvent::Failed(failure) => {
                warn!(
                    "⚠️ [{}] Serving stale readings: {}",
                    connection.entry.title, failure
                );
            }
        }
    });

    let signals = spawn_signal_handlers(Arc::clone(&connection), path)?;

    connection.coordinator.run(shutdown_signal()).await;

    if let Some(signals) = signals {
        signals.abort();
    }
    connection.coordinator.unsubscribe(listener);
    unload_entry(&entry.entry_id, &registry);
    info!("👋 UDElectrical poller stopped");
    Ok(())
}

/// Set up the entry, retrying while the API is not ready.
///
/// Returns `None` if Ctrl-C arrives while waiting for a retry.
async fn connect(
    entry: &ConnectionEntry,
    registry: &CoordinatorRegistry,
    store: &Arc<dyn ReadingStore>,
    retry: Duration,
) -> Result<Option<Connection>> {
    loop {
        match setup_entry(entry, registry, Some(Arc::clone(store))).await {
            Ok(connection) => return Ok(Some(connection)),
            Err(e) if e.is_retryable() => {
                warn!("⚠️ {}; retrying in {}s", e, retry.as_secs());
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return Ok(None),
                    () = tokio::time::sleep(retry) => {}
                }
            }
            Err(e) => {
                error!("❌ Setup of {} failed: {}", entry.title, e);
                return Err(e.into());
            }
        }
    }
}

fn present(readings: &[Arc<Reading>]) {
    for reading in readings {
        let description = reading.description();
        let attributes = serde_json::Value::Object(reading.attributes());
        let stale = if reading.is_stale() { " (stale)" } else { "" };

        match reading.current_value() {
            Some(value) => info!(
                "📊 {}: {:.*} {}{} {}",
                description.name,
                usize::from(description.display_precision),
                value,
                description.unit,
                stale,
                attributes
            ),
            None => info!("📊 {}: unknown{} {}", description.name, stale, attributes),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown requested");
}

/// Re-read the API key and swap it in if the API accepts it
async fn reload_credentials(connection: &Connection, path: &Path) {
    let config = match AppConfig::load(path) {
        Ok((config, _)) => config,
        Err(e) => {
            error!("❌ Failed to reload configuration: {:#}", e);
            return;
        }
    };

    if config.connection.host != connection.entry.config.host
        || config.connection.ssl != connection.entry.config.ssl
    {
        warn!("⚠️ Host or TLS setting changed; restart to apply");
    }

    match reauthenticate(connection, &config.connection.api_key).await {
        Ok(_) => {
            info!("🔑 [{}] API key accepted", connection.entry.title);
            connection.coordinator.request_refresh();
        }
        Err(e) => error!("❌ [{}] Re-authentication failed: {}", connection.entry.title, e),
    }
}

#[cfg(unix)]
fn spawn_signal_handlers(
    connection: Arc<Connection>,
    path: PathBuf,
) -> Result<Option<tokio::task::JoinHandle<()>>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut refresh = signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1")?;
    let mut reload = signal(SignalKind::hangup()).context("Failed to register SIGHUP")?;

    Ok(Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = refresh.recv() => connection.coordinator.request_refresh(),
                Some(()) = reload.recv() => reload_credentials(&connection, &path).await,
                else => break,
            }
        }
    })))
}

#[cfg(not(unix))]
fn spawn_signal_handlers(
    _connection: Arc<Connection>,
    _path: PathBuf,
) -> Result<Option<tokio::task::JoinHandle<()>>> {
    Ok(None)
}
